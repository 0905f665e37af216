use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use filepack_rs::{FileEntry, FilepackConfig, Package, PackageOptions};
use serde::Serialize;
use std::path::{Component, Path, PathBuf};
use tracing::{info, warn};
use walkdir::WalkDir;

#[derive(Parser)]
#[command(name = "fpk", about = "Build, inspect and edit asset packages")]
struct Cli {
    /// Configuration file (TOML) with compression settings
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a package from every file under a directory
    Create { package: PathBuf, dir: PathBuf },
    /// List package entries
    List {
        package: PathBuf,
        /// Print entries as JSON
        #[arg(long)]
        json: bool,
    },
    /// Add a file, replacing an existing entry of the same name
    Add {
        package: PathBuf,
        name: String,
        file: PathBuf,
    },
    /// Remove an entry (its payload is left as dead space)
    Remove { package: PathBuf, name: String },
    /// Extract every entry as a loose file
    Extract { package: PathBuf, output_dir: PathBuf },
    /// Read every entry and report its CRC-32
    Verify { package: PathBuf },
}

#[derive(Serialize)]
struct EntryRow<'a> {
    name: &'a str,
    offset: u32,
    raw_length: u32,
    stored_length: u32,
    compressed: bool,
}

impl<'a> From<&'a FileEntry> for EntryRow<'a> {
    fn from(entry: &'a FileEntry) -> Self {
        Self {
            name: &entry.name,
            offset: entry.offset,
            raw_length: entry.raw_length,
            stored_length: entry.stored_length,
            compressed: entry.is_compressed(),
        }
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => FilepackConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => FilepackConfig::default(),
    };
    let options = config.package_options()?;

    match cli.command {
        Commands::Create { package, dir } => create(&package, &dir, options)?,
        Commands::List { package, json } => list(&package, json, options)?,
        Commands::Add {
            package,
            name,
            file,
        } => {
            let data = std::fs::read(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let mut pkg = Package::open_existing(&package, options)?;
            if pkg.contains(&name) {
                pkg.replace_file(&name, &data)?;
                info!("Replaced {}", name);
            } else {
                pkg.append_file(&name, &data)?;
                info!("Added {}", name);
            }
            pkg.close()?;
        }
        Commands::Remove { package, name } => {
            let mut pkg = Package::open_existing(&package, options)?;
            pkg.remove_file(&name)?;
            pkg.close()?;
            info!("Removed {}", name);
        }
        Commands::Extract {
            package,
            output_dir,
        } => extract(&package, &output_dir, options)?,
        Commands::Verify { package } => verify(&package, options)?,
    }

    Ok(())
}

fn create(package: &Path, dir: &Path, options: PackageOptions) -> anyhow::Result<()> {
    let mut pkg = Package::create(package, options)?;
    let mut count = 0usize;

    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }

        let relative = entry.path().strip_prefix(dir)?;
        let name = relative.to_string_lossy();
        let data = std::fs::read(entry.path())
            .with_context(|| format!("Failed to read {}", entry.path().display()))?;
        pkg.append_file(&name, &data)?;
        count += 1;
    }

    pkg.close()?;
    info!("Created {} with {} files", package.display(), count);
    Ok(())
}

fn list(package: &Path, json: bool, options: PackageOptions) -> anyhow::Result<()> {
    let pkg = Package::open_existing(package, options)?;

    if json {
        let rows: Vec<EntryRow> = pkg.entries().iter().map(EntryRow::from).collect();
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    println!("Package: {}", package.display());
    println!("{:<48} {:>12} {:>12} {:>12}", "Name", "Offset", "Size", "Stored");
    for entry in pkg.entries() {
        println!(
            "{:<48} {:>12} {:>12} {:>12}",
            entry.name, entry.offset, entry.raw_length, entry.stored_length
        );
    }
    println!(
        "{} entries, {} bytes of payload data",
        pkg.file_count(),
        pkg.header().entry_table_offset
    );
    Ok(())
}

/// Map a stored name to a path under `output_dir`, refusing escapes
fn extraction_path(output_dir: &Path, name: &str) -> Option<PathBuf> {
    let relative = PathBuf::from(name.replace('\\', "/"));
    let safe = relative
        .components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
    safe.then(|| output_dir.join(relative))
}

fn extract(package: &Path, output_dir: &Path, options: PackageOptions) -> anyhow::Result<()> {
    let mut pkg = Package::open_existing(package, options)?;
    let entries: Vec<FileEntry> = pkg.entries().iter().cloned().collect();

    for entry in &entries {
        let Some(target) = extraction_path(output_dir, &entry.name) else {
            warn!("Skipping unsafe entry name: {}", entry.name);
            continue;
        };

        let mut data = pkg.entry_buffer(entry)?;
        pkg.read_entry(entry, &mut data, 0)?;

        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&target, &data)
            .with_context(|| format!("Failed to write {}", target.display()))?;
    }

    info!("Extracted {} entries to {}", entries.len(), output_dir.display());
    Ok(())
}

fn verify(package: &Path, options: PackageOptions) -> anyhow::Result<()> {
    let mut pkg = Package::open_existing(package, options)?;
    let entries: Vec<FileEntry> = pkg.entries().iter().cloned().collect();
    let mut failures = 0usize;

    for entry in &entries {
        let result = pkg.entry_buffer(entry).and_then(|mut data| {
            pkg.read_entry(entry, &mut data, 0)?;
            Ok(data)
        });
        match result {
            Ok(data) => println!("{:08x}  {}", crc32fast::hash(&data), entry.name),
            Err(e) => {
                println!("FAILED    {}: {}", entry.name, e);
                failures += 1;
            }
        }
    }

    if failures > 0 {
        bail!("{} of {} entries failed to read", failures, entries.len());
    }
    info!("All {} entries read successfully", entries.len());
    Ok(())
}
