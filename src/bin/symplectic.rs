//! symplectic CLI
//!
//! Apply a symplectic archive to the working tree, remove what it lists, or
//! generate one from existing files.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use symplectic::archive::DEFAULT_ARCHIVE_FILE;
use symplectic::{
    ApplyOptions, Decoder, FileStore, FsStore, Generator, Reconciler, SnapshotWriter,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "symplectic")]
#[command(version)]
#[command(about = "Flatten a directory tree into one text archive and back")]
struct Cli {
    /// Archive file to apply
    #[arg(default_value = DEFAULT_ARCHIVE_FILE)]
    input: PathBuf,

    /// Run with verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Perform a dry run without creating or removing files
    #[arg(short, long)]
    dry_run: bool,

    /// Remove files instead of creating them
    #[arg(short, long)]
    remove: bool,

    /// Generate symplectic.txt from the existing structure
    #[arg(short, long)]
    generate: bool,

    /// Generate the archive for a specific subfolder only
    #[arg(short, long, requires = "generate")]
    subfolder: Option<String>,

    /// Apply changes and save a snapshot of the resulting files
    #[arg(short = 'S', long, conflicts_with_all = ["remove", "generate"])]
    save_snapshot: bool,

    /// Base directory the archive is applied to or generated from
    #[arg(short = 'C', long, default_value = ".")]
    directory: PathBuf,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let store = FsStore::new();

    if cli.generate {
        return generate(&store, &cli);
    }

    tracing::info!("Processing input file: {}", cli.input.display());
    let text = store
        .read_to_string(&cli.input)
        .with_context(|| format!("Failed to read: {}", cli.input.display()))?;
    let archive = Decoder::new()
        .decode(&text)
        .with_context(|| format!("Failed to parse: {}", cli.input.display()))?;

    if cli.save_snapshot {
        let path = SnapshotWriter::new(&store).snapshot(&archive, &cli.directory)?;
        println!("Changes applied and snapshot saved: {}", path.display());
        return Ok(());
    }

    let options = ApplyOptions::new()
        .with_dry_run(cli.dry_run)
        .with_remove(cli.remove);
    let report = Reconciler::new(&store, options).apply(&archive, &cli.directory)?;

    if cli.dry_run {
        for change in &report.changes {
            println!("  {}", change);
        }
    }

    println!(
        "Files {} {} successfully from {}",
        if cli.dry_run { "would be" } else { "were" },
        if cli.remove { "removed" } else { "created/updated" },
        cli.input.display()
    );

    Ok(())
}

fn generate(store: &FsStore, cli: &Cli) -> Result<()> {
    let text = Generator::new(store).write(&cli.directory, cli.subfolder.as_deref(), cli.dry_run)?;

    let output = cli.directory.join(DEFAULT_ARCHIVE_FILE);
    if cli.dry_run {
        println!("Dry run: {} would be generated with the following content:", output.display());
        println!("{}", text);
    } else {
        println!("Generated {}", output.display());
    }

    Ok(())
}

/// Log to stderr; `RUST_LOG` overrides the level chosen by `--verbose`
fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
