use anyhow::{Context, Result};
use byte_patch::file::{apply_to_path_with_buffer, dry_run_with_buffer, ApplyReport};
use byte_patch::{load_edit_set, EditSet, Manifest, DEFAULT_BUFFER_SIZE};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "byte-patch")]
#[command(about = "Apply byte-range edits to files without loading them", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply a manifest's edits to a file
    Apply {
        /// Edit manifest (TOML)
        #[arg(short, long)]
        manifest: PathBuf,

        /// File to patch
        #[arg(short, long)]
        input: PathBuf,

        /// Where to write the result (defaults to rewriting the input in place)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Stream the edits through without writing anything
        #[arg(short = 'n', long, conflicts_with = "output")]
        dry_run: bool,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check that a manifest fits a file's length
    Check {
        /// Edit manifest (TOML)
        #[arg(short, long)]
        manifest: PathBuf,

        /// File the manifest targets
        #[arg(short, long)]
        input: PathBuf,
    },

    /// List the edits in a manifest
    Show {
        /// Edit manifest (TOML)
        #[arg(short, long)]
        manifest: PathBuf,
    },
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Apply {
            manifest,
            input,
            output,
            dry_run,
            json,
        } => cmd_apply(&manifest, &input, output, dry_run, json),

        Commands::Check { manifest, input } => cmd_check(&manifest, &input),

        Commands::Show { manifest } => cmd_show(&manifest),
    }
}

/// Log to stderr, filtered by RUST_LOG (default: warnings only).
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Helper: Intermediate buffer size, overridable with BYTE_PATCH_BUFFER_SIZE
fn buffer_size() -> Result<usize> {
    match env::var("BYTE_PATCH_BUFFER_SIZE") {
        Ok(value) => {
            let size: usize = value
                .trim()
                .parse()
                .with_context(|| format!("BYTE_PATCH_BUFFER_SIZE is not a size: {value:?}"))?;
            if size == 0 {
                anyhow::bail!("BYTE_PATCH_BUFFER_SIZE must be at least 1");
            }
            Ok(size)
        }
        Err(_) => Ok(DEFAULT_BUFFER_SIZE),
    }
}

fn load(manifest: &Path) -> Result<(Manifest, EditSet)> {
    let loaded = load_edit_set(manifest)?;
    tracing::debug!(
        manifest = %manifest.display(),
        edits = loaded.1.len(),
        "loaded manifest"
    );
    Ok(loaded)
}

fn print_report(report: &ApplyReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }

    match &report.output {
        Some(output) => println!(
            "{} Patched {} -> {}",
            "✓".green(),
            report.input.display(),
            output.display()
        ),
        None => println!(
            "{} {} [DRY RUN - nothing written]",
            "✓".green(),
            report.input.display()
        ),
    }
    println!("  {} edits", format!("{}", report.edits).cyan());
    println!(
        "  {} -> {} bytes",
        report.input_len,
        format!("{}", report.output_len).bold()
    );
    Ok(())
}

fn cmd_apply(
    manifest: &Path,
    input: &Path,
    output: Option<PathBuf>,
    dry: bool,
    json: bool,
) -> Result<()> {
    let (_, edits) = load(manifest)?;

    let buffer_size = buffer_size()?;

    let report = if dry {
        dry_run_with_buffer(input, &edits, buffer_size)?
    } else {
        let output = output.unwrap_or_else(|| input.to_path_buf());
        apply_to_path_with_buffer(input, &output, &edits, buffer_size)?
    };

    print_report(&report, json)
}

fn cmd_check(manifest: &Path, input: &Path) -> Result<()> {
    let (_, edits) = load(manifest)?;
    let input_len = fs::metadata(input)
        .with_context(|| format!("failed to stat {}", input.display()))?
        .len();

    match edits.output_len(input_len) {
        Some(output_len) => {
            println!(
                "{} {} edits fit {} ({} -> {} bytes)",
                "✓".green(),
                edits.len(),
                input.display(),
                input_len,
                output_len
            );
            Ok(())
        }
        None => {
            let needed = edits
                .iter()
                .last()
                .map(|e| e.offset + e.size)
                .unwrap_or_default();
            eprintln!(
                "{} {}: edits reach byte {} but the file has {} bytes",
                "✗".red(),
                input.display(),
                needed,
                input_len
            );
            std::process::exit(1);
        }
    }
}

fn cmd_show(manifest: &Path) -> Result<()> {
    let (meta, edits) = load(manifest)?;

    if !meta.meta.name.is_empty() {
        println!("{}", meta.meta.name.bold());
    }
    if let Some(description) = &meta.meta.description {
        println!("{}", description.dimmed());
    }

    for (index, edit) in edits.iter().enumerate() {
        println!(
            "  #{index} {:>9} offset {} size {} data {} bytes ({:+})",
            edit.kind().to_string().cyan(),
            edit.offset,
            edit.size,
            edit.data.len(),
            edit.len_delta()
        );
    }
    Ok(())
}
