use anyhow::{Context, Result};
use clap::Parser;
use common::RuleTable;
use merge::{DatasetBuilder, MergeReport, PartialDataset};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;

/// Merges extractor outputs into the rule dataset container.
#[derive(Parser)]
#[command(name = "rules-bake")]
struct Args {
    /// Directory scanned recursively for `*.json` partial datasets.
    #[arg(long, default_value = "rules")]
    input: PathBuf,
    /// Container to write.
    #[arg(long, default_value = "rules/rules.rkyv")]
    output: PathBuf,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let (table, report) = bake(&args.input)?;
    let digest = table
        .save(&args.output)
        .with_context(|| format!("Failed to write {}", args.output.display()))?;

    println!("{report}");
    println!(
        "Successfully compiled {} with {} rules (sha256 {digest}).",
        args.output.display(),
        report.records()
    );
    Ok(())
}

fn bake(root: &Path) -> Result<(RuleTable, MergeReport)> {
    let mut builder = DatasetBuilder::new();
    if !root.exists() {
        tracing::warn!(
            path = %root.display(),
            "input directory not found, writing an empty dataset"
        );
        return Ok(builder.build());
    }

    for path in json_files(root) {
        tracing::info!(path = %path.display(), "processing");
        let partial = PartialDataset::from_path(&path)?;
        builder.add(partial);
    }
    Ok(builder.build())
}

/// `*.json` files below `root`, sorted so the merge input order is stable.
fn json_files(root: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| p.extension().and_then(|s| s.to_str()) == Some("json"))
        .collect();
    files.sort();
    files
}
