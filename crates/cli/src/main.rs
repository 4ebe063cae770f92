use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use common::typedef::{self, TypedefKind};
use common::Signature;
use engine::{
    ArgValue, ConfigOverrides, DependencyTracker, Finding, LinterConfig, LinterPlugin, QueryContext,
    QueryError,
};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "apilint")]
#[command(about = "Android API usage linter", long_about = None)]
struct Cli {
    /// Rule dataset (overrides APILINT_DATASET and the default location).
    #[arg(long, global = true)]
    dataset: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Clone, Copy, Default)]
struct QueryArgs {
    /// Effective API level of the call site.
    #[arg(long, allow_hyphen_values = true)]
    api_level: Option<i32>,
    /// Report API level bounds even when the level is unknown.
    #[arg(long)]
    strict: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Report findings for one signature.
    Lookup {
        signature: String,
        #[command(flatten)]
        query: QueryArgs,
        /// Print findings as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Report findings for every signature in a file (one per line).
    Check {
        file: PathBuf,
        #[command(flatten)]
        query: QueryArgs,
    },
    /// Resolve a literal argument to its named constant.
    Resolve {
        method: String,
        /// 0-based argument index.
        #[arg(long = "arg")]
        argument: u32,
        /// Literal value: integer (decimal or 0x hex) or text.
        #[arg(long, allow_hyphen_values = true)]
        value: String,
        /// Supertypes of the call's owner, nearest first.
        #[arg(long = "supertype")]
        supertypes: Vec<String>,
    },
    /// Print dataset statistics.
    Stats,
}

fn main() -> anyhow::Result<()> {
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            eprintln!("warning: .env: {}", e);
        }
    }
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let query = match &cli.command {
        Commands::Lookup { query, .. } | Commands::Check { query, .. } => *query,
        Commands::Resolve { .. } | Commands::Stats => QueryArgs::default(),
    };
    let config = LinterConfig::resolve(ConfigOverrides {
        dataset: cli.dataset.clone(),
        api_level: query.api_level,
        strict: query.strict.then_some(true),
    })
    .context("invalid configuration")?;

    let plugin = LinterPlugin::activate(&config);
    if !plugin.is_enabled() {
        tracing::warn!(status = %plugin.status(), "linter inactive, every query reports no findings");
    }

    match &cli.command {
        Commands::Lookup {
            signature, json, ..
        } => cmd_lookup(&plugin, &config, signature, *json)?,
        Commands::Check { file, .. } => cmd_check(&plugin, &config, file)?,
        Commands::Resolve {
            method,
            argument,
            value,
            supertypes,
        } => cmd_resolve(&plugin, method, *argument, value, supertypes)?,
        Commands::Stats => cmd_stats(&plugin, &config),
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// lookup
// ---------------------------------------------------------------------------

fn cmd_lookup(plugin: &LinterPlugin, config: &LinterConfig, text: &str, json: bool) -> anyhow::Result<()> {
    let signature = Signature::parse(text).map_err(QueryError::from)?;
    let findings = plugin.find_rules_for(&signature, &config.query_context())?;

    if json {
        println!("{}", serde_json::to_string_pretty(&findings)?);
        return Ok(());
    }

    println!("{signature}");
    if findings.is_empty() {
        println!("  no findings");
    }
    for finding in &findings {
        println!("  {finding}");
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// check
// ---------------------------------------------------------------------------

fn cmd_check(plugin: &LinterPlugin, config: &LinterConfig, file: &Path) -> anyhow::Result<()> {
    let content = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let results = check_lines(plugin, &config.query_context(), &content);

    let tracker = DependencyTracker::new();
    let mut flagged = 0usize;
    let mut invalid = 0usize;
    for (number, line, result) in &results {
        match result {
            Ok(findings) if findings.is_empty() => {}
            Ok(findings) => {
                flagged += 1;
                tracker.observe_findings(findings);
                println!("{}:{number}: {line}", file.display());
                for finding in findings {
                    println!("    {finding}");
                }
            }
            Err(e) => {
                invalid += 1;
                tracing::error!(file = %file.display(), line = *number, error = %e, "invalid signature");
            }
        }
    }

    println!("+------------------------------------------+");
    println!("| APILINT CHECK                            |");
    println!("+------------------------------------------+");
    println!("| Signatures     : {:>22} |", results.len());
    println!("| Flagged        : {:>22} |", flagged);
    println!("| Invalid        : {:>22} |", invalid);
    println!("+------------------------------------------+");

    let dependencies = tracker.snapshot();
    if dependencies.is_empty() {
        println!("No library dependencies detected.");
    } else {
        println!("\nDETECTED DEPENDENCIES:");
        for artifact in dependencies {
            println!("  {artifact}");
        }
    }
    Ok(())
}

type LineResult<'a> = (usize, &'a str, Result<Vec<Finding>, QueryError>);

/// Queries every signature line in parallel. Blank lines and `#` comments are
/// skipped; results keep input order with 1-based line numbers.
fn check_lines<'a>(plugin: &LinterPlugin, context: &QueryContext, content: &'a str) -> Vec<LineResult<'a>> {
    let lines: Vec<(usize, &str)> = content
        .lines()
        .enumerate()
        .map(|(idx, line)| (idx + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty() && !line.starts_with('#'))
        .collect();

    lines
        .par_iter()
        .map(|&(number, line)| {
            let result = Signature::parse(line)
                .map_err(QueryError::from)
                .and_then(|sig| plugin.find_rules_for(&sig, context));
            (number, line, result)
        })
        .collect()
}

// ---------------------------------------------------------------------------
// resolve
// ---------------------------------------------------------------------------

fn cmd_resolve(
    plugin: &LinterPlugin,
    method: &str,
    argument: u32,
    value: &str,
    supertypes: &[String],
) -> anyhow::Result<()> {
    let call = Signature::parse(method).map_err(QueryError::from)?;
    let value = parse_value(value);
    match plugin.resolve_argument(&call, supertypes, argument, value)? {
        Some(resolution) => {
            println!("{}", resolution.replacement);
            println!("  declared on {} ({})", resolution.declared_on, resolution.source);
        }
        None => println!("no constant for argument {argument} of {call}"),
    }
    Ok(())
}

/// Integers in decimal or `0x` hex, read like a `long` literal; anything
/// else is text. An `int` typedef narrows the value to its 32-bit pattern.
fn parse_value(raw: &str) -> ArgValue<'_> {
    match typedef::parse_literal(raw, TypedefKind::Long) {
        Some(number) => ArgValue::Integer(number),
        None => ArgValue::Text(raw),
    }
}

// ---------------------------------------------------------------------------
// stats
// ---------------------------------------------------------------------------

fn cmd_stats(plugin: &LinterPlugin, config: &LinterConfig) {
    let dataset = plugin.engine().dataset();

    println!("+------------------------------------------+");
    println!("| APILINT DATASET                          |");
    println!("+------------------------------------------+");
    println!("| Status         : {:>22} |", plugin.status().to_string());
    println!("| Records        : {:>22} |", dataset.len());
    println!("| Typedefs       : {:>22} |", dataset.typedef_count());
    println!("+------------------------------------------+");
    println!("Path: {}", config.dataset.display());
    if let Some(digest) = dataset.digest() {
        println!("SHA-256: {digest}");
    }

    println!("\nBY SOURCE:");
    for (source, count) in dataset.count_by_source() {
        println!("  {:<14} {count}", source.label());
    }
    println!("\nBY KIND:");
    for (kind, count) in dataset.count_by_kind() {
        println!("  {:<22} {count}", kind.as_str());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::container::{SourceGroup, StoredRule, TableEntry};
    use common::typedef::{ConstantEntry, TypedefEntry};
    use common::{RuleDataset, RulePayload, RuleTable, Source};
    use std::sync::Arc;

    const SET_FLAGS: &str = "a.B#setFlags(int)";

    fn plugin() -> LinterPlugin {
        let table = RuleTable {
            groups: vec![SourceGroup {
                source: Source::SdkLint,
                entries: vec![TableEntry {
                    pattern: "a.B#old()".into(),
                    rules: vec![StoredRule {
                        payload: RulePayload::Removed { since: Some(30) },
                        artifact: None,
                    }],
                }],
            }],
            typedefs: vec![TypedefEntry {
                method: SET_FLAGS.into(),
                argument: 0,
                kind: TypedefKind::Int,
                flag: true,
                constants: vec!["a.B.HIGH".into(), "a.B.LOW".into()],
                source: Source::SdkLint,
                artifact: None,
            }],
            constants: vec![
                ConstantEntry {
                    name: "a.B.HIGH".into(),
                    value: "0x80000000".into(),
                },
                ConstantEntry {
                    name: "a.B.LOW".into(),
                    value: "1".into(),
                },
            ],
        };
        LinterPlugin::from_dataset(Arc::new(RuleDataset::from_table(table, None).unwrap()))
    }

    #[test]
    fn test_parse_value() {
        assert_eq!(parse_value("8"), ArgValue::Integer(8));
        assert_eq!(parse_value("-1"), ArgValue::Integer(-1));
        assert_eq!(parse_value("0x10000000"), ArgValue::Integer(0x1000_0000));
        assert_eq!(parse_value("-9223372036854775808"), ArgValue::Integer(i64::MIN));
        assert_eq!(parse_value("window"), ArgValue::Text("window"));
    }

    #[test]
    fn test_hex_value_resolves_high_bit_flags() {
        let plugin = plugin();
        let call = Signature::parse(SET_FLAGS).unwrap();
        let none: [&str; 0] = [];
        let resolution = plugin
            .resolve_argument(&call, none, 0, parse_value("0x80000001"))
            .unwrap()
            .unwrap();
        assert_eq!(resolution.replacement.to_string(), "-2147483647 = (B.HIGH | B.LOW)");

        let decimal = plugin
            .resolve_argument(&call, none, 0, parse_value("-2147483647"))
            .unwrap()
            .unwrap();
        assert_eq!(decimal.replacement, resolution.replacement);
    }

    #[test]
    fn test_check_lines_keeps_order_and_reports_invalid() {
        let plugin = plugin();
        let content = "# header\na.B#old()\n\na..B#c()\na.B#fresh()\n";
        let results = check_lines(&plugin, &QueryContext::new(), content);
        let summary: Vec<(usize, &str, Option<usize>)> = results
            .iter()
            .map(|(number, line, result)| (*number, *line, result.as_ref().ok().map(Vec::len)))
            .collect();
        assert_eq!(
            summary,
            vec![(2, "a.B#old()", Some(1)), (4, "a..B#c()", None), (5, "a.B#fresh()", Some(0))]
        );
    }

    #[test]
    fn test_cli_parses() {
        let cli = Cli::try_parse_from([
            "apilint",
            "--dataset",
            "r.rkyv",
            "resolve",
            "android.view.View#setVisibility(int)",
            "--arg",
            "0",
            "--value",
            "8",
            "--supertype",
            "a.B",
            "--supertype",
            "a.C",
        ])
        .unwrap();
        assert_eq!(cli.dataset, Some(PathBuf::from("r.rkyv")));
        match cli.command {
            Commands::Resolve { supertypes, argument, .. } => {
                assert_eq!(argument, 0);
                assert_eq!(supertypes, vec!["a.B", "a.C"]);
            }
            _ => panic!("expected resolve"),
        }
    }
}
