//! binmap: explore unknown binary formats from the command line.
//!
//! The interactive viewer sits elsewhere; this binary wires the core
//! crates together: load a grammar, parse a file, and print trees,
//! coverage, diffs, frequency maps, or the numeric inspector readout.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::error;
use tracing_subscriber::EnvFilter;

use binmap_analysis::{
    compute_coverage, compute_diff_spans, compute_frequency_map, diff_stats, find_bytes,
    inspect_numbers, intersect_spans, spans_from_leaves, DEFAULT_CHUNK_SIZE,
};
use binmap_core::PagedReader;
use binmap_grammar::load_grammar;
use binmap_parse::{parse_schema, parse_stream};

/// Exit code when an input file does not exist.
const EXIT_NO_INPUT: u8 = 2;

/// binmap, a binary-file exploration engine
#[derive(Parser)]
#[command(name = "binmap")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Emit JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a file with a grammar and print the result
    Parse {
        /// Binary file to parse
        file: PathBuf,
        /// Grammar document
        #[arg(short, long)]
        grammar: PathBuf,
    },
    /// Show covered and unmapped ranges for a parse
    Coverage {
        /// Binary file to parse
        file: PathBuf,
        /// Grammar document
        #[arg(short, long)]
        grammar: PathBuf,
    },
    /// Byte-level diff of two files
    Diff {
        /// Baseline file
        a: PathBuf,
        /// Comparison file
        b: PathBuf,
        /// Attribute changed bytes to fields of this grammar
        #[arg(short, long)]
        grammar: Option<PathBuf>,
    },
    /// Per-byte change frequency across snapshots vs. a baseline
    Freq {
        /// Baseline file
        baseline: PathBuf,
        /// Snapshot files
        #[arg(required = true)]
        snapshots: Vec<PathBuf>,
    },
    /// Find bytes (hex) in a file
    Search {
        /// File to scan
        file: PathBuf,
        /// Needle as hex, e.g. 4e54
        needle: String,
        /// Start offset
        #[arg(long, default_value_t = 0)]
        start: u64,
    },
    /// Decode the bytes at an offset every way at once
    Inspect {
        /// File to inspect
        file: PathBuf,
        /// Offset (decimal or 0x hex)
        offset: String,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if input_missing(&e) {
                error!("{e:#}");
                ExitCode::from(EXIT_NO_INPUT)
            } else {
                error!("{e:#}");
                ExitCode::FAILURE
            }
        }
    }
}

fn input_missing(error: &anyhow::Error) -> bool {
    error
        .chain()
        .any(|cause| match cause.downcast_ref::<binmap_core::Error>() {
            Some(e) => e.is_not_found(),
            None => matches!(
                cause.downcast_ref::<std::io::Error>(),
                Some(io) if io.kind() == std::io::ErrorKind::NotFound
            ),
        })
}

fn run(cli: &Cli) -> Result<()> {
    match &cli.command {
        Commands::Parse { file, grammar } => cmd_parse(file, grammar, cli.json),
        Commands::Coverage { file, grammar } => cmd_coverage(file, grammar, cli.json),
        Commands::Diff { a, b, grammar } => cmd_diff(a, b, grammar.as_deref(), cli.json),
        Commands::Freq {
            baseline,
            snapshots,
        } => cmd_freq(baseline, snapshots, cli.json),
        Commands::Search {
            file,
            needle,
            start,
        } => cmd_search(file, needle, *start),
        Commands::Inspect { file, offset } => cmd_inspect(file, offset),
    }
}

fn open(path: &Path) -> Result<PagedReader> {
    PagedReader::open(path).with_context(|| format!("opening {}", path.display()))
}

fn load(path: &Path) -> Result<binmap_grammar::Grammar> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading grammar {}", path.display()))?;
    let grammar = load_grammar(&text)?;
    Ok(grammar)
}

fn cmd_parse(file: &Path, grammar_path: &Path, json: bool) -> Result<()> {
    let reader = open(file)?;
    let grammar = load(grammar_path)?;

    if matches!(&grammar.kind, binmap_grammar::GrammarKind::RecordStream(_)) {
        let stream = parse_stream(&reader, &grammar)?;
        let mut count = 0usize;
        for record in stream {
            count += 1;
            if json {
                println!("{}", serde_json::to_string(&record.node.to_json())?);
            } else {
                let status = record.error.as_deref().unwrap_or("ok");
                println!(
                    "#{:<6} {:#08x} +{:<6} {:<20} {status}",
                    record.index, record.offset, record.size, record.type_name
                );
            }
        }
        if !json {
            println!("{count} records");
        }
        return Ok(());
    }

    let outcome = parse_schema(&reader, &grammar);
    if json {
        let tree: Vec<_> = outcome.tree.iter().map(|n| n.to_json()).collect();
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "tree": tree,
                "errors": outcome.errors,
            }))?
        );
    } else {
        for leaf in &outcome.leaves {
            let value = leaf
                .value
                .as_ref()
                .map(|v| format!("{:?}", v))
                .unwrap_or_default();
            println!("{:#08x} +{:<6} {:<30} {value}", leaf.offset, leaf.length, leaf.path);
        }
        for e in &outcome.errors {
            println!("error: {e}");
        }
    }
    Ok(())
}

fn cmd_coverage(file: &Path, grammar_path: &Path, json: bool) -> Result<()> {
    let reader = open(file)?;
    let grammar = load(grammar_path)?;
    let outcome = parse_schema(&reader, &grammar);
    let (covered, unmapped) = compute_coverage(&outcome.leaves, reader.size());

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "covered": covered,
                "unmapped": unmapped,
            }))?
        );
    } else {
        for c in &covered {
            println!("covered  {:#08x} +{:<6} {}", c.offset, c.length, c.path);
        }
        for (offset, length) in &unmapped {
            println!("unmapped {offset:#08x} +{length}");
        }
    }
    Ok(())
}

fn cmd_diff(a: &Path, b: &Path, grammar_path: Option<&Path>, json: bool) -> Result<()> {
    let reader_a = open(a)?;
    let reader_b = open(b)?;
    let spans = compute_diff_spans(&reader_a, &reader_b, DEFAULT_CHUNK_SIZE)?;
    let stats = diff_stats(&reader_a, &reader_b, &spans);

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "spans": spans,
                "stats": stats,
            }))?
        );
    } else {
        for (offset, length) in &spans {
            println!("changed {offset:#08x} +{length}");
        }
        println!(
            "{} changed bytes of {} ({:.2}%)",
            stats.changed_bytes, stats.max_size, stats.changed_percent
        );
    }

    if let Some(grammar_path) = grammar_path {
        let grammar = load(grammar_path)?;
        let outcome = parse_schema(&reader_a, &grammar);
        let fields = spans_from_leaves(&outcome.leaves);
        let changes = intersect_spans(&fields, &spans);
        let mut changed: Vec<_> = changes
            .iter()
            .filter(|(_, c)| c.changed)
            .collect();
        changed.sort_by_key(|(_, c)| c.offset);
        for (path, change) in changed {
            println!("field {path}: {} changed bytes", change.changed_bytes);
        }
    }
    Ok(())
}

fn cmd_freq(baseline: &Path, snapshots: &[PathBuf], json: bool) -> Result<()> {
    let base = open(baseline)?;
    let mut readers = Vec::with_capacity(snapshots.len());
    for path in snapshots {
        readers.push(open(path)?);
    }
    let refs: Vec<&PagedReader> = readers.iter().collect();
    let (counts, stats) = compute_frequency_map(&base, &refs, DEFAULT_CHUNK_SIZE)?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "counts": counts,
                "stats": stats,
            }))?
        );
    } else {
        for (offset, count) in counts.iter().enumerate().filter(|(_, c)| **c > 0) {
            println!("{offset:#08x} {count}");
        }
        println!(
            "{} of {} positions changed across {} snapshots",
            stats.union_changed, stats.max_size, stats.snapshots
        );
    }
    Ok(())
}

fn cmd_search(file: &Path, needle_hex: &str, start: u64) -> Result<()> {
    let reader = open(file)?;
    let needle = decode_hex(needle_hex).context("needle must be hex, e.g. 4e54")?;
    match find_bytes(&reader, &needle, start)? {
        Some(offset) => println!("{offset:#08x}"),
        None => println!("not found"),
    }
    Ok(())
}

fn cmd_inspect(file: &Path, offset_text: &str) -> Result<()> {
    let reader = open(file)?;
    let offset = parse_offset(offset_text).context("offset must be decimal or 0x hex")?;
    for (label, cell) in inspect_numbers(&reader, offset) {
        println!("{label:<6} {}", cell.text);
    }
    println!(
        "ascii  {}",
        binmap_analysis::ascii_preview(&reader, offset, 16)
    );
    Ok(())
}

fn decode_hex(text: &str) -> Option<Vec<u8>> {
    let clean: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    if clean.len() % 2 != 0 {
        return None;
    }
    (0..clean.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&clean[i..i + 2], 16).ok())
        .collect()
}

fn parse_offset(text: &str) -> Option<u64> {
    let t = text.trim();
    match t.strip_prefix("0x").or_else(|| t.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16).ok(),
        None => t.parse().ok(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_hex() {
        assert_eq!(decode_hex("4e54"), Some(vec![0x4E, 0x54]));
        assert_eq!(decode_hex("4e 54"), Some(vec![0x4E, 0x54]));
        assert_eq!(decode_hex("4e5"), None);
        assert_eq!(decode_hex("zz"), None);
    }

    #[test]
    fn test_parse_offset() {
        assert_eq!(parse_offset("16"), Some(16));
        assert_eq!(parse_offset("0x10"), Some(16));
        assert_eq!(parse_offset("nope"), None);
    }
}
