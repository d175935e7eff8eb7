//! OxiFlate CLI - a gzip-style front end for the OxiFlate DEFLATE codec.
//!
//! Compresses each FILE to FILE.gz (or stdin to stdout), and with `-d`
//! restores it. zlib and raw DEFLATE framings are available via `--format`.

mod commands;
mod utils;

use clap::{Parser, ValueEnum};
use commands::{Mode, Options, run_file};
use std::path::PathBuf;
use utils::{FileStats, display_name, print_json};

#[derive(Parser)]
#[command(name = "oxiflate")]
#[command(author, version, about = "Compress or decompress files with DEFLATE")]
#[command(long_about = "
OxiFlate is a Pure Rust DEFLATE, zlib and gzip codec.
Levels run from 0 (store only) to 12 (near-optimal parsing); the default is 6.

Examples:
  oxiflate notes.txt              # writes notes.txt.gz, removes notes.txt
  oxiflate -k -l 12 notes.txt     # best compression, keep the input
  oxiflate -d notes.txt.gz        # restores notes.txt
  oxiflate -t notes.txt.gz        # checks integrity only
  oxiflate -c notes.txt > out.gz  # compress to stdout
  cat data | oxiflate --format zlib > data.zz
")]
struct Cli {
    /// Files to process; stdin/stdout when none (or "-") is given
    files: Vec<PathBuf>,

    /// Decompress
    #[arg(short, long, conflicts_with = "test")]
    decompress: bool,

    /// Test compressed file integrity
    #[arg(short, long)]
    test: bool,

    /// Write to standard output, keep input files
    #[arg(short = 'c', long)]
    stdout: bool,

    /// Keep input files
    #[arg(short, long)]
    keep: bool,

    /// Overwrite existing output files
    #[arg(short, long)]
    force: bool,

    /// Compression level (0-12)
    #[arg(short, long, default_value_t = 6, value_parser = clap::value_parser!(u32).range(0..=12))]
    level: u32,

    /// Container format
    #[arg(long, value_enum, default_value = "gzip")]
    format: Format,

    /// Suffix of compressed files (defaults per format: .gz, .zz, .deflate)
    #[arg(short = 'S', long)]
    suffix: Option<String>,

    /// Report sizes and ratios on stderr
    #[arg(short, long)]
    verbose: bool,

    /// Print a JSON summary of every processed file
    #[arg(long)]
    json: bool,
}

/// Framing around the DEFLATE stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Format {
    /// gzip (RFC 1952)
    Gzip,
    /// zlib (RFC 1950)
    Zlib,
    /// Raw DEFLATE (RFC 1951)
    Raw,
}

impl Format {
    /// Conventional file suffix.
    pub fn suffix(self) -> &'static str {
        match self {
            Self::Gzip => ".gz",
            Self::Zlib => ".zz",
            Self::Raw => ".deflate",
        }
    }

    /// Display name.
    pub fn name(self) -> &'static str {
        match self {
            Self::Gzip => "gzip",
            Self::Zlib => "zlib",
            Self::Raw => "deflate",
        }
    }
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let mode = if cli.test {
        Mode::Test
    } else if cli.decompress {
        Mode::Decompress
    } else {
        Mode::Compress
    };

    let options = Options {
        mode,
        level: cli.level,
        format: cli.format,
        suffix: cli
            .suffix
            .unwrap_or_else(|| cli.format.suffix().to_string()),
        stdout: cli.stdout,
        keep: cli.keep,
        force: cli.force,
        verbose: cli.verbose,
    };
    if options.suffix.is_empty() {
        return Err("suffix must not be empty".into());
    }

    let inputs: Vec<Option<PathBuf>> = if cli.files.is_empty() {
        vec![None]
    } else {
        cli.files
            .into_iter()
            .map(|p| if p.as_os_str() == "-" { None } else { Some(p) })
            .collect()
    };

    let mut stats: Vec<FileStats> = Vec::with_capacity(inputs.len());
    let mut failures = 0usize;
    for input in &inputs {
        match run_file(&options, input.as_deref()) {
            Ok(s) => stats.push(s),
            Err(e) => {
                failures += 1;
                eprintln!("Error: {}: {}", display_name(input.as_deref()), e);
            }
        }
    }

    if cli.json {
        // Keep compressed data on stdout clean.
        let to_stderr = options.writes_stdout(inputs.iter().any(Option::is_none));
        print_json(&stats, to_stderr)?;
    }

    if failures > 0 {
        return Err(format!("{} of {} file(s) failed", failures, inputs.len()).into());
    }
    Ok(())
}
