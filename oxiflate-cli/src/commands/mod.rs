//! Command implementations for OxiFlate CLI.

pub mod compress;
pub mod decompress;

pub use compress::cmd_compress;
pub use decompress::cmd_decompress;
pub use test::cmd_test;

use crate::Format;
use crate::utils::FileStats;
use std::path::Path;

/// What to do with each input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Compress,
    Decompress,
    Test,
}

/// Options shared by every command.
pub struct Options {
    pub mode: Mode,
    pub level: u32,
    pub format: Format,
    pub suffix: String,
    pub stdout: bool,
    pub keep: bool,
    pub force: bool,
    pub verbose: bool,
}

impl Options {
    /// True if processed data goes to stdout rather than files.
    pub fn writes_stdout(&self, has_stdin: bool) -> bool {
        self.mode != Mode::Test && (self.stdout || has_stdin)
    }
}

/// Process one input (`None` for stdin).
pub fn run_file(
    options: &Options,
    input: Option<&Path>,
) -> Result<FileStats, Box<dyn std::error::Error>> {
    match options.mode {
        Mode::Compress => cmd_compress(options, input),
        Mode::Decompress => cmd_decompress(options, input),
        Mode::Test => cmd_test(options, input),
    }
}
