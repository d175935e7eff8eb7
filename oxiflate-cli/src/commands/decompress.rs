//! Decompress command implementation.

use super::Options;
use crate::Format;
use crate::utils::{
    FileStats, copy_mtime, read_input, set_mtime_secs, strip_suffix, write_output,
};
use oxiflate_deflate::{GzipHeader, gzip_decompress, inflate, zlib_decompress};
use std::fs;
use std::path::Path;

/// Decode `data` in `format`, returning the output and, for gzip, the
/// modification time recorded in the first member header.
pub fn decode(format: Format, data: &[u8]) -> oxiflate_core::Result<(Vec<u8>, Option<u32>)> {
    match format {
        Format::Gzip => {
            let decoded = gzip_decompress(data)?;
            let (header, _) = GzipHeader::parse(data)?;
            Ok((decoded, Some(header.mtime).filter(|&t| t != 0)))
        }
        Format::Zlib => Ok((zlib_decompress(data)?, None)),
        Format::Raw => Ok((inflate(data)?, None)),
    }
}

pub fn cmd_decompress(
    options: &Options,
    input: Option<&Path>,
) -> Result<FileStats, Box<dyn std::error::Error>> {
    let output = match input {
        Some(path) if !options.stdout => Some(
            strip_suffix(path, &options.suffix)
                .ok_or_else(|| format!("unknown suffix, expected {}", options.suffix))?,
        ),
        _ => None,
    };

    let data = read_input(input)?;
    let compressed_len = data.len();
    let (decoded, mtime) = decode(options.format, &data)?;

    write_output(output.as_deref(), &decoded, options.force)?;

    if let (Some(src), Some(dst)) = (input, output.as_deref()) {
        match mtime {
            Some(secs) => set_mtime_secs(dst, secs)?,
            None => copy_mtime(src, dst)?,
        }
        if !options.keep {
            drop(data);
            fs::remove_file(src)?;
        }
    }

    let stats = FileStats::new(
        "decompress",
        options.format.name(),
        input,
        output.as_deref(),
        compressed_len,
        decoded.len(),
    );
    if options.verbose {
        stats.print_verbose();
    }
    Ok(stats)
}
