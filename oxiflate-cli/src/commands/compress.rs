//! Compress command implementation.

use super::Options;
use crate::Format;
use crate::utils::{FileStats, copy_mtime, mtime_secs, read_input, with_suffix, write_output};
use oxiflate_deflate::{GzipHeader, GzipWriter, deflate, zlib_compress};
use std::fs;
use std::path::Path;

/// Gzip header recording the input's name and modification time.
fn gzip_header(input: Option<&Path>) -> std::io::Result<GzipHeader> {
    let Some(path) = input else {
        return Ok(GzipHeader::new());
    };
    let header = match path.file_name() {
        Some(name) => GzipHeader::with_filename(&name.to_string_lossy()),
        None => GzipHeader::new(),
    };
    Ok(header.with_mtime(mtime_secs(path)?))
}

pub fn cmd_compress(
    options: &Options,
    input: Option<&Path>,
) -> Result<FileStats, Box<dyn std::error::Error>> {
    let output = match input {
        Some(path) if !options.stdout => {
            if path
                .file_name()
                .is_some_and(|n| n.to_string_lossy().ends_with(&options.suffix))
            {
                return Err(format!("already has {} suffix", options.suffix).into());
            }
            Some(with_suffix(path, &options.suffix))
        }
        _ => None,
    };

    let data = read_input(input)?;
    let original_len = data.len();
    let compressed = match options.format {
        Format::Gzip => GzipWriter::with_header(gzip_header(input)?)
            .level(options.level)
            .compress_to_vec(&data)?,
        Format::Zlib => zlib_compress(&data, options.level)?,
        Format::Raw => deflate(&data, options.level)?,
    };

    write_output(output.as_deref(), &compressed, options.force)?;

    if let (Some(src), Some(dst)) = (input, output.as_deref()) {
        copy_mtime(src, dst)?;
        if !options.keep {
            drop(data);
            fs::remove_file(src)?;
        }
    }

    let mut stats = FileStats::new(
        "compress",
        options.format.name(),
        input,
        output.as_deref(),
        compressed.len(),
        original_len,
    );
    stats.level = Some(options.level);
    if options.verbose {
        stats.print_verbose();
    }
    Ok(stats)
}
