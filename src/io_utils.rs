//! Sample reading, decoding, and CSV reader construction.
//!
//! Every profile starts from a bounded sample: at most
//! [`DEFAULT_SAMPLE_BYTES`] are read from the source and decoded with the
//! requested encoding before any inference runs. The buffer is owned by the
//! caller and dropped once the profile is built.

use std::{
    fs::File,
    io::{BufReader, Read},
    path::Path,
};

use anyhow::{Context, Result, anyhow};
use csv::Terminator;
use encoding_rs::{Encoding, UTF_8};

use crate::error::{IndexerError, IndexerResult};

pub const DEFAULT_SAMPLE_BYTES: u64 = 5 * 1024 * 1024;

pub fn is_dash(path: &Path) -> bool {
    path == Path::new("-")
}

pub fn resolve_encoding(label: Option<&str>) -> Result<&'static Encoding> {
    if let Some(value) = label {
        Encoding::for_label(value.trim().as_bytes())
            .ok_or_else(|| anyhow!("Unknown encoding '{value}'"))
    } else {
        Ok(UTF_8)
    }
}

/// Read at most `limit` bytes from `reader`.
pub fn read_sample<R: Read>(reader: R, limit: u64) -> IndexerResult<Vec<u8>> {
    let mut buffer = Vec::new();
    reader.take(limit).read_to_end(&mut buffer)?;
    Ok(buffer)
}

/// Reader for `path`, or stdin when `path` is `-`.
pub fn open_input(path: &Path) -> Result<Box<dyn Read>> {
    if is_dash(path) {
        return Ok(Box::new(std::io::stdin().lock()));
    }
    let file = File::open(path).with_context(|| format!("Opening input file {path:?}"))?;
    Ok(Box::new(BufReader::new(file)))
}

/// Decode a sample. A multi-byte sequence cut at the sample boundary is
/// replaced rather than rejected; any other malformed input is an error.
pub fn decode_sample(bytes: &[u8], encoding: &'static Encoding) -> Result<String> {
    let (text, _, had_errors) = encoding.decode(bytes);
    if had_errors {
        let trimmed = text.trim_end_matches('\u{FFFD}');
        if trimmed.contains('\u{FFFD}') {
            return Err(anyhow!(
                "Failed to decode sample with encoding {}",
                encoding.name()
            ));
        }
        return Ok(trimmed.to_string());
    }
    Ok(text.into_owned())
}

/// Single ASCII byte for a format character such as `","` or `"\t"`.
pub fn format_byte(value: &str, role: &str) -> IndexerResult<u8> {
    let mut chars = value.chars();
    match (chars.next(), chars.next()) {
        (Some(ch), None) if ch.is_ascii() => Ok(ch as u8),
        _ => Err(IndexerError::FormatDetection(format!(
            "{role} must be a single ASCII character, got {value:?}"
        ))),
    }
}

pub fn terminator_for(record_separator: &str) -> Terminator {
    match record_separator {
        "\n" | "\r\n" | "" => Terminator::CRLF,
        other => match format_byte(other, "record separator") {
            Ok(byte) => Terminator::Any(byte),
            Err(_) => Terminator::CRLF,
        },
    }
}

pub fn open_sample_reader<'a>(
    sample: &'a str,
    delimiter: u8,
    quote: u8,
    record_separator: &str,
) -> csv::Reader<&'a [u8]> {
    let mut builder = csv::ReaderBuilder::new();
    builder
        .has_headers(false)
        .flexible(true)
        .delimiter(delimiter)
        .quote(quote)
        .double_quote(true)
        .terminator(terminator_for(record_separator));
    builder.from_reader(sample.as_bytes())
}

pub fn printable_delimiter(delimiter: u8) -> String {
    match delimiter {
        b',' => ",".to_string(),
        b'\t' => "\\t".to_string(),
        b'\n' => "\\n".to_string(),
        other => (other as char).to_string(),
    }
}
