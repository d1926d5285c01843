//! Delimited-text dialect detection.
//!
//! [`DialectSniffer`] looks at a bounded text sample and infers the field
//! delimiter, quote character, record separator, and whether the first row is
//! a header. Delimiter and quote come from `csv_nose`, which scores candidate
//! dialects by how uniform the resulting table is. The record separator is
//! read off the sample, and header presence is voted per column by comparing
//! the first row against the type or length the remaining rows agree on.

use csv_nose::{Quote, Sniffer};
use log::debug;

use crate::error::{IndexerError, IndexerResult};

const DEFAULT_QUOTE: u8 = b'"';
const HEADER_CHECK_ROWS: usize = 20;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dialect {
    pub delimiter: u8,
    pub quote_char: u8,
    pub line_terminator: String,
    pub has_header: bool,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DialectSniffer;

impl DialectSniffer {
    pub fn new() -> Self {
        Self
    }

    /// Sniff `sample`. A sample that splits into fewer than two columns has
    /// no detectable delimiter.
    pub fn sniff(&self, sample: &str) -> IndexerResult<Dialect> {
        if sample.trim().is_empty() {
            return Err(IndexerError::FormatDetection(
                "Could not determine delimiter".to_string(),
            ));
        }
        let terminator = detect_terminator(sample);
        // The sniffer sees `\n`-terminated records whatever the source used.
        let records = match terminator {
            "\r" => sample.replace('\r', "\n"),
            _ => sample.to_string(),
        };

        let metadata = Sniffer::new()
            .sniff_bytes(records.as_bytes())
            .map_err(|err| {
                IndexerError::FormatDetection(format!("Could not determine delimiter: {err}"))
            })?;
        if metadata.num_fields < 2 {
            return Err(IndexerError::FormatDetection(
                "Could not determine delimiter".to_string(),
            ));
        }
        let delimiter = metadata.dialect.delimiter;
        let quote_char = match metadata.dialect.quote {
            Quote::Some(quote) => quote,
            Quote::None => DEFAULT_QUOTE,
        };
        let line_terminator = normalize_terminator(terminator);
        let has_header = detect_header(&records, delimiter, quote_char)?;

        debug!(
            "Sniffed dialect delimiter={:?} quote={:?} header={}",
            delimiter as char, quote_char as char, has_header
        );

        Ok(Dialect {
            delimiter,
            quote_char,
            line_terminator,
            has_header,
        })
    }
}

fn detect_terminator(sample: &str) -> &'static str {
    if sample.contains("\r\n") {
        "\r\n"
    } else if sample.contains('\r') && !sample.contains('\n') {
        "\r"
    } else {
        "\n"
    }
}

/// Collapse the two-character terminator to `\n`.
pub fn normalize_terminator(terminator: &str) -> String {
    terminator.replace("\r\n", "\n")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnShape {
    Numeric,
    Length(usize),
}

fn is_numeric(value: &str) -> bool {
    value.trim().parse::<f64>().is_ok()
}

fn shape_of(value: &str) -> ColumnShape {
    if is_numeric(value) {
        ColumnShape::Numeric
    } else {
        ColumnShape::Length(value.chars().count())
    }
}

/// Per-column heterogeneity vote between the first row and the rows after it.
fn detect_header(sample: &str, delimiter: u8, quote: u8) -> IndexerResult<bool> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(delimiter)
        .quote(quote)
        .from_reader(sample.as_bytes());
    let mut records = reader.records();
    let header = match records.next() {
        Some(record) => record?,
        None => return Ok(false),
    };
    let columns = header.len();
    // None: no row seen yet; Some(None): rows disagreed and the column is out.
    let mut shapes: Vec<Option<Option<ColumnShape>>> = vec![None; columns];

    for record in records.take(HEADER_CHECK_ROWS + 1) {
        let record = record?;
        if record.len() != columns {
            continue;
        }
        for (col, value) in record.iter().enumerate() {
            let shape = shape_of(value);
            shapes[col] = match shapes[col] {
                None => Some(Some(shape)),
                Some(Some(existing)) if existing == shape => Some(Some(existing)),
                _ => Some(None),
            };
        }
    }

    let mut votes = 0i64;
    for (col, shape) in shapes.iter().enumerate() {
        let first = header.get(col).unwrap_or("");
        match shape {
            Some(Some(ColumnShape::Length(length))) => {
                if first.chars().count() != *length {
                    votes += 1;
                } else {
                    votes -= 1;
                }
            }
            Some(Some(ColumnShape::Numeric)) => {
                if is_numeric(first) {
                    votes -= 1;
                } else {
                    votes += 1;
                }
            }
            // Nothing to compare against: the first row stands alone.
            None => votes += 1,
            Some(None) => {}
        }
    }
    Ok(votes > 0)
}
