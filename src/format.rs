//! File format profiling.
//!
//! A profile is built once from a bounded sample and never mutated; a client
//! that corrects the detected format sends the edited [`FormatDescriptor`]
//! back, and the profiler trusts it verbatim instead of sniffing again.
//!
//! Format kinds are a closed set ([`FormatKind`]). Each kind has one
//! implementation of [`FileFormat`], selected by [`detect_format`] from the
//! kind tag of the override (or the default kind when sniffing).

use std::io::Read;

use encoding_rs::Encoding;
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::{
    dialect::{DialectSniffer, normalize_terminator},
    error::{IndexerError, IndexerResult},
    field::{Field, FieldTypeName, guess_type},
    io_utils,
};

pub const DEFAULT_SAMPLE_ROWS: usize = 5;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormatKind {
    #[default]
    Csv,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormatDescriptor {
    #[serde(rename = "type", default)]
    pub kind: FormatKind,
    pub field_separator: String,
    pub record_separator: String,
    pub quote_char: String,
    pub has_header: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProfileOptions {
    pub sample_bytes: u64,
    pub sample_rows: usize,
}

impl Default for ProfileOptions {
    fn default() -> Self {
        Self {
            sample_bytes: io_utils::DEFAULT_SAMPLE_BYTES,
            sample_rows: DEFAULT_SAMPLE_ROWS,
        }
    }
}

impl ProfileOptions {
    /// Options with both limits held at or under the defaults.
    pub fn bounded(&self) -> Self {
        Self {
            sample_bytes: self.sample_bytes.min(io_utils::DEFAULT_SAMPLE_BYTES),
            sample_rows: self.sample_rows.min(DEFAULT_SAMPLE_ROWS),
        }
    }
}

/// Structural profile of a sample: format, typed columns, and sample rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormatProfile {
    pub format: FormatDescriptor,
    pub columns: Vec<Field>,
    pub sample: Vec<Vec<String>>,
}

/// Columns and sample rows without the format, as returned when a client asks
/// for field types under a format it already holds.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldsProfile<'a> {
    pub columns: &'a [Field],
    pub sample: &'a [Vec<String>],
}

impl FormatProfile {
    pub fn fields(&self) -> FieldsProfile<'_> {
        FieldsProfile {
            columns: &self.columns,
            sample: &self.sample,
        }
    }

    /// Read a bounded sample from `reader` and profile it.
    pub fn from_reader<R: Read>(
        reader: R,
        encoding: &'static Encoding,
        format_override: Option<&FormatDescriptor>,
        options: &ProfileOptions,
    ) -> anyhow::Result<Self> {
        let options = options.bounded();
        let bytes = io_utils::read_sample(reader, options.sample_bytes)?;
        let text = io_utils::decode_sample(&bytes, encoding)?;
        drop(bytes);
        let format = detect_format(&text, format_override, &options)?;
        Ok(format.profile())
    }
}

/// Capabilities shared by every format implementation.
pub trait FileFormat {
    fn kind(&self) -> FormatKind;
    fn format(&self) -> FormatDescriptor;
    fn fields(&self) -> &[Field];
    fn sample(&self) -> &[Vec<String>];

    fn profile(&self) -> FormatProfile {
        FormatProfile {
            format: self.format(),
            columns: self.fields().to_vec(),
            sample: self.sample().to_vec(),
        }
    }
}

/// Build the format implementation selected by the override's kind, sniffing
/// the default kind when no override is given.
pub fn detect_format(
    sample: &str,
    format_override: Option<&FormatDescriptor>,
    options: &ProfileOptions,
) -> IndexerResult<Box<dyn FileFormat>> {
    let kind = format_override.map(|format| format.kind).unwrap_or_default();
    match kind {
        FormatKind::Csv => Ok(Box::new(CsvFormat::detect(
            sample,
            format_override,
            options,
        )?)),
    }
}

#[derive(Debug, Clone)]
pub struct CsvFormat {
    delimiter: u8,
    quote_char: u8,
    line_terminator: String,
    has_header: bool,
    sample_rows: Vec<Vec<String>>,
    fields: Vec<Field>,
}

impl CsvFormat {
    pub fn detect(
        sample: &str,
        format_override: Option<&FormatDescriptor>,
        options: &ProfileOptions,
    ) -> IndexerResult<Self> {
        let options = options.bounded();
        let (delimiter, quote_char, line_terminator, has_header) = match format_override {
            Some(format) => (
                io_utils::format_byte(&format.field_separator, "field separator")?,
                io_utils::format_byte(&format.quote_char, "quote character")?,
                normalize_terminator(&format.record_separator),
                format.has_header,
            ),
            None => {
                let dialect = DialectSniffer::new().sniff(sample)?;
                (
                    dialect.delimiter,
                    dialect.quote_char,
                    dialect.line_terminator,
                    dialect.has_header,
                )
            }
        };

        let header_offset = usize::from(has_header);
        let mut reader =
            io_utils::open_sample_reader(sample, delimiter, quote_char, &line_terminator);
        let mut rows = Vec::with_capacity(options.sample_rows + header_offset);
        for record in reader.records().take(options.sample_rows + header_offset) {
            let record = record?;
            rows.push(record.iter().map(str::to_string).collect::<Vec<_>>());
        }

        let first_row = rows.first().cloned().unwrap_or_default();
        let sample_rows = rows.into_iter().skip(header_offset).collect::<Vec<_>>();
        let num_columns = guess_num_columns(&sample_rows);
        let types = guess_field_types(&sample_rows, num_columns);
        let header = if has_header {
            first_row
        } else {
            (1..=num_columns).map(|idx| format!("field_{idx}")).collect()
        };

        let fields = match build_fields(header, types) {
            Ok(fields) => fields,
            Err(err) => {
                warn!("Guessing field types failed: {err}");
                Vec::new()
            }
        };
        debug!(
            "Profiled {} sample row(s) into {} column(s)",
            sample_rows.len(),
            fields.len()
        );

        Ok(Self {
            delimiter,
            quote_char,
            line_terminator,
            has_header,
            sample_rows,
            fields,
        })
    }
}

impl FileFormat for CsvFormat {
    fn kind(&self) -> FormatKind {
        FormatKind::Csv
    }

    fn format(&self) -> FormatDescriptor {
        FormatDescriptor {
            kind: self.kind(),
            field_separator: (self.delimiter as char).to_string(),
            record_separator: self.line_terminator.clone(),
            quote_char: (self.quote_char as char).to_string(),
            has_header: self.has_header,
        }
    }

    fn fields(&self) -> &[Field] {
        &self.fields
    }

    fn sample(&self) -> &[Vec<String>] {
        &self.sample_rows
    }
}

/// Statistical mode of the row widths; ties go to the width seen first.
pub fn guess_num_columns(rows: &[Vec<String>]) -> usize {
    let mut counts: Vec<(usize, usize)> = Vec::new();
    for row in rows {
        match counts.iter_mut().find(|(width, _)| *width == row.len()) {
            Some((_, count)) => *count += 1,
            None => counts.push((row.len(), 1)),
        }
    }
    counts
        .iter()
        .fold(None, |best: Option<(usize, usize)>, entry| match best {
            Some(current) if current.1 >= entry.1 => Some(current),
            _ => Some(*entry),
        })
        .map(|(width, _)| width)
        .unwrap_or(0)
}

/// Column types over the sample rows. Rows too short to reach a column are
/// skipped for that column.
pub fn guess_field_types(rows: &[Vec<String>], num_columns: usize) -> Vec<FieldTypeName> {
    (0..num_columns)
        .map(|col| guess_type(rows.iter().filter_map(|row| row.get(col))))
        .collect()
}

fn build_fields(
    header: Vec<String>,
    types: Vec<FieldTypeName>,
) -> IndexerResult<Vec<Field>> {
    if header.len() != types.len() {
        return Err(IndexerError::SchemaMismatch {
            headers: header.len(),
            types: types.len(),
        });
    }
    Ok(header
        .into_iter()
        .zip(types)
        .map(|(name, field_type)| Field::new(name, field_type))
        .collect())
}
