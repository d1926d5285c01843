//! Exporting a result grid as a downloadable attachment.

use std::{fmt, str::FromStr};

use serde_json::Value;

use crate::error::{IndexerError, IndexerResult};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Xls,
    #[default]
    Json,
}

impl ExportFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Xls => "xls",
            ExportFormat::Json => "json",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "text/csv",
            ExportFormat::Xls => "application/ms-excel",
            ExportFormat::Json => "application/json",
        }
    }

    pub fn file_name(&self) -> String {
        format!("file_{0}.{0}", self.as_str())
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExportFormat {
    type Err = IndexerError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "csv" => Ok(ExportFormat::Csv),
            "xls" => Ok(ExportFormat::Xls),
            "json" => Ok(ExportFormat::Json),
            other => Err(IndexerError::InvalidForm(format!(
                "unknown export format '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub content_type: &'static str,
    pub file_name: String,
    pub body: Vec<u8>,
}

impl Attachment {
    pub fn content_disposition(&self) -> String {
        format!("attachment; filename={}", self.file_name)
    }
}

/// Build the attachment for JSON-encoded `headers` (array of names) and
/// `data` (array of rows). CSV and XLS share a CSV body; JSON passes `data`
/// through unchanged.
pub fn export(headers: &str, data: &str, format: ExportFormat) -> IndexerResult<Attachment> {
    let body = match format {
        ExportFormat::Json => data.as_bytes().to_vec(),
        ExportFormat::Csv | ExportFormat::Xls => {
            let headers: Vec<Value> = serde_json::from_str(headers)?;
            let rows: Vec<Vec<Value>> = serde_json::from_str(data)?;
            let mut writer = csv::WriterBuilder::new()
                .terminator(csv::Terminator::CRLF)
                .from_writer(Vec::new());
            writer.write_record(headers.iter().map(cell_text))?;
            for row in &rows {
                writer.write_record(row.iter().map(cell_text))?;
            }
            writer
                .into_inner()
                .map_err(|err| IndexerError::Io(err.into_error()))?
        }
    };
    Ok(Attachment {
        content_type: format.content_type(),
        file_name: format.file_name(),
        body,
    })
}

fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}
