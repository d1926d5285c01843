#![allow(dead_code)]

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use tempfile::{TempDir, tempdir};

pub const ORDERS_CSV: &str = "id,customer,amount,ordered_at\n\
1,Alice,42.5,2024-01-01T10:00:00Z\n\
2,Bob,13.37,2024-01-03T11:30:00Z\n\
3,Carol,7.25,2024-02-11T08:15:00Z\n";

/// The smart-indexer binary built for this test run.
pub fn indexer_bin() -> Command {
    Command::cargo_bin("smart-indexer").expect("binary exists")
}

/// Scratch directory helper that cleans up files automatically on drop.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("temp dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Writes `contents` into a file under the workspace and returns the path.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create parent dirs");
        }
        let mut file = File::create(&path).expect("create temp file");
        file.write_all(contents.as_bytes())
            .expect("write temp file contents");
        path
    }

    pub fn read(&self, name: &str) -> String {
        fs::read_to_string(self.temp_dir.path().join(name)).expect("read workspace file")
    }
}

/// A generation request over the orders sample with a date conversion and a
/// dropped column.
pub fn orders_request(collection: &str) -> String {
    serde_json::json!({
        "collection": collection,
        "format": {
            "type": "csv",
            "fieldSeparator": ",",
            "recordSeparator": "\n",
            "quoteChar": "\"",
            "hasHeader": true
        },
        "columns": [
            {"name": "id", "type": "long"},
            {"name": "customer", "type": "string", "keep": false},
            {"name": "amount", "type": "double"},
            {"name": "ordered_at", "type": "string", "operations": [
                {"type": "convert_date",
                 "settings": {"format": "yyyy-MM-dd'T'HH:mm:ss'Z'"},
                 "fields": [{"name": "ordered_on", "type": "date"}]}
            ]}
        ]
    })
    .to_string()
}
