//! Relational backend contract used by the query views.
//!
//! Backends differ in transaction and retry behavior, so none is assumed:
//! every adapter carries a [`StatementPolicy`] and the contract applies it.
//! Catalog reads without an explicit database go to the one selected with
//! [`RdbmsClient::use_database`]. [`SqliteClient`] is the embedded reference
//! adapter.

use std::{collections::BTreeMap, time::Duration};

use itertools::Itertools;
use log::{debug, info, warn};
use rusqlite::{Connection, ErrorCode, types::ValueRef};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{IndexerError, IndexerResult};

/// Connection settings for one configured query server.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryServerConfig {
    pub server_name: String,
    pub server_host: String,
    pub server_port: Option<u16>,
    pub username: String,
    pub password: String,
    /// Database selected on connect.
    pub name: String,
    /// Extra driver options, merged over the derived parameters.
    pub options: BTreeMap<String, String>,
}

impl QueryServerConfig {
    /// Driver parameters: `user`, `password`, `server`, `database`, and
    /// `port` when set, with `options` taking precedence.
    pub fn connection_params(&self) -> BTreeMap<String, String> {
        let mut params = BTreeMap::from([
            ("user".to_string(), self.username.clone()),
            ("password".to_string(), self.password.clone()),
            ("server".to_string(), self.server_host.clone()),
            ("database".to_string(), self.name.clone()),
        ]);
        if let Some(port) = self.server_port {
            params.insert("port".to_string(), port.to_string());
        }
        params.extend(
            self.options
                .iter()
                .map(|(key, value)| (key.clone(), value.clone())),
        );
        params
    }
}

/// Per-adapter statement behavior.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatementPolicy {
    /// End the implicit transaction after catalog reads.
    pub commit_after_read: bool,
    pub statement_timeout: Option<Duration>,
    /// Extra attempts for statements that fail because the backend is busy.
    pub max_retries: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl ResultTable {
    pub fn headers_json(&self) -> IndexerResult<String> {
        Ok(serde_json::to_string(&self.columns)?)
    }

    pub fn data_json(&self) -> IndexerResult<String> {
        Ok(serde_json::to_string(&self.rows)?)
    }
}

pub trait RdbmsClient {
    fn connect(config: &QueryServerConfig, policy: StatementPolicy) -> IndexerResult<Self>
    where
        Self: Sized;

    /// Database that catalog reads default to.
    fn current_database(&self) -> &str;

    /// Select the default database; unknown names are connection errors.
    fn use_database(&mut self, database: &str) -> IndexerResult<()>;

    fn execute_statement(&mut self, statement: &str) -> IndexerResult<ResultTable>;

    fn get_databases(&mut self) -> IndexerResult<Vec<String>>;

    /// Tables of `database`, or of the current database when `None`.
    fn get_tables(&mut self, database: Option<&str>) -> IndexerResult<Vec<String>>;

    /// Columns of `table` in `database`, or in the current database when
    /// `None`.
    fn get_columns(&mut self, database: Option<&str>, table: &str) -> IndexerResult<Vec<String>>;
}

/// Embedded SQLite adapter. The configured database name is the file to open
/// (`:memory:` for a private in-memory database); attached schemas are the
/// other databases.
pub struct SqliteClient {
    connection: Connection,
    policy: StatementPolicy,
    current: String,
}

const MAIN_SCHEMA: &str = "main";

impl SqliteClient {
    fn schema<'a>(&'a self, database: Option<&'a str>) -> &'a str {
        database.unwrap_or(&self.current)
    }

    fn finish_read(&self) -> IndexerResult<()> {
        if self.policy.commit_after_read && !self.connection.is_autocommit() {
            debug!("Committing after catalog read");
            self.connection.execute_batch("COMMIT")?;
        }
        Ok(())
    }

    fn run_once(&self, statement: &str) -> rusqlite::Result<ResultTable> {
        let mut prepared = self.connection.prepare(statement)?;
        let columns = prepared
            .column_names()
            .into_iter()
            .map(str::to_string)
            .collect::<Vec<_>>();
        let width = columns.len();
        let mut rows = Vec::new();
        let mut cursor = prepared.query([])?;
        while let Some(row) = cursor.next()? {
            let mut values = Vec::with_capacity(width);
            for idx in 0..width {
                values.push(json_value(row.get_ref(idx)?));
            }
            rows.push(values);
        }
        Ok(ResultTable { columns, rows })
    }
}

impl RdbmsClient for SqliteClient {
    fn connect(config: &QueryServerConfig, policy: StatementPolicy) -> IndexerResult<Self> {
        let params = config.connection_params();
        let path = params
            .get("database")
            .filter(|name| !name.is_empty())
            .ok_or_else(|| IndexerError::Connection("no database configured".to_string()))?;
        let connection = Connection::open(path)
            .map_err(|err| IndexerError::Connection(format!("opening {path}: {err}")))?;
        if let Some(timeout) = policy.statement_timeout {
            connection
                .busy_timeout(timeout)
                .map_err(|err| IndexerError::Connection(err.to_string()))?;
        }
        info!("Connected to SQLite database {path}");
        Ok(Self {
            connection,
            policy,
            current: MAIN_SCHEMA.to_string(),
        })
    }

    fn current_database(&self) -> &str {
        &self.current
    }

    fn use_database(&mut self, database: &str) -> IndexerResult<()> {
        if !self.get_databases()?.iter().any(|name| name == database) {
            return Err(IndexerError::Connection(format!(
                "unknown database '{database}'"
            )));
        }
        debug!("Using database {database}");
        self.current = database.to_string();
        Ok(())
    }

    fn execute_statement(&mut self, statement: &str) -> IndexerResult<ResultTable> {
        let mut attempt = 0;
        loop {
            match self.run_once(statement) {
                Ok(table) => {
                    debug!(
                        "Statement returned {} row(s) across {} column(s)",
                        table.rows.len(),
                        table.columns.len()
                    );
                    return Ok(table);
                }
                Err(err) if is_busy(&err) && attempt < self.policy.max_retries => {
                    attempt += 1;
                    warn!(
                        "Database busy, retrying statement (attempt {attempt} of {})",
                        self.policy.max_retries
                    );
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    fn get_databases(&mut self) -> IndexerResult<Vec<String>> {
        let mut statement = self.connection.prepare("PRAGMA database_list")?;
        let names = statement
            .query_map([], |row| row.get::<_, String>(1))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(names)
    }

    fn get_tables(&mut self, database: Option<&str>) -> IndexerResult<Vec<String>> {
        let sql = format!(
            "SELECT name FROM {}.sqlite_master WHERE type IN ('table', 'view') \
             AND name NOT LIKE 'sqlite_%' ORDER BY name",
            quote_identifier(self.schema(database))
        );
        let tables = {
            let mut statement = self.connection.prepare(&sql)?;
            statement
                .query_map([], |row| row.get::<_, String>(0))?
                .collect::<Result<Vec<_>, _>>()?
        };
        self.finish_read()?;
        Ok(tables)
    }

    fn get_columns(&mut self, database: Option<&str>, table: &str) -> IndexerResult<Vec<String>> {
        let sql = format!(
            "PRAGMA {}.table_info({})",
            quote_identifier(self.schema(database)),
            quote_identifier(table)
        );
        let columns = {
            let mut statement = self.connection.prepare(&sql)?;
            statement
                .query_map([], |row| row.get::<_, String>(1))?
                .collect::<Result<Vec<_>, _>>()?
        };
        self.finish_read()?;
        Ok(columns)
    }
}

fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn is_busy(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(failure, _)
            if matches!(failure.code, ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked)
    )
}

fn json_value(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(number) => Value::from(number),
        ValueRef::Real(number) => serde_json::Number::from_f64(number)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        ValueRef::Text(bytes) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => {
            Value::String(bytes.iter().map(|byte| format!("{byte:02x}")).join(""))
        }
    }
}
