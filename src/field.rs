//! Field model, type catalog, and per-column type guessing.
//!
//! The catalog is an immutable, ordered table built once per process. Its order
//! is the precedence used when a column's per-value guesses disagree: the first
//! catalog entry present among the guesses wins, which biases ambiguous columns
//! toward the more general type.

use std::{
    collections::{BTreeMap, HashSet},
    fmt,
    str::FromStr,
    sync::OnceLock,
};

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{IndexerError, IndexerResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldTypeName {
    Text,
    String,
    Double,
    Long,
    Date,
}

impl FieldTypeName {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldTypeName::Text => "text",
            FieldTypeName::String => "string",
            FieldTypeName::Double => "double",
            FieldTypeName::Long => "long",
            FieldTypeName::Date => "date",
        }
    }

    /// Catalog regex for this type, as written in the catalog.
    pub fn pattern(&self) -> &'static str {
        field_type(*self).pattern
    }
}

impl fmt::Display for FieldTypeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FieldTypeName {
    type Err = IndexerError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        field_types()
            .iter()
            .map(|ty| ty.name)
            .find(|name| name.as_str().eq_ignore_ascii_case(value.trim()))
            .ok_or_else(|| IndexerError::FieldGraph(format!("unknown field type '{value}'")))
    }
}

#[derive(Debug)]
pub struct FieldType {
    pub name: FieldTypeName,
    pub pattern: &'static str,
    matcher: Regex,
}

impl FieldType {
    fn new(name: FieldTypeName, pattern: &'static str) -> Self {
        // Catalog patterns only need to match at the start of the value.
        let anchored = format!("^(?:{pattern})");
        let matcher = Regex::new(&anchored).unwrap_or_else(|err| {
            panic!("catalog pattern for '{name}' must compile: {err}")
        });
        Self {
            name,
            pattern,
            matcher,
        }
    }

    pub fn matches(&self, value: &str) -> bool {
        self.matcher.is_match(value)
    }
}

static FIELD_TYPES: OnceLock<Vec<FieldType>> = OnceLock::new();

/// The ordered type catalog.
pub fn field_types() -> &'static [FieldType] {
    FIELD_TYPES.get_or_init(|| {
        vec![
            FieldType::new(FieldTypeName::Text, r"^.{100,}$"),
            FieldType::new(FieldTypeName::String, r"^.*$"),
            FieldType::new(FieldTypeName::Double, r"^[+-]?[0-9]+\.?[0-9]+$"),
            FieldType::new(FieldTypeName::Long, r"^(?:[+-]?(?:[0-9]+))$"),
            FieldType::new(
                FieldTypeName::Date,
                r"[0-9]+-[0-9]+-[0-9]+T[0-9]+:[0-9]+:[0-9]+(\.[0-9]*)?Z",
            ),
        ]
    })
}

// The catalog is declared in `FieldTypeName` order.
fn field_type(name: FieldTypeName) -> &'static FieldType {
    &field_types()[name as usize]
}

/// Per-value matching order: specific matchers first, the catch-all last.
const VALUE_MATCH_ORDER: [FieldTypeName; 5] = [
    FieldTypeName::Date,
    FieldTypeName::Long,
    FieldTypeName::Double,
    FieldTypeName::Text,
    FieldTypeName::String,
];

/// Most specific type matching a single value, if any does.
pub fn guess_value_type(value: &str) -> Option<FieldTypeName> {
    VALUE_MATCH_ORDER
        .iter()
        .copied()
        .find(|name| field_type(*name).matches(value))
}

/// First catalog entry present among `guesses`, `string` when none is.
pub fn pick_best(guesses: &HashSet<FieldTypeName>) -> FieldTypeName {
    field_types()
        .iter()
        .map(|ty| ty.name)
        .find(|name| guesses.contains(name))
        .unwrap_or(FieldTypeName::String)
}

/// Column type for a set of sample values.
pub fn guess_type<I, S>(samples: I) -> FieldTypeName
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let guesses = samples
        .into_iter()
        .filter_map(|sample| guess_value_type(sample.as_ref()))
        .collect::<HashSet<_>>();
    pick_best(&guesses)
}

/// Catalog regex for `name` with backslashes doubled, for embedding in
/// quoted configuration strings.
pub fn regex_for_type(name: FieldTypeName) -> String {
    name.pattern().replace('\\', "\\\\")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Split,
    Grok,
    ConvertDate,
}

impl OperationKind {
    pub const ALL: [OperationKind; 3] = [
        OperationKind::Split,
        OperationKind::Grok,
        OperationKind::ConvertDate,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            OperationKind::Split => "split",
            OperationKind::Grok => "grok",
            OperationKind::ConvertDate => "convert_date",
        }
    }

    /// Argument names the operator expects, in declaration order.
    pub fn args(&self) -> &'static [&'static str] {
        match self {
            OperationKind::Split => &["splitChar"],
            OperationKind::Grok => &["regexp"],
            OperationKind::ConvertDate => &["format"],
        }
    }
}

/// Serializable operator descriptor, as offered to clients building a tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Operator {
    pub name: &'static str,
    pub args: &'static [&'static str],
}

pub fn operator_catalog() -> Vec<Operator> {
    OperationKind::ALL
        .iter()
        .map(|kind| Operator {
            name: kind.name(),
            args: kind.args(),
        })
        .collect()
}

/// A declared transform on a field. Nothing is executed here; the operation is
/// rendered into the morphline for the ingest engine to run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    #[serde(rename = "type")]
    pub kind: OperationKind,
    #[serde(default)]
    pub settings: BTreeMap<String, String>,
    #[serde(default)]
    pub fields: Vec<Field>,
}

impl Operation {
    pub fn new(kind: OperationKind) -> Self {
        Self {
            kind,
            settings: BTreeMap::new(),
            fields: Vec::new(),
        }
    }

    pub fn with_setting(mut self, name: &str, value: &str) -> Self {
        self.settings.insert(name.to_string(), value.to_string());
        self
    }

    pub fn with_field(mut self, field: Field) -> Self {
        self.fields.push(field);
        self
    }

    pub fn argument(&self, name: &str) -> Option<&str> {
        self.settings.get(name).map(String::as_str)
    }

    /// Argument values in operator declaration order.
    pub fn arguments(&self, owner: &str) -> IndexerResult<Vec<&str>> {
        self.kind
            .args()
            .iter()
            .map(|arg| {
                self.argument(arg)
                    .ok_or_else(|| IndexerError::MissingOperationArgument {
                        field: owner.to_string(),
                        operation: self.kind.name().to_string(),
                        argument: arg.to_string(),
                    })
            })
            .collect()
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldTypeName,
    #[serde(default = "default_true")]
    pub keep: bool,
    #[serde(default = "default_true")]
    pub required: bool,
    #[serde(default)]
    pub operations: Vec<Operation>,
}

impl Field {
    pub fn new(name: impl Into<String>, field_type: FieldTypeName) -> Self {
        Self {
            name: name.into(),
            field_type,
            keep: true,
            required: true,
            operations: Vec::new(),
        }
    }

    pub fn with_operation(mut self, operation: Operation) -> Self {
        self.operations.push(operation);
        self
    }

    pub fn dropped(mut self) -> Self {
        self.keep = false;
        self
    }
}
