//! Breadth-first flattening of a field/operation tree.
//!
//! The tree arrives from the client on every generation request. It is owned
//! outright, so it cannot contain back-references, but its size is whatever
//! the payload says; traversal is iterative and capped.

use std::collections::{HashSet, VecDeque};

use serde::{Deserialize, Serialize};

use crate::{
    error::{IndexerError, IndexerResult},
    field::Field,
};

pub const MAX_FLATTENED_FIELDS: usize = 10_000;
pub const MAX_FIELD_DEPTH: usize = 32;

const UUID_BASE_NAME: &str = "_uuid";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldGraph {
    roots: Vec<Field>,
}

impl FieldGraph {
    pub fn new(roots: Vec<Field>) -> Self {
        Self { roots }
    }

    pub fn from_json(payload: &str) -> IndexerResult<Self> {
        Ok(serde_json::from_str(payload)?)
    }

    pub fn roots(&self) -> &[Field] {
        &self.roots
    }

    pub fn flatten(&self) -> IndexerResult<Vec<&Field>> {
        flatten(&self.roots)
    }

    pub fn flatten_kept(&self) -> IndexerResult<Vec<&Field>> {
        flatten_kept(&self.roots)
    }
}

/// Fields in breadth-first order: every field at depth `d` precedes every
/// field at depth `d + 1`; children follow operation order, then the order of
/// each operation's output fields.
pub fn flatten(roots: &[Field]) -> IndexerResult<Vec<&Field>> {
    let mut output = Vec::new();
    let mut queue = roots.iter().map(|field| (field, 0usize)).collect::<VecDeque<_>>();

    while let Some((field, depth)) = queue.pop_front() {
        if output.len() >= MAX_FLATTENED_FIELDS {
            return Err(IndexerError::FieldGraph(format!(
                "more than {MAX_FLATTENED_FIELDS} fields"
            )));
        }
        output.push(field);

        for operation in &field.operations {
            for child in &operation.fields {
                if depth + 1 > MAX_FIELD_DEPTH {
                    return Err(IndexerError::FieldGraph(format!(
                        "field '{}' is nested deeper than {MAX_FIELD_DEPTH} levels",
                        child.name
                    )));
                }
                queue.push_back((child, depth + 1));
            }
        }
    }

    Ok(output)
}

pub fn flatten_kept(roots: &[Field]) -> IndexerResult<Vec<&Field>> {
    Ok(flatten(roots)?
        .into_iter()
        .filter(|field| field.keep)
        .collect())
}

/// `_uuid`, prefixed with underscores until it names no existing column.
pub fn unique_id_name<I, S>(column_names: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let taken = column_names
        .into_iter()
        .map(|name| name.as_ref().to_string())
        .collect::<HashSet<_>>();
    let mut candidate = UUID_BASE_NAME.to_string();
    while taken.contains(&candidate) {
        candidate.insert(0, '_');
    }
    candidate
}
