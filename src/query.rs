//! Query form validation and saved-design naming.

use std::{fmt, str::FromStr};

use log::info;
use serde::{Deserialize, Serialize};

use crate::error::{IndexerError, IndexerResult};

pub const AUTO_DESIGN_SUFFIX: &str = " (new)";
pub const DEFAULT_NEW_DESIGN_NAME: &str = "My saved query";
pub const MAX_DESIGN_NAME_CHARS: usize = 64;

fn default_choice() -> String {
    "default".to_string()
}

fn default_true() -> bool {
    true
}

/// Query editor submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SqlForm {
    pub query: String,
    #[serde(default = "default_true")]
    pub is_parameterized: bool,
    #[serde(default)]
    pub email_notify: bool,
    #[serde(default = "default_choice")]
    pub server: String,
    #[serde(default = "default_choice")]
    pub database: String,
}

impl SqlForm {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            is_parameterized: true,
            email_notify: false,
            server: default_choice(),
            database: default_choice(),
        }
    }

    pub fn validate(&self) -> IndexerResult<()> {
        if self.query.trim().is_empty() {
            return Err(IndexerError::InvalidForm("query is required".to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DesignType {
    Rdbms,
}

impl fmt::Display for DesignType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DesignType::Rdbms => f.write_str("rdbms"),
        }
    }
}

impl FromStr for DesignType {
    type Err = IndexerError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "rdbms" => Ok(DesignType::Rdbms),
            other => Err(IndexerError::InvalidDesignType(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveForm {
    pub name: String,
    #[serde(default)]
    pub desc: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Design {
    /// `None` until the design has been stored.
    pub id: Option<u64>,
    pub name: String,
    pub desc: String,
    pub is_auto: bool,
    pub design_type: Option<DesignType>,
    /// Serialized query form.
    pub data: String,
}

/// Work out the design to store for a submitted query.
///
/// An explicit save renames the current design in place. Otherwise a design
/// whose data changed becomes an auto design: a stored design is cloned and,
/// unless it was already automatic, suffixed with [`AUTO_DESIGN_SUFFIX`]; an
/// unsaved one gets [`DEFAULT_NEW_DESIGN_NAME`]. Names are cut to
/// [`MAX_DESIGN_NAME_CHARS`] characters.
pub fn save_design(
    save_form: Option<&SaveForm>,
    query_form: &SqlForm,
    design_type: &str,
    design: &Design,
) -> IndexerResult<Design> {
    let design_type = design_type.parse::<DesignType>()?;
    query_form.validate()?;
    let new_data = serde_json::to_string(query_form)?;

    let mut saved = design.clone();
    if let Some(form) = save_form {
        saved.name = form.name.clone();
        saved.desc = form.desc.clone();
        saved.is_auto = false;
    } else if new_data != design.data {
        if design.id.is_some() {
            saved.id = None;
            if !design.is_auto {
                saved.name = format!("{}{AUTO_DESIGN_SUFFIX}", design.name);
            }
        } else {
            saved.name = DEFAULT_NEW_DESIGN_NAME.to_string();
        }
        saved.is_auto = true;
    }

    saved.name = saved.name.chars().take(MAX_DESIGN_NAME_CHARS).collect();
    saved.design_type = Some(design_type);
    saved.data = new_data;
    info!(
        "Saved {}design \"{}\"",
        if saved.is_auto { "auto " } else { "" },
        saved.name
    );
    Ok(saved)
}
