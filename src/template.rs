//! Named template lookup and rendering.
//!
//! Templates are Jinja-style text rendered with `minijinja`. They are looked up
//! by file name in the configured directories, falling back to the templates
//! bundled with the crate. `${...}` sequences are plain text to the engine, so
//! morphline and workflow substitutions pass through untouched.
//!
//! Every render sees two helper functions: `format_character(text)` escapes a
//! value for a double-quoted configuration string and `regex_for_type(type)`
//! returns the catalog regex for a field type name.

use std::{
    fs,
    path::{Path, PathBuf},
};

use log::debug;
use minijinja::{Environment, ErrorKind, UndefinedBehavior};
use serde_json::Value;

use crate::{
    error::{IndexerError, IndexerResult},
    field::{FieldTypeName, regex_for_type},
    morphline::format_character,
};

/// Variables handed to a template, as a JSON object.
pub type TemplateContext = Value;

pub const MORPHLINE_TEMPLATE: &str = "morphline_template.conf";
pub const WORKFLOW_TEMPLATE: &str = "workflow.xml";
pub const LOG4J_TEMPLATE: &str = "log4j.properties";

const BUNDLED_TEMPLATES: &[(&str, &str)] = &[
    (
        MORPHLINE_TEMPLATE,
        include_str!("../templates/morphline_template.conf"),
    ),
    (WORKFLOW_TEMPLATE, include_str!("../templates/workflow.xml")),
    (LOG4J_TEMPLATE, include_str!("../templates/log4j.properties")),
];

/// Renders a named template against a context. Implementations own where
/// templates come from and which engine renders them.
pub trait TemplateRenderer {
    fn render(&self, template_name: &str, context: &TemplateContext) -> IndexerResult<String>;
}

#[derive(Debug, Clone, Default)]
pub struct TemplateLookup {
    directories: Vec<PathBuf>,
}

impl TemplateLookup {
    pub fn new<I, P>(directories: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            directories: directories.into_iter().map(Into::into).collect(),
        }
    }

    pub fn directories(&self) -> &[PathBuf] {
        &self.directories
    }

    /// Raw template text, from the first directory holding `name`, else the
    /// bundled copy.
    pub fn get_template(&self, name: &str) -> IndexerResult<String> {
        validate_name(name)?;
        for directory in &self.directories {
            let candidate = directory.join(name);
            if candidate.is_file() {
                debug!("Loading template {:?}", candidate);
                return Ok(fs::read_to_string(&candidate)?);
            }
        }
        BUNDLED_TEMPLATES
            .iter()
            .find(|(bundled, _)| *bundled == name)
            .map(|(_, body)| body.to_string())
            .ok_or_else(|| IndexerError::Template(format!("template '{name}' not found")))
    }
}

impl TemplateRenderer for TemplateLookup {
    fn render(&self, template_name: &str, context: &TemplateContext) -> IndexerResult<String> {
        let source = self.get_template(template_name)?;
        render_source(&source, context)
            .map_err(|err| IndexerError::Template(format!("{template_name}: {err}")))
    }
}

fn validate_name(name: &str) -> IndexerResult<()> {
    let path = Path::new(name);
    if name.is_empty() || path.components().count() != 1 || name.contains("..") {
        return Err(IndexerError::Template(format!(
            "invalid template name '{name}'"
        )));
    }
    Ok(())
}

fn environment() -> Environment<'static> {
    let mut env = Environment::new();
    env.set_keep_trailing_newline(true);
    env.set_trim_blocks(true);
    env.set_lstrip_blocks(true);
    env.set_undefined_behavior(UndefinedBehavior::Strict);
    env.add_function("format_character", |value: String| format_character(&value));
    env.add_function(
        "regex_for_type",
        |type_name: String| -> Result<String, minijinja::Error> {
            type_name
                .parse::<FieldTypeName>()
                .map(regex_for_type)
                .map_err(|err| minijinja::Error::new(ErrorKind::InvalidOperation, err.to_string()))
        },
    );
    env
}

/// Render template text with the helper functions installed. Undefined
/// variables are errors.
pub fn render_source(source: &str, context: &TemplateContext) -> Result<String, minijinja::Error> {
    environment().render_str(source, context)
}
