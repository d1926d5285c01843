//! Morphline configuration generation.
//!
//! Generation is two explicit stages. [`MorphlineContext::assemble`] gathers
//! everything the configuration depends on (collection, flattened fields,
//! format, resource locations) and [`MorphlineContext::variables`] turns it
//! into template variables. A [`TemplateRenderer`] then renders the named
//! template, which owns the command grammar: one block per operation in
//! flattened order, a type check per kept typed field, and removal of the
//! fields that are not kept. The rendered text is not validated here; the
//! ingest engine owns its grammar.

use std::collections::BTreeMap;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::{
    error::IndexerResult,
    field::{Field, FieldTypeName, OperationKind},
    format::FormatDescriptor,
    graph::{FieldGraph, unique_id_name},
    template::{MORPHLINE_TEMPLATE, TemplateContext, TemplateRenderer},
};

/// Escape text for a double-quoted configuration string. Backslashes are
/// escaped first so the later substitutions are not escaped twice.
pub fn format_character(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\t', "\\t")
        .replace('\n', "\\n")
}

/// Locations and endpoints the configuration references.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MorphlineResources {
    pub libs_path: String,
    pub zk_host: String,
}

impl MorphlineResources {
    pub fn grok_dictionaries_location(&self) -> String {
        format!("{}/grok_dictionaries", self.libs_path.trim_end_matches('/'))
    }
}

/// Template view of one flattened field. Children are referenced by name.
#[derive(Debug, Clone, Serialize)]
struct FieldVariables<'a> {
    name: &'a str,
    #[serde(rename = "type")]
    field_type: FieldTypeName,
    keep: bool,
    operations: Vec<OperationVariables<'a>>,
}

#[derive(Debug, Clone, Serialize)]
struct OperationVariables<'a> {
    #[serde(rename = "type")]
    kind: OperationKind,
    settings: &'a BTreeMap<String, String>,
    fields: Vec<&'a str>,
}

#[derive(Debug, Clone, Serialize)]
struct MorphlineVariables<'a> {
    collection_name: &'a str,
    zk_host: &'a str,
    grok_dictionaries_location: &'a str,
    uuid_name: &'a str,
    num_base_fields: usize,
    separator: &'a str,
    quote_char: &'a str,
    has_header: bool,
    columns: Vec<&'a str>,
    fields: Vec<FieldVariables<'a>>,
}

#[derive(Debug, Clone)]
pub struct MorphlineContext<'a> {
    pub collection_name: &'a str,
    pub fields: Vec<&'a Field>,
    pub num_base_fields: usize,
    pub uuid_name: &'a str,
    pub format: &'a FormatDescriptor,
    pub grok_dictionaries_location: String,
    pub zk_host: String,
}

impl<'a> MorphlineContext<'a> {
    pub fn assemble(
        collection_name: &'a str,
        format: &'a FormatDescriptor,
        graph: &'a FieldGraph,
        uuid_name: &'a str,
        resources: &MorphlineResources,
    ) -> IndexerResult<Self> {
        let fields = graph.flatten()?;
        Ok(Self {
            collection_name,
            fields,
            num_base_fields: graph.roots().len(),
            uuid_name,
            format,
            grok_dictionaries_location: resources.grok_dictionaries_location(),
            zk_host: resources.zk_host.clone(),
        })
    }

    pub fn base_fields(&self) -> &[&'a Field] {
        &self.fields[..self.num_base_fields.min(self.fields.len())]
    }

    /// Template variables. Values are raw; the template escapes them with
    /// `format_character`. Fails when an operation lacks a declared argument.
    pub fn variables(&self) -> IndexerResult<TemplateContext> {
        let mut fields = Vec::with_capacity(self.fields.len());
        for field in &self.fields {
            let mut operations = Vec::with_capacity(field.operations.len());
            for operation in &field.operations {
                operation.arguments(&field.name)?;
                operations.push(OperationVariables {
                    kind: operation.kind,
                    settings: &operation.settings,
                    fields: operation
                        .fields
                        .iter()
                        .map(|child| child.name.as_str())
                        .collect(),
                });
            }
            fields.push(FieldVariables {
                name: &field.name,
                field_type: field.field_type,
                keep: field.keep,
                operations,
            });
        }

        let variables = MorphlineVariables {
            collection_name: self.collection_name,
            zk_host: &self.zk_host,
            grok_dictionaries_location: &self.grok_dictionaries_location,
            uuid_name: self.uuid_name,
            num_base_fields: self.num_base_fields,
            separator: &self.format.field_separator,
            quote_char: &self.format.quote_char,
            has_header: self.format.has_header,
            columns: self
                .base_fields()
                .iter()
                .map(|field| field.name.as_str())
                .collect(),
            fields,
        };
        Ok(serde_json::to_value(&variables)?)
    }
}

/// A generation request as a client sends it: the target collection, the
/// (possibly corrected) format, and the edited field tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MorphlineRequest {
    pub collection: String,
    pub format: FormatDescriptor,
    pub columns: FieldGraph,
}

impl MorphlineRequest {
    pub fn from_json(payload: &str) -> IndexerResult<Self> {
        Ok(serde_json::from_str(payload)?)
    }

    /// Unique-id field name that collides with no field in the tree.
    pub fn uuid_name(&self) -> IndexerResult<String> {
        let fields = self.columns.flatten()?;
        Ok(unique_id_name(fields.iter().map(|field| field.name.as_str())))
    }

    pub fn generate(
        &self,
        renderer: &dyn TemplateRenderer,
        resources: &MorphlineResources,
    ) -> IndexerResult<String> {
        let uuid_name = self.uuid_name()?;
        let context = MorphlineContext::assemble(
            &self.collection,
            &self.format,
            &self.columns,
            &uuid_name,
            resources,
        )?;
        generate_morphline_config(renderer, &context)
    }
}

/// Render the morphline for `context` with the standard template.
pub fn generate_morphline_config(
    renderer: &dyn TemplateRenderer,
    context: &MorphlineContext<'_>,
) -> IndexerResult<String> {
    let variables = context.variables()?;
    debug!(
        "Rendering {} for collection '{}' with {} field(s)",
        MORPHLINE_TEMPLATE,
        context.collection_name,
        context.fields.len()
    );
    renderer.render(MORPHLINE_TEMPLATE, &variables)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        field::{Operation, regex_for_type},
        format::FormatKind,
        template::TemplateLookup,
    };
    use tempfile::tempdir;

    fn csv_format() -> FormatDescriptor {
        FormatDescriptor {
            kind: FormatKind::Csv,
            field_separator: "\t".to_string(),
            record_separator: "\n".to_string(),
            quote_char: "\"".to_string(),
            has_header: true,
        }
    }

    fn resources() -> MorphlineResources {
        MorphlineResources {
            libs_path: "/tmp/smart_indexer_lib/".to_string(),
            zk_host: "zk1:2181/solr".to_string(),
        }
    }

    #[test]
    fn format_character_escapes_in_order() {
        assert_eq!(format_character(r"a\b"), r"a\\b");
        assert_eq!(format_character("say \"hi\""), "say \\\"hi\\\"");
        assert_eq!(format_character("a\tb\nc"), "a\\tb\\nc");
        assert_eq!(format_character("\\\""), "\\\\\\\"");
    }

    #[test]
    fn grok_dictionaries_live_under_libs_path() {
        assert_eq!(
            resources().grok_dictionaries_location(),
            "/tmp/smart_indexer_lib/grok_dictionaries"
        );
    }

    #[test]
    fn renders_collection_columns_and_operations() {
        let graph = FieldGraph::new(vec![
            Field::new("message", FieldTypeName::String).with_operation(
                Operation::new(OperationKind::Split)
                    .with_setting("splitChar", ",")
                    .with_field(Field::new("left", FieldTypeName::String))
                    .with_field(Field::new("right", FieldTypeName::String).dropped()),
            ),
            Field::new("count", FieldTypeName::Long),
        ]);
        let format = csv_format();
        let uuid = unique_id_name(["message", "count"]);
        let context =
            MorphlineContext::assemble("logs", &format, &graph, &uuid, &resources()).expect("assemble");
        assert_eq!(context.num_base_fields, 2);
        assert_eq!(context.fields.len(), 4);

        let config =
            generate_morphline_config(&TemplateLookup::default(), &context).expect("render");
        assert!(config.starts_with("SOLR_LOCATOR : {"));
        assert!(config.contains("collection : \"logs\""));
        assert!(config.contains("zkHost : \"zk1:2181/solr\""));
        assert!(config.contains("separator : \"\\t\""));
        assert!(config.contains("columns : [\"message\", \"count\"]"));
        assert!(config.contains("ignoreFirstLine : true"));
        assert!(config.contains("inputField : \"message\""));
        assert!(config.contains("outputFields : [\"left\", \"right\"]"));
        assert!(config.contains("blacklist : [\"literal:right\"]"));
        assert!(config.contains("field : \"_uuid\""));
        assert!(config.contains("solrLocator : ${SOLR_LOCATOR}"));
        assert!(config.contains(&regex_for_type(FieldTypeName::Long)));
    }

    #[test]
    fn grok_and_convert_date_render_their_arguments() {
        let graph = FieldGraph::new(vec![
            Field::new("line", FieldTypeName::String).with_operation(
                Operation::new(OperationKind::Grok)
                    .with_setting("regexp", "%{IP:ip} \"%{WORD:verb}\""),
            ),
            Field::new("when", FieldTypeName::String).with_operation(
                Operation::new(OperationKind::ConvertDate)
                    .with_setting("format", "dd/MM/yyyy")
                    .with_field(Field::new("when_iso", FieldTypeName::Date)),
            ),
        ]);
        let format = csv_format();
        let context = MorphlineContext::assemble("web", &format, &graph, "_uuid", &resources())
            .expect("assemble");
        let config =
            generate_morphline_config(&TemplateLookup::default(), &context).expect("render");
        assert!(config.contains("\"line\" : \"%{IP:ip} \\\"%{WORD:verb}\\\"\""));
        assert!(config.contains("dictionaryFiles : [\"/tmp/smart_indexer_lib/grok_dictionaries\"]"));
        assert!(config.contains("\"when_iso\" : \"@{when}\""));
        assert!(config.contains("inputFormats : [\"dd/MM/yyyy\"]"));
        assert!(config.contains("field : \"when_iso\""));
        assert!(config.contains(&format!(
            "{{ \"when_iso\" : \"{}\" }}",
            regex_for_type(FieldTypeName::Date)
        )));
        assert!(!config.contains("removeFields"));
    }

    #[test]
    fn convert_date_without_outputs_converts_in_place() {
        let graph = FieldGraph::new(vec![
            Field::new("when", FieldTypeName::String).with_operation(
                Operation::new(OperationKind::ConvertDate).with_setting("format", "yyyy"),
            ),
        ]);
        let format = csv_format();
        let context = MorphlineContext::assemble("web", &format, &graph, "_uuid", &resources())
            .expect("assemble");
        let config =
            generate_morphline_config(&TemplateLookup::default(), &context).expect("render");
        assert!(!config.contains("addValues"));
        assert!(config.contains("field : \"when\""));
        assert!(config.contains("inputFormats : [\"yyyy\"]"));
    }

    #[test]
    fn variables_expose_raw_flattened_fields() {
        let graph = FieldGraph::new(vec![
            Field::new("a\"b", FieldTypeName::String).with_operation(
                Operation::new(OperationKind::Split)
                    .with_setting("splitChar", "|")
                    .with_field(Field::new("c", FieldTypeName::Long).dropped()),
            ),
        ]);
        let format = csv_format();
        let context = MorphlineContext::assemble("web", &format, &graph, "_uuid", &resources())
            .expect("assemble");
        let variables = context.variables().expect("variables");
        assert_eq!(variables["columns"], serde_json::json!(["a\"b"]));
        assert_eq!(variables["fields"][0]["name"], "a\"b");
        assert_eq!(variables["fields"][0]["operations"][0]["type"], "split");
        assert_eq!(variables["fields"][0]["operations"][0]["settings"]["splitChar"], "|");
        assert_eq!(variables["fields"][0]["operations"][0]["fields"], serde_json::json!(["c"]));
        assert_eq!(variables["fields"][1]["type"], "long");
        assert_eq!(variables["fields"][1]["keep"], false);
    }

    #[test]
    fn custom_templates_own_the_command_grammar() {
        let dir = tempdir().expect("temp dir");
        std::fs::write(
            dir.path().join(MORPHLINE_TEMPLATE),
            "{% for field in fields %}{{ field.name }}={{ regex_for_type(field.type) }}\n{% endfor %}",
        )
        .expect("write template");
        let graph = FieldGraph::new(vec![
            Field::new("id", FieldTypeName::Long),
            Field::new("name", FieldTypeName::String),
        ]);
        let format = csv_format();
        let context = MorphlineContext::assemble("c", &format, &graph, "_uuid", &resources())
            .expect("assemble");
        let config = generate_morphline_config(&TemplateLookup::new([dir.path()]), &context)
            .expect("render");
        assert_eq!(
            config,
            format!(
                "id={}\nname={}\n",
                regex_for_type(FieldTypeName::Long),
                regex_for_type(FieldTypeName::String)
            )
        );
    }

    #[test]
    fn request_payload_generates_a_config() {
        let payload = r#"{
            "collection": "orders",
            "format": {"type": "csv", "fieldSeparator": ",", "recordSeparator": "\n",
                       "quoteChar": "\"", "hasHeader": false},
            "columns": [
                {"name": "_uuid", "type": "string"},
                {"name": "total", "type": "double"}
            ]
        }"#;
        let request = MorphlineRequest::from_json(payload).expect("parse request");
        assert_eq!(request.uuid_name().expect("uuid"), "__uuid");
        let config = request
            .generate(&TemplateLookup::default(), &resources())
            .expect("generate");
        assert!(config.contains("field : \"__uuid\""));
        assert!(config.contains("ignoreFirstLine : false"));
        assert!(config.contains("quoteChar : \"\\\"\""));
    }

    #[test]
    fn missing_operation_arguments_fail_generation() {
        let graph = FieldGraph::new(vec![
            Field::new("tags", FieldTypeName::String)
                .with_operation(Operation::new(OperationKind::Split)),
        ]);
        let format = csv_format();
        let context = MorphlineContext::assemble("c", &format, &graph, "_uuid", &resources())
            .expect("assemble");
        let err = generate_morphline_config(&TemplateLookup::default(), &context)
            .expect_err("missing splitChar");
        assert!(err.to_string().contains("splitChar"));
    }
}
