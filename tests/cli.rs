mod common;

use std::fs;

use predicates::str::contains;
use serde_json::Value;
use smart_indexer::format::FormatProfile;

use common::{ORDERS_CSV, TestWorkspace, indexer_bin, orders_request};

#[test]
fn guess_format_reports_dialect_columns_and_sample() {
    let workspace = TestWorkspace::new();
    let input = workspace.write("orders.csv", ORDERS_CSV);

    let output = indexer_bin()
        .args(["guess-format", "-i", input.to_str().unwrap()])
        .output()
        .expect("run guess-format");
    assert!(output.status.success());

    let profile: FormatProfile = serde_json::from_slice(&output.stdout).expect("profile json");
    assert_eq!(profile.format.field_separator, ",");
    assert!(profile.format.has_header);
    let names = profile
        .columns
        .iter()
        .map(|c| c.name.as_str())
        .collect::<Vec<_>>();
    assert_eq!(names, vec!["id", "customer", "amount", "ordered_at"]);
    let types = profile
        .columns
        .iter()
        .map(|c| c.field_type.as_str())
        .collect::<Vec<_>>();
    assert_eq!(types, vec!["long", "string", "double", "date"]);
    assert_eq!(profile.sample.len(), 3);
    assert_eq!(profile.sample[1][1], "Bob");
}

#[test]
fn guess_format_uses_camel_case_wire_names() {
    let workspace = TestWorkspace::new();
    let input = workspace.write("orders.csv", ORDERS_CSV);
    let output = indexer_bin()
        .args(["guess-format", "-i", input.to_str().unwrap()])
        .output()
        .expect("run guess-format");
    let json: Value = serde_json::from_slice(&output.stdout).expect("json");
    assert_eq!(json["format"]["type"], "csv");
    assert_eq!(json["format"]["fieldSeparator"], ",");
    assert_eq!(json["format"]["hasHeader"], true);
    assert_eq!(json["columns"][0]["keep"], true);
}

#[test]
fn guess_format_renders_a_table_preview() {
    let workspace = TestWorkspace::new();
    let input = workspace.write("orders.csv", ORDERS_CSV);
    indexer_bin()
        .args(["guess-format", "-i", input.to_str().unwrap(), "--table"])
        .assert()
        .success()
        .stdout(contains("customer"))
        .stdout(contains("long"))
        .stdout(contains("Carol"));
}

#[test]
fn guess_format_reads_stdin() {
    indexer_bin()
        .args(["guess-format", "-i", "-"])
        .write_stdin("a;b;c\n1;2;3\n4;5;6\n")
        .assert()
        .success()
        .stdout(contains("\"fieldSeparator\": \";\""));
}

#[test]
fn single_column_input_needs_an_explicit_format() {
    let workspace = TestWorkspace::new();
    let input = workspace.write("words.txt", "alpha\nbeta\ngamma\n");
    indexer_bin()
        .args(["guess-format", "-i", input.to_str().unwrap()])
        .assert()
        .failure()
        .stderr(contains("could not detect format"));

    indexer_bin()
        .args([
            "guess-format",
            "-i",
            input.to_str().unwrap(),
            "--format",
            r#"{"type":"csv","fieldSeparator":",","recordSeparator":"\n","quoteChar":"\"","hasHeader":false}"#,
        ])
        .assert()
        .success()
        .stdout(contains("field_1"));
}

#[test]
fn guess_fields_trusts_the_supplied_format() {
    let workspace = TestWorkspace::new();
    let input = workspace.write("pipes.txt", "x|y\n1|2\n3|4\n");
    let output = indexer_bin()
        .args([
            "guess-fields",
            "-i",
            input.to_str().unwrap(),
            "--format",
            r#"{"type":"csv","fieldSeparator":"|","recordSeparator":"\n","quoteChar":"\"","hasHeader":false}"#,
        ])
        .output()
        .expect("run guess-fields");
    assert!(output.status.success());
    let json: Value = serde_json::from_slice(&output.stdout).expect("json");
    assert!(json.get("format").is_none());
    assert_eq!(json["columns"][0]["name"], "field_1");
    assert_eq!(json["columns"][0]["type"], "string");
    assert_eq!(json["sample"].as_array().map(Vec::len), Some(3));
}

#[test]
fn operators_lists_the_catalog() {
    let output = indexer_bin()
        .arg("operators")
        .output()
        .expect("run operators");
    let json: Value = serde_json::from_slice(&output.stdout).expect("json");
    let names = json
        .as_array()
        .expect("array")
        .iter()
        .map(|op| op["name"].as_str().unwrap_or_default().to_string())
        .collect::<Vec<_>>();
    assert_eq!(names, vec!["split", "grok", "convert_date"]);
    assert_eq!(json[0]["args"][0], "splitChar");
}

#[test]
fn morphline_renders_request_to_file() {
    let workspace = TestWorkspace::new();
    let request = workspace.write("request.json", &orders_request("orders"));
    let output = workspace.path().join("morphline.conf");
    indexer_bin()
        .args([
            "morphline",
            "-r",
            request.to_str().unwrap(),
            "-o",
            output.to_str().unwrap(),
            "--zk-ensemble",
            "zk1:2181/solr",
        ])
        .assert()
        .success();

    let config = workspace.read("morphline.conf");
    assert!(config.contains("collection : \"orders\""));
    assert!(config.contains("zkHost : \"zk1:2181/solr\""));
    assert!(config.contains("columns : [\"id\", \"customer\", \"amount\", \"ordered_at\"]"));
    assert!(config.contains("\"ordered_on\" : \"@{ordered_at}\""));
    assert!(config.contains("blacklist : [\"literal:customer\"]"));
    assert!(config.contains("grok_dictionaries"));
}

#[test]
fn morphline_prefers_templates_from_the_given_directory() {
    let workspace = TestWorkspace::new();
    let request = workspace.write("request.json", &orders_request("orders"));
    workspace.write(
        "templates/morphline_template.conf",
        "custom {{ collection_name }} {{ uuid_name }}\n",
    );
    indexer_bin()
        .args([
            "morphline",
            "-r",
            request.to_str().unwrap(),
            "--templates",
            workspace.path().join("templates").to_str().unwrap(),
        ])
        .assert()
        .success()
        .stdout("custom orders _uuid\n");
}

#[test]
fn stage_writes_workspace_and_job_properties() {
    let workspace = TestWorkspace::new();
    let request = workspace.write("request.json", &orders_request("orders"));
    let root = workspace.path().join("cluster");
    fs::create_dir_all(&root).expect("create root");

    let output = indexer_bin()
        .args([
            "stage",
            "-r",
            request.to_str().unwrap(),
            "--root",
            root.to_str().unwrap(),
            "-u",
            "alice",
            "--input-path",
            "/user/alice/orders.csv",
            "--dryrun",
        ])
        .output()
        .expect("run stage");
    assert!(output.status.success());
    let job_id = String::from_utf8(output.stdout).expect("utf8");
    assert!(job_id.starts_with("dryrun:/user/alice/oozie/workspaces/hue-oozie-"));

    let workspaces = root.join("user/alice/oozie/workspaces");
    let staged = fs::read_dir(&workspaces)
        .expect("list workspaces")
        .next()
        .expect("one workspace")
        .expect("entry")
        .path();
    for name in ["morphline.conf", "workflow.xml", "log4j.properties", "job.properties"] {
        assert!(staged.join(name).is_file(), "{name} missing");
    }
    let properties = fs::read_to_string(staged.join("job.properties")).expect("properties");
    assert!(properties.contains("dryrun=True\n"));
    assert!(properties.contains("collectionName=orders\n"));
    assert!(properties.contains("outputDir=/user/alice/indexer\n"));
    assert!(properties.contains("oozie.wf.application.path=${nameNode}/user/alice/oozie/workspaces/hue-oozie-"));
}

#[test]
fn upload_moves_file_home_and_reports_conflicts() {
    let workspace = TestWorkspace::new();
    let input = workspace.write("orders.csv", ORDERS_CSV);
    let root = workspace.path().join("cluster");
    fs::create_dir_all(&root).expect("create root");
    let args = [
        "upload",
        "-i",
        input.to_str().unwrap(),
        "--root",
        root.to_str().unwrap(),
        "-u",
        "bob",
    ];

    indexer_bin()
        .args(args)
        .assert()
        .success()
        .stdout(contains("/user/bob/orders.csv"));
    assert_eq!(
        fs::read_to_string(root.join("user/bob/orders.csv")).expect("uploaded"),
        ORDERS_CSV
    );

    indexer_bin()
        .args(args)
        .assert()
        .failure()
        .stderr(contains("Destination /user/bob/orders.csv already exists."));
}

#[test]
fn export_writes_named_attachment() {
    let workspace = TestWorkspace::new();
    indexer_bin()
        .args([
            "export",
            "--headers",
            r#"["id","name"]"#,
            "--data",
            r#"[[1,"ada"],[2,"grace"]]"#,
            "--format",
            "csv",
            "-o",
            workspace.path().to_str().unwrap(),
        ])
        .assert()
        .success();
    assert_eq!(
        workspace.read("file_csv.csv"),
        "id,name\r\n1,ada\r\n2,grace\r\n"
    );

    indexer_bin()
        .args(["export", "--headers", "[]", "--data", r#"[[1]]"#])
        .assert()
        .success()
        .stdout("[[1]]");
}

#[test]
fn query_runs_statements_and_catalog_reads() {
    let workspace = TestWorkspace::new();
    let database = workspace.path().join("shop.db");
    let db = database.to_str().unwrap();

    for sql in [
        "CREATE TABLE orders (id INTEGER, customer TEXT)",
        "INSERT INTO orders VALUES (1, 'Alice'), (2, 'Bob')",
    ] {
        indexer_bin()
            .args(["query", "--database", db, "--sql", sql])
            .assert()
            .success();
    }

    indexer_bin()
        .args(["query", "--database", db, "--tables", "main", "--commit-after-read"])
        .assert()
        .success()
        .stdout("orders\n");
    indexer_bin()
        .args(["query", "--database", db, "--columns", "main.orders"])
        .assert()
        .success()
        .stdout("id\ncustomer\n");
    indexer_bin()
        .args([
            "query",
            "--database",
            db,
            "--sql",
            "SELECT id, customer FROM orders ORDER BY id",
            "--format",
            "csv",
        ])
        .assert()
        .success()
        .stdout("id,customer\r\n1,Alice\r\n2,Bob\r\n");
}

#[test]
fn query_selects_databases_and_validates_statements() {
    let workspace = TestWorkspace::new();
    let database = workspace.path().join("shop.db");
    let db = database.to_str().unwrap();
    indexer_bin()
        .args(["query", "--database", db, "--sql", "CREATE TABLE orders (id INTEGER)"])
        .assert()
        .success();

    indexer_bin()
        .args(["query", "--database", db, "--use", "main", "--tables"])
        .assert()
        .success()
        .stdout("orders\n");
    indexer_bin()
        .args(["query", "--database", db, "--columns", "orders"])
        .assert()
        .success()
        .stdout("id\n");
    indexer_bin()
        .args(["query", "--database", db, "--use", "archive", "--tables"])
        .assert()
        .failure()
        .stderr(contains("unknown database 'archive'"));
    indexer_bin()
        .args(["query", "--database", db, "--sql", "   "])
        .assert()
        .failure()
        .stderr(contains("query is required"));
}

#[test]
fn sample_limits_cannot_be_raised() {
    let workspace = TestWorkspace::new();
    let input = workspace.write("orders.csv", ORDERS_CSV);
    let config = workspace.write("indexer.yml", "sample_rows: 50\n");
    indexer_bin()
        .args([
            "--config",
            config.to_str().unwrap(),
            "guess-format",
            "-i",
            input.to_str().unwrap(),
        ])
        .assert()
        .failure()
        .stderr(contains("sample_rows"));
    indexer_bin()
        .args([
            "guess-format",
            "-i",
            input.to_str().unwrap(),
            "--sample-bytes",
            "5242881",
        ])
        .assert()
        .failure();
}

#[test]
fn query_uses_configured_servers() {
    let workspace = TestWorkspace::new();
    let database = workspace.path().join("conf.db");
    let config = workspace.write(
        "indexer.yml",
        &format!(
            "query_servers:\n  local:\n    name: {}\n",
            database.to_str().unwrap()
        ),
    );
    indexer_bin()
        .args([
            "--config",
            config.to_str().unwrap(),
            "query",
            "--server",
            "local",
            "--databases",
        ])
        .assert()
        .success()
        .stdout(contains("main"));

    indexer_bin()
        .args([
            "--config",
            config.to_str().unwrap(),
            "query",
            "--server",
            "missing",
            "--databases",
        ])
        .assert()
        .failure()
        .stderr(contains("No query server named 'missing'"));
}
