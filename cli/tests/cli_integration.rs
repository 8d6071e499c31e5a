use std::fs;
use std::path::PathBuf;
use std::process::{Command, Output};

fn nepomuk_bin() -> PathBuf {
    let mut p = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("target")
        .join("debug")
        .join(if cfg!(windows) { "nepomuk.exe" } else { "nepomuk" });
    if !p.exists() {
        p = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("..")
            .join("target")
            .join("release")
            .join(if cfg!(windows) { "nepomuk.exe" } else { "nepomuk" });
    }
    assert!(p.exists(), "nepomuk binary not found at {:?}", p);
    p
}

fn tmp_dir(name: &str) -> PathBuf {
    let mut base = std::env::temp_dir();
    base.push(format!("nepomuk-cli-{}-{}", name, std::process::id()));
    if base.exists() {
        let _ = fs::remove_dir_all(&base);
    }
    fs::create_dir_all(&base).unwrap();
    base
}

fn run(store: &PathBuf, args: &[&str]) -> Output {
    Command::new(nepomuk_bin())
        .arg("--store")
        .arg(store)
        .args(args)
        .output()
        .expect("failed to run nepomuk")
}

fn stdout(out: &Output) -> String {
    String::from_utf8_lossy(&out.stdout).to_string()
}

fn stderr(out: &Output) -> String {
    String::from_utf8_lossy(&out.stderr).to_string()
}

#[test]
fn status_on_a_fresh_store_reports_zero_quads() {
    let root = tmp_dir("status-fresh");
    let store = root.join("db");
    let out = run(&store, &["status"]);
    assert!(out.status.success(), "stderr: {}", stderr(&out));
    assert!(stdout(&out).contains("quads: 0"), "stdout: {}", stdout(&out));
}

#[test]
fn create_resource_then_describe_shows_its_label() {
    let root = tmp_dir("create-describe");
    let store = root.join("db");

    let created = run(&store, &["create-resource", "--label", "My Thing"]);
    assert!(created.status.success(), "stderr: {}", stderr(&created));
    let uri = stdout(&created).trim().to_string();
    assert!(!uri.is_empty());

    let described = run(&store, &["describe-resources", "--resource", &uri]);
    assert!(described.status.success(), "stderr: {}", stderr(&described));
    let text = stdout(&described);
    assert!(text.contains("prefLabel"), "stdout: {text}");
    assert!(text.contains("My Thing"), "stdout: {text}");

    let described_json = run(&store, &["describe-resources", "--resource", &uri, "--json"]);
    assert!(described_json.status.success(), "stderr: {}", stderr(&described_json));
    let parsed: serde_json::Value = serde_json::from_str(&stdout(&described_json)).expect("valid json");
    assert!(parsed.get(&uri).is_some(), "json: {parsed}");
}

#[test]
fn add_then_remove_property_round_trips() {
    let root = tmp_dir("add-remove-property");
    let store = root.join("db");

    let created = run(&store, &["create-resource"]);
    assert!(created.status.success());
    let uri = stdout(&created).trim().to_string();

    let added = run(
        &store,
        &["add-property", "--resource", &uri, "--property", "urn:example:note", "--value", "hello"],
    );
    assert!(added.status.success(), "stderr: {}", stderr(&added));

    let described = run(&store, &["describe-resources", "--resource", &uri]);
    assert!(stdout(&described).contains("hello"), "stdout: {}", stdout(&described));

    let removed = run(
        &store,
        &["remove-property", "--resource", &uri, "--property", "urn:example:note"],
    );
    assert!(removed.status.success(), "stderr: {}", stderr(&removed));

    let described_again = run(&store, &["describe-resources", "--resource", &uri]);
    assert!(!stdout(&described_again).contains("hello"), "stdout: {}", stdout(&described_again));
}

#[test]
fn remove_resources_deletes_every_statement() {
    let root = tmp_dir("remove-resources");
    let store = root.join("db");

    let created = run(&store, &["create-resource", "--label", "Gone Soon"]);
    let uri = stdout(&created).trim().to_string();

    let removed = run(&store, &["remove-resources", "--resource", &uri]);
    assert!(removed.status.success(), "stderr: {}", stderr(&removed));

    let described = run(&store, &["describe-resources", "--resource", &uri]);
    assert!(stdout(&described).trim().is_empty(), "stdout: {}", stdout(&described));
}

#[test]
fn merge_resources_combines_their_statements() {
    let root = tmp_dir("merge-resources");
    let store = root.join("db");

    let a = stdout(&run(&store, &["create-resource", "--label", "Alpha"])).trim().to_string();
    let b = stdout(&run(&store, &["create-resource", "--label", "Beta"])).trim().to_string();

    let merged = run(&store, &["merge-resources", &a, &b]);
    assert!(merged.status.success(), "stderr: {}", stderr(&merged));

    let described = run(&store, &["describe-resources", "--resource", &a]);
    let text = stdout(&described);
    assert!(text.contains("Alpha"), "stdout: {text}");
    assert!(text.contains("Beta"), "stdout: {text}");
}

#[test]
fn store_resources_identifies_and_ingests_from_a_file() {
    let root = tmp_dir("store-resources");
    let store = root.join("db");
    let ontology_dir = root.join("ontology");
    fs::create_dir_all(&ontology_dir).unwrap();
    fs::write(
        ontology_dir.join("test.ttl"),
        "@prefix owl: <http://www.w3.org/2002/07/owl#> .\n\
         <urn:example:note> a owl:DatatypeProperty .\n",
    )
    .unwrap();

    let input = root.join("incoming.nq");
    fs::write(&input, "_:x <urn:example:note> \"hello from a file\" .\n").unwrap();

    let stored = run(
        &store,
        &[
            "--ontology-dir",
            ontology_dir.to_str().unwrap(),
            "store-resources",
            "--input",
            input.to_str().unwrap(),
            "--no-identify",
        ],
    );
    assert!(stored.status.success(), "stderr: {}", stderr(&stored));
    let out = stdout(&stored);
    let uri = out
        .split("->")
        .nth(1)
        .map(str::trim)
        .expect("store-resources prints '<input> -> <resolved>'");

    let described = run(&store, &["describe-resources", "--resource", uri]);
    assert!(stdout(&described).contains("hello from a file"), "stdout: {}", stdout(&described));
}

#[test]
fn remove_data_by_application_with_no_resources_sweeps_the_whole_application() {
    let root = tmp_dir("sweep-app");
    let store = root.join("db");

    let uri = stdout(&run(&store, &["create-resource", "--label", "Swept"])).trim().to_string();
    let swept = run(&store, &["remove-data-by-application"]);
    assert!(swept.status.success(), "stderr: {}", stderr(&swept));

    let described = run(&store, &["describe-resources", "--resource", &uri]);
    assert!(stdout(&described).trim().is_empty(), "stdout: {}", stdout(&described));
}
