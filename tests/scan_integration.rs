//! End-to-end scans exported as JSON

use assert_cmd::Command;
use dustpan::scanner::CACHEDIR_TAG_SIGNATURE;
use predicates::prelude::*;
use serde_json::Value;
use std::fs::{self, File};
use std::io::Write;
use tempfile::TempDir;

fn dustpan() -> Command {
    let mut cmd = Command::cargo_bin("dustpan").unwrap();
    cmd.env_remove("DUSTPAN_CONFIG").arg("--ignore-config");
    cmd
}

fn create_test_tree() -> TempDir {
    let dir = TempDir::new().unwrap();
    let root = dir.path();

    fs::create_dir_all(root.join("src")).unwrap();
    fs::create_dir_all(root.join("build/cache")).unwrap();

    File::create(root.join("src/main.rs"))
        .unwrap()
        .write_all(b"fn main() {}")
        .unwrap();
    File::create(root.join("debug.log"))
        .unwrap()
        .write_all(&vec![b'l'; 2048])
        .unwrap();

    for i in 0..5 {
        let mut f = File::create(root.join(format!("build/cache/blob{}.o", i))).unwrap();
        f.write_all(&vec![0u8; 10240]).unwrap();
    }

    dir
}

/// Run a headless scan of `dir` and parse the export from stdout.
fn export(dir: &TempDir, extra: &[&str]) -> Value {
    let output = dustpan()
        .args(["-0", "-o", "-"])
        .args(extra)
        .arg(dir.path())
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    serde_json::from_slice(&output.stdout).unwrap()
}

fn info(node: &Value) -> &Value {
    match node {
        Value::Array(items) => &items[0],
        other => other,
    }
}

fn child<'a>(dir: &'a Value, name: &str) -> &'a Value {
    dir.as_array()
        .unwrap()
        .iter()
        .skip(1)
        .find(|c| info(c)["name"] == name)
        .unwrap_or_else(|| panic!("no child named {name}"))
}

#[test]
fn test_export_header_and_root() {
    let dir = create_test_tree();
    let doc = export(&dir, &[]);

    assert_eq!(doc[0], 1);
    assert_eq!(doc[1], 2);
    assert_eq!(doc[2]["progname"], "dustpan");
    assert!(doc[2]["timestamp"].is_u64());

    let root = &doc[3];
    let root_name = info(root)["name"].as_str().unwrap();
    assert!(root_name.starts_with('/'));
    assert_eq!(root.as_array().unwrap().len(), 4);

    let build = child(root, "build");
    let cache = child(build, "cache");
    assert_eq!(cache.as_array().unwrap().len(), 6);
    assert_eq!(info(child(cache, "blob0.o"))["asize"], 10240);
}

#[test]
fn test_export_to_stdout_starts_with_version() {
    let dir = create_test_tree();
    dustpan()
        .args(["-o", "-"])
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::starts_with("[1,2,"));
}

#[test]
fn test_export_to_file() {
    let dir = create_test_tree();
    let out = TempDir::new().unwrap();
    let target = out.path().join("scan.json");

    dustpan()
        .arg("-o")
        .arg(&target)
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::is_empty());

    let doc: Value = serde_json::from_str(&fs::read_to_string(&target).unwrap()).unwrap();
    assert_eq!(doc[0], 1);
}

#[test]
fn test_exclude_pattern() {
    let dir = create_test_tree();
    let doc = export(&dir, &["--exclude", "*.log"]);
    let log = info(child(&doc[3], "debug.log"));
    assert_eq!(log["excluded"], "pattern");
    assert!(log.get("asize").is_none());
}

#[test]
fn test_exclude_from_file() {
    let dir = create_test_tree();
    let patterns = TempDir::new().unwrap();
    let list = patterns.path().join("excludes");
    fs::write(&list, "\nbuild\n").unwrap();

    let doc = export(&dir, &["-X", list.to_str().unwrap()]);
    let build = child(&doc[3], "build");
    assert_eq!(build.as_array().unwrap().len(), 1);
    assert_eq!(info(build)["excluded"], "pattern");
}

#[test]
fn test_exclude_caches() {
    let dir = create_test_tree();
    let mut tag = CACHEDIR_TAG_SIGNATURE.to_vec();
    tag.extend_from_slice(b"\n# cache\n");
    fs::write(dir.path().join("build/cache/CACHEDIR.TAG"), tag).unwrap();

    let doc = export(&dir, &["--exclude-caches"]);
    let cache = child(child(&doc[3], "build"), "cache");
    assert_eq!(info(cache)["excluded"], "pattern");

    let doc = export(&dir, &["--exclude-caches", "--include-caches"]);
    let cache = child(child(&doc[3], "build"), "cache");
    assert!(info(cache).get("excluded").is_none());
}

#[test]
fn test_extended_adds_mtime() {
    let dir = create_test_tree();
    let doc = export(&dir, &["-e"]);
    assert!(info(child(&doc[3], "debug.log"))["mtime"].is_u64());

    let doc = export(&dir, &[]);
    assert!(info(child(&doc[3], "debug.log")).get("mtime").is_none());
}

#[cfg(unix)]
#[test]
fn test_symlinks_followed_only_with_flag() {
    let dir = create_test_tree();
    std::os::unix::fs::symlink(dir.path().join("debug.log"), dir.path().join("link")).unwrap();

    let doc = export(&dir, &[]);
    let plain = info(child(&doc[3], "link"))["asize"].as_u64().unwrap_or(0);
    assert!(plain < 2048);

    let doc = export(&dir, &["-L"]);
    assert_eq!(info(child(&doc[3], "link"))["asize"], 2048);
}

#[test]
fn test_import_round_trip() {
    let dir = create_test_tree();
    let out = TempDir::new().unwrap();
    let first = out.path().join("first.json");

    dustpan()
        .args(["-0", "-o"])
        .arg(&first)
        .arg(dir.path())
        .assert()
        .success();

    let output = dustpan()
        .arg("-f")
        .arg(&first)
        .args(["-o", "-"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let original: Value = serde_json::from_str(&fs::read_to_string(&first).unwrap()).unwrap();
    let replayed: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(original[3], replayed[3]);
}

#[test]
fn test_import_from_stdin() {
    let doc = r#"[1,2,{},[{"name":"/srv"},{"name":"a","asize":10,"dsize":4096},[{"name":"sub"}]]]"#;
    dustpan()
        .args(["-f", "-", "-o", "-"])
        .write_stdin(doc)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"name\":\"/srv\""))
        .stdout(predicate::str::contains("\"name\":\"sub\""));
}

#[test]
fn test_malformed_import_aborts() {
    dustpan()
        .args(["-f", "-", "-o", "-"])
        .write_stdin("[1,2,{}")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Scan aborted"));
}

#[test]
fn test_missing_root_aborts() {
    dustpan()
        .args(["-0", "-o", "-", "/nonexistent/dustpan-root"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("/nonexistent/dustpan-root"));
}
