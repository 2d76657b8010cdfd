//! CLI integration tests using assert_cmd.

use std::path::PathBuf;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn practica() -> Command {
    #[allow(deprecated)]
    let mut cmd = Command::cargo_bin("practica").unwrap();
    cmd.env_remove("PRACTICA_DATABASE")
        .env_remove("PRACTICA_STALENESS_MINUTES");
    cmd
}

fn sample_bank() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../banks/auxiliar.toml")
}

#[test]
fn validate_sample_bank() {
    practica()
        .arg("validate")
        .arg("--bank")
        .arg(sample_bank())
        .assert()
        .success()
        .stdout(predicate::str::contains("2 laws, 1 positions, 15 questions, 2 exams"))
        .stdout(predicate::str::contains("Bank valid."));
}

#[test]
fn validate_reports_warnings() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("broken.toml");
    std::fs::write(
        &path,
        r#"
[[positions]]
id = "aux"
name = "Aux"

[[positions.blocks]]
id = "b1"
name = "B1"

[[positions.blocks.topics]]
id = "t1"
name = "T1"
weight = 1.0
scopes = [{ law = "CE" }]
"#,
    )
    .unwrap();

    practica()
        .arg("validate")
        .arg("--bank")
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("[topic t1] WARNING: unknown law 'CE'"))
        .stdout(predicate::str::contains("1 warning(s) found."));
}

#[test]
fn validate_nonexistent_file() {
    practica()
        .arg("validate")
        .arg("--bank")
        .arg("nonexistent.toml")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error"));
}

#[test]
fn plan_redistributes_small_pools() {
    practica()
        .arg("plan")
        .arg("aux")
        .arg("10")
        .arg("--bank")
        .arg(sample_bank())
        .assert()
        .success()
        .stdout(predicate::str::contains("Planned 10 of 10 questions."))
        .stdout(predicate::str::contains("t-ce: wanted 7, 6 eligible (short 1)"));
}

#[test]
fn plan_shortfall_exits_two() {
    practica()
        .arg("plan")
        .arg("aux")
        .arg("20")
        .arg("--bank")
        .arg(sample_bank())
        .assert()
        .code(2)
        .stdout(predicate::str::contains("Planned 11 of 20 questions."));
}

#[test]
fn plan_counts_overlapping_scopes_once() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("overlap.toml");
    let mut bank = String::from(
        r#"
[[laws]]
id = "CE"
title = "CE"
articles = ["1", "2", "3"]

[[positions]]
id = "x"
name = "X"

[[positions.blocks]]
id = "b1"
name = "B1"

[[positions.blocks.topics]]
id = "t1"
name = "T1"
weight = 1.0
scopes = [{ law = "CE" }]

[[positions.blocks.topics]]
id = "t2"
name = "T2"
weight = 1.0
scopes = [{ law = "CE", articles = ["1", "2", "3"] }]
"#,
    );
    for article in 1..=3 {
        bank.push_str(&format!(
            r#"
[[questions]]
id = "ce-{article}"
law = "CE"
article = "{article}"
text = "Question on article {article}"
options = ["a", "b", "c", "d"]
correct = "a"
review_status = "perfect"
"#
        ));
    }
    std::fs::write(&path, bank).unwrap();

    practica()
        .arg("plan")
        .arg("x")
        .arg("4")
        .arg("--bank")
        .arg(&path)
        .assert()
        .code(2)
        .stdout(predicate::str::contains("Planned 3 of 4 questions."))
        .stdout(predicate::str::contains("Distinct eligible questions: 3"));

    practica()
        .arg("plan")
        .arg("x")
        .arg("3")
        .arg("--bank")
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("Planned 3 of 3 questions."));
}

#[test]
fn plan_json_output() {
    practica()
        .arg("plan")
        .arg("aux")
        .arg("5")
        .arg("--topic")
        .arg("t-lpac")
        .arg("--format")
        .arg("json")
        .arg("--bank")
        .arg(sample_bank())
        .assert()
        .success()
        .stdout(predicate::str::contains("\"quotas\""))
        .stdout(predicate::str::contains("\"topic_id\": \"t-lpac\""))
        .stdout(predicate::str::contains("t-ce").not());
}

#[test]
fn plan_unknown_position_fails() {
    practica()
        .arg("plan")
        .arg("nope")
        .arg("5")
        .arg("--bank")
        .arg(sample_bank())
        .assert()
        .code(1)
        .stderr(predicate::str::contains("position not found: nope"));
}

#[test]
fn plan_zero_count_is_a_configuration_error() {
    practica()
        .arg("plan")
        .arg("aux")
        .arg("0")
        .arg("--bank")
        .arg(sample_bank())
        .assert()
        .code(1)
        .stderr(predicate::str::contains("configuration error"));
}

#[test]
fn replay_intact_exam() {
    practica()
        .arg("replay")
        .arg("2023-aux")
        .arg("first")
        .arg("--bank")
        .arg(sample_bank())
        .assert()
        .success()
        .stdout(predicate::str::contains("Exam: 2023-aux/first (3 questions)"))
        .stdout(predicate::str::contains("Replica intact."));
}

#[test]
fn replay_broken_exam_exits_two() {
    practica()
        .arg("replay")
        .arg("2021-aux")
        .arg("first")
        .arg("--bank")
        .arg(sample_bank())
        .assert()
        .code(2)
        .stdout(predicate::str::contains("INACTIVE"))
        .stdout(predicate::str::contains("0 missing, 1 inactive"));
}

#[test]
fn replay_unknown_part_fails() {
    practica()
        .arg("replay")
        .arg("2023-aux")
        .arg("third")
        .arg("--bank")
        .arg(sample_bank())
        .assert()
        .code(1)
        .stderr(predicate::str::contains("exam part not found"));
}

#[test]
fn import_then_plan_from_database() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("practica.db");

    practica()
        .current_dir(dir.path())
        .env("HOME", dir.path())
        .arg("import")
        .arg("--bank")
        .arg(sample_bank())
        .arg("--database")
        .arg(&db)
        .assert()
        .success()
        .stdout(predicate::str::contains("15 questions, 2 exams"));
    assert!(db.exists());

    practica()
        .current_dir(dir.path())
        .env("HOME", dir.path())
        .arg("plan")
        .arg("aux")
        .arg("4")
        .arg("--database")
        .arg(&db)
        .assert()
        .success()
        .stdout(predicate::str::contains("Planned 4 of 4 questions."));

    practica()
        .current_dir(dir.path())
        .env("HOME", dir.path())
        .env("PRACTICA_DATABASE", &db)
        .arg("replay")
        .arg("2023-aux")
        .arg("--format")
        .arg("json")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"intact\": true"));
}

#[test]
fn missing_database_is_reported() {
    let dir = TempDir::new().unwrap();
    practica()
        .current_dir(dir.path())
        .env("HOME", dir.path())
        .arg("plan")
        .arg("aux")
        .arg("4")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("database not found"));
}

#[test]
fn init_creates_files() {
    let dir = TempDir::new().unwrap();

    practica()
        .current_dir(dir.path())
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("Created practica.toml"))
        .stdout(predicate::str::contains("Created banks/sample.toml"));

    assert!(dir.path().join("practica.toml").exists());
    assert!(dir.path().join("banks/sample.toml").exists());

    practica()
        .current_dir(dir.path())
        .arg("validate")
        .arg("--bank")
        .arg("banks")
        .assert()
        .success()
        .stdout(predicate::str::contains("Bank valid."));
}

#[test]
fn init_skips_existing() {
    let dir = TempDir::new().unwrap();

    practica()
        .current_dir(dir.path())
        .arg("init")
        .assert()
        .success();

    practica()
        .current_dir(dir.path())
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("already exists"));
}

#[test]
fn help_output() {
    practica()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Practice-test assembly and official exam replay tooling",
        ));
}

#[test]
fn version_output() {
    practica()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("practica"));
}
