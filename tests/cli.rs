use std::fs;

use assert_cmd::Command;
use predicates::prelude::*;
use sluice_lib::utils::write_file;

fn sluice() -> Command {
    let mut cmd = Command::cargo_bin("sluice").unwrap();
    cmd.env_remove("SLUICE_PORT");
    cmd
}

#[test]
fn test_command_fails() {
    sluice()
        .arg("test")
        .assert()
        .failure()
        .stderr(predicate::str::contains("no test task is defined"));
}

#[test]
fn build_writes_release_tree() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    write_file(&root.join("sluice.toml"), "[styles]\nbrowserslist = []\n").unwrap();
    write_file(&root.join("src/index.html"), "<p class=\"lead\">Hi</p>").unwrap();
    write_file(&root.join("src/css/main.scss"), ".lead { font-weight: bold; }").unwrap();
    write_file(&root.join("src/js/main.js"), "console.log('hi');").unwrap();

    sluice()
        .current_dir(root)
        .arg("build")
        .assert()
        .success()
        .stderr(predicate::str::contains(
            "Production build is complete. Files are located at build",
        ));

    assert!(root.join("build/index.html").is_file());
    assert!(root.join("build/css/style.css").is_file());
    assert!(root.join("build/js/main.js").is_file());
    assert!(!root.join("dist").exists());

    sluice()
        .current_dir(root)
        .args(["clean", "--production"])
        .assert()
        .success();

    assert!(!root.join("build").exists());
}

#[test]
fn missing_config_fails() {
    let dir = tempfile::tempdir().unwrap();

    sluice()
        .current_dir(dir.path())
        .arg("build")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read config file"));
}

#[test]
fn init_scaffolds_project() {
    let dir = tempfile::tempdir().unwrap();

    sluice()
        .current_dir(dir.path())
        .args(["init", "site"])
        .assert()
        .success();

    let project = dir.path().join("site");
    let config = fs::read_to_string(project.join("sluice.toml")).unwrap();
    assert!(config.contains("tailwind_config = \"tailwind.config.js\""));
    assert!(project.join("src/index.html").is_file());
    assert!(project.join("src/js/pages/about.js").is_file());

    sluice()
        .current_dir(dir.path())
        .args(["init", "site"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));
}
