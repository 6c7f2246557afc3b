use assert_cmd::prelude::*;
use predicates::prelude::*;
use predicates::str::contains;
use std::fs;
use std::process::Command;
use tempfile::TempDir;

const MTL: &str = "newmtl body\nKd 0.8 0.2 0.2\nKs 0.5 0.5 0.5\nNs 20\n";

/// A single box spanning 20 x 5 x 10, away from the origin.
const OBJ: &str = "mtllib fotou.mtl
o body
usemtl body
v 10 0 0
v 30 0 0
v 10 5 0
v 30 5 0
v 10 0 10
v 30 0 10
v 10 5 10
v 30 5 10
f 1 3 4 2
f 5 6 8 7
f 1 2 6 5
f 3 7 8 4
f 1 5 7 3
f 2 4 8 6
";

fn models_dir(files: &[(&str, &str)]) -> TempDir {
    let dir = TempDir::new().expect("temp dir");
    for (name, contents) in files {
        fs::write(dir.path().join(name), contents).expect("write asset");
    }
    dir
}

fn viewer(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("model-viewer").expect("binary exists");
    cmd.arg(dir.path()).arg("--summary-only");
    cmd
}

#[test]
fn summary_shows_normalized_model() {
    let dir = models_dir(&[("fotou.mtl", MTL), ("fotou.obj", OBJ)]);
    viewer(&dir)
        .assert()
        .success()
        .stdout(contains("Loading model... 100%"))
        .stdout(contains("Model fotou.obj:"))
        .stdout(contains(" - 1 meshes, 1 materials"))
        .stdout(contains("triangles=12 material=body"))
        .stdout(contains("scale=0.5000"))
        .stdout(contains("size=(10.00, 2.50, 5.00)"))
        .stdout(contains("center=(0.00, 0.00, 0.00)"));
}

#[test]
fn missing_materials_stop_before_geometry() {
    let dir = models_dir(&[("fotou.obj", OBJ)]);
    viewer(&dir)
        .assert()
        .failure()
        .stdout(contains("Failed to load materials, check the file path."))
        .stdout(contains("Loading model...").not())
        .stderr(contains("failed to load materials"));
}

#[test]
fn missing_geometry_reports_model_failure() {
    let dir = models_dir(&[("fotou.mtl", MTL)]);
    viewer(&dir)
        .assert()
        .failure()
        .stdout(contains(
            "Failed to load model, check the console log and local server setup.",
        ))
        .stderr(contains("failed to load geometry"));
}

#[test]
fn unknown_flag_is_rejected() {
    Command::cargo_bin("model-viewer")
        .expect("binary exists")
        .arg("--run-scripts")
        .assert()
        .failure()
        .stderr(contains("Unknown argument: --run-scripts"));
}
