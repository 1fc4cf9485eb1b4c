use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};

use serde_json::Value;
use tempfile::{tempdir, TempDir};

fn iris_path() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../../data/iris.csv")
}

fn lfb_sim(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_lfb-sim"))
        .args(args)
        .env("RUST_LOG", "warn")
        .output()
        .expect("run lfb-sim")
}

/// Config with a CSV tracker inside a fresh temp dir. The clean level runs
/// last so the latest registered model is trained on clean labels.
fn workspace() -> (TempDir, PathBuf) {
    let dir = tempdir().expect("tempdir");
    let config = format!(
        r#"seed: 42
dataset:
  path: {iris}
sweep:
  poison_levels: [0.5, 0.0]
  hyperparameter:
    values: [1.0]
tracker:
  backend: csv
  dir: {tracking}
"#,
        iris = iris_path().display(),
        tracking = dir.path().join("tracking").display(),
    );
    let path = dir.path().join("sweep.yaml");
    fs::write(&path, config).expect("write config");
    (dir, path)
}

fn run_sweep(dir: &TempDir, config: &Path) -> Value {
    let out = dir.path().join("report");
    let output = lfb_sim(&[
        "sweep",
        "--config",
        config.to_str().expect("utf8"),
        "--out",
        out.to_str().expect("utf8"),
    ]);
    assert!(output.status.success(), "sweep failed: {}", String::from_utf8_lossy(&output.stderr));
    let body = fs::read(out.join("sweep_report.json")).expect("report");
    serde_json::from_slice(&body).expect("json")
}

#[test]
fn sweep_records_runs_and_report() {
    let (dir, config) = workspace();
    let report = run_sweep(&dir, &config);
    let cells = report["cells"].as_array().expect("cells");
    assert_eq!(cells.len(), 2);
    for cell in cells {
        assert_eq!(cell["outcome"]["status"], "completed");
    }
    assert_eq!(cells[0]["poison_level"], 0.5);
    assert_eq!(report["levels"][0]["flipped"], 52);
    assert!(report["provenance"]["created_at"].as_str().is_some_and(|s| !s.is_empty()));

    let output = lfb_sim(&["runs", "--config", config.to_str().expect("utf8")]);
    assert!(output.status.success());
    let listing = String::from_utf8(output.stdout).expect("utf8");
    let lines: Vec<&str> = listing.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[0].starts_with("run_id,experiment,status"));
    assert!(lines[2].contains("models:/iris-lr-model/2"));
}

#[test]
fn predict_and_check_use_registered_models() {
    let (dir, config) = workspace();
    run_sweep(&dir, &config);
    let config = config.to_str().expect("utf8");

    let output = lfb_sim(&[
        "predict",
        "--config",
        config,
        "--version",
        "2",
        "--features",
        "5.1,3.5,1.4,0.2",
    ]);
    assert!(output.status.success());
    let value: Value = serde_json::from_slice(&output.stdout).expect("json");
    assert_eq!(value["prediction"], "setosa");
    assert_eq!(value["model"], "models:/iris-lr-model/2");

    let output = lfb_sim(&["check", "--config", config]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let value: Value = serde_json::from_slice(&output.stdout).expect("json");
    assert_eq!(value["passed"], true);
    assert_eq!(value["rows"], 150);

    let output = lfb_sim(&["check", "--config", config, "--threshold", "1.0"]);
    assert!(!output.status.success());

    let output = lfb_sim(&["check", "--config", config, "--columns", "4"]);
    assert!(!output.status.success());
}

#[test]
fn missing_model_is_fatal() {
    let (_dir, config) = workspace();
    let output = lfb_sim(&[
        "predict",
        "--config",
        config.to_str().expect("utf8"),
        "--features",
        "5.1,3.5,1.4,0.2",
    ]);
    assert!(!output.status.success());
}

#[test]
fn serve_answers_json_lines() {
    let (dir, config) = workspace();
    run_sweep(&dir, &config);
    let mut child = Command::new(env!("CARGO_BIN_EXE_lfb-sim"))
        .args(["serve", "--config", config.to_str().expect("utf8")])
        .env("RUST_LOG", "warn")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .spawn()
        .expect("spawn serve");
    {
        let mut stdin = child.stdin.take().expect("stdin");
        writeln!(stdin, r#"{{"features":[5.1,3.5,1.4,0.2]}}"#).expect("write");
        writeln!(stdin, r#"{{"features":[1.0]}}"#).expect("write");
    }
    let output = child.wait_with_output().expect("wait");
    assert!(output.status.success());
    let text = String::from_utf8(output.stdout).expect("utf8");
    let lines: Vec<Value> = text
        .lines()
        .map(|line| serde_json::from_str(line).expect("json"))
        .collect();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0]["prediction"], "setosa");
    assert_eq!(lines[1]["error"]["detail"]["code"], "serve-feature-count");
}

#[test]
fn poison_rewrites_label_column() {
    let dir = tempdir().expect("tempdir");
    let out = dir.path().join("poisoned.csv");
    let output = lfb_sim(&[
        "poison",
        "--input",
        iris_path().to_str().expect("utf8"),
        "--label",
        "species",
        "--level",
        "0.1",
        "--seed",
        "7",
        "--out",
        out.to_str().expect("utf8"),
    ]);
    assert!(output.status.success());
    let summary: Value = serde_json::from_slice(&output.stdout).expect("json");
    assert_eq!(summary["flipped"].as_array().map(Vec::len), Some(15));

    let original = fs::read_to_string(iris_path()).expect("iris");
    let poisoned = fs::read_to_string(&out).expect("poisoned");
    let changed = original
        .lines()
        .zip(poisoned.lines())
        .filter(|(a, b)| a != b)
        .count();
    assert_eq!(changed, 15);
    assert_eq!(poisoned.lines().count(), 151);

    let output = lfb_sim(&[
        "poison",
        "--input",
        iris_path().to_str().expect("utf8"),
        "--level",
        "1.5",
        "--out",
        out.to_str().expect("utf8"),
    ]);
    assert!(!output.status.success());
}

#[test]
fn poison_keeps_untouched_labels_verbatim() {
    let dir = tempdir().expect("tempdir");
    let input = dir.path().join("padded.csv");
    let out = dir.path().join("poisoned.csv");
    let original = "x,species\n1, setosa\n2, virginica\n3, setosa \n4,virginica\n";
    fs::write(&input, original).expect("write input");
    let poison_at = |level: &str| {
        lfb_sim(&[
            "poison",
            "--input",
            input.to_str().expect("utf8"),
            "--level",
            level,
            "--out",
            out.to_str().expect("utf8"),
        ])
    };

    assert!(poison_at("0.0").status.success());
    assert_eq!(fs::read_to_string(&out).expect("poisoned"), original);

    let output = poison_at("0.5");
    assert!(output.status.success());
    let summary: Value = serde_json::from_slice(&output.stdout).expect("json");
    let flipped: Vec<usize> = summary["flipped"]
        .as_array()
        .expect("flipped")
        .iter()
        .map(|pos| pos.as_u64().expect("position") as usize)
        .collect();
    assert_eq!(flipped.len(), 2);
    let poisoned = fs::read_to_string(&out).expect("poisoned");
    for (position, (before, after)) in original.lines().skip(1).zip(poisoned.lines().skip(1)).enumerate() {
        if flipped.contains(&position) {
            assert_ne!(before, after);
        } else {
            assert_eq!(before, after);
        }
    }
}
