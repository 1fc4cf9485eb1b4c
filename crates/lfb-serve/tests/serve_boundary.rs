use std::io::Cursor;

use lfb_core::{
    Classifier, ExperimentTracker, FeatureMatrix, Label, LabelSeries, ModelVersion, RunStatus,
};
use lfb_exp::MemoryTracker;
use lfb_model::LogisticRegression;
use lfb_serve::{ModelServer, PredictRequest};
use serde_json::{json, Value};

fn columns() -> Vec<String> {
    ["sepal_length", "sepal_width", "petal_length", "petal_width"]
        .iter()
        .map(|name| name.to_string())
        .collect()
}

fn training_set() -> (FeatureMatrix, LabelSeries) {
    let centres = [
        ("setosa", [5.0, 3.4, 1.5, 0.2]),
        ("versicolor", [5.9, 2.8, 4.3, 1.3]),
        ("virginica", [6.6, 3.0, 5.6, 2.0]),
    ];
    let mut rows = Vec::new();
    let mut labels = Vec::new();
    for (name, centre) in centres {
        for offset in [-0.1, -0.05, 0.0, 0.05, 0.1] {
            rows.push(centre.iter().map(|value| value + offset).collect());
            labels.push(Label::from(name));
        }
    }
    (
        FeatureMatrix::new(columns(), rows).expect("features"),
        LabelSeries::from_labels(labels),
    )
}

/// Registers two versions: a model trained on clean labels, then a model
/// trained on labels that are all shifted one class over.
fn registry() -> MemoryTracker {
    let (features, labels) = training_set();
    let classifier = LogisticRegression::default();
    let mut tracker = MemoryTracker::new();

    let shifted: Vec<Label> = labels
        .labels()
        .iter()
        .map(|label| match label.as_str() {
            "setosa" => Label::from("versicolor"),
            "versicolor" => Label::from("virginica"),
            _ => Label::from("setosa"),
        })
        .collect();
    for series in [labels, LabelSeries::from_labels(shifted)] {
        let model = classifier.train(&features, &series, 1.0).expect("train");
        let run = tracker.start_run("serve").expect("start");
        tracker
            .register_model(&run, &model.artifact().expect("artifact"), "iris-lr-model")
            .expect("register");
        tracker.finish_run(&run, RunStatus::Finished).expect("finish");
    }
    tracker
}

fn server(version: ModelVersion) -> ModelServer {
    let tracker = registry();
    ModelServer::start(
        &tracker,
        &LogisticRegression::default(),
        "iris-lr-model",
        version,
        columns(),
    )
    .expect("start")
}

#[test]
fn serves_exact_and_latest_versions() {
    let first = server(ModelVersion::Exact(1));
    assert_eq!(first.reference().version, 1);
    assert_eq!(
        first.predict(&[5.0, 3.4, 1.5, 0.2]).expect("predict").as_str(),
        "setosa"
    );

    let latest = server(ModelVersion::Latest);
    assert_eq!(latest.reference().uri(), "models:/iris-lr-model/2");
    assert_eq!(
        latest.predict(&[5.0, 3.4, 1.5, 0.2]).expect("predict").as_str(),
        "versicolor"
    );
}

#[test]
fn missing_model_is_fatal_at_startup() {
    let tracker = MemoryTracker::new();
    let err = ModelServer::start(
        &tracker,
        &LogisticRegression::default(),
        "iris-lr-model",
        ModelVersion::Latest,
        columns(),
    )
    .expect_err("empty registry");
    assert_eq!(err.family(), "Registry");
    assert_eq!(err.info().code, "registry-model-missing");
}

#[test]
fn column_mismatch_is_rejected_at_startup() {
    let tracker = registry();
    let err = ModelServer::start(
        &tracker,
        &LogisticRegression::default(),
        "iris-lr-model",
        ModelVersion::Latest,
        vec!["only".to_string()],
    )
    .expect_err("columns");
    assert_eq!(err.info().code, "serve-columns");
}

#[test]
fn predict_validates_feature_count() {
    let server = server(ModelVersion::Exact(1));
    let err = server.predict(&[1.0, 2.0]).expect_err("short row");
    assert_eq!(err.info().code, "serve-feature-count");
    assert_eq!(err.info().context["expected"], "4");
}

#[test]
fn named_requests_follow_column_order() {
    let server = server(ModelVersion::Exact(1));
    let request: PredictRequest = serde_json::from_value(json!({
        "petal_width": 2.0,
        "petal_length": 5.6,
        "sepal_width": 3.0,
        "sepal_length": 6.6,
    }))
    .expect("request");
    assert_eq!(server.respond(&request).expect("respond").as_str(), "virginica");

    let partial: PredictRequest =
        serde_json::from_value(json!({ "sepal_length": 6.6 })).expect("request");
    let err = server.respond(&partial).expect_err("missing");
    assert_eq!(err.info().code, "serve-feature-missing");
}

#[test]
fn handle_line_renders_predictions_and_errors() {
    let server = server(ModelVersion::Exact(1));
    let ok: Value =
        serde_json::from_str(&server.handle_line(r#"{"features":[5.9,2.8,4.3,1.3]}"#))
            .expect("json");
    assert_eq!(ok, json!({ "prediction": "versicolor" }));

    let bad: Value = serde_json::from_str(&server.handle_line("not json")).expect("json");
    assert_eq!(bad["error"]["family"], "Serde");
    assert_eq!(bad["error"]["detail"]["code"], "serve-request");

    let short: Value =
        serde_json::from_str(&server.handle_line(r#"{"features":[1.0]}"#)).expect("json");
    assert_eq!(short["error"]["detail"]["code"], "serve-feature-count");
}

#[test]
fn serve_answers_each_non_blank_line() {
    let server = server(ModelVersion::Exact(1));
    let input = Cursor::new(
        "{\"features\":[5.0,3.4,1.5,0.2]}\n\n{\"features\":[6.6,3.0,5.6,2.0]}\n",
    );
    let mut output = Vec::new();
    let answered = server.serve(input, &mut output).expect("serve");
    assert_eq!(answered, 2);
    let text = String::from_utf8(output).expect("utf8");
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines, vec![r#"{"prediction":"setosa"}"#, r#"{"prediction":"virginica"}"#]);
}
