use std::io::Write;

use lfb_core::Label;
use lfb_data::{load_csv, read_csv, split, DatasetConfig};
use tempfile::NamedTempFile;

const IRIS_SAMPLE: &str = "\
sepal_length,sepal_width,petal_length,petal_width,species
5.1,3.5,1.4,0.2,setosa
4.9,3.0,1.4,0.2,setosa
4.7,3.2,1.3,0.2,setosa
7.0,3.2,4.7,1.4,versicolor
6.4,3.2,4.5,1.5,versicolor
6.9,3.1,4.9,1.5,versicolor
6.3,3.3,6.0,2.5,virginica
5.8,2.7,5.1,1.9,virginica
7.1,3.0,5.9,2.1,virginica
6.5,3.0,5.8,2.2,virginica
";

fn iris_columns() -> Vec<String> {
    DatasetConfig::default().features
}

#[test]
fn loads_headed_csv_from_disk() {
    let mut file = NamedTempFile::new().expect("temp");
    file.write_all(IRIS_SAMPLE.as_bytes()).expect("write");
    let config = DatasetConfig {
        path: file.path().to_path_buf(),
        ..DatasetConfig::default()
    };
    let dataset = load_csv(&config).expect("load");
    assert_eq!(dataset.len(), 10);
    assert_eq!(dataset.column_count(), 5);
    assert_eq!(dataset.features().width(), 4);
    assert_eq!(dataset.features().rows()[3], vec![7.0, 3.2, 4.7, 1.4]);
    assert_eq!(dataset.labels().get(9), Some(&Label::from("virginica")));
    assert_eq!(dataset.labels().classes().len(), 3);
}

#[test]
fn missing_column_is_reported() {
    let features = vec!["sepal_length".to_string(), "stem_length".to_string()];
    let err = read_csv(IRIS_SAMPLE.as_bytes(), &features, "species").unwrap_err();
    assert_eq!(err.info().code, "dataset-column");
    assert_eq!(
        err.info().context.get("column").map(String::as_str),
        Some("stem_length")
    );
}

#[test]
fn non_numeric_feature_is_reported_with_file_line() {
    let text = "a,b,label\n1.0,2.0,x\n1.0,oops,y\n";
    let features = vec!["a".to_string(), "b".to_string()];
    let err = read_csv(text.as_bytes(), &features, "label").unwrap_err();
    assert_eq!(err.info().code, "dataset-parse");
    assert_eq!(err.info().context.get("line").map(String::as_str), Some("3"));
}

#[test]
fn empty_label_is_reported_with_file_line() {
    let text = "a,label\n1.0,x\n2.0,y\n3.0,\n";
    let features = vec!["a".to_string()];
    let err = read_csv(text.as_bytes(), &features, "label").unwrap_err();
    assert_eq!(err.info().code, "dataset-label");
    assert_eq!(err.info().context.get("line").map(String::as_str), Some("4"));
}

#[test]
fn missing_file_is_an_error() {
    let config = DatasetConfig {
        path: "/nonexistent/lfb/iris.csv".into(),
        ..DatasetConfig::default()
    };
    assert_eq!(load_csv(&config).unwrap_err().info().code, "dataset-open");
}

#[test]
fn split_is_deterministic_and_disjoint() {
    let dataset = read_csv(IRIS_SAMPLE.as_bytes(), &iris_columns(), "species").expect("load");
    let first = split(&dataset, 0.3, 42).expect("split");
    let second = split(&dataset, 0.3, 42).expect("split");
    assert_eq!(first, second);
    assert_eq!(first.eval.len(), 3);
    assert_eq!(first.train.len(), 7);

    let mut rows: Vec<usize> = first
        .train
        .labels
        .index()
        .iter()
        .chain(first.eval.labels.index())
        .copied()
        .collect();
    rows.sort_unstable();
    assert_eq!(rows, (0..10).collect::<Vec<_>>());

    for (position, (row, label)) in first.eval.labels.iter().enumerate() {
        assert_eq!(dataset.labels().get(row), Some(label));
        assert_eq!(first.eval.features.rows()[position], dataset.features().rows()[row]);
    }
}

#[test]
fn split_rejects_degenerate_fractions() {
    let dataset = read_csv(IRIS_SAMPLE.as_bytes(), &iris_columns(), "species").expect("load");
    assert!(split(&dataset, 0.0, 1).is_err());
    assert!(split(&dataset, 1.0, 1).is_err());
    assert!(split(&dataset, f64::NAN, 1).is_err());
}

#[test]
fn fingerprint_tracks_content() {
    let dataset = read_csv(IRIS_SAMPLE.as_bytes(), &iris_columns(), "species").expect("load");
    let same = read_csv(IRIS_SAMPLE.as_bytes(), &iris_columns(), "species").expect("load");
    let other_text = IRIS_SAMPLE.replace("5.1,3.5", "5.2,3.5");
    let other = read_csv(other_text.as_bytes(), &iris_columns(), "species").expect("load");
    assert_eq!(dataset.fingerprint().unwrap(), same.fingerprint().unwrap());
    assert_ne!(dataset.fingerprint().unwrap(), other.fingerprint().unwrap());
}
