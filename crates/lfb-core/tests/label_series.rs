use lfb_core::{FeatureMatrix, Label, LabelSeries};

fn labels(values: &[&str]) -> Vec<Label> {
    values.iter().map(|value| Label::from(*value)).collect()
}

#[test]
fn classes_follow_first_appearance() {
    let series = LabelSeries::from_labels(labels(&["b", "a", "b", "c", "a"]));
    assert_eq!(series.classes(), labels(&["b", "a", "c"]));
    assert_eq!(series.index(), &[0, 1, 2, 3, 4]);
}

#[test]
fn mismatched_columns_are_rejected() {
    let err = LabelSeries::new(vec![0, 1, 2], labels(&["a", "b"])).unwrap_err();
    assert_eq!(err.info().code, "series-length");
}

#[test]
fn relabel_returns_previous_value() {
    let mut series = LabelSeries::new(vec![10, 11], labels(&["a", "b"])).expect("series");
    let previous = series.relabel(1, Label::from("c"));
    assert_eq!(previous, Label::from("b"));
    let pairs: Vec<_> = series.iter().map(|(idx, label)| (idx, label.as_str())).collect();
    assert_eq!(pairs, vec![(10, "a"), (11, "c")]);
}

#[test]
fn feature_rows_must_match_columns() {
    let columns = vec!["x".to_string(), "y".to_string()];
    let err = FeatureMatrix::new(columns.clone(), vec![vec![1.0, 2.0], vec![3.0]]).unwrap_err();
    assert_eq!(err.info().code, "feature-width");
    assert_eq!(err.info().context.get("row").map(String::as_str), Some("1"));

    let matrix = FeatureMatrix::new(columns, vec![vec![1.0, 2.0], vec![3.0, 4.0]]).expect("ok");
    let picked = matrix.select(&[1]);
    assert_eq!(picked.rows(), &[vec![3.0, 4.0]]);
    assert_eq!(picked.width(), 2);
}
