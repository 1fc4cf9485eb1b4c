use lfb_core::errors::{ErrorInfo, LfbError};
use lfb_core::rng::{derive_substream_seed, RngHandle};
use lfb_core::{
    Classifier, ExperimentTracker, FeatureMatrix, Label, LabelSeries, ModelArtifact,
    ModelReference, ModelRegistry, ModelVersion, RegisteredModel, RunHandle, RunStatus,
    SchemaVersion, TrackingStore, TrainedModel,
};
use rand::RngCore;
use serde_json::json;

#[derive(Debug)]
struct ConstantModel {
    label: Label,
}

impl TrainedModel for ConstantModel {
    fn predict(&self, features: &FeatureMatrix) -> Result<Vec<Label>, LfbError> {
        Ok(vec![self.label.clone(); features.len()])
    }

    fn artifact(&self) -> Result<ModelArtifact, LfbError> {
        Ok(ModelArtifact {
            family: "constant".into(),
            schema_version: SchemaVersion::default(),
            feature_count: 0,
            classes: vec![self.label.clone()],
            payload: json!({}),
        })
    }
}

struct ConstantClassifier;

impl Classifier for ConstantClassifier {
    fn family(&self) -> &str {
        "constant"
    }

    fn train(
        &self,
        _features: &FeatureMatrix,
        labels: &LabelSeries,
        _hyperparameter: f64,
    ) -> Result<Box<dyn TrainedModel>, LfbError> {
        let label = labels
            .get(0)
            .cloned()
            .ok_or_else(|| LfbError::Model(ErrorInfo::new("empty", "no labels")))?;
        Ok(Box::new(ConstantModel { label }))
    }

    fn restore(&self, artifact: &ModelArtifact) -> Result<Box<dyn TrainedModel>, LfbError> {
        Ok(Box::new(ConstantModel {
            label: artifact.classes[0].clone(),
        }))
    }
}

#[derive(Default)]
struct NullTracker {
    runs: u64,
    last: Option<ModelArtifact>,
}

impl ExperimentTracker for NullTracker {
    fn start_run(&mut self, experiment: &str) -> Result<RunHandle, LfbError> {
        self.runs += 1;
        Ok(RunHandle {
            run_id: format!("run-{}", self.runs),
            experiment: experiment.to_string(),
        })
    }

    fn log_param(&mut self, _run: &RunHandle, _name: &str, _value: &str) -> Result<(), LfbError> {
        Ok(())
    }

    fn log_metric(&mut self, _run: &RunHandle, _name: &str, _value: f64) -> Result<(), LfbError> {
        Ok(())
    }

    fn register_model(
        &mut self,
        _run: &RunHandle,
        artifact: &ModelArtifact,
        name: &str,
    ) -> Result<ModelReference, LfbError> {
        self.last = Some(artifact.clone());
        Ok(ModelReference {
            name: name.to_string(),
            version: 1,
        })
    }

    fn finish_run(&mut self, _run: &RunHandle, _status: RunStatus) -> Result<(), LfbError> {
        Ok(())
    }
}

impl ModelRegistry for NullTracker {
    fn resolve(&self, name: &str, _version: ModelVersion) -> Result<RegisteredModel, LfbError> {
        let artifact = self
            .last
            .clone()
            .ok_or_else(|| LfbError::Registry(ErrorInfo::new("missing", "nothing registered")))?;
        Ok(RegisteredModel {
            reference: ModelReference {
                name: name.to_string(),
                version: 1,
            },
            run_id: None,
            artifact,
        })
    }
}

fn exercise(classifier: &dyn Classifier, store: &mut dyn TrackingStore) -> Result<(), LfbError> {
    let features = FeatureMatrix::new(vec!["x".into()], vec![vec![1.0], vec![2.0]])?;
    let labels = LabelSeries::from_labels(vec![Label::from("a"), Label::from("b")]);
    let model = classifier.train(&features, &labels, 1.0)?;
    let run = store.start_run("compile")?;
    store.log_param(&run, "C", "1.0")?;
    store.log_metric(&run, "accuracy", 0.5)?;
    store.register_model(&run, &model.artifact()?, "constant-model")?;
    store.finish_run(&run, RunStatus::Finished)?;
    let resolved = store.resolve("constant-model", ModelVersion::Latest)?;
    let restored = classifier.restore(&resolved.artifact)?;
    assert_eq!(restored.predict(&features)?, vec![Label::from("a"); 2]);
    Ok(())
}

#[test]
fn trait_objects_are_object_safe() {
    let classifier: Box<dyn Classifier> = Box::new(ConstantClassifier);
    let mut store: Box<dyn TrackingStore> = Box::new(NullTracker::default());
    exercise(&*classifier, &mut *store).unwrap();
}

#[test]
fn rng_handle_compiles() {
    let mut rng = RngHandle::from_seed(derive_substream_seed(42, 0));
    let _ = rng.next_u64();
}
