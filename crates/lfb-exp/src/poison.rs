use lfb_core::errors::{ErrorInfo, LfbError};
use lfb_core::{Label, LabelSeries, RngHandle};
use rand::seq::{index, SliceRandom};
use serde::{Deserialize, Serialize};

/// Target fraction of a label series to corrupt, validated to lie in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct PoisonLevel(f64);

impl PoisonLevel {
    /// The level that leaves every label untouched.
    pub const CLEAN: PoisonLevel = PoisonLevel(0.0);

    /// Validates `value` as a poison level.
    pub fn new(value: f64) -> Result<Self, LfbError> {
        if !(0.0..=1.0).contains(&value) {
            return Err(LfbError::Poison(
                ErrorInfo::new("poison-level-invalid", "poison level must lie in [0, 1]")
                    .with_context("level", value.to_string()),
            ));
        }
        Ok(Self(value))
    }

    /// Raw fraction.
    pub fn value(&self) -> f64 {
        self.0
    }

    /// Number of labels to flip in a series of `len` entries (truncating).
    pub fn target_count(&self, len: usize) -> usize {
        (len as f64 * self.0).floor() as usize
    }
}

impl TryFrom<f64> for PoisonLevel {
    type Error = LfbError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<PoisonLevel> for f64 {
    fn from(level: PoisonLevel) -> Self {
        level.0
    }
}

/// What the poisoner did to a series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PoisonStatus {
    /// Level zero; the series is an exact copy.
    Clean,
    /// `flipped` positions received a different class.
    Poisoned,
    /// Fewer than two classes; nothing can be flipped.
    NoOpInsufficientClasses,
    /// The level truncates to zero flips for this series length.
    NoOpLevelTooSmall,
}

impl PoisonStatus {
    /// True for the degenerate fallbacks that returned the input unchanged.
    pub fn is_noop(&self) -> bool {
        matches!(
            self,
            PoisonStatus::NoOpInsufficientClasses | PoisonStatus::NoOpLevelTooSmall
        )
    }
}

/// Poisoned copy of a label series together with what was changed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoisonOutcome {
    level: PoisonLevel,
    status: PoisonStatus,
    flipped: Vec<usize>,
    series: LabelSeries,
}

impl PoisonOutcome {
    fn unchanged(labels: &LabelSeries, level: PoisonLevel, status: PoisonStatus) -> Self {
        Self {
            level,
            status,
            flipped: Vec::new(),
            series: labels.clone(),
        }
    }

    /// Level the series was poisoned at.
    pub fn level(&self) -> PoisonLevel {
        self.level
    }

    /// Outcome classification.
    pub fn status(&self) -> PoisonStatus {
        self.status
    }

    /// Positions (not sample indices) whose label was flipped, ascending.
    pub fn flipped(&self) -> &[usize] {
        &self.flipped
    }

    /// The poisoned series.
    pub fn series(&self) -> &LabelSeries {
        &self.series
    }

    /// Consumes the outcome, returning the poisoned series.
    pub fn into_series(self) -> LabelSeries {
        self.series
    }
}

/// Flips `floor(len * level)` labels of `labels` to a different class.
///
/// Positions are drawn uniformly without replacement and each replacement is
/// drawn uniformly from the classes other than the current label. Degenerate
/// inputs return an unchanged copy with a no-op status and a warning event.
pub fn poison(labels: &LabelSeries, level: PoisonLevel, rng: &mut RngHandle) -> PoisonOutcome {
    if level.value() == 0.0 {
        return PoisonOutcome::unchanged(labels, level, PoisonStatus::Clean);
    }

    let classes = labels.classes();
    if classes.len() < 2 {
        tracing::warn!(
            level = level.value(),
            classes = classes.len(),
            "cannot flip labels with fewer than two classes; leaving series unchanged"
        );
        return PoisonOutcome::unchanged(labels, level, PoisonStatus::NoOpInsufficientClasses);
    }

    let n_samples = labels.len();
    let n_to_poison = level.target_count(n_samples);
    if n_to_poison == 0 {
        tracing::warn!(
            level = level.value(),
            samples = n_samples,
            "poison level too small to poison any samples; leaving series unchanged"
        );
        return PoisonOutcome::unchanged(labels, level, PoisonStatus::NoOpLevelTooSmall);
    }

    let mut series = labels.clone();
    let mut flipped = index::sample(rng, n_samples, n_to_poison).into_vec();
    for &position in &flipped {
        let current = &labels.labels()[position];
        let candidates: Vec<&Label> = classes.iter().filter(|class| *class != current).collect();
        if let Some(replacement) = candidates.choose(rng) {
            series.relabel(position, (*replacement).clone());
        }
    }
    flipped.sort_unstable();

    tracing::info!(
        level = level.value(),
        flipped = n_to_poison,
        samples = n_samples,
        "poisoned training labels"
    );
    PoisonOutcome {
        level,
        status: PoisonStatus::Poisoned,
        flipped,
        series,
    }
}
