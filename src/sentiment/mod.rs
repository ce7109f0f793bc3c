//! Three-class sentiment classification.
//!
//! `SentimentClassifier` is the seam the pipeline depends on. Two backends:
//! a BERT sequence classifier loaded from a local model directory, and an
//! embedded lexicon scorer used when no model is configured.

pub mod bert;
pub mod lexicon;

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::{ClassifierBackend, ClassifierConfig};

pub use bert::BertClassifier;
pub use lexicon::LexiconClassifier;

/// Sentiment label. Order is the model's class order: negative, neutral, positive.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Label {
    Negative,
    #[default]
    Neutral,
    Positive,
}

impl Label {
    pub const ALL: [Label; 3] = [Label::Negative, Label::Neutral, Label::Positive];

    pub fn as_str(&self) -> &'static str {
        match self {
            Label::Negative => "negative",
            Label::Neutral => "neutral",
            Label::Positive => "positive",
        }
    }

    /// Turkish display name used on the dashboard.
    pub fn display_tr(&self) -> &'static str {
        match self {
            Label::Negative => "Olumsuz",
            Label::Neutral => "Nötr",
            Label::Positive => "Olumlu",
        }
    }

    /// Fixed chart color: red, yellow, green.
    pub fn color(&self) -> &'static str {
        match self {
            Label::Negative => "#dc2626",
            Label::Neutral => "#facc15",
            Label::Positive => "#16a34a",
        }
    }

    /// Recognize a model `id2label` name (English or Turkish, any case).
    pub fn from_model_name(name: &str) -> Option<Label> {
        let n = name.trim().to_lowercase();
        if n.starts_with("neg") || n == "olumsuz" {
            Some(Label::Negative)
        } else if n.starts_with("neu") || n == "nötr" || n == "notr" {
            Some(Label::Neutral)
        } else if n.starts_with("pos") || n == "olumlu" {
            Some(Label::Positive)
        } else {
            None
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Label {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match Label::from_model_name(s) {
            Some(l) => Ok(l),
            None => bail!("unknown label '{s}'"),
        }
    }
}

/// Maps cleaned text to one of the three labels.
///
/// Implementations are synchronous; callers run batches on a blocking thread.
pub trait SentimentClassifier: Send + Sync {
    /// Classify already-normalized text. Empty input is `Label::Neutral`
    /// and must not reach the model.
    fn classify(&self, clean: &str) -> Result<Label>;
    fn name(&self) -> &'static str;
}

pub type DynClassifier = Arc<dyn SentimentClassifier>;

/// Build the configured backend. A configured model that fails to load is an error.
pub fn build_classifier(cfg: &ClassifierConfig) -> Result<DynClassifier> {
    match (cfg.backend, cfg.model_dir.as_deref()) {
        (ClassifierBackend::Bert, Some(dir)) => {
            let model = BertClassifier::load(dir)?;
            info!(dir = %dir.display(), labels = ?model.labels(), "bert classifier loaded");
            Ok(Arc::new(model))
        }
        (ClassifierBackend::Bert, None) => {
            bail!("CLASSIFIER_BACKEND=bert requires SENTIMENT_MODEL_DIR")
        }
        (ClassifierBackend::Lexicon, _) => {
            warn!("using lexicon classifier; set SENTIMENT_MODEL_DIR for the BERT model");
            Ok(Arc::new(LexiconClassifier::new()))
        }
    }
}
