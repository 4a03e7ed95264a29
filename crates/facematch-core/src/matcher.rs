//! Match decision: which gallery label, if any, a query embedding belongs to.

use crate::gallery::Gallery;
use crate::types::{Embedding, MatchOutcome};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Cosine similarity at or above which two ArcFace embeddings are the same person.
pub const DEFAULT_MATCH_THRESHOLD: f32 = 0.40;

/// Same-or-different decision for one pair of embeddings.
pub trait FaceComparator: Send + Sync {
    fn is_match(&self, known: &Embedding, probe: &Embedding) -> bool;

    /// One decision per gallery record, in gallery order.
    fn compare(&self, gallery: &Gallery, probe: &Embedding) -> Vec<bool> {
        gallery
            .records()
            .iter()
            .map(|record| self.is_match(&record.embedding, probe))
            .collect()
    }
}

/// Cosine similarity against a threshold fixed at construction.
#[derive(Debug, Clone, Copy)]
pub struct CosineComparator {
    threshold: f32,
}

impl CosineComparator {
    pub fn new(threshold: f32) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }
}

impl Default for CosineComparator {
    fn default() -> Self {
        Self::new(DEFAULT_MATCH_THRESHOLD)
    }
}

impl FaceComparator for CosineComparator {
    fn is_match(&self, known: &Embedding, probe: &Embedding) -> bool {
        known.similarity(probe) >= self.threshold
    }
}

/// Policy turning per-record comparisons into one outcome.
pub trait MatchStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    fn decide(&self, gallery: &Gallery, probe: &Embedding) -> MatchOutcome;
}

/// Label of the earliest record the comparator accepts.
///
/// Every record is compared; the winner is the first `true` in gallery
/// order, not the most similar record. A person with several reference
/// images is therefore matched through whichever image was scanned first.
#[derive(Debug, Clone, Default)]
pub struct FirstMatch<C = CosineComparator> {
    comparator: C,
}

impl<C: FaceComparator> FirstMatch<C> {
    pub fn new(comparator: C) -> Self {
        Self { comparator }
    }
}

impl<C: FaceComparator> MatchStrategy for FirstMatch<C> {
    fn name(&self) -> &'static str {
        "first"
    }

    fn decide(&self, gallery: &Gallery, probe: &Embedding) -> MatchOutcome {
        let matches = self.comparator.compare(gallery, probe);
        match matches.iter().position(|&m| m) {
            Some(idx) => MatchOutcome::Known(gallery.records()[idx].label.clone()),
            None => MatchOutcome::Unknown,
        }
    }
}

/// Label of the most similar record, if it clears the threshold.
#[derive(Debug, Clone, Copy)]
pub struct NearestMatch {
    threshold: f32,
}

impl NearestMatch {
    pub fn new(threshold: f32) -> Self {
        Self { threshold }
    }
}

impl MatchStrategy for NearestMatch {
    fn name(&self) -> &'static str {
        "nearest"
    }

    fn decide(&self, gallery: &Gallery, probe: &Embedding) -> MatchOutcome {
        let best = gallery
            .records()
            .iter()
            .map(|record| (record, record.embedding.similarity(probe)))
            .fold(None, |best: Option<(_, f32)>, (record, sim)| match best {
                Some((_, best_sim)) if best_sim >= sim => best,
                _ => Some((record, sim)),
            });

        match best {
            Some((record, sim)) if sim >= self.threshold => MatchOutcome::Known(record.label.clone()),
            _ => MatchOutcome::Unknown,
        }
    }
}

/// Configurable choice of [`MatchStrategy`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyKind {
    #[default]
    First,
    Nearest,
}

impl StrategyKind {
    pub fn build(self, threshold: f32) -> Arc<dyn MatchStrategy> {
        match self {
            StrategyKind::First => Arc::new(FirstMatch::new(CosineComparator::new(threshold))),
            StrategyKind::Nearest => Arc::new(NearestMatch::new(threshold)),
        }
    }
}

impl FromStr for StrategyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "first" => Ok(StrategyKind::First),
            "nearest" => Ok(StrategyKind::Nearest),
            other => Err(format!("unknown match strategy '{other}' (expected 'first' or 'nearest')")),
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StrategyKind::First => "first",
            StrategyKind::Nearest => "nearest",
        })
    }
}
