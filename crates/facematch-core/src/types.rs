use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Name reported for a face that matches no gallery entry.
pub const UNKNOWN_LABEL: &str = "Inconnu";

/// Pixel rectangle locating a face, in (top, right, bottom, left) order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaceBox {
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
    pub left: u32,
}

impl FaceBox {
    /// Build a box from floating-point corners, clamped to a `width × height` image.
    pub fn from_corners(x1: f32, y1: f32, x2: f32, y2: f32, width: u32, height: u32) -> Self {
        let clamp = |v: f32, max: u32| v.round().clamp(0.0, max as f32) as u32;
        Self {
            top: clamp(y1, height),
            right: clamp(x2, width),
            bottom: clamp(y2, height),
            left: clamp(x1, width),
        }
    }
}

/// A face located by the detector.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub bbox: FaceBox,
    pub confidence: f32,
    /// Five-point facial landmarks: [left_eye, right_eye, nose, left_mouth, right_mouth].
    pub landmarks: Option<[(f32, f32); 5]>,
}

/// Face embedding vector (512-dimensional for ArcFace).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Embedding {
    pub values: Vec<f32>,
}

impl Embedding {
    pub fn new(values: Vec<f32>) -> Self {
        Self { values }
    }

    pub fn dim(&self) -> usize {
        self.values.len()
    }

    /// Cosine similarity in [-1, 1]. Higher = more similar.
    pub fn similarity(&self, other: &Embedding) -> f32 {
        let mut dot = 0.0f32;
        let mut norm_a = 0.0f32;
        let mut norm_b = 0.0f32;

        for (a, b) in self.values.iter().zip(other.values.iter()) {
            dot += a * b;
            norm_a += a * a;
            norm_b += b * b;
        }

        let denom = norm_a.sqrt() * norm_b.sqrt();
        if denom > 0.0 { dot / denom } else { 0.0 }
    }
}

/// One labeled reference face in the gallery.
#[derive(Debug, Clone)]
pub struct IdentityRecord {
    pub label: String,
    pub embedding: Embedding,
    /// Image the embedding was extracted from.
    pub source: PathBuf,
}

/// Decision for one query face.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchOutcome {
    Known(String),
    Unknown,
}

impl MatchOutcome {
    pub fn name(&self) -> &str {
        match self {
            MatchOutcome::Known(label) => label,
            MatchOutcome::Unknown => UNKNOWN_LABEL,
        }
    }
}

/// One entry of a recognition response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecognizedFace {
    pub name: String,
    #[serde(rename = "box")]
    pub bbox: FaceBox,
}
