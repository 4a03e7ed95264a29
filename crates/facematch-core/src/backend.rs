//! Vision primitives behind a trait, so the gallery loader and request
//! pipeline never depend on a concrete model runtime.

use crate::detector::{DetectorError, FaceDetector};
use crate::recognizer::{FaceRecognizer, RecognizerError};
use crate::types::{Detection, Embedding};
use image::RgbImage;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DETECTOR_MODEL_FILE: &str = "det_10g.onnx";
pub const RECOGNIZER_MODEL_FILE: &str = "w600k_r50.onnx";

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("detector: {0}")]
    Detector(#[from] DetectorError),
    #[error("recognizer: {0}")]
    Recognizer(#[from] RecognizerError),
    #[error("{0}")]
    Other(String),
}

/// Face detection and feature extraction.
///
/// `encode` returns exactly one embedding per input detection, in order.
pub trait FaceBackend: Send {
    fn detect(&mut self, image: &RgbImage) -> Result<Vec<Detection>, BackendError>;

    fn encode(&mut self, image: &RgbImage, faces: &[Detection]) -> Result<Vec<Embedding>, BackendError>;
}

impl<B: FaceBackend + ?Sized> FaceBackend for Box<B> {
    fn detect(&mut self, image: &RgbImage) -> Result<Vec<Detection>, BackendError> {
        (**self).detect(image)
    }

    fn encode(&mut self, image: &RgbImage, faces: &[Detection]) -> Result<Vec<Embedding>, BackendError> {
        (**self).encode(image, faces)
    }
}

/// Directory searched for model files when none is configured.
pub fn default_model_dir() -> PathBuf {
    PathBuf::from("models")
}

/// SCRFD + ArcFace on ONNX Runtime.
pub struct OnnxBackend {
    detector: FaceDetector,
    recognizer: FaceRecognizer,
}

impl OnnxBackend {
    /// Load both models from `model_dir`. Fails fast if either is missing.
    pub fn load(model_dir: &Path) -> Result<Self, BackendError> {
        let detector_path = model_dir.join(DETECTOR_MODEL_FILE);
        let recognizer_path = model_dir.join(RECOGNIZER_MODEL_FILE);

        let detector = FaceDetector::load(&detector_path.to_string_lossy())?;
        let recognizer = FaceRecognizer::load(&recognizer_path.to_string_lossy())?;

        Ok(Self {
            detector,
            recognizer,
        })
    }
}

impl FaceBackend for OnnxBackend {
    fn detect(&mut self, image: &RgbImage) -> Result<Vec<Detection>, BackendError> {
        Ok(self.detector.detect(image)?)
    }

    fn encode(&mut self, image: &RgbImage, faces: &[Detection]) -> Result<Vec<Embedding>, BackendError> {
        faces
            .iter()
            .map(|face| self.recognizer.extract(image, face).map_err(BackendError::from))
            .collect()
    }
}
