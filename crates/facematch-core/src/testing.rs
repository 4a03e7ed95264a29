//! Synthetic backends and fixtures for tests that must run without model files.

use crate::backend::{BackendError, FaceBackend};
use crate::gallery::Gallery;
use crate::types::{Detection, Embedding, FaceBox, IdentityRecord};
use image::{ImageFormat, Rgb, RgbImage};
use std::io::Cursor;
use std::path::{Path, PathBuf};

/// Sees one face covering the whole image iff the top-left pixel is not
/// black; the face's embedding is that pixel's RGB value.
#[derive(Debug, Clone, Copy, Default)]
pub struct ColorBackend;

impl FaceBackend for ColorBackend {
    fn detect(&mut self, image: &RgbImage) -> Result<Vec<Detection>, BackendError> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 || image.get_pixel(0, 0) == &Rgb([0, 0, 0]) {
            return Ok(Vec::new());
        }
        Ok(vec![Detection {
            bbox: FaceBox { top: 0, right: width, bottom: height, left: 0 },
            confidence: 1.0,
            landmarks: None,
        }])
    }

    fn encode(&mut self, image: &RgbImage, faces: &[Detection]) -> Result<Vec<Embedding>, BackendError> {
        let Rgb([r, g, b]) = *image.get_pixel(0, 0);
        Ok(faces
            .iter()
            .map(|_| Embedding::new(vec![r as f32, g as f32, b as f32]))
            .collect())
    }
}

/// Returns the same detections and embeddings for every image, or fails.
#[derive(Debug, Clone)]
pub struct ScriptedBackend {
    faces: Vec<(Detection, Embedding)>,
    failure: Option<String>,
}

impl ScriptedBackend {
    pub fn new(faces: Vec<(Detection, Embedding)>) -> Self {
        Self { faces, failure: None }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            faces: Vec::new(),
            failure: Some(message.to_string()),
        }
    }

    fn check(&self) -> Result<(), BackendError> {
        match &self.failure {
            Some(message) => Err(BackendError::Other(message.clone())),
            None => Ok(()),
        }
    }
}

impl FaceBackend for ScriptedBackend {
    fn detect(&mut self, _image: &RgbImage) -> Result<Vec<Detection>, BackendError> {
        self.check()?;
        Ok(self.faces.iter().map(|(d, _)| d.clone()).collect())
    }

    fn encode(&mut self, _image: &RgbImage, faces: &[Detection]) -> Result<Vec<Embedding>, BackendError> {
        self.check()?;
        Ok(self.faces.iter().take(faces.len()).map(|(_, e)| e.clone()).collect())
    }
}

/// Gallery from `(label, embedding)` pairs, in order.
pub fn gallery_of(entries: &[(&str, &[f32])]) -> Gallery {
    let records = entries
        .iter()
        .enumerate()
        .map(|(i, (label, values))| IdentityRecord {
            label: label.to_string(),
            embedding: Embedding::new(values.to_vec()),
            source: PathBuf::from(format!("{label}/{i}.png")),
        })
        .collect();
    Gallery::from_records(records).expect("fixture embeddings share one dimension")
}

/// PNG-encode an image in memory.
pub fn encode_png(image: &RgbImage) -> Vec<u8> {
    let mut buf = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .expect("PNG encoding to memory");
    buf
}

/// PNG bytes of a single-color image.
pub fn solid_png(width: u32, height: u32, color: [u8; 3]) -> Vec<u8> {
    encode_png(&RgbImage::from_pixel(width, height, Rgb(color)))
}

/// Write an 8×8 single-color PNG, creating parent directories. The content
/// is PNG whatever the extension says.
pub fn write_png(path: &Path, color: [u8; 3]) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("create fixture directory");
    }
    std::fs::write(path, solid_png(8, 8, color)).expect("write fixture image");
}
