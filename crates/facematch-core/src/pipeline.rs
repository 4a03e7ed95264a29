//! Per-request recognition: decode → detect → encode → match.

use crate::backend::{BackendError, FaceBackend};
use crate::gallery::Gallery;
use crate::matcher::MatchStrategy;
use crate::types::RecognizedFace;
use image::RgbImage;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RecognizeError {
    #[error("empty upload")]
    EmptyInput,
    #[error("cannot decode image: {0}")]
    Decode(#[from] image::ImageError),
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error("backend returned {embeddings} embeddings for {faces} faces")]
    MisalignedEncoding { faces: usize, embeddings: usize },
    #[error("query embedding has {found} dimensions, gallery uses {expected}")]
    DimensionMismatch { expected: usize, found: usize },
}

/// Decode uploaded bytes into the RGB layout the detector consumes.
///
/// The container format is sniffed from content; file names are not trusted.
pub fn decode_image(bytes: &[u8]) -> Result<RgbImage, RecognizeError> {
    if bytes.is_empty() {
        return Err(RecognizeError::EmptyInput);
    }
    Ok(image::load_from_memory(bytes)?.into_rgb8())
}

/// Recognize every face in `image`. Zero faces is an empty result.
pub fn recognize_image<B>(
    backend: &mut B,
    gallery: &Gallery,
    strategy: &dyn MatchStrategy,
    image: &RgbImage,
) -> Result<Vec<RecognizedFace>, RecognizeError>
where
    B: FaceBackend + ?Sized,
{
    let faces = backend.detect(image)?;
    if faces.is_empty() {
        return Ok(Vec::new());
    }

    let embeddings = backend.encode(image, &faces)?;
    if embeddings.len() != faces.len() {
        return Err(RecognizeError::MisalignedEncoding {
            faces: faces.len(),
            embeddings: embeddings.len(),
        });
    }

    if let Some(expected) = gallery.dimension() {
        if let Some(bad) = embeddings.iter().find(|e| e.dim() != expected) {
            return Err(RecognizeError::DimensionMismatch {
                expected,
                found: bad.dim(),
            });
        }
    }

    let results: Vec<RecognizedFace> = faces
        .iter()
        .zip(embeddings.iter())
        .map(|(face, embedding)| RecognizedFace {
            name: strategy.decide(gallery, embedding).name().to_string(),
            bbox: face.bbox,
        })
        .collect();

    tracing::debug!(
        faces = results.len(),
        recognized = results.iter().filter(|r| r.name != crate::types::UNKNOWN_LABEL).count(),
        strategy = strategy.name(),
        "recognition done"
    );
    Ok(results)
}

/// Decode `bytes` and recognize every face in it.
pub fn recognize_bytes<B>(
    backend: &mut B,
    gallery: &Gallery,
    strategy: &dyn MatchStrategy,
    bytes: &[u8],
) -> Result<Vec<RecognizedFace>, RecognizeError>
where
    B: FaceBackend + ?Sized,
{
    let image = decode_image(bytes)?;
    recognize_image(backend, gallery, strategy, &image)
}
