//! facematch-core — face recognition against a directory-built gallery.
//!
//! Uses SCRFD for face detection and ArcFace for face encoding, both running
//! via ONNX Runtime for CPU inference, behind the [`FaceBackend`] trait.

pub mod alignment;
pub mod backend;
pub mod detector;
pub mod gallery;
pub mod matcher;
pub mod pipeline;
pub mod recognizer;
pub mod types;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use backend::{default_model_dir, BackendError, FaceBackend, OnnxBackend};
pub use gallery::{Gallery, GalleryError, GalleryOptions};
pub use matcher::{
    CosineComparator, FaceComparator, FirstMatch, MatchStrategy, NearestMatch, StrategyKind,
    DEFAULT_MATCH_THRESHOLD,
};
pub use pipeline::{decode_image, recognize_bytes, recognize_image, RecognizeError};
pub use types::{Detection, Embedding, FaceBox, IdentityRecord, MatchOutcome, RecognizedFace, UNKNOWN_LABEL};
