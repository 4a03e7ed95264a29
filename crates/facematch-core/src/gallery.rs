//! Known-face gallery, built once from a directory tree.
//!
//! Layout: `<root>/<label>/<image>`. Each image contributes the embedding of
//! its first detected face; images without a face contribute nothing.
//! Directory entries are visited in the order the filesystem reports them,
//! which decides which record a first-match strategy sees first.

use crate::backend::{BackendError, FaceBackend};
use crate::types::IdentityRecord;
use image::{ImageError, ImageReader, RgbImage};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Extensions (lowercase) of files considered reference images.
pub const IMAGE_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

#[derive(Error, Debug)]
pub enum GalleryError {
    #[error("gallery root {0} is not a directory")]
    RootNotFound(PathBuf),
    #[error("reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("loading image {path}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: ImageError,
    },
    #[error("analyzing {path}: {source}")]
    Backend {
        path: PathBuf,
        #[source]
        source: BackendError,
    },
    #[error("backend returned no embedding for the face found in {0}")]
    MissingEmbedding(PathBuf),
    #[error("empty embedding for {0}")]
    EmptyEmbedding(PathBuf),
    #[error("embedding for {path} has {found} dimensions, gallery uses {expected}")]
    DimensionMismatch {
        path: PathBuf,
        expected: usize,
        found: usize,
    },
}

#[derive(Debug, Clone, Copy, Default)]
pub struct GalleryOptions {
    /// Log and skip images that cannot be opened or decoded instead of
    /// aborting the scan.
    ///
    /// Only file-level faults are skipped. Backend faults on a decoded image,
    /// including a detected face without the landmarks the encoder needs
    /// for alignment, still abort with [`GalleryError::Backend`].
    pub skip_unreadable: bool,
}

/// Immutable, ordered table of identity records.
#[derive(Debug, Clone, Default)]
pub struct Gallery {
    records: Vec<IdentityRecord>,
}

impl Gallery {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a gallery from records in the given order.
    pub fn from_records(records: Vec<IdentityRecord>) -> Result<Self, GalleryError> {
        let mut gallery = Self::empty();
        for record in records {
            gallery.push(record)?;
        }
        Ok(gallery)
    }

    /// Scan `root` and extract one record per reference image with a face.
    pub fn scan<B>(root: &Path, backend: &mut B, options: GalleryOptions) -> Result<Self, GalleryError>
    where
        B: FaceBackend + ?Sized,
    {
        if !root.is_dir() {
            return Err(GalleryError::RootNotFound(root.to_path_buf()));
        }
        tracing::info!(root = %root.display(), skip_unreadable = options.skip_unreadable, "scanning gallery");

        let mut gallery = Self::empty();
        let mut skipped = 0usize;

        for person_dir in read_dir(root)? {
            if !person_dir.is_dir() {
                continue;
            }
            let label = match person_dir.file_name() {
                Some(name) => name.to_string_lossy().into_owned(),
                None => continue,
            };

            for path in read_dir(&person_dir)? {
                if !path.is_file() || !has_image_extension(&path) {
                    continue;
                }

                let image = match load_rgb(&path) {
                    Ok(image) => image,
                    Err(e) if options.skip_unreadable => {
                        tracing::warn!(path = %path.display(), error = %e, "skipping unreadable image");
                        skipped += 1;
                        continue;
                    }
                    Err(source) => return Err(GalleryError::Image { path, source }),
                };

                let backend_err = |source| GalleryError::Backend { path: path.clone(), source };
                let faces = backend.detect(&image).map_err(backend_err)?;
                let Some(first) = faces.first() else {
                    tracing::debug!(path = %path.display(), "no face in reference image");
                    continue;
                };

                let embedding = backend
                    .encode(&image, std::slice::from_ref(first))
                    .map_err(backend_err)?
                    .into_iter()
                    .next()
                    .ok_or_else(|| GalleryError::MissingEmbedding(path.clone()))?;

                tracing::debug!(label = %label, path = %path.display(), faces = faces.len(), "reference face added");
                gallery.push(IdentityRecord {
                    label: label.clone(),
                    embedding,
                    source: path,
                })?;
            }
        }

        tracing::info!(
            records = gallery.len(),
            identities = gallery.identity_count(),
            skipped,
            "gallery loaded"
        );
        Ok(gallery)
    }

    fn push(&mut self, record: IdentityRecord) -> Result<(), GalleryError> {
        let found = record.embedding.dim();
        if found == 0 {
            return Err(GalleryError::EmptyEmbedding(record.source));
        }
        if let Some(expected) = self.dimension() {
            if expected != found {
                return Err(GalleryError::DimensionMismatch {
                    path: record.source,
                    expected,
                    found,
                });
            }
        }
        self.records.push(record);
        Ok(())
    }

    pub fn records(&self) -> &[IdentityRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Embedding dimensionality shared by every record, `None` when empty.
    pub fn dimension(&self) -> Option<usize> {
        self.records.first().map(|r| r.embedding.dim())
    }

    /// Number of distinct labels.
    pub fn identity_count(&self) -> usize {
        self.records.iter().map(|r| r.label.as_str()).collect::<HashSet<_>>().len()
    }
}

fn read_dir(dir: &Path) -> Result<Vec<PathBuf>, GalleryError> {
    let io_err = |source| GalleryError::Io { path: dir.to_path_buf(), source };
    fs::read_dir(dir)
        .map_err(io_err)?
        .map(|entry| entry.map(|e| e.path()).map_err(io_err))
        .collect()
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Open an image from disk, sniffing the format from content, as RGB.
pub fn load_rgb(path: &Path) -> Result<RgbImage, ImageError> {
    Ok(ImageReader::open(path)?.with_guessed_format()?.decode()?.into_rgb8())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{write_png, ColorBackend};
    use crate::recognizer::RecognizerError;
    use crate::types::{Detection, Embedding};

    fn record(label: &str, values: Vec<f32>) -> IdentityRecord {
        IdentityRecord {
            label: label.into(),
            embedding: Embedding::new(values),
            source: PathBuf::from(format!("{label}.png")),
        }
    }

    #[test]
    fn test_scan_one_record_per_identity() {
        let root = tempfile::tempdir().unwrap();
        write_png(&root.path().join("Alice/a1.png"), [200, 10, 10]);
        write_png(&root.path().join("Alice/a2.JPG"), [190, 20, 10]);
        write_png(&root.path().join("Bob/b1.jpeg"), [10, 200, 10]);

        let gallery = Gallery::scan(root.path(), &mut ColorBackend, GalleryOptions::default()).unwrap();
        assert_eq!(gallery.len(), 3);
        assert_eq!(gallery.identity_count(), 2);
        assert_eq!(gallery.dimension(), Some(3));

        let alice = gallery.records().iter().filter(|r| r.label == "Alice").count();
        assert_eq!(alice, 2);
        assert!(gallery.records().iter().any(|r| r.label == "Bob"));
    }

    #[test]
    fn test_scan_skips_faceless_images() {
        let root = tempfile::tempdir().unwrap();
        write_png(&root.path().join("Nobody/blank.png"), [0, 0, 0]);
        write_png(&root.path().join("Carol/c.png"), [10, 10, 200]);

        let gallery = Gallery::scan(root.path(), &mut ColorBackend, GalleryOptions::default()).unwrap();
        assert_eq!(gallery.len(), 1);
        assert_eq!(gallery.records()[0].label, "Carol");
    }

    #[test]
    fn test_scan_ignores_other_files() {
        let root = tempfile::tempdir().unwrap();
        write_png(&root.path().join("Dave/d.png"), [50, 50, 50]);
        fs::write(root.path().join("Dave/notes.txt"), b"not an image").unwrap();
        fs::write(root.path().join("README.png"), b"root-level files are not identities").unwrap();

        let gallery = Gallery::scan(root.path(), &mut ColorBackend, GalleryOptions::default()).unwrap();
        assert_eq!(gallery.len(), 1);
    }

    #[test]
    fn test_scan_unreadable_image_is_fatal_by_default() {
        let root = tempfile::tempdir().unwrap();
        write_png(&root.path().join("Erin/ok.png"), [200, 200, 10]);
        fs::write(root.path().join("Erin/broken.jpg"), b"definitely not a jpeg").unwrap();

        let err = Gallery::scan(root.path(), &mut ColorBackend, GalleryOptions::default()).unwrap_err();
        assert!(matches!(err, GalleryError::Image { ref path, .. } if path.ends_with("broken.jpg")), "{err}");
    }

    #[test]
    fn test_scan_can_skip_unreadable_images() {
        let root = tempfile::tempdir().unwrap();
        write_png(&root.path().join("Erin/ok.png"), [200, 200, 10]);
        fs::write(root.path().join("Erin/broken.jpg"), b"definitely not a jpeg").unwrap();

        let options = GalleryOptions { skip_unreadable: true };
        let gallery = Gallery::scan(root.path(), &mut ColorBackend, options).unwrap();
        assert_eq!(gallery.len(), 1);
        assert_eq!(gallery.records()[0].label, "Erin");
    }

    /// Detects like [`ColorBackend`] but, like the ONNX encoder, refuses faces
    /// without landmarks.
    struct LandmarklessBackend;

    impl FaceBackend for LandmarklessBackend {
        fn detect(&mut self, image: &RgbImage) -> Result<Vec<Detection>, BackendError> {
            ColorBackend.detect(image)
        }

        fn encode(&mut self, image: &RgbImage, faces: &[Detection]) -> Result<Vec<Embedding>, BackendError> {
            if faces.iter().any(|f| f.landmarks.is_none()) {
                return Err(RecognizerError::NoLandmarks.into());
            }
            ColorBackend.encode(image, faces)
        }
    }

    #[test]
    fn test_scan_missing_landmarks_is_fatal_even_when_skipping() {
        let root = tempfile::tempdir().unwrap();
        write_png(&root.path().join("Erin/ok.png"), [200, 200, 10]);

        let options = GalleryOptions { skip_unreadable: true };
        let err = Gallery::scan(root.path(), &mut LandmarklessBackend, options).unwrap_err();
        assert!(
            matches!(
                err,
                GalleryError::Backend { source: BackendError::Recognizer(RecognizerError::NoLandmarks), .. }
            ),
            "{err}"
        );
    }

    #[test]
    fn test_scan_missing_root() {
        let root = tempfile::tempdir().unwrap();
        let missing = root.path().join("nope");
        let err = Gallery::scan(&missing, &mut ColorBackend, GalleryOptions::default()).unwrap_err();
        assert!(matches!(err, GalleryError::RootNotFound(_)));
    }

    #[test]
    fn test_from_records_keeps_order() {
        let gallery = Gallery::from_records(vec![
            record("Alice", vec![1.0, 0.0]),
            record("Bob", vec![0.0, 1.0]),
            record("Alice", vec![0.7, 0.7]),
        ])
        .unwrap();
        let labels: Vec<&str> = gallery.records().iter().map(|r| r.label.as_str()).collect();
        assert_eq!(labels, ["Alice", "Bob", "Alice"]);
        assert_eq!(gallery.identity_count(), 2);
    }

    #[test]
    fn test_from_records_rejects_mixed_dimensions() {
        let err = Gallery::from_records(vec![record("Alice", vec![1.0, 0.0]), record("Bob", vec![1.0, 0.0, 0.0])])
            .unwrap_err();
        assert!(matches!(err, GalleryError::DimensionMismatch { expected: 2, found: 3, .. }));
    }

    #[test]
    fn test_from_records_rejects_empty_embedding() {
        let err = Gallery::from_records(vec![record("Alice", vec![])]).unwrap_err();
        assert!(matches!(err, GalleryError::EmptyEmbedding(_)));
    }

    #[test]
    fn test_empty_gallery() {
        let gallery = Gallery::empty();
        assert!(gallery.is_empty());
        assert_eq!(gallery.dimension(), None);
    }
}
