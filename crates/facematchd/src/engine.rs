use facematch_core::{recognize_bytes, FaceBackend, Gallery, MatchStrategy, RecognizeError, RecognizedFace};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

const WORKER_QUEUE_DEPTH: usize = 8;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Recognize(#[from] RecognizeError),
    #[error("engine has no workers")]
    NoWorkers,
    #[error("failed to spawn engine thread: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("engine thread exited")]
    ChannelClosed,
}

/// Message sent from HTTP handlers to an engine thread.
struct RecognizeRequest {
    image: Vec<u8>,
    reply: oneshot::Sender<Result<Vec<RecognizedFace>, RecognizeError>>,
}

/// Clone-safe handle to the engine threads.
#[derive(Clone)]
pub struct EngineHandle {
    workers: Arc<[mpsc::Sender<RecognizeRequest>]>,
    next: Arc<AtomicUsize>,
}

impl EngineHandle {
    /// Run the full recognition pipeline on uploaded image bytes.
    pub async fn recognize(&self, image: Vec<u8>) -> Result<Vec<RecognizedFace>, EngineError> {
        let slot = self.next.fetch_add(1, Ordering::Relaxed) % self.workers.len();
        let (reply_tx, reply_rx) = oneshot::channel();
        self.workers[slot]
            .send(RecognizeRequest {
                image,
                reply: reply_tx,
            })
            .await
            .map_err(|_| EngineError::ChannelClosed)?;
        Ok(reply_rx.await.map_err(|_| EngineError::ChannelClosed)??)
    }

    pub fn workers(&self) -> usize {
        self.workers.len()
    }
}

/// Spawn one engine thread per backend.
///
/// Each thread owns its backend exclusively and shares the read-only gallery
/// and strategy. Requests are dispatched round-robin.
pub fn spawn_engine<B>(
    backends: Vec<B>,
    gallery: Arc<Gallery>,
    strategy: Arc<dyn MatchStrategy>,
) -> Result<EngineHandle, EngineError>
where
    B: FaceBackend + 'static,
{
    if backends.is_empty() {
        return Err(EngineError::NoWorkers);
    }

    let mut senders = Vec::with_capacity(backends.len());
    for (id, mut backend) in backends.into_iter().enumerate() {
        let (tx, mut rx) = mpsc::channel::<RecognizeRequest>(WORKER_QUEUE_DEPTH);
        let gallery = Arc::clone(&gallery);
        let strategy = Arc::clone(&strategy);

        std::thread::Builder::new()
            .name(format!("facematch-engine-{id}"))
            .spawn(move || {
                tracing::info!(worker = id, "engine thread started");
                while let Some(req) = rx.blocking_recv() {
                    let result = recognize_bytes(&mut backend, &gallery, strategy.as_ref(), &req.image);
                    if let Err(e) = &result {
                        tracing::debug!(worker = id, error = %e, "recognition failed");
                    }
                    let _ = req.reply.send(result);
                }
                tracing::info!(worker = id, "engine thread exiting");
            })
            .map_err(EngineError::Spawn)?;

        senders.push(tx);
    }

    Ok(EngineHandle {
        workers: senders.into(),
        next: Arc::new(AtomicUsize::new(0)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use facematch_core::testing::{gallery_of, solid_png, ColorBackend};
    use facematch_core::{CosineComparator, FirstMatch};

    fn engine(workers: usize) -> EngineHandle {
        let gallery = Arc::new(gallery_of(&[("Alice", &[255.0, 0.0, 0.0])]));
        let strategy: Arc<dyn MatchStrategy> = Arc::new(FirstMatch::new(CosineComparator::default()));
        spawn_engine(vec![ColorBackend; workers], gallery, strategy).unwrap()
    }

    #[test]
    fn test_spawn_without_backends_fails() {
        let strategy: Arc<dyn MatchStrategy> = Arc::new(FirstMatch::new(CosineComparator::default()));
        let result = spawn_engine(Vec::<ColorBackend>::new(), Arc::new(Gallery::empty()), strategy);
        assert!(matches!(result, Err(EngineError::NoWorkers)));
    }

    #[tokio::test]
    async fn test_recognize_round_robin() {
        let engine = engine(2);
        assert_eq!(engine.workers(), 2);

        let red = solid_png(4, 4, [255, 0, 0]);
        for _ in 0..4 {
            let faces = engine.recognize(red.clone()).await.unwrap();
            assert_eq!(faces.len(), 1);
            assert_eq!(faces[0].name, "Alice");
        }
    }

    #[tokio::test]
    async fn test_recognize_error_is_returned() {
        let engine = engine(1);
        let err = engine.recognize(b"garbage".to_vec()).await.unwrap_err();
        assert!(matches!(err, EngineError::Recognize(RecognizeError::Decode(_))), "{err}");
    }
}
