use std::thread::{self, JoinHandle};

use crossbeam_channel::Sender;

use crate::classification::domain::action_classifier::ActionClassifier;
use crate::shared::frame::Frame;

use crate::pipeline::classify_error_policy::ClassifyErrorPolicy;
use crate::pipeline::prediction_cell::PredictionCell;

/// Messages accepted by the classification thread.
#[derive(Debug)]
pub enum WorkerMessage {
    Batch(Vec<Frame>),
    /// Stop after the batch currently being classified; later batches are
    /// dropped.
    Shutdown,
}

/// What the worker did before it exited.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WorkerStats {
    pub classified: usize,
    pub failed: usize,
    /// Set when a `Propagate` policy stopped the worker.
    pub error: Option<String>,
}

/// Runs the action classifier on its own thread so live capture never
/// waits on inference.
///
/// Each label is written to the shared [`PredictionCell`] and sent on the
/// update channel. Batches queue in submission order.
pub struct ClassificationWorker {
    tx: Sender<WorkerMessage>,
    handle: Option<JoinHandle<WorkerStats>>,
}

impl ClassificationWorker {
    pub fn spawn(
        mut classifier: Box<dyn ActionClassifier>,
        prediction: PredictionCell,
        updates: Sender<String>,
        policy: ClassifyErrorPolicy,
    ) -> Self {
        let (tx, rx) = crossbeam_channel::unbounded::<WorkerMessage>();

        let handle = thread::spawn(move || {
            let mut stats = WorkerStats::default();
            for msg in rx.iter() {
                let batch = match msg {
                    WorkerMessage::Batch(batch) => batch,
                    WorkerMessage::Shutdown => break,
                };
                match policy.handle(classifier.classify(&batch)) {
                    Ok(Some(label)) => {
                        stats.classified += 1;
                        prediction.set(label.clone());
                        let _ = updates.send(label);
                    }
                    Ok(None) => stats.failed += 1,
                    Err(e) => {
                        log::error!("Classification worker stopped: {e}");
                        stats.failed += 1;
                        stats.error = Some(e.to_string());
                        break;
                    }
                }
            }
            log::debug!(
                "Classification worker exiting: {} classified, {} failed",
                stats.classified,
                stats.failed
            );
            stats
        });

        Self {
            tx,
            handle: Some(handle),
        }
    }

    /// Queues a clip. Fails once the worker has exited.
    pub fn submit(&self, batch: Vec<Frame>) -> Result<(), Box<dyn std::error::Error>> {
        self.tx
            .send(WorkerMessage::Batch(batch))
            .map_err(|_| "classification worker is not running".into())
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Sends the shutdown sentinel and joins the thread. Later calls return
    /// default stats.
    pub fn shutdown(&mut self) -> WorkerStats {
        let Some(handle) = self.handle.take() else {
            return WorkerStats::default();
        };
        let _ = self.tx.send(WorkerMessage::Shutdown);
        match handle.join() {
            Ok(stats) => stats,
            Err(_) => WorkerStats {
                error: Some("classification worker panicked".to_string()),
                ..Default::default()
            },
        }
    }
}

impl Drop for ClassificationWorker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use super::*;

    fn clip(len: usize) -> Vec<Frame> {
        (0..len)
            .map(|i| Frame::new(vec![0u8; 4 * 4 * 3], 4, 4, 3, i))
            .collect()
    }

    struct Counting {
        calls: Arc<AtomicUsize>,
        fail: bool,
    }

    impl ActionClassifier for Counting {
        fn classify(&mut self, frames: &[Frame]) -> Result<String, Box<dyn std::error::Error>> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err("model error".into());
            }
            Ok(format!("label-{n}-{}", frames.len()))
        }
    }

    fn counting(fail: bool) -> (Box<Counting>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        (
            Box::new(Counting {
                calls: calls.clone(),
                fail,
            }),
            calls,
        )
    }

    #[test]
    fn test_batches_update_cell_and_channel() {
        let (classifier, _) = counting(false);
        let cell = PredictionCell::new();
        let (tx, rx) = crossbeam_channel::unbounded();
        let mut worker =
            ClassificationWorker::spawn(classifier, cell.clone(), tx, ClassifyErrorPolicy::Ignore);

        worker.submit(clip(16)).unwrap();
        worker.submit(clip(16)).unwrap();
        let stats = worker.shutdown();

        assert_eq!(stats.classified, 2);
        let labels: Vec<String> = rx.try_iter().collect();
        assert_eq!(labels, vec!["label-0-16", "label-1-16"]);
        assert_eq!(cell.get().as_deref(), Some("label-1-16"));
    }

    #[test]
    fn test_no_classify_after_shutdown() {
        /// Blocks on its first call until released.
        struct Gated {
            gate: crossbeam_channel::Receiver<()>,
            calls: Arc<Mutex<usize>>,
        }
        impl ActionClassifier for Gated {
            fn classify(&mut self, _: &[Frame]) -> Result<String, Box<dyn std::error::Error>> {
                *self.calls.lock().unwrap() += 1;
                let _ = self.gate.recv_timeout(Duration::from_secs(5));
                Ok("normal".into())
            }
        }

        let (gate_tx, gate_rx) = crossbeam_channel::bounded(1);
        let calls = Arc::new(Mutex::new(0));
        let (tx, _rx) = crossbeam_channel::unbounded();
        let mut worker = ClassificationWorker::spawn(
            Box::new(Gated {
                gate: gate_rx,
                calls: calls.clone(),
            }),
            PredictionCell::new(),
            tx,
            ClassifyErrorPolicy::Ignore,
        );

        worker.submit(clip(16)).unwrap();
        // Wait until the first batch is in flight.
        while *calls.lock().unwrap() == 0 {
            thread::sleep(Duration::from_millis(1));
        }
        worker.tx.send(WorkerMessage::Shutdown).unwrap();
        worker.submit(clip(16)).unwrap();
        gate_tx.send(()).unwrap();

        let stats = worker.shutdown();
        assert_eq!(stats.classified, 1);
        assert_eq!(*calls.lock().unwrap(), 1);
        assert!(!worker.is_running());
        assert!(worker.submit(clip(16)).is_err());
    }

    #[test]
    fn test_ignore_policy_keeps_running() {
        let (classifier, calls) = counting(true);
        let cell = PredictionCell::new();
        let (tx, rx) = crossbeam_channel::unbounded();
        let mut worker =
            ClassificationWorker::spawn(classifier, cell.clone(), tx, ClassifyErrorPolicy::Ignore);

        worker.submit(clip(16)).unwrap();
        worker.submit(clip(16)).unwrap();
        let stats = worker.shutdown();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(stats.failed, 2);
        assert_eq!(stats.error, None);
        assert_eq!(cell.get(), None);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_propagate_policy_stops_worker() {
        let (classifier, calls) = counting(true);
        let (tx, _rx) = crossbeam_channel::unbounded();
        let mut worker = ClassificationWorker::spawn(
            classifier,
            PredictionCell::new(),
            tx,
            ClassifyErrorPolicy::Propagate,
        );

        worker.submit(clip(16)).unwrap();
        let _ = worker.submit(clip(16));
        let stats = worker.shutdown();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(stats.error.as_deref(), Some("model error"));
    }

    #[test]
    fn test_shutdown_is_idempotent() {
        let (classifier, _) = counting(false);
        let (tx, _rx) = crossbeam_channel::unbounded();
        let mut worker = ClassificationWorker::spawn(
            classifier,
            PredictionCell::new(),
            tx,
            ClassifyErrorPolicy::Ignore,
        );
        worker.shutdown();
        assert_eq!(worker.shutdown(), WorkerStats::default());
    }

    #[test]
    fn test_closed_update_channel_does_not_stop_worker() {
        let (classifier, _) = counting(false);
        let cell = PredictionCell::new();
        let (tx, rx) = crossbeam_channel::unbounded();
        drop(rx);
        let mut worker =
            ClassificationWorker::spawn(classifier, cell.clone(), tx, ClassifyErrorPolicy::Ignore);
        worker.submit(clip(16)).unwrap();
        assert_eq!(worker.shutdown().classified, 1);
        assert_eq!(cell.get().as_deref(), Some("label-0-16"));
    }
}
