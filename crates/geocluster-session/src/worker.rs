//! Background clustering worker with debounce and supersede.
//!
//! One worker serves one consumer. Each `submit()` gets a generation
//! number. The worker loop:
//!
//! 1. waits for a request, then keeps waiting while newer requests keep
//!    arriving within the debounce window, so a burst of pan/zoom ticks
//!    collapses to its last view;
//! 2. runs the engine on the blocking pool;
//! 3. delivers the result only if no newer request arrived meanwhile.
//!
//! Stale results are dropped and counted, never delivered, so the consumer
//! sees strictly increasing generations. A superseded run is not waited on
//! for delivery, but it is joined before the next run starts: at most one
//! engine call per worker occupies the blocking pool at any time.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use geocluster_core::{ClusterEngine, ClusterOutput, GridIndex, SensorPoint, ViewState};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::config::SessionConfig;
use crate::error::{WorkerError, WorkerResult};

/// A delivered clustering result.
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterResult {
    pub generation: u64,
    pub output: ClusterOutput,
}

#[derive(Debug, Clone)]
struct Request {
    generation: u64,
    points: Arc<[SensorPoint]>,
    view: ViewState,
}

/// Counters shared between the handle and the loop.
#[derive(Debug, Default)]
struct Counters {
    submitted: AtomicU64,
    delivered: AtomicU64,
    superseded: AtomicU64,
}

/// Point-in-time view of the worker counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerStats {
    pub submitted: u64,
    pub delivered: u64,
    /// Results computed but discarded because a newer request arrived.
    pub superseded: u64,
}

/// Handle to a running clustering worker.
pub struct ClusterWorker {
    requests: watch::Sender<Option<Request>>,
    /// Newest generation handed out by `submit()`.
    latest: Arc<AtomicU64>,
    counters: Arc<Counters>,
    shutdown_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl ClusterWorker {
    /// Spawn a worker on the current tokio runtime.
    ///
    /// Returns the handle and the receiving end of the result channel. An
    /// invalid config is rejected before anything is spawned.
    pub fn spawn(config: SessionConfig) -> WorkerResult<(Self, mpsc::Receiver<ClusterResult>)> {
        config.validate()?;
        let engine = ClusterEngine::new(config.engine.clone())?;
        let (requests, request_rx) = watch::channel(None);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (result_tx, result_rx) = mpsc::channel(config.result_buffer.max(1));
        let latest = Arc::new(AtomicU64::new(0));
        let counters = Arc::new(Counters::default());

        let worker_loop = WorkerLoop {
            engine,
            debounce: config.debounce(),
            latest: Arc::clone(&latest),
            counters: Arc::clone(&counters),
            index: Some(GridIndex::new()),
            abandoned: None,
        };
        let handle = tokio::spawn(worker_loop.run(request_rx, result_tx, shutdown_rx));

        info!(debounce_ms = config.debounce_ms, "clustering worker started");

        Ok((
            Self {
                requests,
                latest,
                counters,
                shutdown_tx,
                handle,
            },
            result_rx,
        ))
    }

    /// Queue a clustering request, superseding any pending or running one.
    ///
    /// Returns the request's generation.
    pub fn submit(&self, points: Arc<[SensorPoint]>, view: ViewState) -> WorkerResult<u64> {
        let generation = self.latest.fetch_add(1, Ordering::SeqCst) + 1;
        self.requests
            .send(Some(Request {
                generation,
                points,
                view,
            }))
            .map_err(|_| WorkerError::Closed)?;
        self.counters.submitted.fetch_add(1, Ordering::Relaxed);
        debug!(generation, "clustering request submitted");
        Ok(generation)
    }

    /// Generation of the newest submitted request.
    pub fn latest_generation(&self) -> u64 {
        self.latest.load(Ordering::SeqCst)
    }

    pub fn stats(&self) -> WorkerStats {
        WorkerStats {
            submitted: self.counters.submitted.load(Ordering::Relaxed),
            delivered: self.counters.delivered.load(Ordering::Relaxed),
            superseded: self.counters.superseded.load(Ordering::Relaxed),
        }
    }

    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }

    /// Stop the loop and wait for it to exit. A computation already on the
    /// blocking pool finishes, but its result is not delivered.
    pub async fn shutdown(self) -> WorkerResult<()> {
        let _ = self.shutdown_tx.send(true);
        self.handle.await?;
        info!("clustering worker stopped");
        Ok(())
    }
}

struct WorkerLoop {
    engine: ClusterEngine,
    debounce: Duration,
    latest: Arc<AtomicU64>,
    counters: Arc<Counters>,
    /// Grid cache, lent to the blocking task while it runs.
    index: Option<GridIndex>,
    /// Superseded run still on the blocking pool.
    abandoned: Option<JoinHandle<(GridIndex, ClusterOutput)>>,
}

enum Wake {
    Request,
    Stop,
}

impl WorkerLoop {
    async fn run(
        mut self,
        mut requests: watch::Receiver<Option<Request>>,
        results: mpsc::Sender<ClusterResult>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        loop {
            tokio::select! {
                changed = requests.changed() => {
                    if changed.is_err() {
                        debug!("request channel closed");
                        break;
                    }
                }
                _ = shutdown.changed() => break,
            }

            if let Wake::Stop = self.settle(&mut requests, &mut shutdown).await {
                break;
            }

            if let Some(previous) = self.abandoned.take() {
                tokio::select! {
                    joined = previous => {
                        if let Ok((index, _)) = joined {
                            self.index = Some(index);
                        }
                    }
                    _ = shutdown.changed() => break,
                }
            }

            let Some(request) = requests.borrow_and_update().clone() else {
                continue;
            };

            let index = self.index.take().unwrap_or_default();
            let engine = self.engine.clone();
            let job = Arc::clone(&request.points);
            let view = request.view.clone();
            let mut task = tokio::task::spawn_blocking(move || {
                let mut index = index;
                let output = engine.cluster_with_index(&mut index, &job, &view);
                (index, output)
            });

            // A newer request while the engine runs abandons this one.
            let outcome = tokio::select! {
                joined = &mut task => Some(joined),
                changed = requests.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    None
                }
                _ = shutdown.changed() => break,
            };

            let output = match outcome {
                Some(Ok((index, output))) => {
                    self.index = Some(index);
                    output
                }
                Some(Err(e)) => {
                    error!(generation = request.generation, error = %e, "clustering task failed");
                    continue;
                }
                None => {
                    self.discard(request.generation);
                    self.abandoned = Some(task);
                    // The changed() above consumed the wake-up; re-arm so
                    // the outer wait sees the pending request.
                    requests.mark_changed();
                    continue;
                }
            };

            if request.generation != self.latest.load(Ordering::SeqCst) {
                self.discard(request.generation);
                continue;
            }

            if results
                .send(ClusterResult {
                    generation: request.generation,
                    output,
                })
                .await
                .is_err()
            {
                debug!("result receiver dropped");
                break;
            }
            self.counters.delivered.fetch_add(1, Ordering::Relaxed);
            debug!(generation = request.generation, "clustering result delivered");
        }

        debug!("clustering worker loop exiting");
    }

    /// Wait out the debounce window, restarting it on every new request.
    async fn settle(
        &self,
        requests: &mut watch::Receiver<Option<Request>>,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Wake {
        if self.debounce.is_zero() {
            return Wake::Request;
        }
        loop {
            tokio::select! {
                _ = tokio::time::sleep(self.debounce) => return Wake::Request,
                changed = requests.changed() => {
                    if changed.is_err() {
                        return Wake::Stop;
                    }
                }
                _ = shutdown.changed() => return Wake::Stop,
            }
        }
    }

    fn discard(&self, generation: u64) {
        self.counters.superseded.fetch_add(1, Ordering::Relaxed);
        debug!(
            generation,
            latest = self.latest.load(Ordering::SeqCst),
            "discarding superseded clustering result"
        );
    }
}
