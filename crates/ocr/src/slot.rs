use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::engine::{InferenceEngine, ModelError};

/// Builds an inference engine. Called on the blocking thread pool.
pub trait EngineLoader: Send + Sync {
    fn load(&self) -> Result<Arc<dyn InferenceEngine>, ModelError>;
}

impl<F> EngineLoader for F
where
    F: Fn() -> Result<Arc<dyn InferenceEngine>, ModelError> + Send + Sync,
{
    fn load(&self) -> Result<Arc<dyn InferenceEngine>, ModelError> {
        self()
    }
}

type LoadHandle = JoinHandle<Result<Arc<dyn InferenceEngine>, ModelError>>;

enum State {
    Empty,
    /// A load is running on the blocking pool. The handle outlives any
    /// caller that gave up waiting, so the next caller resumes the same load.
    Loading(LoadHandle),
    Ready(Arc<dyn InferenceEngine>),
}

/// Process-wide holder of the single loaded inference engine.
///
/// The engine is loaded at most once; concurrent first callers wait on the
/// same load, and so does a caller arriving after an earlier one was
/// cancelled mid-load. A failed load leaves the slot empty so the next caller
/// retries.
pub struct EngineSlot {
    loader: Arc<dyn EngineLoader>,
    state: Mutex<State>,
    loaded: AtomicBool,
}

impl EngineSlot {
    pub fn new(loader: Arc<dyn EngineLoader>) -> Self {
        Self { loader, state: Mutex::new(State::Empty), loaded: AtomicBool::new(false) }
    }

    /// A slot that already holds `engine`; its loader is never called.
    pub fn preloaded(engine: Arc<dyn InferenceEngine>) -> Self {
        let fallback = engine.clone();
        let loader = move || -> Result<Arc<dyn InferenceEngine>, ModelError> { Ok(fallback.clone()) };
        Self {
            loader: Arc::new(loader),
            state: Mutex::new(State::Ready(engine)),
            loaded: AtomicBool::new(true),
        }
    }

    /// Load the engine now instead of on the first request.
    pub async fn initialize(&self) -> Result<(), ModelError> {
        self.get().await.map(|_| ())
    }

    /// The loaded engine, loading it first if needed.
    pub async fn get(&self) -> Result<Arc<dyn InferenceEngine>, ModelError> {
        let mut state = self.state.lock().await;
        loop {
            match &mut *state {
                State::Ready(engine) => return Ok(engine.clone()),
                State::Empty => *state = State::Loading(self.start_load()),
                State::Loading(handle) => {
                    // Awaiting by reference keeps the handle in place if this
                    // future is dropped before the load finishes.
                    let result = match handle.await {
                        Ok(result) => result,
                        Err(e) => Err(ModelError::Load(format!("loader task failed: {e}"))),
                    };
                    return match result {
                        Ok(engine) => {
                            *state = State::Ready(engine.clone());
                            self.loaded.store(true, Ordering::Release);
                            Ok(engine)
                        }
                        Err(e) => {
                            *state = State::Empty;
                            Err(e)
                        }
                    };
                }
            }
        }
    }

    /// Drop the cached engine. A later `get` loads a fresh one.
    ///
    /// A load still running is detached and its result discarded.
    pub async fn shutdown(&self) {
        let mut state = self.state.lock().await;
        match std::mem::replace(&mut *state, State::Empty) {
            State::Ready(engine) => info!("Releasing inference engine '{}'", engine.name()),
            State::Loading(_) => warn!("Shutdown while the inference engine was loading"),
            State::Empty => {}
        }
        self.loaded.store(false, Ordering::Release);
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded.load(Ordering::Acquire)
    }

    fn start_load(&self) -> LoadHandle {
        let loader = self.loader.clone();
        info!("Loading inference engine");

        tokio::task::spawn_blocking(move || {
            let started = Instant::now();
            let result = loader.load();
            match &result {
                Ok(engine) => info!(
                    "Inference engine '{}' loaded in {} ms",
                    engine.name(),
                    started.elapsed().as_millis()
                ),
                Err(e) => warn!("Inference engine failed to load: {e}"),
            }
            result
        })
    }
}
