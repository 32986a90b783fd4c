use crate::config::Config;
use crate::engine::{soffice::SofficeEngine, Engine, EngineDiag};
use crate::error::{ConvertError, InitError};
use anyhow::{anyhow, Result};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, warn};

enum State<E> {
    Ready(E),
    Failed(String),
    Released,
}

/// Exclusive owner of one engine resource. State machine: ready on successful
/// create, failed on unrecoverable fault, released exactly once on teardown.
/// A failed or released handle rejects every further engine call.
pub struct EngineHandle<E: Engine> {
    install_path: PathBuf,
    state: Mutex<State<E>>,
}

impl EngineHandle<SofficeEngine> {
    pub fn create(cfg: &Config) -> Result<Self, InitError> {
        let engine = SofficeEngine::initialize(cfg)?;
        let install_path = engine.install_path().to_path_buf();
        Ok(Self {
            install_path,
            state: Mutex::new(State::Ready(engine)),
        })
    }
}

impl<E: Engine> EngineHandle<E> {
    /// Bind an already-initialized engine. Test seam, and the escape hatch for
    /// embedders that bring their own `Engine` impl.
    pub fn from_engine(install_path: impl Into<PathBuf>, engine: E) -> Self {
        Self {
            install_path: install_path.into(),
            state: Mutex::new(State::Ready(engine)),
        }
    }

    pub fn install_path(&self) -> &Path {
        &self.install_path
    }

    pub fn is_ready(&self) -> bool {
        matches!(*self.lock(), State::Ready(_))
    }

    pub fn diagnose(&self) -> Result<EngineDiag> {
        match &*self.lock() {
            State::Ready(engine) => engine.diagnose(),
            State::Failed(diag) => Err(anyhow!("engine not ready: {diag}")),
            State::Released => Err(anyhow!("engine not ready: handle released")),
        }
    }

    /// Single entry point for engine access. Holds the lock for the whole
    /// call, so at most one conversion is in flight per handle; a fatal error
    /// releases the engine resource and poisons the handle.
    pub(crate) fn with_engine<R>(
        &self,
        f: impl FnOnce(&E) -> Result<R, ConvertError>,
    ) -> Result<R, ConvertError> {
        let mut state = self.lock();

        let result = match &*state {
            State::Ready(engine) => f(engine),
            State::Failed(diag) => {
                return Err(ConvertError::NotReady(format!(
                    "engine previously failed: {diag}"
                )));
            }
            State::Released => {
                return Err(ConvertError::NotReady("handle has been released".into()));
            }
        };

        if let Err(err) = &result {
            if err.is_fatal() {
                warn!("engine fault, poisoning handle: {err}");
                if let State::Ready(mut engine) =
                    std::mem::replace(&mut *state, State::Failed(err.to_string()))
                {
                    if let Err(e) = engine.shutdown() {
                        debug!("engine shutdown after fault failed: {e:#}");
                    }
                }
            }
        }

        result
    }

    /// Tear the handle down. The engine resource is released on the first
    /// call; repeat calls are no-ops.
    pub fn close(&self) -> Result<()> {
        let mut state = self.lock();
        match std::mem::replace(&mut *state, State::Released) {
            State::Ready(mut engine) => engine.shutdown(),
            State::Failed(_) | State::Released => Ok(()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State<E>> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl<E: Engine> std::fmt::Debug for EngineHandle<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineHandle")
            .field("install_path", &self.install_path)
            .finish_non_exhaustive()
    }
}

impl<E: Engine> Drop for EngineHandle<E> {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            debug!("engine shutdown on drop failed: {err:#}");
        }
    }
}
