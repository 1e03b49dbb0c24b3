//! Lifecycle around one pipeline run: `initialize` starts it, `teardown`
//! abandons it and guarantees nothing is written afterwards.

use crate::config::AppConfig;
use crate::error::MapError;
use crate::loader::Fetcher;
use crate::pipeline::{build_map, RenderedMap};
use crate::render::write_page;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::task::{AbortHandle, JoinHandle};
use tracing::debug;

/// Cloneable handle that can tear a session down from elsewhere, e.g. a
/// signal handler.
#[derive(Debug, Clone)]
pub struct SessionGuard {
    disposed: Arc<Mutex<bool>>,
    abort: AbortHandle,
}

impl SessionGuard {
    pub fn teardown(&self) {
        // Waits out at most one in-progress page write (done on a blocking
        // thread); once this returns nothing else lands.
        let mut disposed = self.disposed.lock().unwrap_or_else(PoisonError::into_inner);
        if !*disposed {
            debug!("Tearing down map session");
            *disposed = true;
        }
        self.abort.abort();
    }

    pub fn is_disposed(&self) -> bool {
        *self.disposed.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

pub struct MapSession {
    // Cleared once the run has been awaited to completion.
    handle: Option<JoinHandle<Result<RenderedMap, MapError>>>,
    guard: SessionGuard,
}

impl MapSession {
    /// Spawns load → decode → classify → render and, when `output` is set,
    /// writes the page there.
    pub fn initialize(config: AppConfig, fetcher: Arc<dyn Fetcher>, output: Option<PathBuf>) -> Self {
        let disposed = Arc::new(Mutex::new(false));
        let flag = Arc::clone(&disposed);

        let handle = tokio::spawn(async move {
            let rendered = build_map(fetcher.as_ref(), &config).await?;
            let page = rendered.page.clone();
            // File IO and the disposal lock stay off the async workers.
            match tokio::task::spawn_blocking(move || commit(&flag, output.as_deref(), &page)).await {
                Ok(committed) => committed?,
                Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
                Err(_) => return Err(MapError::Cancelled),
            }
            Ok(rendered)
        });

        let guard = SessionGuard {
            disposed,
            abort: handle.abort_handle(),
        };
        Self {
            handle: Some(handle),
            guard,
        }
    }

    pub fn guard(&self) -> SessionGuard {
        self.guard.clone()
    }

    /// Waits for the run. A torn-down run resolves to `MapError::Cancelled`;
    /// asking again after the run resolved gives `MapError::AlreadyFinished`.
    pub async fn finished(&mut self) -> Result<RenderedMap, MapError> {
        let handle = self.handle.as_mut().ok_or(MapError::AlreadyFinished)?;
        let joined = handle.await;
        self.handle = None;

        match joined {
            Ok(result) => result,
            Err(e) if e.is_cancelled() => Err(MapError::Cancelled),
            Err(e) => std::panic::resume_unwind(e.into_panic()),
        }
    }

    pub fn teardown(self) {
        self.guard.teardown();
    }
}

impl Drop for MapSession {
    fn drop(&mut self) {
        self.guard.teardown();
    }
}

fn commit(disposed: &Mutex<bool>, output: Option<&Path>, page: &str) -> Result<(), MapError> {
    let disposed = disposed.lock().unwrap_or_else(PoisonError::into_inner);
    if *disposed {
        return Err(MapError::Cancelled);
    }
    if let Some(path) = output {
        write_page(path, page)?;
    }
    Ok(())
}
