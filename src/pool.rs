use std::sync::{
  atomic::{AtomicBool, AtomicU64, Ordering},
  Arc,
};

use tokio::sync::OnceCell;
use tracing::{info, warn};

use crate::{
  config::{ExtractorConfig, ExtractorKind, Limits},
  extractor::Backend,
  handle::{ExtractorHandle, ExtractorHandleRef},
  Error, Result,
};

struct Handles {
  audio: ExtractorHandleRef,
  info: ExtractorHandleRef,
  search: ExtractorHandleRef,
}

impl Handles {
  fn get(&self, kind: ExtractorKind) -> &ExtractorHandleRef {
    match kind {
      ExtractorKind::Audio => &self.audio,
      ExtractorKind::Info => &self.info,
      ExtractorKind::Search => &self.search,
    }
  }
}

/// Owns the three long-lived extractor handles. Nothing is built until the
/// first [`ExtractorPool::ensure_ready`].
pub struct ExtractorPool {
  backend: Arc<dyn Backend>,
  limits: Limits,
  handles: OnceCell<Handles>,
  runtime_started: AtomicBool,
  initializations: AtomicU64,
}

impl ExtractorPool {
  pub fn new(backend: Arc<dyn Backend>, limits: Limits) -> Self {
    Self {
      backend,
      limits,
      handles: OnceCell::new(),
      runtime_started: AtomicBool::new(false),
      initializations: AtomicU64::new(0),
    }
  }

  /// Starts the runtime and builds all three handles, once. Concurrent
  /// callers wait for the same initialization. A failed initialization
  /// leaves nothing behind and the next call starts over.
  ///
  /// Returns true when the handles already existed.
  pub async fn ensure_ready(&self) -> Result<bool> {
    if self.handles.initialized() {
      return Ok(true);
    }

    // callers that had to wait on an initialization in flight count as
    // misses too
    self.handles.get_or_try_init(|| self.initialize()).await?;
    Ok(false)
  }

  pub fn handle(&self, kind: ExtractorKind) -> Result<ExtractorHandleRef> {
    self
      .handles
      .get()
      .map(|handles| handles.get(kind).clone())
      .ok_or_else(|| Error::NotReady(format!("no {kind} extractor yet")))
  }

  pub fn runtime_started(&self) -> bool {
    self.runtime_started.load(Ordering::SeqCst)
  }

  pub fn is_ready(&self) -> bool {
    self.handles.initialized()
  }

  /// Number of times initialization has been entered.
  #[cfg(test)]
  pub fn initializations(&self) -> u64 {
    self.initializations.load(Ordering::SeqCst)
  }

  async fn initialize(&self) -> Result<Handles> {
    let attempt = self.initializations.fetch_add(1, Ordering::SeqCst) + 1;
    info!(backend = self.backend.name(), attempt, "starting extractors");

    let handles = self.build().await.map_err(|err| {
      warn!(backend = self.backend.name(), "initialization failed: {err}");
      match err {
        Error::Initialization(_) => err,
        other => Error::Initialization(other.to_string()),
      }
    })?;

    info!(backend = self.backend.name(), "extractors ready");
    Ok(handles)
  }

  async fn build(&self) -> Result<Handles> {
    self.backend.start().await?;
    self.runtime_started.store(true, Ordering::SeqCst);

    // every extractor is built before any handle is spawned, so a failure
    // here leaves no handle running
    let audio = self.prepare(ExtractorKind::Audio)?;
    let info = self.prepare(ExtractorKind::Info)?;
    let search = self.prepare(ExtractorKind::Search)?;

    Ok(Handles {
      audio: audio.spawn(),
      info: info.spawn(),
      search: search.spawn(),
    })
  }

  fn prepare(&self, kind: ExtractorKind) -> Result<ExtractorHandle> {
    let config = ExtractorConfig::new(kind, self.limits);
    let extractor = self.backend.extractor(&config)?;
    Ok(ExtractorHandle::new(kind, extractor))
  }
}
