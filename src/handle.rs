use std::sync::Arc;

use kameo::{actor::ActorRef, error::SendError, messages, Actor};
use serde_json::Value;
use tracing::debug;

use crate::{config::ExtractorKind, extractor::Extractor, Error, Result};

// An actor handles one message at a time, so a handle never runs two
// extractions at once while handles of different kinds stay independent.
#[derive(Actor)]
pub struct ExtractorHandle {
  kind: ExtractorKind,
  extractor: Arc<dyn Extractor>,
}

#[derive(Clone)]
pub struct ExtractorHandleRef {
  kind: ExtractorKind,
  actor: ActorRef<ExtractorHandle>,
}

#[messages]
impl ExtractorHandle {
  #[message]
  async fn extract(&mut self, target: String) -> Result<Option<Value>> {
    debug!(kind = %self.kind, subject = %target, "extract");
    self.extractor.extract(&target).await
  }
}

impl ExtractorHandle {
  pub fn new(kind: ExtractorKind, extractor: Arc<dyn Extractor>) -> Self {
    Self { kind, extractor }
  }

  pub fn spawn(self) -> ExtractorHandleRef {
    let kind = self.kind;
    ExtractorHandleRef {
      kind,
      actor: kameo::spawn(self),
    }
  }
}

impl ExtractorHandleRef {
  #[cfg(test)]
  pub fn kind(&self) -> ExtractorKind {
    self.kind
  }

  /// Waits for the handle to run the extraction. Dropping the returned
  /// future abandons the reply; the handle still finishes the call.
  pub async fn extract(&self, target: String) -> Result<Option<Value>> {
    match self.actor.ask(Extract { target }).send().await {
      Ok(record) => Ok(record),
      Err(SendError::HandlerError(err)) => Err(err),
      Err(_) => Err(Error::NotReady(format!(
        "{} extractor is no longer running",
        self.kind
      ))),
    }
  }
}
