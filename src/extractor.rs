mod piped;
mod ytdlp;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::{config::ExtractorConfig, Result};

pub use self::piped::Piped;
pub use ytdlp::Ytdlp;

pub const WATCH_URL_PREFIX: &str = "https://www.youtube.com/watch?v=";

pub fn watch_url(video_id: &str) -> String {
  format!("{WATCH_URL_PREFIX}{video_id}")
}

pub fn search_expression(query: &str, max_results: usize) -> String {
  format!("ytsearch{max_results}:{query}")
}

/// A client bound to one [`ExtractorConfig`]. Given a watch url or a search
/// expression it returns the raw info record, or `None` when the platform
/// gave back nothing.
#[async_trait]
pub trait Extractor: Send + Sync {
  async fn extract(&self, target: &str) -> Result<Option<Value>>;
}

/// The platform runtime that extractors are created from.
#[async_trait]
pub trait Backend: Send + Sync {
  fn name(&self) -> &'static str;

  /// Brings up whatever the extractors need. Called again from scratch if
  /// an earlier start failed.
  async fn start(&self) -> Result<()>;

  fn extractor(&self, config: &ExtractorConfig) -> Result<Arc<dyn Extractor>>;
}
