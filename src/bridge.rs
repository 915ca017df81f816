use std::{
  future::Future,
  sync::atomic::{AtomicU64, Ordering},
  time::Instant,
};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::{
  config::{ExtractorKind, Settings},
  extractor::{search_expression, watch_url},
  format::{candidate_formats, select_best_audio_format, QualityTier},
  handle::ExtractorHandleRef,
  normalize::{
    normalize_audio, normalize_info, normalize_search, AudioStreamResult,
    SearchResultEntry, VideoInfoResult,
  },
  pool::ExtractorPool,
  Error, Result,
};

pub const DEFAULT_MAX_RESULTS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceStats {
  pub total_calls: u64,
  pub cache_hits: u64,
  pub pool_initialized: bool,
  pub extractors_ready: bool,
}

/// Request facade over the extractor pool. Shared by every caller for the
/// life of the process.
pub struct Bridge {
  pool: ExtractorPool,
  total_calls: AtomicU64,
  cache_hits: AtomicU64,
}

impl Bridge {
  pub fn new(pool: ExtractorPool) -> Self {
    Self {
      pool,
      total_calls: AtomicU64::new(0),
      cache_hits: AtomicU64::new(0),
    }
  }

  pub fn from_settings(settings: &Settings) -> Self {
    Self::new(ExtractorPool::new(settings.backend(), settings.limits))
  }

  /// Initializes the pool ahead of the first request. Not counted as a
  /// call.
  pub async fn warm_up(&self) -> Result<()> {
    self.pool.ensure_ready().await.map(|_| ())
  }

  pub async fn get_audio_stream(
    &self,
    video_id: &str,
    quality: QualityTier,
  ) -> Result<AudioStreamResult> {
    let video_id = required(ExtractorKind::Audio, "videoId", video_id)?;

    self
      .run(ExtractorKind::Audio, video_id, |handle| async move {
        let raw = handle
          .extract(watch_url(video_id))
          .await?
          .ok_or_else(|| Error::Extraction("Failed to extract info".into()))?;

        let formats = candidate_formats(&raw)
          .ok_or_else(|| Error::Extraction("No formats found".into()))?;
        let format =
          select_best_audio_format(&formats, quality).ok_or_else(|| {
            Error::Extraction("No suitable audio format found".into())
          })?;

        info!(
          video_id,
          %quality,
          bitrate = format.bitrate_kbps(),
          container = format.container.as_deref().unwrap_or_default(),
          "selected audio format"
        );
        Ok(normalize_audio(&raw, format))
      })
      .await
  }

  pub async fn get_video_info(
    &self,
    video_id: &str,
  ) -> Result<VideoInfoResult> {
    let video_id = required(ExtractorKind::Info, "videoId", video_id)?;

    self
      .run(ExtractorKind::Info, video_id, |handle| async move {
        let raw = handle
          .extract(watch_url(video_id))
          .await?
          .ok_or_else(|| Error::Extraction("Failed to extract info".into()))?;

        let mut info = normalize_info(&raw);
        if info.id.is_empty() {
          info.id = video_id.to_string();
        }
        Ok(info)
      })
      .await
  }

  pub async fn search_videos(
    &self,
    query: &str,
    max_results: usize,
  ) -> Result<Vec<SearchResultEntry>> {
    let query = required(ExtractorKind::Search, "query", query)?;
    if max_results == 0 {
      return Err(rejected(
        ExtractorKind::Search,
        query,
        "maxResults must be a positive integer".into(),
      ));
    }

    self
      .run(ExtractorKind::Search, query, |handle| async move {
        let raw = handle
          .extract(search_expression(query, max_results))
          .await?
          .ok_or_else(|| Error::Extraction("Search failed".into()))?;

        Ok(normalize_search(&raw))
      })
      .await
  }

  pub fn performance_stats(&self) -> PerformanceStats {
    PerformanceStats {
      total_calls: self.total_calls.load(Ordering::SeqCst),
      cache_hits: self.cache_hits.load(Ordering::SeqCst),
      pool_initialized: self.pool.runtime_started(),
      extractors_ready: self.pool.is_ready(),
    }
  }

  // One extraction attempt: counted, run against the handle for `kind`
  // once the pool is up, and logged with its outcome.
  async fn run<'a, T, F, Fut>(
    &self,
    kind: ExtractorKind,
    subject: &'a str,
    op: F,
  ) -> Result<T>
  where
    F: FnOnce(ExtractorHandleRef) -> Fut,
    Fut: Future<Output = Result<T>> + 'a,
  {
    let call = self.total_calls.fetch_add(1, Ordering::SeqCst) + 1;
    let started = Instant::now();

    let result = async {
      if self.pool.ensure_ready().await? {
        self.cache_hits.fetch_add(1, Ordering::SeqCst);
      }
      op(self.pool.handle(kind)?).await
    }
    .await;

    let elapsed_ms = started.elapsed().as_millis() as u64;
    match &result {
      Ok(_) => info!(%kind, subject, call, elapsed_ms, "extraction succeeded"),
      Err(err) => warn!(
        %kind,
        subject,
        call,
        elapsed_ms,
        code = err.code(),
        retryable = err.retryable(),
        "extraction failed: {err}"
      ),
    }

    result
  }
}

fn required<'a>(
  kind: ExtractorKind,
  name: &str,
  value: &'a str,
) -> Result<&'a str> {
  let trimmed = value.trim();
  if trimmed.is_empty() {
    return Err(rejected(kind, value, format!("{name} is required")));
  }
  Ok(trimmed)
}

// not counted as a call, but still logged
fn rejected(kind: ExtractorKind, subject: &str, message: String) -> Error {
  let err = Error::InvalidArgument(message);
  warn!(%kind, subject, code = err.code(), "request rejected: {err}");
  err
}
