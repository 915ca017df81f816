use axum::{
  extract::{Path, Query, State},
  response::IntoResponse,
  routing::{get, post},
  Json, Router,
};
use serde::Deserialize;

use crate::{
  bridge::{PerformanceStats, DEFAULT_MAX_RESULTS},
  channel::{MethodCall, MethodChannel, MethodResponse},
  format::QualityTier,
  normalize::{AudioStreamResult, SearchResultEntry, VideoInfoResult},
  Error,
};

pub fn router(channel: MethodChannel) -> Router {
  Router::new()
    .route("/health", get(health))
    .route("/audio/:video_id", get(get_audio))
    .route("/info/:video_id", get(get_info))
    .route("/search", get(search))
    .route("/stats", get(stats))
    .route("/call", post(call))
    .with_state(channel)
}

async fn health() -> impl IntoResponse {
  "ok".to_owned()
}

#[derive(Debug, Default, Deserialize)]
pub struct AudioReq {
  quality: Option<String>,
}

#[axum::debug_handler]
pub async fn get_audio(
  State(channel): State<MethodChannel>,
  Path(video_id): Path<String>,
  Query(req): Query<AudioReq>,
) -> Result<Json<AudioStreamResult>, Error> {
  let quality = req
    .quality
    .as_deref()
    .map(QualityTier::parse)
    .unwrap_or_default();
  let audio = channel.bridge().get_audio_stream(&video_id, quality).await?;
  Ok(Json(audio))
}

#[axum::debug_handler]
pub async fn get_info(
  State(channel): State<MethodChannel>,
  Path(video_id): Path<String>,
) -> Result<Json<VideoInfoResult>, Error> {
  Ok(Json(channel.bridge().get_video_info(&video_id).await?))
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchReq {
  #[serde(default)]
  query: String,
  // kept as text so a bad number gets the usual json error body
  max_results: Option<String>,
}

impl SearchReq {
  fn max_results(&self) -> Result<usize, Error> {
    let Some(value) = self.max_results.as_deref().map(str::trim) else {
      return Ok(DEFAULT_MAX_RESULTS);
    };
    if value.is_empty() {
      return Ok(DEFAULT_MAX_RESULTS);
    }

    value.parse().map_err(|_| {
      Error::InvalidArgument(format!(
        "maxResults must be a positive integer, got {value:?}"
      ))
    })
  }
}

#[axum::debug_handler]
pub async fn search(
  State(channel): State<MethodChannel>,
  Query(req): Query<SearchReq>,
) -> Result<Json<Vec<SearchResultEntry>>, Error> {
  let max_results = req.max_results()?;
  let bridge = channel.bridge();
  let entries = bridge.search_videos(&req.query, max_results).await?;
  Ok(Json(entries))
}

pub async fn stats(
  State(channel): State<MethodChannel>,
) -> Json<PerformanceStats> {
  Json(channel.bridge().performance_stats())
}

pub async fn call(
  State(channel): State<MethodChannel>,
  Json(call): Json<MethodCall>,
) -> Json<MethodResponse> {
  Json(channel.request(call).await)
}
