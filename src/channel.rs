use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::oneshot;
use tracing::debug;

use crate::{
  bridge::{Bridge, DEFAULT_MAX_RESULTS},
  format::QualityTier,
  Error, Result,
};

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct MethodCall {
  pub method: String,
  #[serde(default)]
  pub arguments: Map<String, Value>,
}

impl MethodCall {
  #[cfg(test)]
  pub fn new(method: impl Into<String>, arguments: Value) -> Self {
    let arguments = match arguments {
      Value::Object(map) => map,
      _ => Map::new(),
    };
    Self {
      method: method.into(),
      arguments,
    }
  }

  // present but non-string values count as missing
  fn str_arg(&self, name: &str) -> &str {
    self
      .arguments
      .get(name)
      .and_then(Value::as_str)
      .unwrap_or_default()
  }

  fn max_results(&self) -> usize {
    match self.arguments.get("maxResults") {
      None | Some(Value::Null) => DEFAULT_MAX_RESULTS,
      Some(v) => v
        .as_u64()
        .or_else(|| v.as_f64().map(|f| f as u64))
        .unwrap_or_default() as usize,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MethodResponse {
  Success { result: Value },
  Error { code: String, message: String },
  NotImplemented,
}

impl From<Result<Value>> for MethodResponse {
  fn from(result: Result<Value>) -> Self {
    match result {
      Ok(result) => Self::Success { result },
      Err(err) => Self::Error {
        code: err.code().to_string(),
        message: err.to_string(),
      },
    }
  }
}

/// Dispatches named method calls to the bridge.
#[derive(Clone)]
pub struct MethodChannel {
  bridge: Arc<Bridge>,
}

impl MethodChannel {
  pub fn new(bridge: Arc<Bridge>) -> Self {
    Self { bridge }
  }

  pub fn bridge(&self) -> &Bridge {
    &self.bridge
  }

  pub async fn handle(&self, call: MethodCall) -> MethodResponse {
    let bridge = &self.bridge;
    let result = match call.method.as_str() {
      "getAudioStream" => {
        let video_id = call.str_arg("videoId");
        let quality = QualityTier::parse(call.str_arg("quality"));
        to_value(bridge.get_audio_stream(video_id, quality).await)
      }
      "getVideoInfo" => {
        to_value(bridge.get_video_info(call.str_arg("videoId")).await)
      }
      "searchVideos" => to_value(
        bridge
          .search_videos(call.str_arg("query"), call.max_results())
          .await,
      ),
      "getPerformanceStats" => to_value(Ok(bridge.performance_stats())),
      method => {
        debug!(method, "method not implemented");
        return MethodResponse::NotImplemented;
      }
    };

    result.into()
  }

  /// Runs the call on its own task. The reply is delivered once; a caller
  /// that has dropped the receiver simply never sees it.
  pub fn call(&self, call: MethodCall) -> oneshot::Receiver<MethodResponse> {
    let (tx, rx) = oneshot::channel();
    let channel = self.clone();

    tokio::spawn(async move {
      let method = call.method.clone();
      let response = channel.handle(call).await;
      if tx.send(response).is_err() {
        debug!(method, "caller went away, reply discarded");
      }
    });

    rx
  }

  /// [`MethodChannel::call`] and wait for the reply.
  pub async fn request(&self, call: MethodCall) -> MethodResponse {
    await_reply(self.call(call)).await
  }
}

async fn await_reply(
  rx: oneshot::Receiver<MethodResponse>,
) -> MethodResponse {
  match rx.await {
    Ok(response) => response,
    // the worker task ended before sending
    Err(_) => MethodResponse::from(Err::<Value, _>(Error::Extraction(
      "call ended without a reply".into(),
    ))),
  }
}

fn to_value<T: Serialize>(result: Result<T>) -> Result<Value> {
  Ok(serde_json::to_value(result?)?)
}
