use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use regex::Regex;
use reqwest::{Client, Url};
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::{
  config::ExtractorConfig, piped::PipedInstance, util::redact_proxy, Error,
  Result,
};

use super::{Backend, Extractor};

static SEARCH_EXPR_REGEX: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"(?s)^ytsearch(\d*):(.+)$").unwrap());

// query a Piped API instance and reshape its responses into the info json
// layout yt-dlp produces.
pub struct Piped {
  instance: PipedInstance,
  proxy: Option<String>,
  user_agent: String,
}

impl Piped {
  pub fn new(
    instance: PipedInstance,
    proxy: Option<String>,
    user_agent: String,
  ) -> Self {
    Self {
      instance,
      proxy,
      user_agent,
    }
  }
}

#[async_trait]
impl Backend for Piped {
  fn name(&self) -> &'static str {
    "piped"
  }

  async fn start(&self) -> Result<()> {
    Url::parse(self.instance.base_url()).map_err(|e| {
      Error::Initialization(format!(
        "invalid piped instance {}: {e}",
        self.instance.base_url()
      ))
    })?;

    info!(instance = self.instance.base_url(), "using piped instance");
    if let Some(proxy) = &self.proxy {
      info!("using proxy: {}", redact_proxy(proxy));
    }

    Ok(())
  }

  fn extractor(&self, config: &ExtractorConfig) -> Result<Arc<dyn Extractor>> {
    let mut builder = Client::builder()
      .user_agent(self.user_agent.clone())
      .timeout(config.socket_timeout);

    // only the configured proxy is used, never one from the environment
    builder = match &self.proxy {
      Some(proxy) => builder.proxy(reqwest::Proxy::all(proxy).map_err(|e| {
        Error::Initialization(format!("invalid proxy: {e}"))
      })?),
      None => builder.no_proxy(),
    };

    let client = builder.build().map_err(|e| {
      Error::Initialization(format!("failed to build http client: {e}"))
    })?;

    Ok(Arc::new(PipedExtractor {
      client,
      instance: self.instance.clone(),
      config: config.clone(),
    }))
  }
}

struct PipedExtractor {
  client: Client,
  instance: PipedInstance,
  config: ExtractorConfig,
}

impl PipedExtractor {
  async fn fetch<T: DeserializeOwned>(
    &self,
    url: &str,
    query: &[(&str, &str)],
  ) -> Result<T> {
    let mut attempt = 0;
    loop {
      let resp = self
        .client
        .get(url)
        .query(query)
        .send()
        .await
        .and_then(|resp| resp.error_for_status());

      match resp {
        Ok(resp) => return Ok(resp.json::<T>().await?),
        Err(e)
          if (e.is_timeout() || e.is_connect())
            && attempt < self.config.max_retries =>
        {
          attempt += 1;
          warn!(url, attempt, "retrying piped request: {e}");
        }
        Err(e) => return Err(e.into()),
      }
    }
  }
}

#[async_trait]
impl Extractor for PipedExtractor {
  async fn extract(&self, target: &str) -> Result<Option<Value>> {
    match Target::parse(target)? {
      Target::Video(video_id) => {
        let url = self.instance.stream_url(&video_id);
        let streams: PipedStreams = self.fetch(&url, &[]).await?;
        Ok(Some(streams.into_record(&video_id)))
      }
      Target::Search { limit, query } => {
        let url = self.instance.search_url();
        let params = [("q", query.as_str()), ("filter", "videos")];
        let search: PipedSearch = self.fetch(&url, &params).await?;
        Ok(Some(search.into_record(limit)))
      }
    }
  }
}

#[derive(Debug, PartialEq, Eq)]
enum Target {
  Video(String),
  Search { limit: usize, query: String },
}

impl Target {
  fn parse(target: &str) -> Result<Self> {
    if let Some(caps) = SEARCH_EXPR_REGEX.captures(target) {
      // a bare "ytsearch:" asks for a single result
      let limit = caps[1].parse().unwrap_or(1);
      let query = caps[2].to_string();
      return Ok(Self::Search { limit, query });
    }

    let unsupported =
      || Error::Extraction(format!("unsupported target: {target}"));
    let url = Url::parse(target).map_err(|_| unsupported())?;
    let video_id = url
      .query_pairs()
      .find_map(|(k, v)| (k == "v").then(|| v.into_owned()))
      .ok_or_else(unsupported)?;

    Ok(Self::Video(video_id))
  }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct PipedStreams {
  title: Option<String>,
  description: Option<String>,
  uploader: Option<String>,
  thumbnail_url: Option<String>,
  duration: Option<i64>,
  views: Option<i64>,
  audio_streams: Vec<PipedStream>,
  video_streams: Vec<PipedStream>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct PipedStream {
  url: Option<String>,
  mime_type: Option<String>,
  codec: Option<String>,
  // bits per second
  bitrate: Option<u64>,
  video_only: bool,
}

impl PipedStreams {
  fn into_record(self, video_id: &str) -> Value {
    let audio = self.audio_streams.iter().map(|s| {
      json!({
        "url": s.url,
        "ext": container_of(s.mime_type.as_deref()),
        "acodec": s.codec.as_deref().unwrap_or("unknown"),
        "vcodec": "none",
        "abr": s.bitrate.map(|b| b / 1000),
      })
    });

    let video = self.video_streams.iter().map(|s| {
      json!({
        "url": s.url,
        "ext": container_of(s.mime_type.as_deref()),
        "acodec": if s.video_only { "none" } else { "unknown" },
        "vcodec": s.codec.as_deref().unwrap_or("unknown"),
        "tbr": s.bitrate.map(|b| b / 1000),
      })
    });

    json!({
      "id": video_id,
      "title": self.title,
      "description": self.description,
      "uploader": self.uploader,
      "thumbnail": self.thumbnail_url,
      "duration": self.duration,
      "view_count": self.views,
      "formats": audio.chain(video).collect::<Vec<_>>(),
    })
  }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PipedSearch {
  items: Vec<PipedSearchItem>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct PipedSearchItem {
  url: Option<String>,
  #[serde(rename = "type")]
  item_type: Option<String>,
  title: Option<String>,
  thumbnail: Option<String>,
  uploader_name: Option<String>,
  duration: Option<i64>,
  views: Option<i64>,
}

impl PipedSearch {
  fn into_record(self, limit: usize) -> Value {
    let entries: Vec<Value> = self
      .items
      .into_iter()
      .filter(|item| item.item_type.as_deref().unwrap_or("stream") == "stream")
      .take(limit)
      .map(|item| {
        let id = item
          .url
          .as_deref()
          .map(|url| url.strip_prefix("/watch?v=").unwrap_or(url));
        json!({
          "id": id,
          "title": item.title,
          "thumbnail": item.thumbnail,
          "uploader": item.uploader_name,
          "duration": item.duration,
          "view_count": item.views,
        })
      })
      .collect();

    json!({ "entries": entries })
  }
}

fn container_of(mime_type: Option<&str>) -> Option<String> {
  let mime_type = mime_type?;
  let essence = mime_type.split(';').next().unwrap_or(mime_type).trim();
  let container = match essence {
    "audio/mp4" => "m4a",
    "audio/mpeg" => "mp3",
    other => other.rsplit('/').next().unwrap_or(other),
  };
  Some(container.to_string())
}
