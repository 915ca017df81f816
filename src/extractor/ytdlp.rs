use std::{process::Stdio, sync::Arc, time::Duration};

use async_trait::async_trait;
use serde_json::Value;
use tokio::{process::Command, time::timeout};
use tracing::{debug, info};

use crate::{
  config::ExtractorConfig, util::redact_proxy, Error, Result,
};

use super::{Backend, Extractor};

const VERSION_PROBE_TIMEOUT: Duration = Duration::from_secs(15);

// slack on top of yt-dlp's own socket timeout and retries
const PROCESS_GRACE: Duration = Duration::from_secs(30);

// run yt-dlp command line to get the info json of a video or search.
// requires yt-dlp executable to be in PATH (or YTDLP_PATH).
pub struct Ytdlp {
  path: String,
  proxy: Option<String>,
  user_agent: String,
}

impl Ytdlp {
  pub fn new(path: String, proxy: Option<String>, user_agent: String) -> Self {
    Self {
      path,
      proxy,
      user_agent,
    }
  }
}

#[async_trait]
impl Backend for Ytdlp {
  fn name(&self) -> &'static str {
    "yt-dlp"
  }

  async fn start(&self) -> Result<()> {
    let probe = Command::new(&self.path)
      .arg("--version")
      .kill_on_drop(true)
      .output();

    let output = timeout(VERSION_PROBE_TIMEOUT, probe)
      .await
      .map_err(|_| {
        Error::Initialization(format!("{} --version timed out", self.path))
      })?
      .map_err(|e| {
        Error::Initialization(format!("failed to run {}: {e}", self.path))
      })?;

    if !output.status.success() {
      return Err(Error::Initialization(format!(
        "{} --version exited with {}",
        self.path, output.status
      )));
    }

    let version = String::from_utf8_lossy(&output.stdout);
    info!(path = %self.path, version = %version.trim(), "found yt-dlp");
    if let Some(proxy) = &self.proxy {
      info!("using proxy: {}", redact_proxy(proxy));
    }

    Ok(())
  }

  fn extractor(&self, config: &ExtractorConfig) -> Result<Arc<dyn Extractor>> {
    Ok(Arc::new(YtdlpExtractor {
      path: self.path.clone(),
      proxy: self.proxy.clone(),
      user_agent: self.user_agent.clone(),
      config: config.clone(),
    }))
  }
}

struct YtdlpExtractor {
  path: String,
  proxy: Option<String>,
  user_agent: String,
  config: ExtractorConfig,
}

impl YtdlpExtractor {
  fn args(&self, target: &str) -> Vec<String> {
    let config = &self.config;
    // emit the output as a single json object instead of jsonl
    let mut args = vec!["--dump-single-json".to_string()];

    if config.quiet {
      args.push("--quiet".into());
    }
    if config.no_warnings {
      args.push("--no-warnings".into());
    }
    if config.skip_download {
      args.push("--skip-download".into());
    }
    if let Some(format) = &config.format {
      args.extend(["-f".into(), format.clone()]);
    }
    if config.flatten_entries {
      // don't fetch video pages of search entries
      args.push("--flat-playlist".into());
    }
    if !config.allow_playlist {
      args.push("--no-playlist".into());
    }

    args.extend([
      "--socket-timeout".into(),
      config.socket_timeout.as_secs().to_string(),
      "--retries".into(),
      config.max_retries.to_string(),
      "--user-agent".into(),
      self.user_agent.clone(),
    ]);

    if let Some(proxy) = &self.proxy {
      args.extend(["--proxy".into(), proxy.clone()]);
    }

    args.push(target.to_string());
    args
  }

  // yt-dlp bounds each socket operation itself, this only catches a
  // process that hangs past all of its retries.
  fn deadline(&self) -> Duration {
    let attempts = self.config.max_retries.saturating_add(1);
    self
      .config
      .socket_timeout
      .saturating_mul(attempts)
      .saturating_add(PROCESS_GRACE)
  }
}

#[async_trait]
impl Extractor for YtdlpExtractor {
  async fn extract(&self, target: &str) -> Result<Option<Value>> {
    debug!(kind = %self.config.kind, subject = target, "running yt-dlp");

    let child = Command::new(&self.path)
      .args(self.args(target))
      .stdin(Stdio::null())
      .stdout(Stdio::piped())
      .stderr(Stdio::piped())
      .kill_on_drop(true)
      .spawn()
      .map_err(|e| {
        Error::Extraction(format!("failed to run {}: {e}", self.path))
      })?;

    // dropping the child on timeout kills the process
    let output = timeout(self.deadline(), child.wait_with_output())
      .await
      .map_err(|_| {
        Error::Timeout(format!(
          "yt-dlp did not finish within {}s",
          self.deadline().as_secs()
        ))
      })?
      .map_err(|e| Error::Extraction(format!("yt-dlp failed: {e}")))?;

    detect_error(&output.stderr)?;
    if !output.status.success() {
      return Err(Error::Extraction(format!(
        "yt-dlp exited with {}",
        output.status
      )));
    }

    parse_output(&output.stdout)
  }
}

fn detect_error(bytes: &[u8]) -> Result<()> {
  let s = String::from_utf8_lossy(bytes);
  let Some(line) = s.lines().find(|line| line.contains("ERROR:")) else {
    return Ok(());
  };

  let message = line.trim().to_string();
  let lowered = message.to_lowercase();
  if lowered.contains("timed out") || lowered.contains("timeout") {
    Err(Error::Timeout(message))
  } else {
    Err(Error::Extraction(message))
  }
}

fn parse_output(stdout: &[u8]) -> Result<Option<Value>> {
  let text = String::from_utf8_lossy(stdout);
  let text = text.trim();
  if text.is_empty() {
    return Ok(None);
  }

  let value: Value = serde_json::from_str(text)?;
  Ok((!value.is_null()).then_some(value))
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;
  use crate::config::{ExtractorKind, Limits};

  fn extractor(kind: ExtractorKind, proxy: Option<&str>) -> YtdlpExtractor {
    let backend = Ytdlp::new(
      "yt-dlp".into(),
      proxy.map(Into::into),
      "test-agent".into(),
    );
    YtdlpExtractor {
      path: backend.path,
      proxy: backend.proxy,
      user_agent: backend.user_agent,
      config: ExtractorConfig::new(kind, Limits::default()),
    }
  }

  fn has_pair(args: &[String], flag: &str, value: &str) -> bool {
    args.windows(2).any(|w| w[0] == flag && w[1] == value)
  }

  #[test]
  fn test_audio_args() {
    let url = "https://www.youtube.com/watch?v=abc";
    let args = extractor(ExtractorKind::Audio, None).args(url);

    assert_eq!(args.first().map(String::as_str), Some("--dump-single-json"));
    assert_eq!(args.last().map(String::as_str), Some(url));
    assert!(has_pair(
      &args,
      "-f",
      "bestaudio[ext=m4a]/bestaudio[ext=mp3]/bestaudio"
    ));
    assert!(has_pair(&args, "--socket-timeout", "10"));
    assert!(has_pair(&args, "--retries", "1"));
    assert!(has_pair(&args, "--user-agent", "test-agent"));
    assert!(args.contains(&"--no-playlist".to_string()));
    assert!(!args.contains(&"--flat-playlist".to_string()));
    assert!(!args.contains(&"--proxy".to_string()));
  }

  #[test]
  fn test_search_args() {
    let args = extractor(ExtractorKind::Search, Some("socks5://127.0.0.1:1080"))
      .args("ytsearch5:lofi");

    assert!(args.contains(&"--flat-playlist".to_string()));
    assert!(!args.contains(&"-f".to_string()));
    assert!(has_pair(&args, "--proxy", "socks5://127.0.0.1:1080"));
    assert_eq!(args.last().map(String::as_str), Some("ytsearch5:lofi"));
  }

  #[test]
  fn test_deadline() {
    let extractor = extractor(ExtractorKind::Info, None);
    assert_eq!(extractor.deadline(), Duration::from_secs(10 * 2 + 30));
  }

  #[test]
  fn test_deadline_saturates() {
    let mut extractor = extractor(ExtractorKind::Info, None);
    extractor.config.max_retries = u32::MAX;
    assert!(extractor.deadline() > Duration::from_secs(10 * 1000));

    extractor.config.socket_timeout = Duration::MAX;
    assert_eq!(extractor.deadline(), Duration::MAX);
  }

  #[test]
  fn test_detect_error() {
    assert_eq!(detect_error(b"[youtube] abc: Downloading webpage\n"), Ok(()));

    let err = detect_error(
      b"[youtube] abc: Downloading webpage\n\
        ERROR: [youtube] abc: Video unavailable\n",
    )
    .unwrap_err();
    assert_eq!(
      err,
      Error::Extraction("ERROR: [youtube] abc: Video unavailable".into())
    );

    let err = detect_error(
      b"ERROR: Unable to download webpage: The read operation timed out\n",
    )
    .unwrap_err();
    assert_eq!(err.code(), "TIMEOUT");
  }

  #[test]
  fn test_parse_output() {
    assert_eq!(parse_output(b""), Ok(None));
    assert_eq!(parse_output(b"null\n"), Ok(None));
    assert_eq!(
      parse_output(br#"{"id": "abc", "formats": []}"#),
      Ok(Some(json!({ "id": "abc", "formats": [] })))
    );
    let err = parse_output(b"{not json").unwrap_err();
    assert_eq!(err.code(), "EXTRACTION_ERROR");
  }
}
