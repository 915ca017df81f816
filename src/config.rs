use std::{fmt, net::SocketAddr, str::FromStr, sync::Arc, time::Duration};

use tracing::warn;

use crate::{
  extractor::{Backend, Piped, Ytdlp},
  piped::PipedInstance,
};

// desktop browser UA, the mobile default gets throttled
pub const DEFAULT_USER_AGENT: &str =
  "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
   (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

pub const AUDIO_FORMAT_HINT: &str =
  "bestaudio[ext=m4a]/bestaudio[ext=mp3]/bestaudio";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExtractorKind {
  Audio,
  Info,
  Search,
}

impl fmt::Display for ExtractorKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Audio => write!(f, "audio"),
      Self::Info => write!(f, "info"),
      Self::Search => write!(f, "search"),
    }
  }
}

pub const MAX_SOCKET_TIMEOUT: Duration = Duration::from_secs(300);
pub const MAX_RETRIES: u32 = 10;

/// Bounds applied to every extraction call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
  pub socket_timeout: Duration,
  pub max_retries: u32,
}

impl Limits {
  /// Pulls out-of-range values back inside the supported bounds.
  pub fn clamped(self) -> Self {
    let clamped = Self {
      socket_timeout: self
        .socket_timeout
        .clamp(Duration::from_secs(1), MAX_SOCKET_TIMEOUT),
      max_retries: self.max_retries.min(MAX_RETRIES),
    };
    if clamped != self {
      warn!(
        socket_timeout = clamped.socket_timeout.as_secs(),
        max_retries = clamped.max_retries,
        "limits out of range, clamped"
      );
    }
    clamped
  }
}

impl Default for Limits {
  fn default() -> Self {
    Self {
      socket_timeout: Duration::from_secs(10),
      max_retries: 1,
    }
  }
}

/// Options for one extraction mode. Built once when the pool starts and
/// never changed afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractorConfig {
  pub kind: ExtractorKind,
  pub quiet: bool,
  pub no_warnings: bool,
  pub skip_download: bool,
  pub format: Option<String>,
  pub flatten_entries: bool,
  pub allow_playlist: bool,
  pub socket_timeout: Duration,
  pub max_retries: u32,
}

impl ExtractorConfig {
  pub fn new(kind: ExtractorKind, limits: Limits) -> Self {
    let (format, flatten_entries) = match kind {
      ExtractorKind::Audio => (Some(AUDIO_FORMAT_HINT.to_string()), false),
      ExtractorKind::Info | ExtractorKind::Search => (None, true),
    };

    Self {
      kind,
      quiet: true,
      no_warnings: true,
      skip_download: true,
      format,
      flatten_entries,
      allow_playlist: false,
      socket_timeout: limits.socket_timeout,
      max_retries: limits.max_retries,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendKind {
  #[default]
  Ytdlp,
  Piped,
}

impl FromStr for BackendKind {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.trim().to_lowercase().as_str() {
      "ytdlp" | "yt-dlp" => Ok(Self::Ytdlp),
      "piped" => Ok(Self::Piped),
      other => Err(format!("unknown extractor backend: {other}")),
    }
  }
}

/// Process settings, read from the environment once at startup.
#[derive(Debug, Clone)]
pub struct Settings {
  pub listen_addr: SocketAddr,
  pub backend: BackendKind,
  pub ytdlp_path: String,
  pub proxy: Option<String>,
  pub piped_instance: String,
  pub user_agent: String,
  pub limits: Limits,
}

impl Default for Settings {
  fn default() -> Self {
    Self {
      listen_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
      backend: BackendKind::default(),
      ytdlp_path: "yt-dlp".to_string(),
      proxy: None,
      piped_instance: PipedInstance::default().base_url().to_string(),
      user_agent: DEFAULT_USER_AGENT.to_string(),
      limits: Limits::default(),
    }
  }
}

impl Settings {
  pub fn from_env() -> Self {
    Self::from_lookup(|key| std::env::var(key).ok())
  }

  fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
    let defaults = Self::default();
    let parsed = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    let limits = Limits {
      socket_timeout: Duration::from_secs(parse_or(
        "YTDLP_SOCKET_TIMEOUT",
        parsed("YTDLP_SOCKET_TIMEOUT"),
        defaults.limits.socket_timeout.as_secs(),
      )),
      max_retries: parse_or(
        "YTDLP_RETRIES",
        parsed("YTDLP_RETRIES"),
        defaults.limits.max_retries,
      ),
    }
    .clamped();

    Self {
      listen_addr: parse_or(
        "LISTEN_ADDR",
        parsed("LISTEN_ADDR"),
        defaults.listen_addr,
      ),
      backend: parse_or(
        "EXTRACTOR_BACKEND",
        parsed("EXTRACTOR_BACKEND"),
        defaults.backend,
      ),
      ytdlp_path: parsed("YTDLP_PATH").unwrap_or(defaults.ytdlp_path),
      proxy: parsed("YTDLP_PROXY"),
      piped_instance: parsed("PIPED_INSTANCE")
        .unwrap_or(defaults.piped_instance),
      user_agent: parsed("USER_AGENT").unwrap_or(defaults.user_agent),
      limits,
    }
  }

  pub fn backend(&self) -> Arc<dyn Backend> {
    match self.backend {
      BackendKind::Ytdlp => Arc::new(Ytdlp::new(
        self.ytdlp_path.clone(),
        self.proxy.clone(),
        self.user_agent.clone(),
      )),
      BackendKind::Piped => Arc::new(Piped::new(
        PipedInstance::new(self.piped_instance.clone()),
        self.proxy.clone(),
        self.user_agent.clone(),
      )),
    }
  }
}

fn parse_or<T>(key: &str, value: Option<String>, default: T) -> T
where
  T: FromStr,
  T::Err: fmt::Display,
{
  let Some(value) = value else {
    return default;
  };

  match value.trim().parse() {
    Ok(parsed) => parsed,
    Err(e) => {
      warn!(key, value = %value, "ignoring invalid setting: {e}");
      default
    }
  }
}
