const DEFAULT_PIPED_INSTANCE: &str = "pipedapi.kavin.rocks";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PipedInstance {
  base_url: String,
}

impl PipedInstance {
  /// Accepts either a bare domain or a full base url.
  pub fn new(instance: String) -> Self {
    let instance = instance.trim().trim_end_matches('/');
    let base_url = if instance.contains("://") {
      instance.to_string()
    } else {
      format!("https://{instance}")
    };

    Self { base_url }
  }

  pub fn base_url(&self) -> &str {
    &self.base_url
  }

  pub fn stream_url(&self, video_id: &str) -> String {
    format!("{}/streams/{}", self.base_url, video_id)
  }

  pub fn search_url(&self) -> String {
    format!("{}/search", self.base_url)
  }
}

impl Default for PipedInstance {
  fn default() -> Self {
    Self::new(DEFAULT_PIPED_INSTANCE.to_string())
  }
}
