use std::fmt;

use serde_json::Value;

use crate::W;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QualityTier {
  Low,
  Medium,
  #[default]
  High,
}

impl QualityTier {
  /// Unrecognized names fall back to `High`.
  pub fn parse(s: &str) -> Self {
    match s.trim().to_lowercase().as_str() {
      "low" => Self::Low,
      "medium" => Self::Medium,
      _ => Self::High,
    }
  }
}

impl fmt::Display for QualityTier {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Low => write!(f, "low"),
      Self::Medium => write!(f, "medium"),
      Self::High => write!(f, "high"),
    }
  }
}

/// One encoding listed under a video's `formats`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CandidateFormat {
  pub audio_codec: Option<String>,
  pub video_codec: Option<String>,
  pub container: Option<String>,
  pub average_bitrate: Option<u64>,
  pub nominal_bitrate: Option<u64>,
  pub stream_url: Option<String>,
}

impl CandidateFormat {
  pub fn from_record(record: &Value) -> Option<Self> {
    if !record.is_object() {
      return None;
    }

    let r = W(record);
    Some(Self {
      audio_codec: r.opt_string("acodec"),
      video_codec: r.opt_string("vcodec"),
      container: r.opt_string("ext"),
      average_bitrate: r.opt_int("abr"),
      nominal_bitrate: r.opt_int("tbr"),
      stream_url: r.opt_string("url"),
    })
  }

  pub fn is_audio_only(&self) -> bool {
    has_codec(&self.audio_codec)
      && !has_codec(&self.video_codec)
      && self.stream_url.is_some()
  }

  pub fn bitrate_kbps(&self) -> u64 {
    self
      .average_bitrate
      .or(self.nominal_bitrate)
      .unwrap_or_default()
  }

  fn score(&self, tier: QualityTier) -> i64 {
    let bitrate = i64::try_from(self.bitrate_kbps()).unwrap_or(i64::MAX);
    let base = match tier {
      QualityTier::Low if bitrate <= 128 => 1000 - (128 - bitrate),
      QualityTier::Medium if (129..=192).contains(&bitrate) => {
        1000 - (160 - bitrate).abs()
      }
      QualityTier::Low | QualityTier::Medium => 0,
      QualityTier::High => bitrate,
    };

    let bonus = match self.container.as_deref().map(str::to_lowercase) {
      Some(ext) if ext == "m4a" => 100,
      Some(ext) if ext == "mp3" => 50,
      _ => 0,
    };

    base.saturating_add(bonus)
  }
}

// absent, empty and "none" all mean the stream lacks that track
fn has_codec(codec: &Option<String>) -> bool {
  codec
    .as_deref()
    .is_some_and(|c| !c.is_empty() && !c.eq_ignore_ascii_case("none"))
}

/// Reads the `formats` list of a raw record. `None` when the record has no
/// such list; entries that are not records are skipped.
pub fn candidate_formats(raw: &Value) -> Option<Vec<CandidateFormat>> {
  let formats = W(raw).list("formats")?;
  Some(
    formats
      .iter()
      .filter_map(CandidateFormat::from_record)
      .collect(),
  )
}

/// Picks the audio-only candidate with the strictly greatest score. Ties
/// keep the earlier candidate; nothing scoring above zero yields `None`.
pub fn select_best_audio_format(
  candidates: &[CandidateFormat],
  tier: QualityTier,
) -> Option<&CandidateFormat> {
  let mut best = None;
  let mut best_score = 0;

  for candidate in candidates.iter().filter(|c| c.is_audio_only()) {
    let score = candidate.score(tier);
    if score > best_score {
      best_score = score;
      best = Some(candidate);
    }
  }

  best
}
