use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{format::CandidateFormat, W};

const FALLBACK_BITRATE_KBPS: u64 = 128;

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AudioStreamResult {
  pub url: String,
  pub title: String,
  #[serde(rename = "duration")]
  pub duration_seconds: u64,
  #[serde(rename = "thumbnail")]
  pub thumbnail_url: String,
  pub uploader: String,
  #[serde(rename = "bitrate")]
  pub bitrate_kbps: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct VideoInfoResult {
  pub id: String,
  pub title: String,
  #[serde(rename = "duration")]
  pub duration_seconds: u64,
  #[serde(rename = "thumbnail")]
  pub thumbnail_url: String,
  pub uploader: String,
  pub view_count: u64,
  pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SearchResultEntry {
  pub id: String,
  pub title: String,
  #[serde(rename = "duration")]
  pub duration_seconds: u64,
  #[serde(rename = "thumbnail")]
  pub thumbnail_url: String,
  pub uploader: String,
  pub view_count: u64,
}

pub fn normalize_audio(
  raw: &Value,
  format: &CandidateFormat,
) -> AudioStreamResult {
  let r = W(raw);
  AudioStreamResult {
    url: format.stream_url.clone().unwrap_or_default(),
    title: r.string("title"),
    duration_seconds: r.int("duration"),
    thumbnail_url: r.string("thumbnail"),
    uploader: r.string("uploader"),
    bitrate_kbps: format
      .average_bitrate
      .or(format.nominal_bitrate)
      .unwrap_or(FALLBACK_BITRATE_KBPS),
  }
}

pub fn normalize_info(raw: &Value) -> VideoInfoResult {
  let r = W(raw);
  VideoInfoResult {
    id: r.string("id"),
    title: r.string("title"),
    duration_seconds: r.int("duration"),
    thumbnail_url: r.string("thumbnail"),
    uploader: r.string("uploader"),
    view_count: r.int("view_count"),
    description: r.string("description"),
  }
}

/// Flattens the `entries` of a search result. Missing entries mean no
/// results; placeholders that are not records are dropped.
pub fn normalize_search(raw: &Value) -> Vec<SearchResultEntry> {
  let Some(entries) = W(raw).list("entries") else {
    return Vec::new();
  };

  entries
    .iter()
    .filter(|entry| entry.is_object())
    .map(|entry| {
      let r = W(entry);
      SearchResultEntry {
        id: r.string("id"),
        title: r.string("title"),
        duration_seconds: r.int("duration"),
        thumbnail_url: r.string("thumbnail"),
        uploader: r.string("uploader"),
        view_count: r.int("view_count"),
      }
    })
    .collect()
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;

  fn m4a(abr: Option<u64>, tbr: Option<u64>) -> CandidateFormat {
    CandidateFormat {
      audio_codec: Some("mp4a.40.2".into()),
      video_codec: Some("none".into()),
      container: Some("m4a".into()),
      average_bitrate: abr,
      nominal_bitrate: tbr,
      stream_url: Some("https://audio".into()),
    }
  }

  #[test]
  fn test_audio_missing_fields() {
    let raw = json!({ "title": "Test Song", "duration": 180 });
    let result = normalize_audio(&raw, &m4a(Some(129), None));

    assert_eq!(
      result,
      AudioStreamResult {
        url: "https://audio".into(),
        title: "Test Song".into(),
        duration_seconds: 180,
        thumbnail_url: String::new(),
        uploader: String::new(),
        bitrate_kbps: 129,
      }
    );
  }

  #[test]
  fn test_audio_bitrate_fallbacks() {
    let raw = json!({});
    assert_eq!(normalize_audio(&raw, &m4a(None, Some(140))).bitrate_kbps, 140);
    assert_eq!(normalize_audio(&raw, &m4a(None, None)).bitrate_kbps, 128);
  }

  #[test]
  fn test_info_truncates_duration() {
    let raw = json!({
      "id": "abc",
      "title": "Test",
      "duration": 123.45,
      "view_count": 1000000.0,
    });
    let info = normalize_info(&raw);

    assert_eq!(info.id, "abc");
    assert_eq!(info.duration_seconds, 123);
    assert_eq!(info.view_count, 1_000_000);
    assert_eq!(info.thumbnail_url, "");
    assert_eq!(info.uploader, "");
    assert_eq!(info.description, "");
  }

  #[test]
  fn test_search_without_entries() {
    assert!(normalize_search(&json!({ "title": "lofi" })).is_empty());
    assert!(normalize_search(&json!({ "entries": null })).is_empty());
  }

  #[test]
  fn test_search_entries() {
    let raw = json!({
      "entries": [
        { "id": "a", "title": "First", "duration": 61.9, "view_count": 5 },
        null,
        { "id": "b", "uploader": "Someone", "thumbnail": "https://t" },
      ]
    });
    let entries = normalize_search(&raw);

    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].duration_seconds, 61);
    assert_eq!(entries[0].view_count, 5);
    assert_eq!(entries[1].title, "");
    assert_eq!(entries[1].uploader, "Someone");
    assert_eq!(entries[1].thumbnail_url, "https://t");
  }

  #[test]
  fn test_wire_names() {
    let value = serde_json::to_value(SearchResultEntry {
      id: "a".into(),
      ..Default::default()
    })
    .unwrap();

    assert_eq!(
      value,
      json!({
        "id": "a", "title": "", "duration": 0, "thumbnail": "",
        "uploader": "", "view_count": 0,
      })
    );
  }
}
