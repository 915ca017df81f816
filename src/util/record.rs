use serde_json::Value;

use crate::W;

// Field access on raw extractor records. Fields may be absent, null, an
// integer or a float; every accessor has a total fallback.
impl<'a> W<&'a Value> {
  pub fn opt_string(&self, key: &str) -> Option<String> {
    match self.0.get(key)? {
      Value::String(s) => Some(s.clone()),
      Value::Number(n) => Some(n.to_string()),
      Value::Bool(b) => Some(b.to_string()),
      _ => None,
    }
  }

  pub fn string(&self, key: &str) -> String {
    self.opt_string(key).unwrap_or_default()
  }

  /// Integers are taken as is, floats truncated toward zero. Negative
  /// values clamp to zero.
  pub fn opt_int(&self, key: &str) -> Option<u64> {
    let value = self.0.get(key)?;
    value
      .as_u64()
      .or_else(|| value.as_f64().map(|f| f as u64))
  }

  pub fn int(&self, key: &str) -> u64 {
    self.opt_int(key).unwrap_or_default()
  }

  pub fn list(&self, key: &str) -> Option<&'a [Value]> {
    self.0.get(key)?.as_array().map(Vec::as_slice)
  }
}
