use std::{borrow::Cow, sync::LazyLock};

use regex::Regex;

mod record;

#[derive(Default)]
pub struct W<T>(pub T);

// used to remove cred info from proxy url before printing
static PROXY_AUTH_REGEX: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"//[^:/@]+(:[^@]+)?@").unwrap());

pub fn redact_proxy(proxy: &str) -> Cow<'_, str> {
  PROXY_AUTH_REGEX.replace(proxy, "//<REDACTED>@")
}
