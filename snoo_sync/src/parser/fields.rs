//! Typed reads from a payload object. Every reader treats a missing key, JSON `null` and a
//! value of the wrong type alike: as "not present", so the caller keeps what it had.

use crate::utils::from_epoch_seconds;
use chrono::{DateTime, Utc};
use regex::Regex;
use serde_json::{Map, Value};
use std::sync::OnceLock;

pub(crate) type Data = Map<String, Value>;

pub(crate) fn string(data: &Data, key: &str) -> Option<String> {
    data.get(key).and_then(Value::as_str).map(str::to_string)
}

/// A user-visible string with HTML entities decoded.
pub(crate) fn text(data: &Data, key: &str) -> Option<String> {
    data.get(key).and_then(Value::as_str).map(unescape_html)
}

/// Whole numbers only. Reddit sends some counts as floats (`12.0`); those are accepted,
/// while fractional or out-of-range values count as absent.
pub(crate) fn int(data: &Data, key: &str) -> Option<i64> {
    let Value::Number(number) = data.get(key)? else {
        return None;
    };
    if let Some(value) = number.as_i64() {
        return Some(value);
    }
    let value = number.as_f64()?;
    let in_range = value >= i64::MIN as f64 && value < i64::MAX as f64;
    (value.fract() == 0.0 && in_range).then_some(value as i64)
}

/// Reddit sends some flags as `0`/`1`, so numbers are accepted too.
pub(crate) fn flag(data: &Data, key: &str) -> Option<bool> {
    match data.get(key)? {
        Value::Bool(value) => Some(*value),
        Value::Number(number) => number.as_i64().map(|value| value != 0),
        _ => None,
    }
}

pub(crate) fn epoch(data: &Data, key: &str) -> Option<DateTime<Utc>> {
    data.get(key)
        .and_then(Value::as_f64)
        .and_then(from_epoch_seconds)
}

pub(crate) fn object<'v>(data: &'v Data, key: &str) -> Option<&'v Data> {
    data.get(key).and_then(Value::as_object)
}

pub(crate) fn array<'v>(data: &'v Data, key: &str) -> Option<&'v Vec<Value>> {
    data.get(key).and_then(Value::as_array)
}

/// Writes `incoming` only when the payload carried it.
pub(crate) fn merge<T>(target: &mut Option<T>, incoming: Option<T>) {
    if let Some(value) = incoming {
        *target = Some(value);
    }
}

pub(crate) fn merge_flag(target: &mut bool, incoming: Option<bool>) {
    if let Some(value) = incoming {
        *target = value;
    }
}

/// Compiles a fixed pattern on first use.
pub(crate) fn compiled(
    cell: &'static OnceLock<Option<Regex>>,
    pattern: &str,
) -> Option<&'static Regex> {
    cell.get_or_init(|| Regex::new(pattern).ok()).as_ref()
}

/// Reddit's JSON escapes `&`, `<` and `>` in user text and occasionally quotes. That fixed
/// set is decoded here; the text is never treated as HTML.
pub(crate) fn unescape_html(raw: &str) -> String {
    if !raw.contains('&') {
        return raw.to_string();
    }
    raw.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#x27;", "'")
        .replace("&amp;", "&")
}

/// The inverse of [`unescape_html`] for the characters reddit escapes.
pub(crate) fn escape_html(raw: &str) -> String {
    raw.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

static URL_HOST: OnceLock<Option<Regex>> = OnceLock::new();
static LINK_PATH: OnceLock<Option<Regex>> = OnceLock::new();

/// Host part of an absolute URL, lowercased.
pub(crate) fn url_host(url: &str) -> Option<String> {
    let pattern = compiled(
        &URL_HOST,
        r"^[A-Za-z][A-Za-z0-9+.-]*://(?:[^/?#@]*@)?(?P<host>[^/?#:@]+)",
    )?;
    let captures = pattern.captures(url)?;
    Some(captures.name("host")?.as_str().to_ascii_lowercase())
}

/// The path of a permalink or context link, without origin, query or fragment.
pub(crate) fn link_path(link: &str) -> &str {
    compiled(
        &LINK_PATH,
        r"^(?:[A-Za-z][A-Za-z0-9+.-]*://[^/?#]*)?(?P<path>[^?#]*)",
    )
    .and_then(|pattern| pattern.captures(link))
    .and_then(|captures| captures.name("path"))
    .map(|path| path.as_str())
    .unwrap_or(link)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn data(value: Value) -> Data {
        value.as_object().cloned().expect("object literal")
    }

    #[test]
    fn null_and_wrong_types_are_absent() {
        let payload = data(json!({"a": null, "b": "x", "c": 3, "d": true}));
        assert_eq!(string(&payload, "a"), None);
        assert_eq!(int(&payload, "b"), None);
        assert_eq!(int(&payload, "c"), Some(3));
        assert_eq!(flag(&payload, "d"), Some(true));
        assert_eq!(flag(&payload, "c"), Some(true));
        assert_eq!(flag(&payload, "missing"), None);
    }

    #[test]
    fn int_accepts_only_whole_numbers() {
        let payload = data(json!({"a": 12.0, "b": 2.5, "c": 1e300, "d": -4}));
        assert_eq!(int(&payload, "a"), Some(12));
        assert_eq!(int(&payload, "b"), None);
        assert_eq!(int(&payload, "c"), None);
        assert_eq!(int(&payload, "d"), Some(-4));
    }

    #[test]
    fn escaping_inverts_decoding() {
        let raw = "a &lt; b <c> & d";
        assert_eq!(escape_html(raw), "a &amp;lt; b &lt;c&gt; &amp; d");
        assert_eq!(unescape_html(&escape_html(raw)), raw);
    }

    #[test]
    fn merge_keeps_existing_value() {
        let mut target = Some("old".to_string());
        merge(&mut target, None);
        assert_eq!(target.as_deref(), Some("old"));
        merge(&mut target, Some("new".to_string()));
        assert_eq!(target.as_deref(), Some("new"));
    }

    #[test]
    fn html_entities_decode_once() {
        assert_eq!(unescape_html("a &amp;lt; b &gt; c"), "a &lt; b > c");
        assert_eq!(unescape_html("it&#39;s"), "it's");
    }

    #[test]
    fn url_parts() {
        assert_eq!(
            url_host("https://i.redd.it/abc.jpg").as_deref(),
            Some("i.redd.it")
        );
        assert_eq!(url_host("/r/rust"), None);
        assert_eq!(
            url_host("https://user@I.Imgur.com:443/x.png").as_deref(),
            Some("i.imgur.com")
        );
        assert_eq!(link_path("https://www.reddit.com?x=1"), "");
        assert_eq!(
            link_path("/r/rust/comments/abc/title/def/?context=3"),
            "/r/rust/comments/abc/title/def/"
        );
        assert_eq!(
            link_path("https://www.reddit.com/r/rust/comments/abc/"),
            "/r/rust/comments/abc/"
        );
    }
}
