//! Callback URLs: the wire format of a call and of its answer.
//!
//! A [`CallbackUrl`] is the value object behind
//! `scheme://host/path?k1=v1&k2=v2`. A [`ResponseUrl`] wraps one and adds
//! the response metadata an answer carries: the
//! [`ResponseKind`] discriminant and, for errors, an optional code and
//! message.
//!
//! # The reserved namespace
//!
//! Bookkeeping fields travel in the same query section as user fields.
//! To keep them apart, bookkeeping keys carry the `__callbridge_` prefix —
//! a name no caller would pick for a payload field. User items that try to
//! use the prefix anyway are dropped on serialization; the reserved
//! namespace can never be shadowed.

use std::borrow::Cow;

use thiserror::Error;
use uuid::Uuid;

use crate::query::QueryMap;
use crate::response::ResponseKind;

/// Prefix of every reserved query key.
pub const RESERVED_PREFIX: &str = "__callbridge_";

/// Reserved key carrying the response discriminant on an answer URL.
pub(crate) const RESPONSE_KIND_KEY: &str = "__callbridge_response_kind";

/// Reserved key carrying the call id on every URL this library builds.
pub(crate) const RESPONSE_ID_KEY: &str = "__callbridge_response_id";

/// The path every return address points at. An inbound URL with this path
/// is an answer to a call we sent; anything else is a call to us.
pub const CLIENT_RESPONSE_PATH: &str = "/__callbridge-client-response";

/// Wire names of the error detail fields on an error response.
/// These come from the x-callback-url draft and are not prefix-reserved.
pub(crate) const ERROR_CODE_KEY: &str = "errorCode";
pub(crate) const ERROR_MESSAGE_KEY: &str = "errorMessage";

/// Errors raised while parsing a URL string.
#[derive(Debug, Error, PartialEq)]
pub enum UrlError {
    /// The string cannot be interpreted as a callback URL. The reason
    /// names the first missing or malformed piece.
    #[error("url {url:?} could not be interpreted as a callback url: {reason}")]
    Corrupted { url: String, reason: String },
}

fn corrupted(url: &str, reason: impl Into<String>) -> UrlError {
    UrlError::Corrupted {
        url: url.into(),
        reason: reason.into(),
    }
}

/// A parsed or to-be-built callback URL.
///
/// `id` identifies one logical call for its whole lifecycle: it is minted
/// when the caller builds the URL, rides along in the reserved id field,
/// and comes back on every response variant so the answer can be paired
/// with the pending continuation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackUrl {
    pub scheme: String,
    pub host: String,
    path: String,
    /// User-level query items, in emission order. Reserved bookkeeping
    /// items are appended at serialization time and stripped at parse
    /// time; they never live here.
    pub query: Vec<(String, String)>,
    pub id: Uuid,
}

impl CallbackUrl {
    /// Build a URL with a fresh call id and no query items.
    /// The path is slash-prefixed if it is not already.
    pub fn new(scheme: impl Into<String>, host: impl Into<String>, path: &str) -> Self {
        Self {
            scheme: scheme.into(),
            host: host.into(),
            path: slash_prefixed(path),
            query: Vec::new(),
            id: Uuid::new_v4(),
        }
    }

    /// The slash-prefixed path.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Replace the path, keeping the slash-prefix invariant.
    pub fn set_path(&mut self, path: &str) {
        self.path = slash_prefixed(path);
    }

    /// Parse a URL string.
    ///
    /// Requires a scheme, a host, and a query section. A reserved id item
    /// is captured into `id` when present and valid; otherwise a fresh id
    /// is minted. Reserved items are stripped from `query`.
    pub fn parse(url: &str) -> Result<Self, UrlError> {
        let (scheme, host, path, mut items) = parse_components(url)?;
        let id = remove_first(&mut items, RESPONSE_ID_KEY)
            .and_then(|raw| Uuid::parse_str(&raw).ok())
            .unwrap_or_else(Uuid::new_v4);
        items.retain(|(name, _)| !name.starts_with(RESERVED_PREFIX));

        Ok(Self {
            scheme,
            host,
            path,
            query: items,
            id,
        })
    }

    /// The first value for `name` among user items.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .filter(|(k, _)| !k.starts_with(RESERVED_PREFIX))
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// The user items as a flat mapping, ready for the query codec.
    /// The first value wins for a repeated name.
    pub fn query_map(&self) -> QueryMap {
        let mut map = QueryMap::new();
        for (name, value) in &self.query {
            if name.starts_with(RESERVED_PREFIX) {
                continue;
            }
            map.entry(name.clone()).or_insert_with(|| value.clone());
        }
        map
    }

    /// Serialize to the wire form, appending the reserved id item after
    /// the user items.
    pub fn to_url_string(&self) -> String {
        let mut items = user_items(&self.query);
        items.push(format!(
            "{}={}",
            RESPONSE_ID_KEY,
            urlencoding::encode(&self.id.to_string())
        ));
        assemble(&self.scheme, &self.host, &self.path, &items)
    }
}

/// A callback URL that carries response metadata: the answer to a call.
///
/// Composition rather than a subclass: the only difference from a plain
/// [`CallbackUrl`] is the discriminant and the optional error detail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseUrl {
    pub url: CallbackUrl,
    pub kind: ResponseKind,
    pub error_code: Option<i64>,
    pub error_message: Option<String>,
}

impl ResponseUrl {
    /// Wrap a URL as a response of the given kind, with no error detail.
    pub fn new(url: CallbackUrl, kind: ResponseKind) -> Self {
        Self {
            url,
            kind,
            error_code: None,
            error_message: None,
        }
    }

    /// Parse a URL string as a response.
    ///
    /// On top of the plain parse this requires a recognized discriminant
    /// and a well-formed id under the reserved keys; the error detail
    /// fields are captured when present. A non-error response normalizes
    /// the error fields to absent even if the sender put them there.
    pub fn parse(raw: &str) -> Result<Self, UrlError> {
        let (scheme, host, path, mut items) = parse_components(raw)?;

        let kind: ResponseKind = remove_first(&mut items, RESPONSE_KIND_KEY)
            .and_then(|v| v.parse().ok())
            .ok_or_else(|| corrupted(raw, "missing response kind"))?;
        let id = remove_first(&mut items, RESPONSE_ID_KEY)
            .and_then(|v| Uuid::parse_str(&v).ok())
            .ok_or_else(|| corrupted(raw, "missing or invalid response id"))?;

        let mut error_code = remove_first(&mut items, ERROR_CODE_KEY).and_then(|v| v.parse().ok());
        let mut error_message = remove_first(&mut items, ERROR_MESSAGE_KEY);
        if kind != ResponseKind::Error {
            error_code = None;
            error_message = None;
        }

        items.retain(|(name, _)| !name.starts_with(RESERVED_PREFIX));

        Ok(Self {
            url: CallbackUrl {
                scheme,
                host,
                path,
                query: items,
                id,
            },
            kind,
            error_code,
            error_message,
        })
    }

    /// Serialize to the wire form: user items first, then the reserved
    /// discriminant and id, then any non-empty error detail.
    pub fn to_url_string(&self) -> String {
        let mut items: Vec<String> = self
            .url
            .query
            .iter()
            .filter(|(name, _)| {
                // Error detail is part of the response contract; user items
                // may not occupy those names either.
                !name.starts_with(RESERVED_PREFIX)
                    && name != ERROR_CODE_KEY
                    && name != ERROR_MESSAGE_KEY
            })
            .map(|(name, value)| encode_item(name, value))
            .collect();

        items.push(format!("{}={}", RESPONSE_KIND_KEY, self.kind));
        items.push(format!(
            "{}={}",
            RESPONSE_ID_KEY,
            urlencoding::encode(&self.url.id.to_string())
        ));
        if let Some(code) = self.error_code {
            items.push(format!("{}={}", ERROR_CODE_KEY, code));
        }
        if let Some(message) = &self.error_message {
            if !message.is_empty() {
                items.push(encode_item(ERROR_MESSAGE_KEY, message));
            }
        }

        assemble(&self.url.scheme, &self.url.host, self.url.path(), &items)
    }
}

/// Prefix `path` with `/` if it is not already.
pub(crate) fn slash_prefixed(path: &str) -> String {
    if path.starts_with('/') {
        path.into()
    } else {
        format!("/{path}")
    }
}

// --- wire-level helpers ------------------------------------------------------

fn encode_item(name: &str, value: &str) -> String {
    format!("{}={}", urlencoding::encode(name), urlencoding::encode(value))
}

fn assemble(scheme: &str, host: &str, path: &str, items: &[String]) -> String {
    format!("{}://{}{}?{}", scheme, host, path, items.join("&"))
}

fn user_items(query: &[(String, String)]) -> Vec<String> {
    query
        .iter()
        .filter(|(name, _)| !name.starts_with(RESERVED_PREFIX))
        .map(|(name, value)| encode_item(name, value))
        .collect()
}

/// Split `scheme://host/path?query` into its pieces, percent-decoding the
/// query items. Every failure mode is a [`UrlError::Corrupted`].
fn parse_components(url: &str) -> Result<(String, String, String, Vec<(String, String)>), UrlError> {
    let (scheme, rest) = url
        .split_once("://")
        .ok_or_else(|| corrupted(url, "missing scheme"))?;
    if scheme.is_empty() {
        return Err(corrupted(url, "missing scheme"));
    }

    let (location, raw_query) = rest
        .split_once('?')
        .ok_or_else(|| corrupted(url, "missing query section"))?;

    let (host, path) = match location.find('/') {
        Some(i) => (&location[..i], &location[i..]),
        None => (location, "/"),
    };
    if host.is_empty() {
        return Err(corrupted(url, "missing host"));
    }

    let mut items = Vec::new();
    for pair in raw_query.split('&').filter(|p| !p.is_empty()) {
        let (name, value) = pair.split_once('=').unwrap_or((pair, ""));
        items.push((decode_part(url, name)?, decode_part(url, value)?));
    }

    Ok((scheme.into(), host.into(), path.into(), items))
}

fn decode_part(url: &str, part: &str) -> Result<String, UrlError> {
    urlencoding::decode(part)
        .map(Cow::into_owned)
        .map_err(|_| corrupted(url, "invalid percent-encoding in query"))
}

/// Remove and return the first value stored under `name`.
fn remove_first(items: &mut Vec<(String, String)>, name: &str) -> Option<String> {
    let index = items.iter().position(|(k, _)| k == name)?;
    Some(items.remove(index).1)
}

// --- tests -------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_are_always_slash_prefixed() {
        let url = CallbackUrl::new("notes", "x-callback-url", "add-note");
        assert_eq!(url.path(), "/add-note");

        let mut url = CallbackUrl::new("notes", "x-callback-url", "/add-note");
        assert_eq!(url.path(), "/add-note");
        url.set_path("open-note");
        assert_eq!(url.path(), "/open-note");
    }

    #[test]
    fn round_trip_preserves_components_and_id() {
        let mut url = CallbackUrl::new("notes", "x-callback-url", "/add-note");
        url.query.push(("title".into(), "a b&c".into()));
        url.query.push(("tags".into(), "x,y".into()));

        let parsed = CallbackUrl::parse(&url.to_url_string()).unwrap();
        assert_eq!(parsed.scheme, "notes");
        assert_eq!(parsed.host, "x-callback-url");
        assert_eq!(parsed.path(), "/add-note");
        assert_eq!(parsed.id, url.id);
        assert_eq!(parsed.param("title"), Some("a b&c"));
        assert_eq!(parsed.param("tags"), Some("x,y"));
    }

    #[test]
    fn parse_failures_name_the_missing_piece() {
        let missing_scheme = CallbackUrl::parse("://host/path?a=1").unwrap_err();
        assert!(matches!(missing_scheme, UrlError::Corrupted { reason, .. }
            if reason == "missing scheme"));

        let not_a_url = CallbackUrl::parse("just some words").unwrap_err();
        assert!(matches!(not_a_url, UrlError::Corrupted { reason, .. }
            if reason == "missing scheme"));

        let missing_host = CallbackUrl::parse("notes:///path?a=1").unwrap_err();
        assert!(matches!(missing_host, UrlError::Corrupted { reason, .. }
            if reason == "missing host"));

        let missing_query = CallbackUrl::parse("notes://host/path").unwrap_err();
        assert!(matches!(missing_query, UrlError::Corrupted { reason, .. }
            if reason == "missing query section"));
    }

    #[test]
    fn response_parse_requires_kind_and_id() {
        let id = Uuid::new_v4();

        let no_kind = format!("app://host/p?{}={}", RESPONSE_ID_KEY, id);
        assert!(matches!(
            ResponseUrl::parse(&no_kind).unwrap_err(),
            UrlError::Corrupted { reason, .. } if reason == "missing response kind"
        ));

        let no_id = format!("app://host/p?{}=success", RESPONSE_KIND_KEY);
        assert!(matches!(
            ResponseUrl::parse(&no_id).unwrap_err(),
            UrlError::Corrupted { reason, .. } if reason == "missing or invalid response id"
        ));

        let bad_id = format!(
            "app://host/p?{}=success&{}=not-a-uuid",
            RESPONSE_KIND_KEY, RESPONSE_ID_KEY
        );
        assert!(ResponseUrl::parse(&bad_id).is_err());
    }

    #[test]
    fn response_round_trip_with_error_detail() {
        let mut response = ResponseUrl::new(
            CallbackUrl::new("caller", "x-callback-url", CLIENT_RESPONSE_PATH),
            ResponseKind::Error,
        );
        response.error_code = Some(404);
        response.error_message = Some("note not found".into());

        let parsed = ResponseUrl::parse(&response.to_url_string()).unwrap();
        assert_eq!(parsed.kind, ResponseKind::Error);
        assert_eq!(parsed.url.id, response.url.id);
        assert_eq!(parsed.error_code, Some(404));
        assert_eq!(parsed.error_message.as_deref(), Some("note not found"));
    }

    #[test]
    fn non_error_responses_normalize_error_fields_to_absent() {
        let id = Uuid::new_v4();
        let raw = format!(
            "app://host/p?{}=success&{}={}&errorCode=7&errorMessage=stale",
            RESPONSE_KIND_KEY, RESPONSE_ID_KEY, id
        );
        let parsed = ResponseUrl::parse(&raw).unwrap();
        assert_eq!(parsed.kind, ResponseKind::Success);
        assert_eq!(parsed.error_code, None);
        assert_eq!(parsed.error_message, None);
    }

    #[test]
    fn empty_error_message_is_not_serialized() {
        let mut response = ResponseUrl::new(
            CallbackUrl::new("caller", "x-callback-url", CLIENT_RESPONSE_PATH),
            ResponseKind::Error,
        );
        response.error_message = Some(String::new());
        assert!(!response.to_url_string().contains(ERROR_MESSAGE_KEY));
    }

    #[test]
    fn user_items_cannot_shadow_the_reserved_namespace() {
        let mut url = CallbackUrl::new("notes", "x-callback-url", "/add-note");
        url.query
            .push((RESPONSE_ID_KEY.into(), "deadbeef".into()));
        url.query.push(("title".into(), "real".into()));

        let wire = url.to_url_string();
        // The only reserved id on the wire is the real one.
        assert_eq!(wire.matches(RESPONSE_ID_KEY).count(), 1);
        assert!(wire.contains(&url.id.to_string()));

        let parsed = CallbackUrl::parse(&wire).unwrap();
        assert_eq!(parsed.id, url.id);
        assert_eq!(parsed.param(RESPONSE_ID_KEY), None);
    }

    #[test]
    fn param_returns_first_user_value_only() {
        let mut url = CallbackUrl::new("notes", "x-callback-url", "/p");
        url.query.push(("k".into(), "first".into()));
        url.query.push(("k".into(), "second".into()));
        assert_eq!(url.param("k"), Some("first"));
        assert_eq!(url.param("missing"), None);
        assert_eq!(url.query_map().get("k").map(String::as_str), Some("first"));
    }
}
