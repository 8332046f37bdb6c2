//! The flat query-string codec.
//!
//! Maps any serde-derivable value tree — records, optionals, primitives,
//! dates, and sequences — onto a single flat mapping of string keys to
//! string values, the only shape a URL query section can carry, and back.
//!
//! # Wire rules
//!
//! - Field names are converted to `snake_case` before lookup or emission.
//! - Booleans travel as `"yes"` / `"no"` (case-insensitive on decode);
//!   any other value is a type mismatch.
//! - Dates travel as ISO 8601 timestamps.
//! - Sequences are joined with `,` into one value; decoding splits on `,`
//!   and decodes each element in order. A comma inside an element is
//!   indistinguishable from a separator — the format has no escaping, and
//!   this codec deliberately does not add any.
//! - `None` omits the key entirely; a missing key decodes an optional
//!   field to `None` and a required field to [`QueryError::KeyNotFound`].
//!
//! # The flat namespace
//!
//! There is exactly one mapping, shared by every nesting level. A nested
//! record's fields are emitted and looked up under their *own* names; the
//! enclosing field name never appears on the wire. Two same-named fields at
//! different nesting levels therefore collide and cannot be told apart.
//! This is a property of the wire format, not a bug in the codec.
//!
//! # Example
//!
//! ```rust,ignore
//! use callbridge::query::{from_query, to_query};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Serialize, Deserialize)]
//! struct AddNote {
//!     title: String,
//!     pinned: bool,
//!     tags: Vec<String>,
//! }
//!
//! let map = to_query(&AddNote {
//!     title: "groceries".into(),
//!     pinned: true,
//!     tags: vec!["home".into(), "errands".into()],
//! })?;
//! assert_eq!(map["pinned"], "yes");
//! assert_eq!(map["tags"], "home,errands");
//!
//! let back: AddNote = from_query(&map)?;
//! ```

mod de;
mod ser;

use std::collections::BTreeMap;
use std::fmt::Display;

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

/// The flat key/value mapping a record encodes into.
///
/// A `BTreeMap` keeps iteration order deterministic, so the same value
/// always produces the same query-item order on the wire.
pub type QueryMap = BTreeMap<String, String>;

/// Encode a record into a flat query mapping.
///
/// Only records (structs with named fields) can be encoded at the top
/// level — the query section of a URL has no way to carry a bare scalar
/// or sequence. [`Nothing`](crate::Nothing) encodes to an empty mapping.
pub fn to_query<T: Serialize>(value: &T) -> Result<QueryMap, QueryError> {
    let mut map = QueryMap::new();
    value.serialize(ser::MapSerializer { map: &mut map })?;
    Ok(map)
}

/// Decode a record from a flat query mapping.
///
/// Keys not named by any field of `T` are ignored, which is what lets a
/// response URL carry reserved bookkeeping items alongside the payload.
pub fn from_query<T: DeserializeOwned>(map: &QueryMap) -> Result<T, QueryError> {
    T::deserialize(de::MapDeserializer {
        map,
        path: Vec::new(),
    })
}

/// Errors produced while encoding to or decoding from a query mapping.
///
/// All of these are non-fatal: they are returned to whoever asked for the
/// specific encode or decode and must never take the process down.
#[derive(Debug, Error, PartialEq)]
pub enum QueryError {
    /// A required field's key is absent from the mapping.
    ///
    /// `path` is the dotted chain of field names from the top-level record
    /// down to the missing field (for a top-level field it is just the
    /// field name itself).
    #[error("no value found for key {field:?} (at {path})")]
    KeyNotFound { field: String, path: String },

    /// A value is present but cannot be parsed as the target primitive.
    #[error("could not convert {value:?} into {expected} for key {field:?}")]
    TypeMismatch {
        field: String,
        value: String,
        expected: &'static str,
    },

    /// The value shape has no representation in a flat query string.
    #[error("{0} cannot be represented in a query string")]
    Unsupported(&'static str),

    /// A failure reported by a type's own serde implementation
    /// (for example a date string chrono refuses to parse).
    #[error("{0}")]
    Message(String),
}

impl serde::ser::Error for QueryError {
    fn custom<T: Display>(msg: T) -> Self {
        QueryError::Message(msg.to_string())
    }
}

impl serde::de::Error for QueryError {
    fn custom<T: Display>(msg: T) -> Self {
        QueryError::Message(msg.to_string())
    }
}

/// Split a comma-joined sequence value into its elements.
///
/// An empty value is an empty sequence, not a sequence of one empty string.
pub(crate) fn split_elements(raw: &str) -> Vec<&str> {
    if raw.is_empty() {
        Vec::new()
    } else {
        raw.split(',').collect()
    }
}

/// Parse the `"yes"` / `"no"` boolean wire form, case-insensitively.
pub(crate) fn parse_yes_no(raw: &str) -> Option<bool> {
    if raw.eq_ignore_ascii_case("yes") {
        Some(true)
    } else if raw.eq_ignore_ascii_case("no") {
        Some(false)
    } else {
        None
    }
}

// --- tests -------------------------------------------------------------------
