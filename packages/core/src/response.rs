//! The three ways a callee can answer a call, with and without data.

use serde::{Deserialize, Serialize};

/// The answer a continuation receives when the callee gets back to us.
///
/// `O` is the calling action's `Output`. Actions that produce no data use
/// [`Nothing`], which decodes from any response.
#[derive(Debug, Clone, PartialEq)]
pub enum Response<O> {
    /// The callee completed the call; `O` was decoded from the response URL.
    Success(O),
    /// The callee reported a failure.
    ///
    /// When the response URL carries no `errorCode` the code defaults to
    /// `-1`, and a missing `errorMessage` defaults to a fixed diagnostic.
    /// That fallback is deliberate: an error answer with no detail is still
    /// an error answer.
    Error { code: i64, message: String },
    /// The callee declined the call (usually: the user dismissed it).
    Cancel,
}

/// The continuation registered when a call is sent, invoked at most once.
pub type Callback<O> = Box<dyn FnOnce(Response<O>) + Send>;

/// The semantic discriminant of a response, without any payload.
///
/// On the wire this is both the value under the reserved response-kind
/// query key and the name of the return-address parameter
/// (`x-success` / `x-error` / `x-cancel`) a call embeds for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResponseKind {
    Success,
    Error,
    Cancel,
}

impl ResponseKind {
    /// Every kind, in the order the return addresses appear on a call URL.
    pub const ALL: [ResponseKind; 3] =
        [ResponseKind::Success, ResponseKind::Error, ResponseKind::Cancel];

    /// The name of the return-address query parameter for this kind.
    pub fn parameter_name(self) -> &'static str {
        match self {
            ResponseKind::Success => "x-success",
            ResponseKind::Error => "x-error",
            ResponseKind::Cancel => "x-cancel",
        }
    }
}

/// Formats the kind as its wire-format string (e.g. `"success"`).
impl std::fmt::Display for ResponseKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResponseKind::Success => write!(f, "success"),
            ResponseKind::Error => write!(f, "error"),
            ResponseKind::Cancel => write!(f, "cancel"),
        }
    }
}

/// Parses a [`ResponseKind`] from its wire-format string.
impl std::str::FromStr for ResponseKind {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "success" => Ok(ResponseKind::Success),
            "error" => Ok(ResponseKind::Error),
            "cancel" => Ok(ResponseKind::Cancel),
            _ => Err(format!(
                "unknown response kind {:?}; expected one of: success, error, cancel",
                s
            )),
        }
    }
}

/// The payload of an action that carries no data.
///
/// Use it as an action's `Input` when the call itself is the message, or as
/// its `Output` when the call can succeed but has nothing to say. `Nothing`
/// encodes to zero query items and decodes from any query mapping, so a
/// success response with no payload is just `Response::Success(Nothing)`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Nothing;

// --- tests -------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{from_query, to_query, QueryMap};

    #[test]
    fn kind_round_trips_through_wire_strings() {
        for kind in ResponseKind::ALL {
            assert_eq!(kind.to_string().parse::<ResponseKind>(), Ok(kind));
        }
        assert!("nope".parse::<ResponseKind>().is_err());
    }

    #[test]
    fn parameter_names() {
        assert_eq!(ResponseKind::Success.parameter_name(), "x-success");
        assert_eq!(ResponseKind::Error.parameter_name(), "x-error");
        assert_eq!(ResponseKind::Cancel.parameter_name(), "x-cancel");
    }

    #[test]
    fn nothing_encodes_to_no_items_and_decodes_from_anything() {
        assert!(to_query(&Nothing).unwrap().is_empty());

        let mut map = QueryMap::new();
        map.insert("stray".into(), "value".into());
        assert_eq!(from_query::<Nothing>(&map).unwrap(), Nothing);
    }
}
