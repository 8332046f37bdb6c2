//! Typed application-to-application calls over `x-callback-url`.
//!
//! Two independently installed applications exchange typed requests and
//! typed responses using nothing but the operating system's "open this
//! URL" primitive. One side encodes a typed call into
//! `scheme://host/path?key=value` items and asks the platform to open it;
//! the other decodes it, runs a handler, and answers by opening a URL
//! back into the caller carrying a success payload, an error, or a
//! cancellation.
//!
//! # Crate layout
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`query`] | Flat query-string codec: typed values to `key=value` maps and back |
//! | [`url`] | [`CallbackUrl`] and [`ResponseUrl`] wire values, parse and serialize |
//! | [`response`] | [`Response`] outcomes, [`ResponseKind`], the [`Nothing`] payload |
//! | [`action`] | The [`Action`] trait and its type-erased [`AnyAction`] form |
//! | [`app`] | [`App`] / [`Receiver`] identities, environment configuration |
//! | [`exchange`] | The [`Exchange`]: correlation table, send, and receive |
//!
//! # Quick start
//!
//! ```rust,ignore
//! use callbridge::{Action, Exchange, Nothing, RemoteApp, Response};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Serialize, Deserialize)]
//! struct NoteInput { title: String }
//!
//! #[derive(Serialize, Deserialize)]
//! struct NoteOutput { id: String }
//!
//! struct AddNote;
//!
//! impl Action for AddNote {
//!     type Input = NoteInput;
//!     type Output = NoteOutput;
//! }
//!
//! // Identity from CALLBRIDGE_SCHEME; opener is your platform hook.
//! let exchange = Exchange::from_env(opener);
//!
//! exchange.send_with(
//!     &RemoteApp::new("notes"),
//!     &AddNote,
//!     NoteInput { title: "groceries".into() },
//!     |response| match response {
//!         Response::Success(output) => println!("created {}", output.id),
//!         Response::Error { code, message } => eprintln!("{code}: {message}"),
//!         Response::Cancel => {}
//!     },
//! )?;
//!
//! // And from your "opened with URL" platform entry point:
//! exchange.receive(&incoming_url)?;
//! ```
//!
//! # What the transport does not give you
//!
//! URL hand-off is fire-and-forget: no delivery confirmation, no retries,
//! no ordering across in-flight calls, and no timeout. A call whose answer
//! never arrives simply stays pending.

mod case;

pub mod action;
pub mod app;
pub mod exchange;
pub mod query;
pub mod response;
pub mod url;

pub use action::{Action, AnyAction};
pub use app::{App, EnvReceiver, IdentityError, Receiver, RemoteApp};
pub use exchange::{Exchange, ReceiveError, UrlOpener};
pub use query::{from_query, to_query, QueryError, QueryMap};
pub use response::{Callback, Nothing, Response, ResponseKind};
pub use url::{CallbackUrl, ResponseUrl, UrlError, CLIENT_RESPONSE_PATH, RESERVED_PREFIX};
