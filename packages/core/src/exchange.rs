//! The exchange: sending calls out, routing inbound URLs back.
//!
//! An [`Exchange`] owns everything one process needs to speak the
//! protocol: the local [`Receiver`] identity, the platform [`UrlOpener`],
//! and the table of pending continuations. Construct one at startup and
//! hand every inbound URL to [`Exchange::receive`]; there is no global
//! state.
//!
//! # A call's life
//!
//! ```text
//! send ──► call URL opened in the target app        (Unsent)
//!            with x-success / x-error / x-cancel
//!            return addresses, continuation stored  (AwaitingResponse)
//! ...target app does its work, then opens one of
//!    the return addresses back into this process...
//! receive ─► continuation removed and invoked once  (Resolved)
//! ```
//!
//! A call whose answer never arrives stays in the table until the process
//! ends. The transport has no delivery confirmation and no deadline, so
//! nothing can tell an abandoned call from a slow one; callers that need a
//! timeout must layer one on top.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::action::Action;
use crate::app::{App, EnvReceiver, Receiver};
use crate::query::{self, QueryError};
use crate::response::{Callback, Response, ResponseKind};
use crate::url::{slash_prefixed, CallbackUrl, ResponseUrl, UrlError, CLIENT_RESPONSE_PATH};

/// Message of the error outcome used when an error response carries no
/// message of its own. A deliberate default: an error answer with no
/// detail is still an error answer.
pub const NO_ERROR_MESSAGE: &str = "no error message received";

/// Message of the error outcome used when a success response arrives but
/// its output cannot be decoded as the action's `Output`.
pub const OUTPUT_NOT_DECODED: &str = "response output could not be decoded";

/// The platform call that hands a URL to whatever application owns its
/// scheme. Fire-and-forget: no delivery confirmation exists, and none is
/// modeled.
pub trait UrlOpener: Send + Sync {
    fn open(&self, url: &str);
}

impl<T: UrlOpener + ?Sized> UrlOpener for Arc<T> {
    fn open(&self, url: &str) {
        (**self).open(url)
    }
}

/// Errors surfaced by [`Exchange::receive`].
///
/// None of these are fatal. A corrupted URL or an unmatched response is
/// reported to the integrator and the process moves on.
#[derive(Debug, Error, PartialEq)]
pub enum ReceiveError {
    /// The inbound string is not a callback URL at all.
    #[error(transparent)]
    Corrupted(#[from] UrlError),

    /// A response arrived at the reserved path, but no pending call
    /// matches its id: it was already consumed, never existed, or belongs
    /// to a previous process instance.
    #[error(
        "url {url:?} claims to answer a call sent by this application, \
         but no pending call matches its id"
    )]
    NoRunningActionFound { url: String },

    /// An inbound call's path matches none of the receiver's actions.
    #[error(
        "no receivable action matches the path of url {url:?}; make sure \
         the action is registered on your receiver"
    )]
    NoActionFound { url: String },

    /// The matched action's input failed to decode.
    #[error("could not decode the input carried by url {url:?}")]
    Decode {
        url: String,
        #[source]
        source: QueryError,
    },
}

/// A registered continuation, owned by the table until its response
/// arrives. Being `FnOnce`, it structurally cannot run twice.
type PendingCallback = Box<dyn FnOnce(ResponseUrl) + Send>;

/// The per-process context for sending and receiving calls.
pub struct Exchange {
    receiver: Box<dyn Receiver + Send + Sync>,
    opener: Box<dyn UrlOpener>,
    pending: Mutex<HashMap<Uuid, PendingCallback>>,
}

impl Exchange {
    /// Build an exchange from an explicit receiver identity.
    pub fn new<R, O>(receiver: R, opener: O) -> Self
    where
        R: Receiver + Send + Sync + 'static,
        O: UrlOpener + 'static,
    {
        Self {
            receiver: Box::new(receiver),
            opener: Box::new(opener),
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// Build an exchange whose identity comes from the environment.
    ///
    /// If no scheme is configured the problem is reported once and the
    /// exchange degrades to send-only: calls go out, answers cannot come
    /// back.
    pub fn from_env<O: UrlOpener + 'static>(opener: O) -> Self {
        let receiver = EnvReceiver::from_env().unwrap_or_else(|e| {
            warn!("receiving disabled: {e}");
            EnvReceiver::degraded()
        });
        Self::new(receiver, opener)
    }

    /// How many sent calls are still waiting for an answer.
    pub fn pending_calls(&self) -> usize {
        self.pending.lock().unwrap().len()
    }

    /// Send a call and forget it: no return addresses, no registration.
    pub fn send<A: Action>(
        &self,
        app: &dyn App,
        action: &A,
        input: A::Input,
    ) -> Result<(), QueryError> {
        self.dispatch(app, action, input, None)
    }

    /// Send a call and register `callback` for its eventual answer.
    ///
    /// The continuation is stored *before* the URL is handed to the
    /// opener, so an answer that comes back synchronously still finds it.
    /// It is invoked at most once, and never if no answer ever arrives.
    pub fn send_with<A, F>(
        &self,
        app: &dyn App,
        action: &A,
        input: A::Input,
        callback: F,
    ) -> Result<(), QueryError>
    where
        A: Action,
        F: FnOnce(Response<A::Output>) + Send + 'static,
    {
        self.dispatch(app, action, input, Some(Box::new(callback)))
    }

    fn dispatch<A: Action>(
        &self,
        app: &dyn App,
        action: &A,
        input: A::Input,
        callback: Option<Callback<A::Output>>,
    ) -> Result<(), QueryError> {
        let mut url = CallbackUrl::new(app.scheme(), app.host(), &action.path());
        url.query.extend(query::to_query(&input)?);

        if let Some(callback) = callback {
            let local_scheme = self.receiver.scheme();
            if local_scheme.is_empty() {
                // Degraded identity: no return address can be built, so
                // the callback can never fire. Send the call anyway.
                warn!(
                    path = %url.path(),
                    "callback dropped: no receiver scheme configured, \
                     responses cannot be addressed back to this application"
                );
            } else {
                let id = url.id;
                for kind in ResponseKind::ALL {
                    let mut address =
                        CallbackUrl::new(local_scheme.clone(), self.receiver.host(), CLIENT_RESPONSE_PATH);
                    address.id = id;
                    url.query.push((
                        kind.parameter_name().into(),
                        ResponseUrl::new(address, kind).to_url_string(),
                    ));
                }

                self.pending
                    .lock()
                    .unwrap()
                    .insert(id, resolve_with::<A::Output>(callback));
                debug!(%id, path = %url.path(), "call awaiting response");
            }
        }

        self.opener.open(&url.to_url_string());
        Ok(())
    }

    /// Route one inbound URL. Call this from whatever platform entry point
    /// delivers "this application was opened with a URL".
    ///
    /// A URL at the reserved client-response path resolves a pending call;
    /// anything else is a call *to* this application and is dispatched to
    /// its registered actions.
    pub fn receive(&self, url: &str) -> Result<(), ReceiveError> {
        let call = CallbackUrl::parse(url)?;

        if call.path() == CLIENT_RESPONSE_PATH {
            let response = ResponseUrl::parse(url)?;
            let id = response.url.id;
            // Remove-then-invoke under one lock acquisition: two deliveries
            // of the same response cannot both find the continuation.
            let pending = self.pending.lock().unwrap().remove(&id);
            match pending {
                Some(continuation) => {
                    debug!(%id, kind = %response.kind, "response matched pending call");
                    continuation(response);
                    Ok(())
                }
                None => {
                    warn!(%id, "response does not match any pending call");
                    Err(ReceiveError::NoRunningActionFound { url: url.into() })
                }
            }
        } else {
            let action = self
                .receiver
                .actions()
                .iter()
                .find(|a| slash_prefixed(a.path()) == call.path())
                .ok_or_else(|| ReceiveError::NoActionFound { url: url.into() })?;

            action
                .receive(&call.query_map())
                .map_err(|source| ReceiveError::Decode {
                    url: url.into(),
                    source,
                })
        }
    }
}

impl std::fmt::Debug for Exchange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Exchange")
            .field("scheme", &self.receiver.scheme())
            .field("pending", &self.pending_calls())
            .finish()
    }
}

/// Wrap a typed callback as the table's type-erased continuation,
/// translating the response discriminant into an outcome.
fn resolve_with<O: DeserializeOwned + 'static>(callback: Callback<O>) -> PendingCallback {
    Box::new(move |response: ResponseUrl| {
        let outcome = match response.kind {
            ResponseKind::Success => match query::from_query::<O>(&response.url.query_map()) {
                Ok(output) => Response::Success(output),
                Err(e) => {
                    debug!(error = %e, "success response carried an undecodable output");
                    Response::Error {
                        code: -1,
                        message: OUTPUT_NOT_DECODED.into(),
                    }
                }
            },
            ResponseKind::Error => Response::Error {
                code: response.error_code.unwrap_or(-1),
                message: response
                    .error_message
                    .clone()
                    .unwrap_or_else(|| NO_ERROR_MESSAGE.into()),
            },
            ResponseKind::Cancel => Response::Cancel,
        };
        callback(outcome);
    })
}

// --- tests -------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::AnyAction;
    use crate::response::Nothing;
    use serde::{Deserialize, Serialize};
    use std::sync::Arc;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct EchoInput {
        name: String,
    }

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct EchoOutput {
        echoed: String,
    }

    struct Echo;

    impl Action for Echo {
        type Input = EchoInput;
        type Output = EchoOutput;
    }

    struct Quiet;

    impl Action for Quiet {
        type Input = Nothing;
        type Output = Nothing;
    }

    /// Records every opened URL.
    #[derive(Default)]
    struct RecordingOpener {
        urls: Mutex<Vec<String>>,
    }

    impl RecordingOpener {
        fn last(&self) -> String {
            self.urls.lock().unwrap().last().cloned().unwrap()
        }
    }

    impl UrlOpener for RecordingOpener {
        fn open(&self, url: &str) {
            self.urls.lock().unwrap().push(url.to_string());
        }
    }

    struct TestReceiver {
        actions: Vec<AnyAction>,
    }

    impl App for TestReceiver {
        fn scheme(&self) -> String {
            "caller".into()
        }
    }

    impl Receiver for TestReceiver {
        fn actions(&self) -> &[AnyAction] {
            &self.actions
        }
    }

    fn exchange_with(actions: Vec<AnyAction>) -> (Arc<RecordingOpener>, Exchange) {
        let opener = Arc::new(RecordingOpener::default());
        let exchange = Exchange::new(TestReceiver { actions }, Arc::clone(&opener));
        (opener, exchange)
    }

    /// Pull a return address out of the opened call URL.
    fn return_address(opened: &str, kind: ResponseKind) -> ResponseUrl {
        let call = CallbackUrl::parse(opened).unwrap();
        let address = call.param(kind.parameter_name()).unwrap();
        ResponseUrl::parse(address).unwrap()
    }

    #[test]
    fn send_and_forget_carries_input_and_nothing_else() {
        let (opener, exchange) = exchange_with(vec![]);
        exchange
            .send(&crate::app::RemoteApp::new("target"), &Echo, EchoInput { name: "x".into() })
            .unwrap();

        let opened = opener.last();
        assert!(opened.starts_with("target://x-callback-url/echo?"));
        let call = CallbackUrl::parse(&opened).unwrap();
        assert_eq!(call.param("name"), Some("x"));
        assert_eq!(call.param("x-success"), None);
        assert_eq!(exchange.pending_calls(), 0);
    }

    #[test]
    fn full_cycle_success_response_decodes_the_output() {
        let (opener, exchange) = exchange_with(vec![]);
        let observed: Arc<Mutex<Option<Response<EchoOutput>>>> = Arc::default();

        let sink = Arc::clone(&observed);
        exchange
            .send_with(
                &crate::app::RemoteApp::new("target"),
                &Echo,
                EchoInput { name: "x".into() },
                move |response| *sink.lock().unwrap() = Some(response),
            )
            .unwrap();
        assert_eq!(exchange.pending_calls(), 1);

        // The other application answers by opening the success return
        // address back at us, payload fields appended.
        let mut reply = return_address(&opener.last(), ResponseKind::Success);
        reply.url.query.push(("echoed".into(), "x".into()));
        exchange.receive(&reply.to_url_string()).unwrap();

        assert_eq!(
            observed.lock().unwrap().take(),
            Some(Response::Success(EchoOutput { echoed: "x".into() }))
        );
        assert_eq!(exchange.pending_calls(), 0);
    }

    #[test]
    fn each_continuation_fires_exactly_once() {
        let (opener, exchange) = exchange_with(vec![]);
        let fired = Arc::new(Mutex::new(0u32));

        let counter = Arc::clone(&fired);
        exchange
            .send_with(
                &crate::app::RemoteApp::new("target"),
                &Echo,
                EchoInput { name: "x".into() },
                move |_| *counter.lock().unwrap() += 1,
            )
            .unwrap();

        let mut reply = return_address(&opener.last(), ResponseKind::Success);
        reply.url.query.push(("echoed".into(), "x".into()));
        let wire = reply.to_url_string();

        exchange.receive(&wire).unwrap();
        let second = exchange.receive(&wire).unwrap_err();
        assert!(matches!(second, ReceiveError::NoRunningActionFound { .. }));
        assert_eq!(*fired.lock().unwrap(), 1);
    }

    #[test]
    fn unknown_response_id_resolves_nothing() {
        let (_opener, exchange) = exchange_with(vec![]);
        let stray = ResponseUrl::new(
            CallbackUrl::new("caller", "x-callback-url", CLIENT_RESPONSE_PATH),
            ResponseKind::Success,
        );
        let err = exchange.receive(&stray.to_url_string()).unwrap_err();
        assert!(matches!(err, ReceiveError::NoRunningActionFound { .. }));
    }

    #[test]
    fn error_response_defaults_are_documented_fallbacks() {
        let (opener, exchange) = exchange_with(vec![]);
        let observed: Arc<Mutex<Option<Response<EchoOutput>>>> = Arc::default();

        let sink = Arc::clone(&observed);
        exchange
            .send_with(
                &crate::app::RemoteApp::new("target"),
                &Echo,
                EchoInput { name: "x".into() },
                move |response| *sink.lock().unwrap() = Some(response),
            )
            .unwrap();

        // An error answer with no errorCode and no errorMessage at all.
        let reply = return_address(&opener.last(), ResponseKind::Error);
        exchange.receive(&reply.to_url_string()).unwrap();

        assert_eq!(
            observed.lock().unwrap().take(),
            Some(Response::Error {
                code: -1,
                message: NO_ERROR_MESSAGE.into(),
            })
        );
    }

    #[test]
    fn error_response_detail_is_passed_through() {
        let (opener, exchange) = exchange_with(vec![]);
        let observed: Arc<Mutex<Option<Response<EchoOutput>>>> = Arc::default();

        let sink = Arc::clone(&observed);
        exchange
            .send_with(
                &crate::app::RemoteApp::new("target"),
                &Echo,
                EchoInput { name: "x".into() },
                move |response| *sink.lock().unwrap() = Some(response),
            )
            .unwrap();

        let mut reply = return_address(&opener.last(), ResponseKind::Error);
        reply.error_code = Some(404);
        reply.error_message = Some("not found".into());
        exchange.receive(&reply.to_url_string()).unwrap();

        assert_eq!(
            observed.lock().unwrap().take(),
            Some(Response::Error {
                code: 404,
                message: "not found".into(),
            })
        );
    }

    #[test]
    fn cancel_response_is_a_cancel_outcome() {
        let (opener, exchange) = exchange_with(vec![]);
        let observed: Arc<Mutex<Option<Response<EchoOutput>>>> = Arc::default();

        let sink = Arc::clone(&observed);
        exchange
            .send_with(
                &crate::app::RemoteApp::new("target"),
                &Echo,
                EchoInput { name: "x".into() },
                move |response| *sink.lock().unwrap() = Some(response),
            )
            .unwrap();

        let reply = return_address(&opener.last(), ResponseKind::Cancel);
        exchange.receive(&reply.to_url_string()).unwrap();
        assert_eq!(observed.lock().unwrap().take(), Some(Response::Cancel));
    }

    #[test]
    fn undecodable_success_output_becomes_an_error_outcome() {
        let (opener, exchange) = exchange_with(vec![]);
        let observed: Arc<Mutex<Option<Response<EchoOutput>>>> = Arc::default();

        let sink = Arc::clone(&observed);
        exchange
            .send_with(
                &crate::app::RemoteApp::new("target"),
                &Echo,
                EchoInput { name: "x".into() },
                move |response| *sink.lock().unwrap() = Some(response),
            )
            .unwrap();

        // Success, but the `echoed` field never arrives.
        let reply = return_address(&opener.last(), ResponseKind::Success);
        exchange.receive(&reply.to_url_string()).unwrap();

        assert_eq!(
            observed.lock().unwrap().take(),
            Some(Response::Error {
                code: -1,
                message: OUTPUT_NOT_DECODED.into(),
            })
        );
    }

    #[test]
    fn nothing_output_succeeds_with_no_payload() {
        let (opener, exchange) = exchange_with(vec![]);
        let observed: Arc<Mutex<Option<Response<Nothing>>>> = Arc::default();

        let sink = Arc::clone(&observed);
        exchange
            .send_with(
                &crate::app::RemoteApp::new("target"),
                &Quiet,
                Nothing,
                move |response| *sink.lock().unwrap() = Some(response),
            )
            .unwrap();

        let reply = return_address(&opener.last(), ResponseKind::Success);
        exchange.receive(&reply.to_url_string()).unwrap();
        assert_eq!(observed.lock().unwrap().take(), Some(Response::Success(Nothing)));
    }

    #[test]
    fn inbound_call_dispatches_to_the_matching_action() {
        let seen: Arc<Mutex<Vec<String>>> = Arc::default();

        struct AddNote {
            seen: Arc<Mutex<Vec<String>>>,
        }

        #[derive(Serialize, Deserialize)]
        struct NoteInput {
            title: String,
        }

        impl Action for AddNote {
            type Input = NoteInput;
            type Output = Nothing;

            fn receive(&self, input: NoteInput) {
                self.seen.lock().unwrap().push(input.title);
            }
        }

        let (_opener, exchange) =
            exchange_with(vec![AddNote { seen: seen.clone() }.erased()]);

        exchange
            .receive("caller://x-callback-url/add-note?title=groceries")
            .unwrap();
        assert_eq!(*seen.lock().unwrap(), vec!["groceries".to_string()]);

        let missing = exchange
            .receive("caller://x-callback-url/no-such-action?title=x")
            .unwrap_err();
        assert!(matches!(missing, ReceiveError::NoActionFound { .. }));

        let undecodable = exchange
            .receive("caller://x-callback-url/add-note?unrelated=1")
            .unwrap_err();
        assert!(matches!(undecodable, ReceiveError::Decode { .. }));
    }

    #[test]
    fn corrupted_inbound_urls_are_reported() {
        let (_opener, exchange) = exchange_with(vec![]);
        let err = exchange.receive("not a url at all").unwrap_err();
        assert!(matches!(err, ReceiveError::Corrupted(_)));
    }

    #[test]
    fn degraded_identity_sends_but_drops_the_callback() {
        let opener = Arc::new(RecordingOpener::default());
        let exchange = Exchange::new(EnvReceiver::degraded(), Arc::clone(&opener));

        exchange
            .send_with(
                &crate::app::RemoteApp::new("target"),
                &Echo,
                EchoInput { name: "x".into() },
                |_: Response<EchoOutput>| panic!("must never fire"),
            )
            .unwrap();

        let call = CallbackUrl::parse(&opener.last()).unwrap();
        assert_eq!(call.param("x-success"), None);
        assert_eq!(exchange.pending_calls(), 0);
    }

    #[test]
    fn continuation_is_registered_before_the_opener_runs() {
        /// Observes the exchange's pending count from inside `open`.
        #[derive(Default)]
        struct ProbeOpener {
            exchange: Mutex<Option<Arc<Exchange>>>,
            observed: Mutex<Option<usize>>,
        }

        impl UrlOpener for ProbeOpener {
            fn open(&self, _url: &str) {
                if let Some(exchange) = &*self.exchange.lock().unwrap() {
                    *self.observed.lock().unwrap() = Some(exchange.pending_calls());
                }
            }
        }

        let probe = Arc::new(ProbeOpener::default());
        let exchange = Arc::new(Exchange::new(
            TestReceiver { actions: vec![] },
            Arc::clone(&probe),
        ));
        *probe.exchange.lock().unwrap() = Some(Arc::clone(&exchange));

        exchange
            .send_with(
                &crate::app::RemoteApp::new("target"),
                &Echo,
                EchoInput { name: "x".into() },
                |_: Response<EchoOutput>| {},
            )
            .unwrap();

        assert_eq!(*probe.observed.lock().unwrap(), Some(1));
    }
}
