//! Actions: the typed operations one application exposes to another.
//!
//! An [`Action`] pairs an `Input` it is called with and an `Output` it may
//! answer with. The sending side encodes `Input` into the call URL; the
//! receiving side decodes it and runs [`Action::receive`]. For
//! heterogeneous "what can this app receive" lists, an action is erased to
//! an [`AnyAction`]: just a path and a decode-and-invoke closure.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::case::{kebab_case, short_type_name};
use crate::query::{self, QueryError, QueryMap};

/// One operation this or another application can be called with.
///
/// ```rust,ignore
/// use callbridge::{Action, Nothing};
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Serialize, Deserialize)]
/// struct Input {
///     title: String,
/// }
///
/// struct AddNote;
///
/// impl Action for AddNote {
///     type Input = Input;
///     type Output = Nothing;
///
///     fn receive(&self, input: Input) {
///         println!("adding note {}", input.title);
///     }
/// }
///
/// // The default path is the kebab-cased type name:
/// assert_eq!(AddNote.path(), "add-note");
/// ```
pub trait Action {
    /// What the action is called with. Use [`Nothing`](crate::Nothing)
    /// when the call itself is the whole message.
    type Input: Serialize + DeserializeOwned + 'static;
    /// What a success response carries back. Use
    /// [`Nothing`](crate::Nothing) when a success has no payload.
    type Output: Serialize + DeserializeOwned + 'static;

    /// The path this action is reachable under.
    ///
    /// Defaults to the kebab-cased type name, so `AddNote` lives at
    /// `add-note`.
    fn path(&self) -> String {
        kebab_case(short_type_name::<Self>())
    }

    /// Called when an inbound call for this action arrives with a decoded
    /// `Input`. The default does nothing, which suits actions that are
    /// only ever sent.
    fn receive(&self, input: Self::Input) {
        let _ = input;
    }

    /// Erase this action for storage in a receiver's action list.
    fn erased(self) -> AnyAction
    where
        Self: Sized + Send + Sync + 'static,
    {
        AnyAction::new(self)
    }
}

/// A type-erased [`Action`]: the fixed capability surface a registry needs.
pub struct AnyAction {
    path: String,
    receive: Box<dyn Fn(&QueryMap) -> Result<(), QueryError> + Send + Sync>,
}

impl AnyAction {
    /// Capture the action's path and a closure that decodes its `Input`
    /// from a query mapping and invokes its handler.
    pub fn new<A>(action: A) -> Self
    where
        A: Action + Send + Sync + 'static,
    {
        Self {
            path: action.path(),
            receive: Box::new(move |map| {
                action.receive(query::from_query::<A::Input>(map)?);
                Ok(())
            }),
        }
    }

    /// The path this action is reachable under.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Decode the action's input from `map` and run its handler.
    pub fn receive(&self, map: &QueryMap) -> Result<(), QueryError> {
        (self.receive)(map)
    }
}

impl std::fmt::Debug for AnyAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnyAction").field("path", &self.path).finish()
    }
}

// --- tests -------------------------------------------------------------------
