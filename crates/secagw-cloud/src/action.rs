//! Asynchronous provider actions
//!
//! Provider mutations are accepted asynchronously; the provider hands back an
//! action identifier. The gateway only records that identifier, it never polls
//! the action to completion.

use serde::{Deserialize, Serialize};

/// Reference to an asynchronous provider action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionRef {
    /// Provider-assigned action identifier
    pub id: String,

    /// Provider command name (e.g. "create_server", "poweron")
    pub command: String,
}

impl ActionRef {
    pub fn new(id: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            command: command.into(),
        }
    }
}

/// Result of a create-or-update call
#[derive(Debug, Clone)]
pub struct Applied<T> {
    /// The resource as the provider reports it after the call
    pub resource: T,

    /// Whether the call created the resource (as opposed to updating it)
    pub created: bool,

    /// Actions the provider started for this call
    pub actions: Vec<ActionRef>,
}

impl<T> Applied<T> {
    pub fn created(resource: T, actions: Vec<ActionRef>) -> Self {
        Self {
            resource,
            created: true,
            actions,
        }
    }

    pub fn updated(resource: T, actions: Vec<ActionRef>) -> Self {
        Self {
            resource,
            created: false,
            actions,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Applied<U> {
        Applied {
            resource: f(self.resource),
            created: self.created,
            actions: self.actions,
        }
    }
}
