//! Error types.
//!
//! Each concern gets its own enum so callers can tell fatal setup problems
//! apart from the recoverable failures that the binding pipeline logs and
//! swallows.

use thiserror::Error;

use crate::dom::NodeId;

/// Errors raised while defining or mounting an application.
///
/// These are fatal and returned straight to the caller.
#[derive(Debug, Error)]
pub enum SetupError {
    #[error("component name `{0}` must start with an uppercase letter")]
    InvalidComponentName(String),

    #[error("custom element `{0}` has already been defined")]
    DuplicateTag(String),

    #[error("invalid app configuration: {0}")]
    InvalidConfig(#[from] serde_json::Error),

    #[error(transparent)]
    Dom(#[from] DomError),
}

/// Errors produced by store reads and writes.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StoreError {
    #[error("store has no field `{0}`")]
    UnknownKey(String),

    #[error("cannot overwrite method `{0}`")]
    MethodOverwrite(String),
}

/// Errors produced while compiling or evaluating an expression.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    #[error("syntax error at {position}: {message}")]
    Syntax { position: usize, message: String },

    #[error("`{0}` is not defined")]
    UnknownIdentifier(String),

    #[error("`{0}` is not a function")]
    NotCallable(String),

    #[error("invalid assignment target `{0}`")]
    NotAssignable(String),

    #[error("type error: {0}")]
    Type(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl EvalError {
    pub(crate) fn syntax(position: usize, message: impl Into<String>) -> Self {
        Self::Syntax {
            position,
            message: message.into(),
        }
    }
}

/// Errors surfaced by effect runs.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ReactiveError {
    #[error("effect failed: {0}")]
    EffectFailed(String),

    #[error(transparent)]
    Eval(#[from] EvalError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Errors produced by document operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DomError {
    #[error("node {0:?} does not exist")]
    NodeNotFound(NodeId),

    #[error("cannot insert {child:?} into {parent:?}: {reason}")]
    Hierarchy {
        parent: NodeId,
        child: NodeId,
        reason: &'static str,
    },

    #[error("markup parse error at {position}: {message}")]
    Parse { position: usize, message: String },

    #[error("the document body cannot be disposed")]
    DisposeBody,
}
