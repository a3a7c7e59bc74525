//! Error types for the lineage runtime.

use thiserror::Error;

use crate::hooks::LifecycleHook;
use crate::types::{DefinitionId, InstanceId};

/// Errors from the definition registry and options resolver.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DefinitionError {
    #[error("Unknown definition {id}: not registered in this registry")]
    UnknownDefinition { id: DefinitionId },
}

/// Failure reported by a lifecycle hook callback.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HookError {
    #[error("{0}")]
    Failed(String),

    #[error("Hook expects a context of type {expected}")]
    ContextMismatch { expected: &'static str },
}

impl HookError {
    pub fn failed(message: impl Into<String>) -> Self {
        HookError::Failed(message.into())
    }
}

/// Failure reported by an external initialization collaborator.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct CollaboratorError {
    pub message: String,
}

impl CollaboratorError {
    pub fn new(message: impl Into<String>) -> Self {
        CollaboratorError { message: message.into() }
    }
}

/// The collaborator-driven steps of instance creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CollaboratorStep {
    Injections,
    State,
    Provisions,
    Mount,
}

impl std::fmt::Display for CollaboratorStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            CollaboratorStep::Injections => "injections",
            CollaboratorStep::State => "state",
            CollaboratorStep::Provisions => "provisions",
            CollaboratorStep::Mount => "mount",
        };
        f.write_str(name)
    }
}

/// Errors that halt instantiation of a single instance.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LifecycleError {
    #[error("Error in {hook} hook of {instance}: {source}")]
    Hook {
        hook: LifecycleHook,
        instance: InstanceId,
        #[source]
        source: HookError,
    },

    #[error("Error resolving {step} for {instance}: {source}")]
    Collaborator {
        step: CollaboratorStep,
        instance: InstanceId,
        #[source]
        source: CollaboratorError,
    },

    #[error("Unknown instance {id}")]
    UnknownInstance { id: InstanceId },

    #[error(transparent)]
    Definition(#[from] DefinitionError),
}
