use thiserror::Error;

use crate::models::{ListOperation, UserId};

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum CoreErrorKind {
    InvalidInput,
    StorageFailure,
    SerializationFailure,
    NetworkFailure,
    Timeout,
    Internal,
}

#[derive(Clone, Debug, Eq, PartialEq, Error)]
#[error("{kind:?}: {message}")]
pub struct CoreError {
    pub user: Option<UserId>,
    pub operation: Option<ListOperation>,
    pub kind: CoreErrorKind,
    pub message: String,
}

impl CoreError {
    pub fn new(kind: CoreErrorKind, message: impl Into<String>) -> Self {
        Self {
            user: None,
            operation: None,
            kind,
            message: message.into(),
        }
    }

    pub fn for_user(mut self, user: &UserId) -> Self {
        self.user = Some(user.clone());
        self
    }

    pub fn during(mut self, operation: ListOperation) -> Self {
        self.operation = Some(operation);
        self
    }
}
