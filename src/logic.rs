//! Business layer: the echo operation behind the [`Echo`] trait.
//!
//! Inputs and outputs are plain value types; no transport framing crosses
//! this boundary and failures are domain errors, never statuses. Each call
//! performs exactly one store operation after validation.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::trace;

use crate::store::{Store, StoreError};

/// Longest message the echo operation accepts, in bytes.
pub(crate) const MAX_MESSAGE_LEN: usize = 512;

/// Key under which the most recently echoed message is recorded.
const LAST_ECHO_KEY: &str = "last-echo";

/// Echo input value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct EchoRequest {
    pub message: String,
}

/// Echo output value, derived deterministically from the input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct EchoReply {
    pub message: String,
}

/// Domain failures of the echo operation.
#[derive(Error, Debug)]
pub enum DomainError {
    /// The message is empty.
    #[error("message is empty")]
    Empty,

    /// The message exceeds the accepted length.
    #[error("message is {len} bytes, limit is {max}")]
    TooLong { len: usize, max: usize },

    /// The data-access layer failed while recording the message.
    #[error("store failure: {0}")]
    Store(#[from] StoreError),
}

/// Business-logic contract for the echo operation.
#[async_trait]
pub(crate) trait Echo: Send + Sync {
    async fn execute(&self, input: EchoRequest) -> Result<EchoReply, DomainError>;
}

/// Default [`Echo`] implementation backed by a [`Store`].
pub(crate) struct EchoEngine {
    store: Arc<dyn Store>,
}

impl EchoEngine {
    pub(crate) fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Echo for EchoEngine {
    async fn execute(&self, input: EchoRequest) -> Result<EchoReply, DomainError> {
        if input.message.is_empty() {
            return Err(DomainError::Empty);
        }
        if input.message.len() > MAX_MESSAGE_LEN {
            return Err(DomainError::TooLong {
                len: input.message.len(),
                max: MAX_MESSAGE_LEN,
            });
        }

        // One store operation per unit of work, after validation.
        self.store
            .put(LAST_ECHO_KEY, input.message.clone().into_bytes())
            .await?;

        trace!(len = input.message.len(), "Echoed message");
        Ok(EchoReply {
            message: input.message,
        })
    }
}
