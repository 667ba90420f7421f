//! # Step Errors
//!
//! Errors produced by reconciliation steps. Every variant names the object it
//! concerns so that log lines and condition messages are actionable.

use crate::controller::store::{ObjectId, StoreError};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to apply {object}: {source}")]
    Apply {
        object: ObjectId,
        #[source]
        source: StoreError,
    },

    #[error("failed to delete {object}: {source}")]
    Delete {
        object: ObjectId,
        #[source]
        source: StoreError,
    },

    #[error("cannot set owner reference from {owner} on {object}: owner has no name or uid")]
    OwnerReference { owner: ObjectId, object: ObjectId },

    #[error("failed to refresh {object}: {source}")]
    Refresh {
        object: ObjectId,
        #[source]
        source: StoreError,
    },

    #[error("failed to persist {object}: {source}")]
    Persist {
        object: ObjectId,
        #[source]
        source: StoreError,
    },

    #[error("failed to update status of {object}: {source}")]
    Status {
        object: ObjectId,
        #[source]
        source: StoreError,
    },

    #[error("{object} not found after waiting {}s", .waited.as_secs())]
    MissingDependency { object: ObjectId, waited: Duration },

    #[error("failed to issue token for {account}: {source}")]
    Token {
        account: ObjectId,
        #[source]
        source: StoreError,
    },

    #[error("failed to encode {object}: {source}")]
    Encode {
        object: ObjectId,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}
