//! # Credentials
//!
//! Lifecycle of short-lived agent credentials.
//!
//! - `issuer` - issues and rotates the token secret, as a step of the agent pass
//! - `expiry` - deletes secrets shortly before they expire
//! - `poll` - bounded waits for asynchronously created prerequisites

pub mod expiry;
mod issuer;
mod poll;

pub use expiry::{reconcile_secret, ExpiryDecision};
pub use issuer::CredentialIssuer;
pub use poll::poll_for_object;
