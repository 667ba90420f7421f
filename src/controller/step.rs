//! # Reconciliation Steps
//!
//! A closed set of step kinds, each carrying its own data. The runner is
//! generic over [`Reconcile`], so anything that yields a [`StepResult`] can be
//! sequenced; [`Step`] is the implementation used by the controller loops.

use crate::controller::action::StepResult;
use crate::controller::credentials::CredentialIssuer;
use crate::controller::deleter::Deleter;
use crate::controller::finalizer::Finalizer;
use crate::controller::namespace::EnsureNamespace;
use crate::controller::store::ObjectStore;
use crate::controller::updater::Updater;
use async_trait::async_trait;

/// A unit of reconciliation work
#[async_trait]
pub trait Reconcile: Send + Sync {
    async fn reconcile(&self, store: &dyn ObjectStore) -> StepResult;

    /// Short description for logs
    fn describe(&self) -> String;
}

#[derive(Debug, Clone)]
pub enum Step {
    Apply(Updater),
    Delete(Deleter),
    EnsureNamespace(EnsureNamespace),
    Credentials(Box<CredentialIssuer>),
    Finalize(Finalizer),
}

#[async_trait]
impl Reconcile for Step {
    async fn reconcile(&self, store: &dyn ObjectStore) -> StepResult {
        match self {
            Step::Apply(updater) => updater.reconcile(store).await,
            Step::Delete(deleter) => deleter.reconcile(store).await,
            Step::EnsureNamespace(step) => step.reconcile(store).await,
            Step::Credentials(issuer) => issuer.reconcile(store).await,
            Step::Finalize(gate) => gate.reconcile(store).await,
        }
    }

    fn describe(&self) -> String {
        match self {
            Step::Apply(updater) => format!("apply {}", updater.object.id()),
            Step::Delete(deleter) => format!("delete {}", deleter.object.id()),
            Step::EnsureNamespace(step) => format!("ensure {}", step.namespace.id()),
            Step::Credentials(issuer) => format!("credentials {}", issuer.secret_key()),
            Step::Finalize(gate) => format!("finalize {}/{}", gate.resource.kind, gate.key),
        }
    }
}
