//! # Credential Issuer
//!
//! Issues a short-lived bearer token for an agent's service account and keeps
//! it in a secret annotated with its expiration.
//!
//! A pass of the issuer:
//!
//! 1. disabled: delete the secret and finish
//! 2. wait for the service account (it may be created asynchronously)
//! 3. look for an existing secret; keep it while it is outside the expiry buffer
//! 4. request a token and apply the annotated secret through the updater

use super::expiry::expiration;
use super::poll::poll_for_object;
use crate::constants::{
    CREDENTIAL_POLL_INTERVAL, EXISTING_SECRET_TIMEOUT, TOKEN_AUDIENCES, TOKEN_EXPIRY_BUFFER,
    TOKEN_TTL,
};
use crate::controller::action::{Action, StepResult};
use crate::controller::deleter::Deleter;
use crate::controller::error::Error;
use crate::controller::store::{
    api_resource, ManagedObject, ObjectId, ObjectKey, ObjectStore, Owner, TokenParams,
};
use crate::controller::updater::Updater;
use crate::observability;
use crate::template::{self, Detail, Params};
use chrono::{DateTime, Utc};
use k8s_openapi::api::core::v1::{Secret, ServiceAccount};
use kube::api::DynamicObject;
use std::time::Duration;
use tracing::{debug, info};

/// Step issuing and rotating an agent credential
#[derive(Debug, Clone)]
pub struct CredentialIssuer {
    pub owner: Owner,
    pub params: Params,
    pub enabled: bool,
    pub account_timeout: Duration,
    pub existing_timeout: Duration,
    pub poll_interval: Duration,
    pub ttl: Duration,
    pub expiry_buffer: Duration,
}

impl CredentialIssuer {
    #[must_use]
    pub fn new(owner: Owner, params: Params, enabled: bool, account_timeout: Duration) -> Self {
        Self {
            owner,
            params,
            enabled,
            account_timeout,
            existing_timeout: EXISTING_SECRET_TIMEOUT,
            poll_interval: CREDENTIAL_POLL_INTERVAL,
            ttl: TOKEN_TTL,
            expiry_buffer: TOKEN_EXPIRY_BUFFER,
        }
    }

    #[must_use]
    pub fn secret_key(&self) -> ObjectKey {
        ObjectKey::namespaced(
            self.params.namespace.clone(),
            template::credential_secret_name(&self.params.instance),
        )
    }

    fn account_key(&self) -> ObjectKey {
        ObjectKey::namespaced(self.params.namespace.clone(), self.params.name.clone())
    }

    pub async fn reconcile(&self, store: &dyn ObjectStore) -> StepResult {
        if !self.enabled {
            return match ManagedObject::from_typed(&template::credential_secret(
                &self.params,
                Detail::MetadataOnly,
                None,
            )) {
                Ok(secret) => Deleter::new(secret).reconcile(store).await,
                Err(e) => StepResult::fail(Action::Stop, e),
            };
        }

        let account = self.account_key();
        let account_id = ObjectId::new("ServiceAccount", account.clone());
        match poll_for_object(
            store,
            &api_resource::<ServiceAccount>(),
            &account,
            self.poll_interval,
            self.account_timeout,
        )
        .await
        {
            Ok(Some(_)) => {}
            Ok(None) => {
                return StepResult::fail(
                    Action::Stop,
                    Error::MissingDependency {
                        object: account_id,
                        waited: self.account_timeout,
                    },
                )
            }
            Err(source) => {
                return StepResult::fail(
                    Action::Stop,
                    Error::Refresh {
                        object: account_id,
                        source,
                    },
                )
            }
        }

        let secret_key = self.secret_key();
        let now = Utc::now();
        match poll_for_object(
            store,
            &api_resource::<Secret>(),
            &secret_key,
            self.poll_interval,
            self.existing_timeout,
        )
        .await
        {
            Ok(Some(existing)) if !self.needs_rotation(&existing, now) => {
                debug!(secret = %secret_key, "credential still valid");
                return StepResult::ok();
            }
            Ok(_) => {}
            Err(source) => {
                return StepResult::fail(
                    Action::Stop,
                    Error::Refresh {
                        object: ObjectId::new("Secret", secret_key),
                        source,
                    },
                )
            }
        }

        let params = TokenParams {
            audiences: TOKEN_AUDIENCES.iter().map(|a| (*a).to_string()).collect(),
            ttl: self.ttl,
        };
        let token = match store.request_token(&account, &params).await {
            Ok(token) => token,
            Err(source) => {
                return StepResult::fail(
                    Action::Stop,
                    Error::Token {
                        account: account_id,
                        source,
                    },
                )
            }
        };

        let expires_at = now + chrono::Duration::from_std(self.ttl).unwrap_or(chrono::Duration::zero());
        let secret = match ManagedObject::from_typed(&template::credential_secret(
            &self.params,
            Detail::Full,
            Some((&token, expires_at)),
        )) {
            Ok(secret) => secret,
            Err(e) => return StepResult::fail(Action::Stop, e),
        };

        let result = Updater::new(self.owner.clone(), secret)
            .on_error(Action::Stop)
            .reconcile(store)
            .await;
        if result.is_ok() {
            observability::metrics::increment_credential_rotations();
            info!(
                secret = %secret_key,
                expires_at = %expires_at.to_rfc3339(),
                "Issued credential"
            );
        }
        result
    }

    /// Whether an existing secret must be reissued at `now`
    fn needs_rotation(&self, secret: &DynamicObject, now: DateTime<Utc>) -> bool {
        let Ok(expires_at) = expiration(secret.metadata.annotations.as_ref()) else {
            return true;
        };
        let buffer = chrono::Duration::from_std(self.expiry_buffer).unwrap_or(chrono::Duration::zero());
        expires_at - buffer <= now
    }
}
