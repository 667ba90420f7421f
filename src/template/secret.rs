//! # Credential Secret and Namespace Templates

use super::{credential_secret_name, Detail, Params};
use crate::constants::{ANNOTATION_TOKEN_EXPIRATION, LABEL_CREDENTIAL, TOKEN_SECRET_KEY};
use chrono::{DateTime, Utc};
use k8s_openapi::api::core::v1::{Namespace, Secret};
use k8s_openapi::ByteString;
use std::collections::BTreeMap;

#[must_use]
pub fn namespace(params: &Params, _detail: Detail) -> Namespace {
    Namespace {
        metadata: params.cluster_meta(&params.namespace),
        ..Default::default()
    }
}

/// Credential secret of an agent.
///
/// `Detail::Full` requires the issued token and its expiration; without them
/// only the identity and the watcher label are set.
#[must_use]
pub fn credential_secret(
    params: &Params,
    detail: Detail,
    token: Option<(&str, DateTime<Utc>)>,
) -> Secret {
    let mut metadata = params.namespaced_meta(&credential_secret_name(&params.instance));
    metadata
        .labels
        .get_or_insert_with(BTreeMap::new)
        .insert(LABEL_CREDENTIAL.to_string(), "true".to_string());

    let mut secret = Secret {
        metadata,
        type_: Some("Opaque".to_string()),
        ..Default::default()
    };
    if let (Detail::Full, Some((token, expires_at))) = (detail, token) {
        secret.metadata.annotations = Some(BTreeMap::from([(
            ANNOTATION_TOKEN_EXPIRATION.to_string(),
            expires_at.to_rfc3339(),
        )]));
        secret.data = Some(BTreeMap::from([(
            TOKEN_SECRET_KEY.to_string(),
            ByteString(token.as_bytes().to_vec()),
        )]));
    }
    secret
}
