//! # Workload Templates
//!
//! The node `DaemonSet` and the objects it depends on.

use super::{Detail, Params};
use k8s_openapi::api::apps::v1::{DaemonSet, DaemonSetSpec};
use k8s_openapi::api::core::v1::{
    ConfigMap, ConfigMapEnvSource, Container, ContainerPort, EnvFromSource, EnvVar, EnvVarSource,
    HostPathVolumeSource, ObjectFieldSelector, PodSpec, PodTemplateSpec, SecretVolumeSource,
    Service, ServicePort, ServiceSpec, Toleration, Volume, VolumeMount,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;

/// Mount path of the issued credential inside agent pods
pub const CREDENTIAL_MOUNT_PATH: &str = "/var/run/secrets/nodeagent";

#[must_use]
pub fn config_map(params: &Params, detail: Detail) -> ConfigMap {
    ConfigMap {
        metadata: params.namespaced_meta(&params.name),
        data: match detail {
            Detail::Full => Some(params.config.clone()),
            Detail::MetadataOnly => None,
        },
        ..Default::default()
    }
}

/// Headless service exposing the per-node port
#[must_use]
pub fn service(params: &Params, detail: Detail) -> Service {
    let metadata = params.namespaced_meta(&params.name);
    let Detail::Full = detail else {
        return Service {
            metadata,
            ..Default::default()
        };
    };
    Service {
        metadata,
        spec: Some(ServiceSpec {
            cluster_ip: Some("None".to_string()),
            selector: Some(params.selector_labels()),
            ports: params.port.map(|port| {
                vec![ServicePort {
                    name: Some("http".to_string()),
                    port,
                    target_port: Some(IntOrString::String("http".to_string())),
                    ..Default::default()
                }]
            }),
            ..Default::default()
        }),
        ..Default::default()
    }
}

#[must_use]
pub fn daemon_set(params: &Params, detail: Detail) -> DaemonSet {
    let metadata = params.namespaced_meta(&params.name);
    if detail == Detail::MetadataOnly {
        return DaemonSet {
            metadata,
            ..Default::default()
        };
    }

    let mut volumes = Vec::new();
    let mut mounts = Vec::new();
    if let Some(secret) = &params.credential_secret {
        volumes.push(Volume {
            name: "credentials".to_string(),
            secret: Some(SecretVolumeSource {
                secret_name: Some(secret.clone()),
                // The issuer may not have written it yet
                optional: Some(true),
                ..Default::default()
            }),
            ..Default::default()
        });
        mounts.push(VolumeMount {
            name: "credentials".to_string(),
            mount_path: CREDENTIAL_MOUNT_PATH.to_string(),
            read_only: Some(true),
            ..Default::default()
        });
    }
    if params.host_filesystem {
        volumes.push(Volume {
            name: "host-root".to_string(),
            host_path: Some(HostPathVolumeSource {
                path: "/".to_string(),
                ..Default::default()
            }),
            ..Default::default()
        });
        mounts.push(VolumeMount {
            name: "host-root".to_string(),
            mount_path: "/host".to_string(),
            read_only: Some(true),
            ..Default::default()
        });
    }

    let container = Container {
        name: params.app.to_string(),
        image: Some(params.image.clone()),
        env: Some(vec![EnvVar {
            name: "NODE_NAME".to_string(),
            value_from: Some(EnvVarSource {
                field_ref: Some(ObjectFieldSelector {
                    field_path: "spec.nodeName".to_string(),
                    ..Default::default()
                }),
                ..Default::default()
            }),
            ..Default::default()
        }]),
        env_from: Some(vec![EnvFromSource {
            config_map_ref: Some(ConfigMapEnvSource {
                name: params.name.clone(),
                ..Default::default()
            }),
            ..Default::default()
        }]),
        ports: params.port.map(|port| {
            vec![ContainerPort {
                name: Some("http".to_string()),
                container_port: port,
                ..Default::default()
            }]
        }),
        volume_mounts: (!mounts.is_empty()).then_some(mounts),
        ..Default::default()
    };

    DaemonSet {
        metadata,
        spec: Some(DaemonSetSpec {
            selector: LabelSelector {
                match_labels: Some(params.selector_labels()),
                ..Default::default()
            },
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(params.labels()),
                    ..Default::default()
                }),
                spec: Some(PodSpec {
                    service_account_name: Some(params.name.clone()),
                    node_selector: params.node_selector.clone(),
                    containers: vec![container],
                    volumes: (!volumes.is_empty()).then_some(volumes),
                    // Node agents run on every node, tainted or not
                    tolerations: Some(vec![Toleration {
                        operator: Some("Exists".to_string()),
                        ..Default::default()
                    }]),
                    ..Default::default()
                }),
            },
            ..Default::default()
        }),
        ..Default::default()
    }
}
