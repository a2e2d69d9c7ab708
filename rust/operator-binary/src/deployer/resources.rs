//! Builders for the cert-controller-manager workload and its surroundings.

use std::collections::BTreeMap;

use k8s_openapi::{
    api::{
        apps::v1::{Deployment, DeploymentSpec},
        core::v1::{
            ConfigMap, ConfigMapVolumeSource, Container, ContainerPort, EnvVar, HTTPGetAction,
            PodSpec, PodTemplateSpec, Probe, ResourceRequirements, SecretVolumeSource, Service,
            ServiceAccount, ServicePort, ServiceSpec, Volume, VolumeMount,
        },
        networking::v1::{
            NetworkPolicy, NetworkPolicyIngressRule, NetworkPolicyPeer, NetworkPolicyPort,
            NetworkPolicySpec,
        },
        policy::v1::{PodDisruptionBudget, PodDisruptionBudgetSpec},
        rbac::v1::{
            ClusterRole, ClusterRoleBinding, PolicyRule, Role, RoleBinding, RoleRef, Subject,
        },
    },
    apimachinery::pkg::{
        api::resource::Quantity,
        apis::meta::v1::{LabelSelector, ObjectMeta},
        util::intstr::IntOrString,
    },
};
use snafu::Snafu;

use crate::{
    config::PrivateKeyAlgorithm,
    crd::v1alpha1::DnsChallengeOnShoot,
    external_crd::autoscaling::{
        ContainerResourcePolicy, VerticalPodAutoscaler, VerticalPodAutoscalerSpec,
        VpaResourcePolicy, VpaUpdatePolicy,
    },
    values::Values,
};

pub const CERT_MANAGEMENT_NAME: &str = "cert-controller-manager";
pub const METRICS_PORT: i32 = 10258;

const CA_CERTIFICATES_CONFIG_MAP_NAME: &str = "cert-controller-manager-ca-certificates";
const CA_CERTIFICATES_MOUNT_PATH: &str = "/var/run/cert-management/ca-certificates";
const KUBECONFIG_MOUNT_PATH: &str = "/var/run/secrets/gardener.cloud/shoot/generic-kubeconfig";

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("configured CA certificates are not a PEM certificate bundle"))]
    MalformedCaCertificates,
}

pub fn standard_labels() -> BTreeMap<String, String> {
    BTreeMap::from([
        (
            "app.kubernetes.io/name".to_string(),
            "cert-management".to_string(),
        ),
        (
            "app.kubernetes.io/instance".to_string(),
            CERT_MANAGEMENT_NAME.to_string(),
        ),
    ])
}

fn metadata(values: &Values, name: &str) -> ObjectMeta {
    let mut labels = standard_labels();
    if let Some(seed) = &values.seed_name {
        labels.insert("seed.gardener.cloud/name".to_string(), seed.clone());
    }
    ObjectMeta {
        name: Some(name.to_string()),
        namespace: Some(values.namespace.clone()),
        labels: Some(labels),
        ..ObjectMeta::default()
    }
}

/// The ordered cert-controller-manager argument list. The order is part of
/// the contract with downstream consumers, do not rearrange.
pub fn container_args(values: &Values) -> Vec<String> {
    let mut args = vec![
        format!("--name={CERT_MANAGEMENT_NAME}"),
        format!("--namespace={}", values.namespace),
    ];
    if values.cert_class.is_shoot() && values.generic_kubeconfig_secret_name.is_some() {
        args.push(format!(
            "--target-kubeconfig={KUBECONFIG_MOUNT_PATH}/kubeconfig"
        ));
    }

    args.push(format!("--issuer.issuer-namespace={}", values.namespace));
    args.push(format!("--issuer.default-issuer={}", values.issuer_name));
    if let Some(quota) = values.default_requests_per_day_quota {
        args.push(format!("--issuer.default-requests-per-day-quota={quota}"));
    }
    if values.restricted_issuer {
        if let Some(domain) = &values.restricted_domain {
            args.push(format!("--issuer.default-issuer-domain-ranges={domain}"));
        }
    }
    if let Some(nameservers) = &values.precheck_nameservers {
        args.push(format!("--issuer.precheck-nameservers={nameservers}"));
    }

    // DNS01 challenges go either to DNSEntries in the shoot cluster or to
    // DNSRecords next to the control plane, never both.
    let dns_challenge_on_shoot = values
        .dns_challenge_on_shoot
        .as_ref()
        .filter(|dns| dns.enabled && values.cert_class.is_shoot());
    if let Some(dns) = dns_challenge_on_shoot {
        args.push(format!("--issuer.dns-namespace={}", dns.namespace));
        if let Some(class) = dns.dns_class.as_ref().or(values.dns_class.as_ref()) {
            args.push(format!("--issuer.dns-class={class}"));
        }
    } else {
        args.push("--use-dnsrecords=true".to_string());
    }

    args.push(format!("--server-port-http={METRICS_PORT}"));
    args.push("--pool.size=2".to_string());

    if let Some(timeout) = &values.propagation_timeout {
        args.push(format!("--propagation-timeout={timeout}"));
    }
    if values.shoot_issuers_enabled {
        args.push("--issuer.allow-target-issuers".to_string());
    }
    if values.deactivate_authorizations {
        args.push("--acme-deactivate-authorizations".to_string());
    }

    args.push("--lease-name=shoot-cert-service".to_string());
    args.push("--lease-resource-lock=leases".to_string());
    args.push("--deploy-crds=false".to_string());

    let defaults = values.private_key_defaults.as_ref();
    let algorithm = match defaults.and_then(|d| d.algorithm) {
        Some(PrivateKeyAlgorithm::Ecdsa) => "ECDSA",
        _ => "RSA",
    };
    args.push(format!("--default-private-key-algorithm={algorithm}"));
    args.push(format!(
        "--default-rsa-private-key-size={}",
        defaults.and_then(|d| d.rsa_key_size).unwrap_or(3072)
    ));
    args.push(format!(
        "--default-ecdsa-private-key-size={}",
        defaults.and_then(|d| d.ecdsa_key_size).unwrap_or(384)
    ));

    args
}

pub fn service_account(values: &Values) -> ServiceAccount {
    ServiceAccount {
        metadata: metadata(values, CERT_MANAGEMENT_NAME),
        automount_service_account_token: Some(true),
        ..ServiceAccount::default()
    }
}

pub fn role(values: &Values) -> Role {
    Role {
        metadata: metadata(values, CERT_MANAGEMENT_NAME),
        rules: Some(vec![
            PolicyRule {
                api_groups: Some(vec!["cert.gardener.cloud".to_string()]),
                resources: Some(vec![
                    "issuers".to_string(),
                    "issuers/status".to_string(),
                    "certificates".to_string(),
                    "certificates/status".to_string(),
                    "certificaterevocations".to_string(),
                    "certificaterevocations/status".to_string(),
                ]),
                verbs: vec![
                    "get".to_string(),
                    "list".to_string(),
                    "watch".to_string(),
                    "create".to_string(),
                    "update".to_string(),
                    "patch".to_string(),
                    "delete".to_string(),
                ],
                ..PolicyRule::default()
            },
            PolicyRule {
                api_groups: Some(vec!["".to_string()]),
                resources: Some(vec!["secrets".to_string(), "configmaps".to_string()]),
                verbs: vec![
                    "get".to_string(),
                    "list".to_string(),
                    "watch".to_string(),
                    "create".to_string(),
                    "update".to_string(),
                    "patch".to_string(),
                    "delete".to_string(),
                ],
                ..PolicyRule::default()
            },
            PolicyRule {
                api_groups: Some(vec!["".to_string()]),
                resources: Some(vec!["events".to_string()]),
                verbs: vec!["create".to_string(), "patch".to_string()],
                ..PolicyRule::default()
            },
            PolicyRule {
                api_groups: Some(vec!["coordination.k8s.io".to_string()]),
                resources: Some(vec!["leases".to_string()]),
                verbs: vec![
                    "get".to_string(),
                    "watch".to_string(),
                    "create".to_string(),
                    "update".to_string(),
                ],
                ..PolicyRule::default()
            },
        ]),
    }
}

pub fn role_binding(values: &Values) -> RoleBinding {
    RoleBinding {
        metadata: metadata(values, CERT_MANAGEMENT_NAME),
        role_ref: RoleRef {
            api_group: "rbac.authorization.k8s.io".to_string(),
            kind: "Role".to_string(),
            name: CERT_MANAGEMENT_NAME.to_string(),
        },
        subjects: Some(vec![Subject {
            kind: "ServiceAccount".to_string(),
            name: CERT_MANAGEMENT_NAME.to_string(),
            namespace: Some(values.namespace.clone()),
            ..Subject::default()
        }]),
    }
}

/// RBAC applied inside the target cluster, granting the extension user access
/// to the cert-management API group.
pub fn target_cluster_role() -> ClusterRole {
    ClusterRole {
        metadata: ObjectMeta {
            name: Some(format!(
                "extensions.gardener.cloud:extension-shoot-cert-service:{CERT_MANAGEMENT_NAME}"
            )),
            labels: Some(standard_labels()),
            ..ObjectMeta::default()
        },
        rules: Some(vec![
            PolicyRule {
                api_groups: Some(vec!["cert.gardener.cloud".to_string()]),
                resources: Some(vec![
                    "issuers".to_string(),
                    "issuers/status".to_string(),
                    "certificates".to_string(),
                    "certificates/status".to_string(),
                    "certificaterevocations".to_string(),
                    "certificaterevocations/status".to_string(),
                ]),
                verbs: vec![
                    "get".to_string(),
                    "list".to_string(),
                    "watch".to_string(),
                    "create".to_string(),
                    "update".to_string(),
                    "patch".to_string(),
                    "delete".to_string(),
                ],
                ..PolicyRule::default()
            },
            PolicyRule {
                api_groups: Some(vec!["apiextensions.k8s.io".to_string()]),
                resources: Some(vec!["customresourcedefinitions".to_string()]),
                verbs: vec![
                    "get".to_string(),
                    "list".to_string(),
                    "watch".to_string(),
                ],
                ..PolicyRule::default()
            },
            PolicyRule {
                api_groups: Some(vec!["".to_string()]),
                resources: Some(vec![
                    "secrets".to_string(),
                    "services".to_string(),
                    "events".to_string(),
                ]),
                verbs: vec![
                    "get".to_string(),
                    "list".to_string(),
                    "watch".to_string(),
                    "create".to_string(),
                    "update".to_string(),
                    "patch".to_string(),
                    "delete".to_string(),
                ],
                ..PolicyRule::default()
            },
            PolicyRule {
                api_groups: Some(vec![
                    "networking.k8s.io".to_string(),
                    "extensions".to_string(),
                ]),
                resources: Some(vec!["ingresses".to_string()]),
                verbs: vec!["get".to_string(), "list".to_string(), "watch".to_string()],
                ..PolicyRule::default()
            },
        ]),
        ..ClusterRole::default()
    }
}

pub fn target_cluster_role_binding() -> ClusterRoleBinding {
    let name =
        format!("extensions.gardener.cloud:extension-shoot-cert-service:{CERT_MANAGEMENT_NAME}");
    ClusterRoleBinding {
        metadata: ObjectMeta {
            name: Some(name.clone()),
            labels: Some(standard_labels()),
            ..ObjectMeta::default()
        },
        role_ref: RoleRef {
            api_group: "rbac.authorization.k8s.io".to_string(),
            kind: "ClusterRole".to_string(),
            name,
        },
        subjects: Some(vec![Subject {
            kind: "User".to_string(),
            api_group: Some("rbac.authorization.k8s.io".to_string()),
            name: "gardener.cloud:extensions:shoot-cert-service".to_string(),
            ..Subject::default()
        }]),
    }
}

/// Allows the extension user to manage DNSEntries for DNS01 challenges in the
/// configured shoot namespace.
pub fn dns_challenge_role(dns: &DnsChallengeOnShoot) -> Role {
    Role {
        metadata: ObjectMeta {
            name: Some(
                "extensions.gardener.cloud:extension-shoot-cert-service:dns-challenge".to_string(),
            ),
            namespace: Some(dns.namespace.clone()),
            labels: Some(standard_labels()),
            ..ObjectMeta::default()
        },
        rules: Some(vec![PolicyRule {
            api_groups: Some(vec!["dns.gardener.cloud".to_string()]),
            resources: Some(vec![
                "dnsentries".to_string(),
                "dnsentries/status".to_string(),
            ]),
            verbs: vec![
                "get".to_string(),
                "list".to_string(),
                "watch".to_string(),
                "create".to_string(),
                "update".to_string(),
                "patch".to_string(),
                "delete".to_string(),
            ],
            ..PolicyRule::default()
        }]),
    }
}

pub fn dns_challenge_role_binding(dns: &DnsChallengeOnShoot) -> RoleBinding {
    RoleBinding {
        metadata: ObjectMeta {
            name: Some(
                "extensions.gardener.cloud:extension-shoot-cert-service:dns-challenge".to_string(),
            ),
            namespace: Some(dns.namespace.clone()),
            labels: Some(standard_labels()),
            ..ObjectMeta::default()
        },
        role_ref: RoleRef {
            api_group: "rbac.authorization.k8s.io".to_string(),
            kind: "Role".to_string(),
            name: "extensions.gardener.cloud:extension-shoot-cert-service:dns-challenge"
                .to_string(),
        },
        subjects: Some(vec![Subject {
            kind: "User".to_string(),
            api_group: Some("rbac.authorization.k8s.io".to_string()),
            name: "gardener.cloud:extensions:shoot-cert-service".to_string(),
            ..Subject::default()
        }]),
    }
}

pub fn service(values: &Values) -> Service {
    Service {
        metadata: metadata(values, CERT_MANAGEMENT_NAME),
        spec: Some(ServiceSpec {
            selector: Some(standard_labels()),
            ports: Some(vec![ServicePort {
                name: Some("metrics".to_string()),
                port: METRICS_PORT,
                protocol: Some("TCP".to_string()),
                target_port: Some(IntOrString::Int(METRICS_PORT)),
                ..ServicePort::default()
            }]),
            ..ServiceSpec::default()
        }),
        ..Service::default()
    }
}

/// ConfigMap carrying the additional CA bundle trusted for ACME endpoints.
/// Returns `None` when no bundle is configured.
pub fn ca_certificates_config_map(values: &Values) -> Result<Option<ConfigMap>, Error> {
    let Some(bundle) = &values.ca_certificates else {
        return Ok(None);
    };
    if !bundle.contains("-----BEGIN CERTIFICATE-----") {
        return Err(Error::MalformedCaCertificates);
    }
    Ok(Some(ConfigMap {
        metadata: metadata(values, CA_CERTIFICATES_CONFIG_MAP_NAME),
        data: Some(BTreeMap::from([(
            "bundle.pem".to_string(),
            bundle.clone(),
        )])),
        ..ConfigMap::default()
    }))
}

pub fn deployment(values: &Values, issuers_checksum: &str) -> Deployment {
    let mut volumes = Vec::new();
    let mut volume_mounts = Vec::new();
    let mut env = Vec::new();

    if let Some(secret_name) = &values.generic_kubeconfig_secret_name {
        volumes.push(Volume {
            name: "kubeconfig".to_string(),
            secret: Some(SecretVolumeSource {
                secret_name: Some(secret_name.clone()),
                default_mode: Some(0o420),
                ..SecretVolumeSource::default()
            }),
            ..Volume::default()
        });
        volume_mounts.push(VolumeMount {
            name: "kubeconfig".to_string(),
            mount_path: KUBECONFIG_MOUNT_PATH.to_string(),
            read_only: Some(true),
            ..VolumeMount::default()
        });
    }
    if values.ca_certificates.is_some() {
        volumes.push(Volume {
            name: "ca-certificates".to_string(),
            config_map: Some(ConfigMapVolumeSource {
                name: CA_CERTIFICATES_CONFIG_MAP_NAME.to_string(),
                ..ConfigMapVolumeSource::default()
            }),
            ..Volume::default()
        });
        volume_mounts.push(VolumeMount {
            name: "ca-certificates".to_string(),
            mount_path: CA_CERTIFICATES_MOUNT_PATH.to_string(),
            read_only: Some(true),
            ..VolumeMount::default()
        });
        env.push(EnvVar {
            name: "LEGO_CA_CERTIFICATES".to_string(),
            value: Some(format!("{CA_CERTIFICATES_MOUNT_PATH}/bundle.pem")),
            ..EnvVar::default()
        });
    }

    let mut pod_labels = standard_labels();
    pod_labels.insert(
        "networking.gardener.cloud/to-dns".to_string(),
        "allowed".to_string(),
    );
    pod_labels.insert(
        "networking.gardener.cloud/to-public-networks".to_string(),
        "allowed".to_string(),
    );
    pod_labels.insert(
        "networking.gardener.cloud/to-runtime-apiserver".to_string(),
        "allowed".to_string(),
    );

    Deployment {
        metadata: metadata(values, CERT_MANAGEMENT_NAME),
        spec: Some(DeploymentSpec {
            replicas: Some(values.replicas),
            revision_history_limit: Some(2),
            selector: LabelSelector {
                match_labels: Some(standard_labels()),
                ..LabelSelector::default()
            },
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(pod_labels),
                    annotations: Some(BTreeMap::from([(
                        "checksum/issuers".to_string(),
                        issuers_checksum.to_string(),
                    )])),
                    ..ObjectMeta::default()
                }),
                spec: Some(PodSpec {
                    service_account_name: Some(CERT_MANAGEMENT_NAME.to_string()),
                    priority_class_name: Some("gardener-system-200".to_string()),
                    containers: vec![Container {
                        name: CERT_MANAGEMENT_NAME.to_string(),
                        image: Some(values.image.clone()),
                        image_pull_policy: Some("IfNotPresent".to_string()),
                        args: Some(container_args(values)),
                        ports: Some(vec![ContainerPort {
                            name: Some("metrics".to_string()),
                            container_port: METRICS_PORT,
                            protocol: Some("TCP".to_string()),
                            ..ContainerPort::default()
                        }]),
                        env: (!env.is_empty()).then_some(env),
                        liveness_probe: Some(Probe {
                            http_get: Some(HTTPGetAction {
                                path: Some("/healthz".to_string()),
                                port: IntOrString::Int(METRICS_PORT),
                                scheme: Some("HTTP".to_string()),
                                ..HTTPGetAction::default()
                            }),
                            initial_delay_seconds: Some(30),
                            timeout_seconds: Some(5),
                            ..Probe::default()
                        }),
                        resources: Some(ResourceRequirements {
                            requests: Some(BTreeMap::from([
                                ("cpu".to_string(), Quantity("10m".to_string())),
                                ("memory".to_string(), Quantity("64Mi".to_string())),
                            ])),
                            limits: Some(BTreeMap::from([(
                                "memory".to_string(),
                                Quantity("512Mi".to_string()),
                            )])),
                            ..ResourceRequirements::default()
                        }),
                        volume_mounts: (!volume_mounts.is_empty()).then_some(volume_mounts),
                        ..Container::default()
                    }],
                    volumes: (!volumes.is_empty()).then_some(volumes),
                    ..PodSpec::default()
                }),
            },
            ..DeploymentSpec::default()
        }),
        ..Deployment::default()
    }
}

pub fn vertical_pod_autoscaler(values: &Values) -> VerticalPodAutoscaler {
    let mut vpa = VerticalPodAutoscaler::new(
        CERT_MANAGEMENT_NAME,
        VerticalPodAutoscalerSpec {
            target_ref: k8s_openapi::api::autoscaling::v1::CrossVersionObjectReference {
                api_version: Some("apps/v1".to_string()),
                kind: "Deployment".to_string(),
                name: CERT_MANAGEMENT_NAME.to_string(),
            },
            update_policy: Some(VpaUpdatePolicy {
                update_mode: Some("Auto".to_string()),
            }),
            resource_policy: Some(VpaResourcePolicy {
                container_policies: vec![ContainerResourcePolicy {
                    container_name: Some(CERT_MANAGEMENT_NAME.to_string()),
                    min_allowed: Some(BTreeMap::from([(
                        "memory".to_string(),
                        Quantity("20Mi".to_string()),
                    )])),
                }],
            }),
        },
    );
    vpa.metadata.namespace = Some(values.namespace.clone());
    vpa.metadata.labels = Some(standard_labels());
    vpa
}

pub fn pod_disruption_budget(values: &Values) -> PodDisruptionBudget {
    PodDisruptionBudget {
        metadata: metadata(values, CERT_MANAGEMENT_NAME),
        spec: Some(PodDisruptionBudgetSpec {
            max_unavailable: Some(IntOrString::Int(1)),
            selector: Some(LabelSelector {
                match_labels: Some(standard_labels()),
                ..LabelSelector::default()
            }),
            ..PodDisruptionBudgetSpec::default()
        }),
        ..PodDisruptionBudget::default()
    }
}

/// Admits metrics traffic only from namespaces carrying the configured match
/// label. Returns `None` when no label is configured.
pub fn network_policy(values: &Values) -> Option<NetworkPolicy> {
    let match_label = values.namespace_match_label.clone()?;
    Some(NetworkPolicy {
        metadata: metadata(values, "allow-cert-controller-manager"),
        spec: Some(NetworkPolicySpec {
            pod_selector: LabelSelector {
                match_labels: Some(standard_labels()),
                ..LabelSelector::default()
            },
            ingress: Some(vec![NetworkPolicyIngressRule {
                from: Some(vec![NetworkPolicyPeer {
                    namespace_selector: Some(LabelSelector {
                        match_labels: Some(match_label),
                        ..LabelSelector::default()
                    }),
                    ..NetworkPolicyPeer::default()
                }]),
                ports: Some(vec![NetworkPolicyPort {
                    port: Some(IntOrString::Int(METRICS_PORT)),
                    protocol: Some("TCP".to_string()),
                    ..NetworkPolicyPort::default()
                }]),
            }]),
            policy_types: Some(vec!["Ingress".to_string()]),
            ..NetworkPolicySpec::default()
        }),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::{AcmeConfig, Configuration, ImageRef, PrivateKeyDefaults, ShootIssuersConfig},
        crd::v1alpha1::{CertConfig, DnsChallengeOnShoot},
        values::{CertClass, DeploymentContext},
    };

    fn build_values(
        mutate_config: impl FnOnce(&mut Configuration),
        mutate_cert_config: impl FnOnce(&mut CertConfig),
    ) -> Values {
        let mut config = Configuration {
            issuer_name: "garden".to_string(),
            restrict_issuer: true,
            default_requests_per_day_quota: Some(100),
            acme: Some(AcmeConfig {
                email: "foo@example.com".to_string(),
                server: "https://acme-v02.api.letsencrypt.org/directory".to_string(),
                precheck_nameservers: Some("8.8.8.8".to_string()),
                propagation_timeout: Some("120s".to_string()),
                deactivate_authorizations: Some(true),
                ..AcmeConfig::default()
            }),
            image: Some(ImageRef {
                repository: "registry.example.com/cert-controller-manager".to_string(),
                tag: "v0.17.4".to_string(),
            }),
            ..Configuration::default()
        };
        mutate_config(&mut config);
        let mut cert_config = CertConfig::default();
        mutate_cert_config(&mut cert_config);
        Values::build(
            &config,
            &cert_config,
            DeploymentContext {
                namespace: "shoot--core--test".to_string(),
                cert_class: CertClass::Shoot,
                restricted_domain: Some("test.core.example.com".to_string()),
                referenced_resources: Vec::new(),
                hibernated: false,
                generic_kubeconfig_secret_name: Some("generic-token-kubeconfig".to_string()),
                seed_name: None,
            },
        )
        .unwrap()
        .unwrap()
    }

    #[test]
    fn args_are_emitted_in_contract_order() {
        let values = build_values(
            |config| {
                config.shoot_issuers = Some(ShootIssuersConfig { enabled: true });
                config.private_key_defaults = Some(PrivateKeyDefaults {
                    algorithm: None,
                    rsa_key_size: None,
                    ecdsa_key_size: None,
                });
            },
            |cert_config| {
                cert_config.dns_challenge_on_shoot = Some(DnsChallengeOnShoot {
                    enabled: true,
                    namespace: "kube-system".to_string(),
                    dns_class: Some("gardendns".to_string()),
                });
            },
        );
        assert_eq!(
            container_args(&values),
            vec![
                "--name=cert-controller-manager",
                "--namespace=shoot--core--test",
                "--target-kubeconfig=/var/run/secrets/gardener.cloud/shoot/generic-kubeconfig/kubeconfig",
                "--issuer.issuer-namespace=shoot--core--test",
                "--issuer.default-issuer=garden",
                "--issuer.default-requests-per-day-quota=100",
                "--issuer.default-issuer-domain-ranges=test.core.example.com",
                "--issuer.precheck-nameservers=8.8.8.8",
                "--issuer.dns-namespace=kube-system",
                "--issuer.dns-class=gardendns",
                "--server-port-http=10258",
                "--pool.size=2",
                "--propagation-timeout=120s",
                "--issuer.allow-target-issuers",
                "--acme-deactivate-authorizations",
                "--lease-name=shoot-cert-service",
                "--lease-resource-lock=leases",
                "--deploy-crds=false",
                "--default-private-key-algorithm=RSA",
                "--default-rsa-private-key-size=3072",
                "--default-ecdsa-private-key-size=384",
            ]
        );
    }

    #[test]
    fn dns_records_are_used_without_shoot_challenges() {
        let values = build_values(|_| {}, |_| {});
        let args = container_args(&values);
        assert!(args.contains(&"--use-dnsrecords=true".to_string()));
        assert!(!args.iter().any(|a| a.starts_with("--issuer.dns-namespace")));
    }

    #[test]
    fn checksum_lands_in_pod_template_annotation() {
        let values = build_values(|_| {}, |_| {});
        let deployment = deployment(&values, "abc123");
        let annotations = deployment
            .spec
            .unwrap()
            .template
            .metadata
            .unwrap()
            .annotations
            .unwrap();
        assert_eq!(annotations.get("checksum/issuers").unwrap(), "abc123");
    }

    #[test]
    fn ca_bundle_must_be_pem() {
        let values = build_values(
            |config| {
                config.acme.as_mut().unwrap().ca_certificates = Some("not a pem".to_string());
            },
            |_| {},
        );
        assert!(matches!(
            ca_certificates_config_map(&values),
            Err(Error::MalformedCaCertificates)
        ));

        let values = build_values(
            |config| {
                config.acme.as_mut().unwrap().ca_certificates =
                    Some("-----BEGIN CERTIFICATE-----\nMIIB\n-----END CERTIFICATE-----\n".to_string());
            },
            |_| {},
        );
        let config_map = ca_certificates_config_map(&values).unwrap().unwrap();
        assert!(config_map.data.unwrap().contains_key("bundle.pem"));
    }

    #[test]
    fn network_policy_requires_namespace_match_label() {
        let values = build_values(|_| {}, |_| {});
        assert!(network_policy(&values).is_none());

        let values = build_values(
            |config| {
                config.namespace_match_label = Some(BTreeMap::from([(
                    "gardener.cloud/role".to_string(),
                    "shoot".to_string(),
                )]));
            },
            |_| {},
        );
        let policy = network_policy(&values).unwrap();
        let spec = policy.spec.unwrap();
        assert_eq!(spec.policy_types, Some(vec!["Ingress".to_string()]));
    }
}
