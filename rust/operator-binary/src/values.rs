//! Merges the extension-wide [`Configuration`] with the per-deployment
//! [`CertConfig`] into the single `Values` struct the deployer renders from.

use std::collections::BTreeMap;

use snafu::Snafu;

use crate::{
    config::{AcmeConfig, CaConfig, Configuration, PrivateKeyDefaults},
    crd::v1alpha1::{CertConfig, DnsChallengeOnShoot, IssuerConfig},
    external_crd::extensions::NamedResourceReference,
};

/// Alerting default when the deployment does not set its own value.
pub const DEFAULT_CERT_EXPIRATION_ALERT_DAYS: u32 = 15;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("no cert-controller-manager image is configured"))]
    MissingImage,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum CertClass {
    Shoot,
    Seed,
    Garden,
}

impl CertClass {
    pub fn is_shoot(&self) -> bool {
        matches!(self, CertClass::Shoot)
    }
}

/// Everything the deployer needs to know about where it is deploying to.
#[derive(Clone, Debug)]
pub struct DeploymentContext {
    pub namespace: String,
    pub cert_class: CertClass,
    /// Domain the default issuer is restricted to, when known.
    pub restricted_domain: Option<String>,
    /// Resource references declared on the shoot.
    pub referenced_resources: Vec<NamedResourceReference>,
    pub hibernated: bool,
    /// Secret holding the kubeconfig for the target cluster.
    pub generic_kubeconfig_secret_name: Option<String>,
    pub seed_name: Option<String>,
}

/// Fully merged deployment parameters, rebuilt from scratch on every reconcile.
#[derive(Clone, Debug)]
pub struct Values {
    pub namespace: String,
    pub cert_class: CertClass,
    pub image: String,
    pub replicas: i32,

    pub issuer_name: String,
    pub restricted_issuer: bool,
    pub restricted_domain: Option<String>,
    pub default_requests_per_day_quota: Option<u32>,
    pub acme: Option<AcmeConfig>,
    pub ca: Option<CaConfig>,

    /// Additional issuers requested by the shoot, still unresolved.
    pub extra_issuers: Vec<IssuerConfig>,
    pub shoot_issuers_enabled: bool,
    pub dns_challenge_on_shoot: Option<DnsChallengeOnShoot>,
    pub dns_class: Option<String>,

    pub precheck_nameservers: Option<String>,
    pub ca_certificates: Option<String>,
    pub deactivate_authorizations: bool,
    pub propagation_timeout: Option<String>,
    pub cert_expiration_alert_days: u32,
    pub private_key_defaults: Option<PrivateKeyDefaults>,
    pub generate_control_plane_certificate: bool,

    pub referenced_resources: Vec<NamedResourceReference>,
    pub generic_kubeconfig_secret_name: Option<String>,
    pub namespace_match_label: Option<BTreeMap<String, String>>,
    pub seed_name: Option<String>,
}

impl Values {
    /// Assembles the deployment values. Returns `Ok(None)` when the issuer is
    /// restricted but no shoot domain is known yet; the caller is expected to
    /// skip the reconcile and retry once the domain shows up.
    pub fn build(
        config: &Configuration,
        cert_config: &CertConfig,
        context: DeploymentContext,
    ) -> Result<Option<Self>, Error> {
        let image = config
            .image
            .as_ref()
            .ok_or(Error::MissingImage)?
            .to_image_string();

        let restricted_issuer = config.restrict_issuer && context.restricted_domain.is_some();
        if config.restrict_issuer && context.restricted_domain.is_none() {
            tracing::info!(
                namespace = %context.namespace,
                "issuer is restricted but the shoot domain is not yet known, skipping deployment"
            );
            return Ok(None);
        }

        let acme = config.acme.as_ref();
        let precheck_nameservers = merge_precheck_nameservers(
            cert_config.precheck_nameservers.as_deref(),
            acme.and_then(|a| a.precheck_nameservers.as_deref()),
        );
        let ca_certificates = acme
            .and_then(|a| a.ca_certificates.clone())
            .or_else(|| config.ca.as_ref().and_then(|ca| ca.ca_certificates.clone()));

        let shoot_issuers_enabled = cert_config
            .shoot_issuers
            .as_ref()
            .map(|s| s.enabled)
            .or(config.shoot_issuers.as_ref().map(|s| s.enabled))
            .unwrap_or(false);

        Ok(Some(Self {
            namespace: context.namespace,
            cert_class: context.cert_class,
            image,
            replicas: if context.hibernated { 0 } else { 1 },
            issuer_name: config.issuer_name.clone(),
            restricted_issuer,
            restricted_domain: context.restricted_domain,
            default_requests_per_day_quota: config.default_requests_per_day_quota,
            acme: config.acme.clone(),
            ca: config.ca.clone(),
            extra_issuers: cert_config.issuers.clone(),
            shoot_issuers_enabled,
            dns_challenge_on_shoot: cert_config.dns_challenge_on_shoot.clone(),
            dns_class: cert_config.dns_class.clone(),
            precheck_nameservers,
            ca_certificates,
            deactivate_authorizations: acme
                .and_then(|a| a.deactivate_authorizations)
                .unwrap_or(false),
            propagation_timeout: acme.and_then(|a| a.propagation_timeout.clone()),
            cert_expiration_alert_days: cert_config
                .alerting
                .as_ref()
                .and_then(|a| a.cert_expiration_alert_days)
                .unwrap_or(DEFAULT_CERT_EXPIRATION_ALERT_DAYS),
            private_key_defaults: config.private_key_defaults.clone(),
            generate_control_plane_certificate: cert_config
                .generate_control_plane_certificate
                .unwrap_or(false),
            referenced_resources: context.referenced_resources,
            generic_kubeconfig_secret_name: context.generic_kubeconfig_secret_name,
            namespace_match_label: config.namespace_match_label.clone(),
            seed_name: context.seed_name,
        }))
    }
}

/// Merges two comma-separated nameserver lists, deduplicating by exact string
/// equality while preserving first-seen order.
pub fn merge_precheck_nameservers(
    deployment: Option<&str>,
    default: Option<&str>,
) -> Option<String> {
    let mut merged: Vec<&str> = Vec::new();
    for list in [deployment, default].into_iter().flatten() {
        for server in list.split(',') {
            if !server.is_empty() && !merged.contains(&server) {
                merged.push(server);
            }
        }
    }
    if merged.is_empty() {
        None
    } else {
        Some(merged.join(","))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ImageRef;

    fn base_config() -> Configuration {
        Configuration {
            issuer_name: "garden".to_string(),
            acme: Some(AcmeConfig {
                email: "ops@example.com".to_string(),
                server: "https://acme-v02.api.letsencrypt.org/directory".to_string(),
                ..AcmeConfig::default()
            }),
            image: Some(ImageRef {
                repository: "registry.example.com/cert-controller-manager".to_string(),
                tag: "v0.17.4".to_string(),
            }),
            ..Configuration::default()
        }
    }

    fn context() -> DeploymentContext {
        DeploymentContext {
            namespace: "shoot--core--test".to_string(),
            cert_class: CertClass::Shoot,
            restricted_domain: None,
            referenced_resources: Vec::new(),
            hibernated: false,
            generic_kubeconfig_secret_name: Some("generic-token-kubeconfig".to_string()),
            seed_name: None,
        }
    }

    #[test]
    fn merge_deduplicates_preserving_first_seen_order() {
        assert_eq!(
            merge_precheck_nameservers(Some("8.8.8.8,8.8.4.4"), Some("8.8.4.4")),
            Some("8.8.8.8,8.8.4.4".to_string())
        );
    }

    #[test]
    fn merge_is_idempotent() {
        let merged = merge_precheck_nameservers(Some("8.8.8.8,8.8.4.4"), Some("8.8.4.4")).unwrap();
        assert_eq!(
            merge_precheck_nameservers(Some(&merged), Some(&merged)),
            Some(merged.clone())
        );
    }

    #[test]
    fn merge_of_nothing_is_none() {
        assert_eq!(merge_precheck_nameservers(None, None), None);
        assert_eq!(merge_precheck_nameservers(Some(""), None), None);
    }

    #[test]
    fn hibernated_cluster_gets_zero_replicas() {
        let values = Values::build(
            &base_config(),
            &CertConfig::default(),
            DeploymentContext {
                hibernated: true,
                ..context()
            },
        )
        .unwrap()
        .unwrap();
        assert_eq!(values.replicas, 0);
    }

    #[test]
    fn restricted_issuer_without_domain_skips_deployment() {
        let config = Configuration {
            restrict_issuer: true,
            ..base_config()
        };
        let values = Values::build(&config, &CertConfig::default(), context()).unwrap();
        assert!(values.is_none());

        let values = Values::build(
            &config,
            &CertConfig::default(),
            DeploymentContext {
                restricted_domain: Some("test.core.example.com".to_string()),
                ..context()
            },
        )
        .unwrap()
        .unwrap();
        assert!(values.restricted_issuer);
        assert_eq!(
            values.restricted_domain.as_deref(),
            Some("test.core.example.com")
        );
    }

    #[test]
    fn missing_image_is_an_error() {
        let config = Configuration {
            image: None,
            ..base_config()
        };
        assert!(matches!(
            Values::build(&config, &CertConfig::default(), context()),
            Err(Error::MissingImage)
        ));
    }

    #[test]
    fn alert_days_default_and_explicit_zero() {
        let values = Values::build(&base_config(), &CertConfig::default(), context())
            .unwrap()
            .unwrap();
        assert_eq!(
            values.cert_expiration_alert_days,
            DEFAULT_CERT_EXPIRATION_ALERT_DAYS
        );

        let cert_config = CertConfig {
            alerting: Some(crate::crd::v1alpha1::Alerting {
                cert_expiration_alert_days: Some(0),
            }),
            ..CertConfig::default()
        };
        let values = Values::build(&base_config(), &cert_config, context())
            .unwrap()
            .unwrap();
        assert_eq!(values.cert_expiration_alert_days, 0);
    }

    #[test]
    fn ca_certificates_fall_back_from_acme_to_ca() {
        let mut config = base_config();
        config.acme.as_mut().unwrap().ca_certificates = Some("acme-bundle".to_string());
        config.ca = Some(CaConfig {
            certificate: "cert".to_string(),
            certificate_key: "key".to_string(),
            ca_certificates: Some("ca-bundle".to_string()),
        });
        let values = Values::build(&config, &CertConfig::default(), context())
            .unwrap()
            .unwrap();
        assert_eq!(values.ca_certificates.as_deref(), Some("acme-bundle"));

        config.acme.as_mut().unwrap().ca_certificates = None;
        let values = Values::build(&config, &CertConfig::default(), context())
            .unwrap()
            .unwrap();
        assert_eq!(values.ca_certificates.as_deref(), Some("ca-bundle"));
    }
}
