//! Extension-wide service configuration, loaded once at process start.

use std::{collections::BTreeMap, path::Path};

use serde::{Deserialize, Serialize};
use snafu::{ResultExt, Snafu};

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("failed to read configuration file {path}"))]
    ReadFile {
        source: std::io::Error,
        path: String,
    },

    #[snafu(display("failed to parse configuration file {path}"))]
    ParseFile {
        source: serde_yaml::Error,
        path: String,
    },
}

/// Defaults applied to every deployment of the cert service. Immutable after
/// startup; per-shoot overrides come from the decoded
/// [`CertConfig`](crate::crd::v1alpha1::CertConfig).
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Configuration {
    /// Name of the default issuer every deployment carries.
    pub issuer_name: String,

    /// Restrict the default issuer to the shoot's own domain.
    #[serde(default)]
    pub restrict_issuer: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_requests_per_day_quota: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub acme: Option<AcmeConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub ca: Option<CaConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub shoot_issuers: Option<ShootIssuersConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub private_key_defaults: Option<PrivateKeyDefaults>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub health_check: Option<HealthCheckConfig>,

    /// When set, the seed deployment gets a NetworkPolicy admitting traffic
    /// only from namespaces carrying these labels.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace_match_label: Option<BTreeMap<String, String>>,

    /// cert-controller-manager image. Deployments fail when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<ImageRef>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AcmeConfig {
    pub email: String,
    pub server: String,

    /// ACME account private key in PEM form. When absent, cert-management
    /// registers an account itself.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub private_key: Option<String>,

    /// DNS01 propagation timeout, e.g. `120s`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub propagation_timeout: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub precheck_nameservers: Option<String>,

    /// PEM bundle of additional CA certificates trusted for ACME endpoints.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ca_certificates: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub deactivate_authorizations: Option<bool>,

    #[serde(
        rename = "skipDNSChallengeValidation",
        skip_serializing_if = "Option::is_none"
    )]
    pub skip_dns_challenge_validation: Option<bool>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CaConfig {
    /// Issuing certificate, PEM.
    pub certificate: String,
    /// Key of the issuing certificate, PEM.
    pub certificate_key: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub ca_certificates: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ShootIssuersConfig {
    pub enabled: bool,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PrivateKeyDefaults {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub algorithm: Option<PrivateKeyAlgorithm>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rsa_key_size: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ecdsa_key_size: Option<u32>,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum PrivateKeyAlgorithm {
    #[serde(rename = "RSA")]
    Rsa,
    #[serde(rename = "ECDSA")]
    Ecdsa,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HealthCheckConfig {
    /// Interval between health-check reconciles of deployed components.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sync_period_seconds: Option<u64>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ImageRef {
    pub repository: String,
    pub tag: String,
}

impl ImageRef {
    pub fn to_image_string(&self) -> String {
        format!("{}:{}", self.repository, self.tag)
    }
}

impl Configuration {
    pub fn load(path: &Path) -> Result<Self, Error> {
        let path_str = path.display().to_string();
        let raw = std::fs::read_to_string(path).context(ReadFileSnafu { path: &path_str })?;
        serde_yaml::from_str(&raw).context(ParseFileSnafu { path: &path_str })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_configuration() {
        let config: Configuration = serde_yaml::from_str(
            r#"
issuerName: garden
restrictIssuer: true
defaultRequestsPerDayQuota: 50
acme:
  email: ops@example.com
  server: https://acme-v02.api.letsencrypt.org/directory
  propagationTimeout: 120s
  precheckNameservers: "8.8.8.8,8.8.4.4"
  deactivateAuthorizations: true
shootIssuers:
  enabled: true
privateKeyDefaults:
  algorithm: ECDSA
  ecdsaKeySize: 384
namespaceMatchLabel:
  gardener.cloud/role: shoot
image:
  repository: europe-docker.pkg.dev/gardener-project/releases/cert-controller-manager
  tag: v0.17.4
"#,
        )
        .unwrap();
        assert_eq!(config.issuer_name, "garden");
        assert!(config.restrict_issuer);
        assert_eq!(config.default_requests_per_day_quota, Some(50));
        let acme = config.acme.unwrap();
        assert_eq!(acme.deactivate_authorizations, Some(true));
        assert_eq!(
            config.private_key_defaults.unwrap().algorithm,
            Some(PrivateKeyAlgorithm::Ecdsa)
        );
        assert_eq!(
            config.image.unwrap().to_image_string(),
            "europe-docker.pkg.dev/gardener-project/releases/cert-controller-manager:v0.17.4"
        );
    }

    #[test]
    fn minimal_configuration_defaults() {
        let config: Configuration = serde_yaml::from_str("issuerName: garden").unwrap();
        assert!(!config.restrict_issuer);
        assert!(config.acme.is_none());
        assert!(config.ca.is_none());
    }
}
