use serde::{Deserialize, Serialize};

pub const API_VERSION: &str = "service.cert.extensions.gardener.cloud/v1alpha1";
pub const KIND: &str = "CertConfig";

/// Per-shoot configuration of the cert service, embedded in the `Extension`
/// resource. Re-decoded on every reconcile, never persisted.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CertConfig {
    /// Additional issuers deployed next to the extension-wide default issuer.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub issuers: Vec<IssuerConfig>,

    /// Where DNS01 challenge records are written.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dns_challenge_on_shoot: Option<DnsChallengeOnShoot>,

    /// Per-shoot override for allowing issuers in the shoot cluster itself.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shoot_issuers: Option<ShootIssuers>,

    /// Comma-separated `host[:port]` list, merged with the extension-wide
    /// default nameservers.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub precheck_nameservers: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub alerting: Option<Alerting>,

    /// Garden-runtime only: also request a certificate for the control plane.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generate_control_plane_certificate: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub dns_class: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IssuerConfig {
    pub name: String,
    pub server: String,
    pub email: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub requests_per_day_quota: Option<u32>,

    /// Name of a declared resource reference pointing at the ACME account key
    /// secret. Resolved against the shoot's referenced resources.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub private_key_secret_name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_account_binding: Option<ExternalAccountBinding>,

    #[serde(
        rename = "skipDNSChallengeValidation",
        skip_serializing_if = "Option::is_none"
    )]
    pub skip_dns_challenge_validation: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub domains: Option<DomainSelection>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub precheck_nameservers: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExternalAccountBinding {
    pub key_id: String,
    /// Name of a declared resource reference pointing at the EAB HMAC key secret.
    pub key_secret_name: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DomainSelection {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub include: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exclude: Vec<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DnsChallengeOnShoot {
    pub enabled: bool,
    #[serde(default)]
    pub namespace: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dns_class: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ShootIssuers {
    pub enabled: bool,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Alerting {
    /// Days before expiration at which the certificate alert fires.
    /// Zero disables alerting.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cert_expiration_alert_days: Option<u32>,
}
