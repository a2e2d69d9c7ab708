//! CRDs owned by [cert-management](https://github.com/gardener/cert-management),
//! the certificate controller this extension deploys and configures.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

// Redefine SecretReference instead of reusing k8s-openapi's, in order to make the name mandatory.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SecretReference {
    pub name: String,
    pub namespace: Option<String>,
}

/// See <https://github.com/gardener/cert-management#setting-up-issuers>.
#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, PartialEq, JsonSchema)]
#[kube(
    group = "cert.gardener.cloud",
    version = "v1alpha1",
    kind = "Issuer",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct IssuerSpec {
    pub acme: Option<AcmeSpec>,
    pub ca: Option<CaSpec>,
    pub requests_per_day_quota: Option<u32>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AcmeSpec {
    pub server: String,
    pub email: String,

    /// Let cert-management generate and persist the account private key itself.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_registration: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub private_key_secret_ref: Option<SecretReference>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_account_binding: Option<ExternalAccountBinding>,

    #[serde(
        rename = "skipDNSChallengeValidation",
        skip_serializing_if = "Option::is_none"
    )]
    pub skip_dns_challenge_validation: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub domains: Option<DnsSelection>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub precheck_nameservers: Option<Vec<String>>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExternalAccountBinding {
    pub key_id: String,
    pub key_secret_ref: SecretReference,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DnsSelection {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub include: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exclude: Vec<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CaSpec {
    pub private_key_secret_ref: SecretReference,
}

/// See <https://github.com/gardener/cert-management#requesting-a-certificate>.
#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, PartialEq, JsonSchema)]
#[kube(
    group = "cert.gardener.cloud",
    version = "v1alpha1",
    kind = "Certificate",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct CertificateSpec {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub common_name: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dns_names: Vec<String>,

    /// Target secret the issued certificate is written to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret_name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub issuer_ref: Option<IssuerRef>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct IssuerRef {
    pub name: String,
    pub namespace: Option<String>,
}
