//! Accumulating validation of the provider config and the service configuration.
//!
//! Validation never fails fast: a single pass collects every problem so the
//! user sees all of them at once.

use std::{
    collections::HashSet,
    fmt::{self, Display},
    net::IpAddr,
    sync::LazyLock,
};

use regex::Regex;
use url::Url;

use crate::{
    config::Configuration,
    crd::v1alpha1::CertConfig,
    external_crd::extensions::NamedResourceReference,
};

// Intentionally permissive, full RFC 5322 conformance is the ACME server's problem.
static EMAIL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("valid email pattern"));

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    Required,
    Invalid,
    Duplicate,
    NotFound,
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ErrorKind::Required => "Required value",
            ErrorKind::Invalid => "Invalid value",
            ErrorKind::Duplicate => "Duplicate value",
            ErrorKind::NotFound => "Not found",
        })
    }
}

/// A single validation finding, scoped to the config field that caused it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldError {
    pub path: String,
    pub kind: ErrorKind,
    pub detail: String,
}

impl FieldError {
    fn new(path: impl Into<String>, kind: ErrorKind, detail: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            kind,
            detail: detail.into(),
        }
    }
}

impl Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}: {}", self.path, self.kind, self.detail)
    }
}

/// The aggregate of all findings of one validation pass.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ValidationErrors(pub Vec<FieldError>);

impl Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for error in &self.0 {
            if !first {
                f.write_str("; ")?;
            }
            first = false;
            write!(f, "{error}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

/// Validates the decoded per-shoot [`CertConfig`] against the shoot's declared
/// resource references. An empty result means the config is valid.
pub fn validate_cert_config(
    config: &CertConfig,
    references: &[NamedResourceReference],
) -> Vec<FieldError> {
    let mut errors = Vec::new();
    let mut seen_names = HashSet::new();

    for (i, issuer) in config.issuers.iter().enumerate() {
        let path = |field: &str| format!("issuers[{i}].{field}");

        if issuer.name.is_empty() {
            errors.push(FieldError::new(
                path("name"),
                ErrorKind::Required,
                "issuer name must not be empty",
            ));
        } else if !seen_names.insert(issuer.name.clone()) {
            errors.push(FieldError::new(
                path("name"),
                ErrorKind::Duplicate,
                format!("{:?}", issuer.name),
            ));
        }

        if Url::parse(&issuer.server).is_err() {
            errors.push(FieldError::new(
                path("server"),
                ErrorKind::Invalid,
                format!("{:?} must be a valid absolute URL", issuer.server),
            ));
        }
        if !EMAIL_PATTERN.is_match(&issuer.email) {
            errors.push(FieldError::new(
                path("email"),
                ErrorKind::Invalid,
                format!("{:?} must be a valid email address", issuer.email),
            ));
        }

        if let Some(secret_name) = &issuer.private_key_secret_name {
            if let Err(detail) = check_secret_reference(references, secret_name) {
                errors.push(FieldError::new(
                    path("privateKeySecretName"),
                    ErrorKind::NotFound,
                    detail,
                ));
            }
        }
        if let Some(eab) = &issuer.external_account_binding {
            if eab.key_id.is_empty() {
                errors.push(FieldError::new(
                    path("externalAccountBinding.keyID"),
                    ErrorKind::Required,
                    "keyID must not be empty",
                ));
            }
            if let Err(detail) = check_secret_reference(references, &eab.key_secret_name) {
                errors.push(FieldError::new(
                    path("externalAccountBinding.keySecretName"),
                    ErrorKind::NotFound,
                    detail,
                ));
            }
        }
        if issuer.skip_dns_challenge_validation == Some(true)
            && issuer.external_account_binding.is_none()
        {
            errors.push(FieldError::new(
                path("skipDNSChallengeValidation"),
                ErrorKind::Invalid,
                "is only allowed together with an external account binding",
            ));
        }

        if issuer.requests_per_day_quota == Some(0) {
            errors.push(FieldError::new(
                path("requestsPerDayQuota"),
                ErrorKind::Invalid,
                "must be at least 1",
            ));
        }

        if let Some(nameservers) = &issuer.precheck_nameservers {
            validate_precheck_nameservers(&path("precheckNameservers"), nameservers, &mut errors);
        }
    }

    if let Some(nameservers) = &config.precheck_nameservers {
        validate_precheck_nameservers("precheckNameservers", nameservers, &mut errors);
    }

    if let Some(dns) = &config.dns_challenge_on_shoot {
        if dns.enabled && dns.namespace.is_empty() {
            errors.push(FieldError::new(
                "dnsChallengeOnShoot.namespace",
                ErrorKind::Required,
                "namespace must not be empty when DNS challenges run on the shoot",
            ));
        }
    }

    errors
}

/// Startup validation of the extension-wide service [`Configuration`].
pub fn validate_configuration(config: &Configuration) -> Vec<FieldError> {
    let mut errors = Vec::new();

    if config.issuer_name.is_empty() {
        errors.push(FieldError::new(
            "issuerName",
            ErrorKind::Required,
            "issuer name must not be empty",
        ));
    }
    if config.acme.is_none() && config.ca.is_none() {
        errors.push(FieldError::new(
            "acme",
            ErrorKind::Required,
            "either an acme or a ca block must be configured for the default issuer",
        ));
    }
    if config.default_requests_per_day_quota == Some(0) {
        errors.push(FieldError::new(
            "defaultRequestsPerDayQuota",
            ErrorKind::Invalid,
            "must be at least 1",
        ));
    }

    if let Some(acme) = &config.acme {
        if Url::parse(&acme.server).is_err() {
            errors.push(FieldError::new(
                "acme.server",
                ErrorKind::Invalid,
                format!("{:?} must be a valid absolute URL", acme.server),
            ));
        }
        if !EMAIL_PATTERN.is_match(&acme.email) {
            errors.push(FieldError::new(
                "acme.email",
                ErrorKind::Invalid,
                format!("{:?} must be a valid email address", acme.email),
            ));
        }
        if let Some(nameservers) = &acme.precheck_nameservers {
            validate_precheck_nameservers("acme.precheckNameservers", nameservers, &mut errors);
        }
    }
    if let Some(ca) = &config.ca {
        if ca.certificate.is_empty() {
            errors.push(FieldError::new(
                "ca.certificate",
                ErrorKind::Required,
                "certificate must not be empty",
            ));
        }
        if ca.certificate_key.is_empty() {
            errors.push(FieldError::new(
                "ca.certificateKey",
                ErrorKind::Required,
                "certificate key must not be empty",
            ));
        }
    }
    if let Some(defaults) = &config.private_key_defaults {
        if let Some(size) = defaults.rsa_key_size {
            if ![2048, 3072, 4096].contains(&size) {
                errors.push(FieldError::new(
                    "privateKeyDefaults.rsaKeySize",
                    ErrorKind::Invalid,
                    "must be one of 2048, 3072, 4096",
                ));
            }
        }
        if let Some(size) = defaults.ecdsa_key_size {
            if ![256, 384].contains(&size) {
                errors.push(FieldError::new(
                    "privateKeyDefaults.ecdsaKeySize",
                    ErrorKind::Invalid,
                    "must be one of 256, 384",
                ));
            }
        }
    }

    errors
}

fn check_secret_reference(
    references: &[NamedResourceReference],
    name: &str,
) -> Result<(), String> {
    match references.iter().find(|r| r.name == name) {
        None => Err(format!(
            "no resource reference named {name:?} is declared on the shoot"
        )),
        Some(reference) if reference.resource_ref.kind != "Secret" => Err(format!(
            "resource reference {name:?} must be of kind Secret, got {:?}",
            reference.resource_ref.kind
        )),
        Some(_) => Ok(()),
    }
}

/// Validates a comma-separated `host[:port]` nameserver list.
fn validate_precheck_nameservers(path: &str, nameservers: &str, errors: &mut Vec<FieldError>) {
    if nameservers.trim().is_empty() {
        errors.push(FieldError::new(
            path,
            ErrorKind::Invalid,
            "must contain at least one DNS server IP",
        ));
        return;
    }
    for server in nameservers.split(',') {
        if server.is_empty() {
            errors.push(FieldError::new(
                path,
                ErrorKind::Invalid,
                "must contain at least one DNS server IP",
            ));
            continue;
        }
        let (host, port) = split_host_port(server);
        if let Some(port) = port {
            match port.parse::<u32>() {
                Ok(1..=65535) => {}
                _ => errors.push(FieldError::new(
                    path,
                    ErrorKind::Invalid,
                    format!("{port:?} is not a valid port number"),
                )),
            }
        }
        if host.parse::<IpAddr>().is_err() && !is_dns1123_subdomain(host) {
            errors.push(FieldError::new(
                path,
                ErrorKind::Invalid,
                format!("{host:?} must be a valid IP address or DNS name"),
            ));
        }
    }
}

// Treats the suffix as a port only if it is all digits; a string that is a
// bare IP address (IPv6 included) is always a host.
fn split_host_port(server: &str) -> (&str, Option<&str>) {
    if server.parse::<IpAddr>().is_ok() {
        return (server, None);
    }
    match server.rsplit_once(':') {
        Some((host, port)) if !port.is_empty() && port.bytes().all(|b| b.is_ascii_digit()) => {
            let host = host
                .strip_prefix('[')
                .and_then(|h| h.strip_suffix(']'))
                .unwrap_or(host);
            (host, Some(port))
        }
        _ => (server, None),
    }
}

fn is_dns1123_subdomain(host: &str) -> bool {
    !host.is_empty()
        && host.len() <= 253
        && host.split('.').all(|label| {
            !label.is_empty()
                && label.len() <= 63
                && label
                    .bytes()
                    .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
                && !label.starts_with('-')
                && !label.ends_with('-')
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        crd::v1alpha1::{DnsChallengeOnShoot, ExternalAccountBinding, IssuerConfig},
        external_crd::extensions::CrossVersionObjectReference,
    };

    fn issuer(name: &str) -> IssuerConfig {
        IssuerConfig {
            name: name.to_string(),
            server: "https://acme-v02.api.letsencrypt.org/directory".to_string(),
            email: "ops@example.com".to_string(),
            ..IssuerConfig::default()
        }
    }

    fn secret_reference(name: &str, kind: &str) -> NamedResourceReference {
        NamedResourceReference {
            name: name.to_string(),
            resource_ref: CrossVersionObjectReference {
                api_version: Some("v1".to_string()),
                kind: kind.to_string(),
                name: format!("{name}-secret"),
            },
        }
    }

    #[test]
    fn well_formed_config_is_valid() {
        let config = CertConfig {
            issuers: vec![issuer("a"), issuer("b")],
            precheck_nameservers: Some("8.8.8.8,8.8.4.4:53".to_string()),
            dns_challenge_on_shoot: Some(DnsChallengeOnShoot {
                enabled: true,
                namespace: "kube-system".to_string(),
                dns_class: None,
            }),
            ..CertConfig::default()
        };
        assert_eq!(validate_cert_config(&config, &[]), vec![]);
    }

    #[test]
    fn duplicate_name_reported_against_later_occurrence() {
        let config = CertConfig {
            issuers: vec![issuer("dup"), issuer("dup")],
            ..CertConfig::default()
        };
        let errors = validate_cert_config(&config, &[]);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].path, "issuers[1].name");
        assert_eq!(errors[0].kind, ErrorKind::Duplicate);
    }

    #[test]
    fn zero_quota_is_invalid_one_is_valid() {
        let mut config = CertConfig {
            issuers: vec![issuer("a")],
            ..CertConfig::default()
        };
        config.issuers[0].requests_per_day_quota = Some(0);
        let errors = validate_cert_config(&config, &[]);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].path, "issuers[0].requestsPerDayQuota");
        assert_eq!(errors[0].kind, ErrorKind::Invalid);

        config.issuers[0].requests_per_day_quota = Some(1);
        assert_eq!(validate_cert_config(&config, &[]), vec![]);
    }

    #[test]
    fn bad_nameserver_host_and_port_yield_two_errors() {
        let config = CertConfig {
            issuers: vec![issuer("a")],
            precheck_nameservers: Some("dns.server.te%st,dns.server.test:123456".to_string()),
            ..CertConfig::default()
        };
        let errors = validate_cert_config(&config, &[]);
        assert_eq!(errors.len(), 2);
        assert!(errors.iter().all(|e| e.kind == ErrorKind::Invalid));
        assert!(errors[0].detail.contains("dns.server.te%st"));
        assert!(errors[1].detail.contains("123456"));
    }

    #[test]
    fn empty_nameservers_require_at_least_one_entry() {
        let config = CertConfig {
            precheck_nameservers: Some("".to_string()),
            ..CertConfig::default()
        };
        let errors = validate_cert_config(&config, &[]);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].detail, "must contain at least one DNS server IP");
    }

    #[test]
    fn ipv6_nameserver_is_accepted() {
        let config = CertConfig {
            precheck_nameservers: Some("2001:db8::53".to_string()),
            ..CertConfig::default()
        };
        assert_eq!(validate_cert_config(&config, &[]), vec![]);
    }

    #[test]
    fn secret_reference_must_be_declared_and_of_kind_secret() {
        let mut config = CertConfig {
            issuers: vec![issuer("a"), issuer("b")],
            ..CertConfig::default()
        };
        config.issuers[0].private_key_secret_name = Some("missing".to_string());
        config.issuers[1].private_key_secret_name = Some("wrong-kind".to_string());
        let references = vec![secret_reference("wrong-kind", "ConfigMap")];
        let errors = validate_cert_config(&config, &references);
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].path, "issuers[0].privateKeySecretName");
        assert_eq!(errors[0].kind, ErrorKind::NotFound);
        assert_eq!(errors[1].path, "issuers[1].privateKeySecretName");

        config.issuers[1].private_key_secret_name = Some("good".to_string());
        config.issuers[0].private_key_secret_name = None;
        let references = vec![secret_reference("good", "Secret")];
        assert_eq!(validate_cert_config(&config, &references), vec![]);
    }

    #[test]
    fn skip_dns_challenge_validation_requires_external_account_binding() {
        let mut config = CertConfig {
            issuers: vec![issuer("a")],
            ..CertConfig::default()
        };
        config.issuers[0].skip_dns_challenge_validation = Some(true);
        let errors = validate_cert_config(&config, &[]);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].path, "issuers[0].skipDNSChallengeValidation");

        config.issuers[0].external_account_binding = Some(ExternalAccountBinding {
            key_id: "key-1".to_string(),
            key_secret_name: "eab".to_string(),
        });
        let references = vec![secret_reference("eab", "Secret")];
        assert_eq!(validate_cert_config(&config, &references), vec![]);
    }

    #[test]
    fn dns_challenge_on_shoot_requires_namespace() {
        let config = CertConfig {
            dns_challenge_on_shoot: Some(DnsChallengeOnShoot {
                enabled: true,
                namespace: String::new(),
                dns_class: None,
            }),
            ..CertConfig::default()
        };
        let errors = validate_cert_config(&config, &[]);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].path, "dnsChallengeOnShoot.namespace");
        assert_eq!(errors[0].kind, ErrorKind::Required);
    }

    #[test]
    fn all_errors_are_accumulated() {
        let mut config = CertConfig {
            issuers: vec![issuer("a"), issuer("a")],
            precheck_nameservers: Some("bad%host".to_string()),
            ..CertConfig::default()
        };
        config.issuers[0].server = "not a url".to_string();
        config.issuers[1].email = "not-an-email".to_string();
        let errors = validate_cert_config(&config, &[]);
        assert_eq!(errors.len(), 4);
    }

    #[test]
    fn configuration_requires_issuer_block() {
        let config = Configuration {
            issuer_name: "garden".to_string(),
            ..Configuration::default()
        };
        let errors = validate_configuration(&config);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].path, "acme");
    }
}
