//! Observability objects shipped with shoot deployments.

use std::collections::BTreeMap;

use k8s_openapi::{
    api::core::v1::ConfigMap,
    apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta},
};

use crate::{
    external_crd::monitoring::{
        Endpoint, PrometheusRule, PrometheusRuleSpec, Rule, RuleGroup, ServiceMonitor,
        ServiceMonitorSpec,
    },
    values::Values,
};

use super::resources::{standard_labels, CERT_MANAGEMENT_NAME};

const OBSERVABILITY_CONFIG_MAP_NAME: &str = "cert-controller-manager-observability-config";

pub fn observability_config_map(values: &Values) -> ConfigMap {
    let mut labels = standard_labels();
    labels.insert(
        "extensions.gardener.cloud/configuration".to_string(),
        "monitoring".to_string(),
    );
    ConfigMap {
        metadata: ObjectMeta {
            name: Some(OBSERVABILITY_CONFIG_MAP_NAME.to_string()),
            namespace: Some(values.namespace.clone()),
            labels: Some(labels),
            ..ObjectMeta::default()
        },
        data: Some(BTreeMap::from([(
            "observability.yaml".to_string(),
            format!(
                "dashboard: cert-controller-manager\nscrapeJob: {CERT_MANAGEMENT_NAME}\nmetricsPort: metrics\n"
            ),
        )])),
        ..ConfigMap::default()
    }
}

/// Alerting rule for certificates approaching expiration. Returns `None` when
/// alerting is disabled (zero alert days).
pub fn prometheus_rule(values: &Values) -> Option<PrometheusRule> {
    if values.cert_expiration_alert_days == 0 {
        return None;
    }
    let expire_seconds = u64::from(values.cert_expiration_alert_days) * 24 * 60 * 60;
    let mut rule = PrometheusRule::new(
        "shoot-cert-controller-manager",
        PrometheusRuleSpec {
            groups: vec![RuleGroup {
                name: "cert-management.rules".to_string(),
                rules: vec![
                    Rule {
                        alert: Some("CertManagementCertificateExpiring".to_string()),
                        expr: format!(
                            "(cert_management_cert_object_expire{{namespace=\"{}\"}} - time()) < {expire_seconds}",
                            values.namespace
                        ),
                        r#for: Some("30m".to_string()),
                        labels: Some(BTreeMap::from([
                            ("service".to_string(), CERT_MANAGEMENT_NAME.to_string()),
                            ("severity".to_string(), "warning".to_string()),
                            ("visibility".to_string(), "operator".to_string()),
                        ])),
                        annotations: Some(BTreeMap::from([
                            (
                                "summary".to_string(),
                                "Certificate expires soon".to_string(),
                            ),
                            (
                                "description".to_string(),
                                format!(
                                    "A certificate managed by cert-controller-manager expires in less than {} days.",
                                    values.cert_expiration_alert_days
                                ),
                            ),
                        ])),
                    },
                    Rule {
                        alert: Some("CertManagementCertificateErrored".to_string()),
                        expr: "cert_management_cert_object_errored > 0".to_string(),
                        r#for: Some("15m".to_string()),
                        labels: Some(BTreeMap::from([
                            ("service".to_string(), CERT_MANAGEMENT_NAME.to_string()),
                            ("severity".to_string(), "warning".to_string()),
                            ("visibility".to_string(), "operator".to_string()),
                        ])),
                        annotations: Some(BTreeMap::from([(
                            "summary".to_string(),
                            "Certificate reconciliation keeps failing".to_string(),
                        )])),
                    },
                ],
            }],
        },
    );
    rule.metadata.namespace = Some(values.namespace.clone());
    let mut labels = standard_labels();
    labels.insert("prometheus".to_string(), "shoot".to_string());
    rule.metadata.labels = Some(labels);
    Some(rule)
}

pub fn service_monitor(values: &Values) -> ServiceMonitor {
    let mut monitor = ServiceMonitor::new(
        "shoot-cert-controller-manager",
        ServiceMonitorSpec {
            selector: LabelSelector {
                match_labels: Some(standard_labels()),
                ..LabelSelector::default()
            },
            endpoints: vec![Endpoint {
                port: "metrics".to_string(),
                path: Some("/metrics".to_string()),
                interval: Some("1m".to_string()),
            }],
        },
    );
    monitor.metadata.namespace = Some(values.namespace.clone());
    let mut labels = standard_labels();
    labels.insert("prometheus".to_string(), "shoot".to_string());
    monitor.metadata.labels = Some(labels);
    monitor
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::{AcmeConfig, Configuration, ImageRef},
        crd::v1alpha1::{Alerting, CertConfig},
        values::{CertClass, DeploymentContext},
    };

    fn values(alert_days: Option<u32>) -> Values {
        let config = Configuration {
            issuer_name: "garden".to_string(),
            acme: Some(AcmeConfig {
                email: "foo@example.com".to_string(),
                server: "https://acme-v02.api.letsencrypt.org/directory".to_string(),
                ..AcmeConfig::default()
            }),
            image: Some(ImageRef {
                repository: "registry.example.com/cert-controller-manager".to_string(),
                tag: "v0.17.4".to_string(),
            }),
            ..Configuration::default()
        };
        let cert_config = CertConfig {
            alerting: alert_days.map(|days| Alerting {
                cert_expiration_alert_days: Some(days),
            }),
            ..CertConfig::default()
        };
        Values::build(
            &config,
            &cert_config,
            DeploymentContext {
                namespace: "shoot--core--test".to_string(),
                cert_class: CertClass::Shoot,
                restricted_domain: None,
                referenced_resources: Vec::new(),
                hibernated: false,
                generic_kubeconfig_secret_name: None,
                seed_name: None,
            },
        )
        .unwrap()
        .unwrap()
    }

    #[test]
    fn alert_expression_uses_configured_days() {
        let rule = prometheus_rule(&values(Some(7))).unwrap();
        let expr = &rule.spec.groups[0].rules[0].expr;
        assert!(expr.contains(&(7 * 24 * 60 * 60).to_string()), "{expr}");
    }

    #[test]
    fn zero_alert_days_disable_the_rule() {
        assert!(prometheus_rule(&values(Some(0))).is_none());
    }

    #[test]
    fn service_monitor_scrapes_metrics_port() {
        let monitor = service_monitor(&values(None));
        assert_eq!(monitor.spec.endpoints[0].port, "metrics");
    }
}
