//! CRDs owned by the [Gardener extensions API](https://gardener.cloud/docs/gardener/extensions/),
//! see the [API reference](https://gardener.cloud/docs/gardener/api-reference/extensions/).

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use snafu::{ResultExt, Snafu};

/// See <https://gardener.cloud/docs/gardener/api-reference/extensions/#extensions.gardener.cloud/v1alpha1.Extension>.
#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, PartialEq, JsonSchema)]
#[kube(
    group = "extensions.gardener.cloud",
    version = "v1alpha1",
    kind = "Extension",
    namespaced,
    status = "ExtensionStatus"
)]
#[serde(rename_all = "camelCase")]
pub struct ExtensionSpec {
    /// Extension type, used by Gardener to select the responsible controller.
    pub r#type: String,

    /// Deployment context of the extension (`shoot`, `seed` or `garden`).
    /// Absent means `shoot`.
    pub class: Option<String>,

    /// Provider-specific configuration, carried as an embedded versioned object.
    pub provider_config: Option<serde_json::Value>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExtensionStatus {
    pub provider_status: Option<serde_json::Value>,

    /// References to secrets generated for this extension, discoverable by
    /// other Gardener components.
    pub resources: Option<Vec<NamedResourceReference>>,
}

/// See <https://gardener.cloud/docs/gardener/api-reference/core/#core.gardener.cloud/v1beta1.NamedResourceReference>.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct NamedResourceReference {
    pub name: String,
    pub resource_ref: CrossVersionObjectReference,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CrossVersionObjectReference {
    pub api_version: Option<String>,
    pub kind: String,
    pub name: String,
}

/// See <https://gardener.cloud/docs/gardener/api-reference/extensions/#extensions.gardener.cloud/v1alpha1.Cluster>.
///
/// Cluster mirrors the shoot's Gardener metadata into the seed. The embedded
/// objects keep their original API versions, so they are carried as raw JSON
/// and only the few paths this extension needs are decoded.
#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, PartialEq, JsonSchema)]
#[kube(group = "extensions.gardener.cloud", version = "v1alpha1", kind = "Cluster")]
#[serde(rename_all = "camelCase")]
pub struct ClusterSpec {
    pub cloud_profile: Option<serde_json::Value>,
    pub seed: Option<serde_json::Value>,
    pub shoot: Option<serde_json::Value>,
}

#[derive(Debug, Snafu)]
pub enum ShootInfoError {
    #[snafu(display("shoot declares malformed resource references"))]
    MalformedResourceReferences { source: serde_json::Error },
}

/// The subset of the embedded shoot manifest the extension acts on.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ShootInfo {
    /// External DNS domain of the shoot, if one is assigned yet.
    pub dns_domain: Option<String>,
    pub hibernated: bool,
    /// Resource references declared on the shoot, resolvable by extensions.
    pub resources: Vec<NamedResourceReference>,
}

impl Cluster {
    pub fn shoot_info(&self) -> Result<ShootInfo, ShootInfoError> {
        let Some(shoot) = &self.spec.shoot else {
            return Ok(ShootInfo::default());
        };
        let spec = &shoot["spec"];
        let dns_domain = spec["dns"]["domain"].as_str().map(str::to_string);
        let hibernated = spec["hibernation"]["enabled"].as_bool().unwrap_or(false);
        let resources = match &spec["resources"] {
            serde_json::Value::Null => Vec::new(),
            refs => serde_json::from_value(refs.clone()).context(MalformedResourceReferencesSnafu)?,
        };
        Ok(ShootInfo {
            dns_domain,
            hibernated,
            resources,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_shoot_info_from_embedded_manifest() {
        let cluster: Cluster = serde_yaml::from_str(
            r#"
apiVersion: extensions.gardener.cloud/v1alpha1
kind: Cluster
metadata:
  name: shoot--core--test
spec:
  shoot:
    apiVersion: core.gardener.cloud/v1beta1
    kind: Shoot
    spec:
      dns:
        domain: test.core.example.com
      hibernation:
        enabled: true
      resources:
        - name: my-issuer-key
          resourceRef:
            apiVersion: v1
            kind: Secret
            name: issuer-key-secret
"#,
        )
        .unwrap();
        let info = cluster.shoot_info().unwrap();
        assert_eq!(info.dns_domain.as_deref(), Some("test.core.example.com"));
        assert!(info.hibernated);
        assert_eq!(info.resources.len(), 1);
        assert_eq!(info.resources[0].resource_ref.kind, "Secret");
    }

    #[test]
    fn empty_cluster_yields_defaults() {
        let cluster = Cluster::new(
            "shoot--core--bare",
            ClusterSpec {
                cloud_profile: None,
                seed: None,
                shoot: None,
            },
        );
        let info = cluster.shoot_info().unwrap();
        assert_eq!(info, ShootInfo::default());
    }
}
