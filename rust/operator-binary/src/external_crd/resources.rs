//! CRDs owned by the [Gardener resource-manager](https://gardener.cloud/docs/gardener/concepts/resource-manager/),
//! see <https://gardener.cloud/docs/gardener/api-reference/resources/>.

use std::collections::BTreeMap;

use k8s_openapi::{
    api::core::v1::LocalObjectReference, apimachinery::pkg::apis::meta::v1::Condition,
};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// See <https://gardener.cloud/docs/gardener/api-reference/resources/#resources.gardener.cloud/v1alpha1.ManagedResource>.
///
/// A ManagedResource names one or more secrets holding serialized Kubernetes
/// manifests. The resource-manager applies those manifests to the target
/// cluster and keeps them reconciled.
#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, PartialEq, JsonSchema)]
#[kube(
    group = "resources.gardener.cloud",
    version = "v1alpha1",
    kind = "ManagedResource",
    namespaced,
    status = "ManagedResourceStatus"
)]
#[serde(rename_all = "camelCase")]
pub struct ManagedResourceSpec {
    /// Resource-manager instance responsible for this resource. Unset means
    /// the shoot-targeting default instance.
    pub class: Option<String>,

    pub secret_refs: Vec<LocalObjectReference>,

    /// Labels injected into every object of the bundle.
    pub inject_labels: Option<BTreeMap<String, String>>,

    /// Leave the applied objects in place when the ManagedResource is deleted.
    pub keep_objects: Option<bool>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ManagedResourceStatus {
    pub conditions: Option<Vec<Condition>>,
    pub observed_generation: Option<i64>,
}
