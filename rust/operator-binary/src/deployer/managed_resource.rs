//! Serializes object bundles and manages their ManagedResource records.

use std::collections::BTreeMap;

use k8s_openapi::{
    api::core::v1::{LocalObjectReference, Secret},
    apimachinery::pkg::apis::meta::v1::ObjectMeta,
};
use kube::{
    api::{Api, DeleteParams, Patch, PatchParams},
    Client,
};
use serde::Serialize;
use snafu::{ResultExt, Snafu};
use tokio::time::{sleep, Duration, Instant};

use crate::{
    external_crd::resources::{ManagedResource, ManagedResourceSpec},
    FIELD_MANAGER,
};

/// Deletions block until the resource-manager confirms removal, at most this long.
pub const DELETION_TIMEOUT: Duration = Duration::from_secs(2 * 60);
const DELETION_POLL_INTERVAL: Duration = Duration::from_secs(5);

const OBJECTS_KEY: &str = "objects.yaml";

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("failed to serialize object for the bundle"))]
    SerializeObject { source: serde_yaml::Error },

    #[snafu(display("failed to apply ManagedResource secret {name}"))]
    ApplySecret { source: kube::Error, name: String },

    #[snafu(display("failed to apply ManagedResource {name}"))]
    ApplyManagedResource { source: kube::Error, name: String },

    #[snafu(display("failed to delete ManagedResource {name}"))]
    DeleteManagedResource { source: kube::Error, name: String },

    #[snafu(display("failed to delete ManagedResource secret {name}"))]
    DeleteSecret { source: kube::Error, name: String },

    #[snafu(display("failed to check deletion of ManagedResource {name}"))]
    CheckDeletion { source: kube::Error, name: String },

    #[snafu(display(
        "deletion of ManagedResource {name} was not confirmed within {DELETION_TIMEOUT:?}"
    ))]
    DeletionTimeout { name: String },
}
type Result<T, E = Error> = std::result::Result<T, E>;

/// An ordered collection of Kubernetes objects, rendered into a single
/// multi-document YAML manifest.
#[derive(Debug, Default)]
pub struct ObjectBundle {
    docs: Vec<serde_yaml::Value>,
}

impl ObjectBundle {
    pub fn add<T: Serialize>(&mut self, object: &T) -> Result<()> {
        self.docs
            .push(serde_yaml::to_value(object).context(SerializeObjectSnafu)?);
        Ok(())
    }

    pub fn objects(&self) -> &[serde_yaml::Value] {
        &self.docs
    }

    pub fn to_manifest(&self) -> Result<String> {
        let mut manifest = String::new();
        for doc in &self.docs {
            manifest.push_str("---\n");
            manifest.push_str(&serde_yaml::to_string(doc).context(SerializeObjectSnafu)?);
        }
        Ok(manifest)
    }
}

pub fn secret_name(managed_resource_name: &str) -> String {
    format!("managedresource-{managed_resource_name}")
}

/// Creates or updates the secret/ManagedResource pair for a bundle.
pub async fn deploy(
    client: &Client,
    namespace: &str,
    name: &str,
    class: Option<&str>,
    keep_objects: bool,
    bundle: &ObjectBundle,
) -> Result<()> {
    let manifest = bundle.to_manifest()?;
    let secret_name = secret_name(name);
    let secret = Secret {
        metadata: ObjectMeta {
            name: Some(secret_name.clone()),
            namespace: Some(namespace.to_string()),
            ..ObjectMeta::default()
        },
        type_: Some("Opaque".to_string()),
        string_data: Some(BTreeMap::from([(OBJECTS_KEY.to_string(), manifest)])),
        ..Secret::default()
    };
    let ssapply = PatchParams::apply(FIELD_MANAGER).force();
    Api::<Secret>::namespaced(client.clone(), namespace)
        .patch(&secret_name, &ssapply, &Patch::Apply(&secret))
        .await
        .context(ApplySecretSnafu { name: &secret_name })?;

    let mut managed_resource = ManagedResource::new(
        name,
        ManagedResourceSpec {
            class: class.map(str::to_string),
            secret_refs: vec![LocalObjectReference { name: secret_name }],
            inject_labels: None,
            keep_objects: Some(keep_objects),
        },
    );
    managed_resource.metadata.namespace = Some(namespace.to_string());
    Api::<ManagedResource>::namespaced(client.clone(), namespace)
        .patch(name, &ssapply, &Patch::Apply(&managed_resource))
        .await
        .context(ApplyManagedResourceSnafu { name })?;
    Ok(())
}

/// Deletes the ManagedResource and its secret. Both may already be gone.
pub async fn delete(client: &Client, namespace: &str, name: &str) -> Result<()> {
    let managed_resources = Api::<ManagedResource>::namespaced(client.clone(), namespace);
    ignore_not_found(managed_resources.delete(name, &DeleteParams::default()).await)
        .context(DeleteManagedResourceSnafu { name })?;

    let secret_name = secret_name(name);
    let secrets = Api::<Secret>::namespaced(client.clone(), namespace);
    ignore_not_found(secrets.delete(&secret_name, &DeleteParams::default()).await)
        .context(DeleteSecretSnafu { name: secret_name })?;
    Ok(())
}

/// Polls until the target cluster confirms removal of the ManagedResource.
pub async fn wait_until_deleted(client: &Client, namespace: &str, name: &str) -> Result<()> {
    let api = Api::<ManagedResource>::namespaced(client.clone(), namespace);
    let deadline = Instant::now() + DELETION_TIMEOUT;
    loop {
        if api
            .get_opt(name)
            .await
            .context(CheckDeletionSnafu { name })?
            .is_none()
        {
            return Ok(());
        }
        if Instant::now() >= deadline {
            return DeletionTimeoutSnafu { name }.fail();
        }
        sleep(DELETION_POLL_INTERVAL).await;
    }
}

fn ignore_not_found<T>(result: kube::Result<T>) -> kube::Result<()> {
    match result {
        Ok(_) => Ok(()),
        Err(kube::Error::Api(response)) if response.code == 404 => Ok(()),
        Err(err) => Err(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::ConfigMap;

    #[test]
    fn manifest_carries_every_object_with_type_meta() {
        let mut bundle = ObjectBundle::default();
        bundle
            .add(&ConfigMap {
                metadata: ObjectMeta {
                    name: Some("a".to_string()),
                    ..ObjectMeta::default()
                },
                ..ConfigMap::default()
            })
            .unwrap();
        bundle
            .add(&Secret {
                metadata: ObjectMeta {
                    name: Some("b".to_string()),
                    ..ObjectMeta::default()
                },
                ..Secret::default()
            })
            .unwrap();

        let manifest = bundle.to_manifest().unwrap();
        assert_eq!(manifest.matches("---\n").count(), 2);
        assert!(manifest.contains("kind: ConfigMap"));
        assert!(manifest.contains("kind: Secret"));
        assert!(manifest.contains("apiVersion: v1"));
    }
}
