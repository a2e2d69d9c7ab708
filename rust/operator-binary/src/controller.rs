//! The Extension actuator: decode, validate, assemble values, deploy.

use std::{sync::Arc, time::Duration};

use const_format::concatcp;
use futures::StreamExt;
use kube::{
    api::{Api, Patch, PatchParams},
    runtime::{
        controller::{Action, Controller},
        watcher,
    },
    Client, ResourceExt,
};
use snafu::{OptionExt, ResultExt, Snafu};
use strum::{EnumDiscriminants, IntoStaticStr};

use crate::{
    config::Configuration,
    crd,
    deployer::{
        self, managed_resource, Deployer, INTERNAL_MANAGED_RESOURCE_NAME,
        SEED_MANAGED_RESOURCE_NAME, SHOOT_MANAGED_RESOURCE_NAME,
    },
    external_crd::extensions::{self, Cluster, Extension, NamedResourceReference, ShootInfo},
    garden::{self, GardenClientSource},
    validation::{validate_cert_config, ValidationErrors},
    values::{CertClass, DeploymentContext, Values},
    EXTENSION_TYPE, OPERATOR_NAME,
};

const CONTROLLER_NAME: &str = "extension";
const FULL_CONTROLLER_NAME: &str = concatcp!(CONTROLLER_NAME, ".", OPERATOR_NAME);

const FINALIZER: &str = "extensions.gardener.cloud/shoot-cert-service";
const GENERIC_KUBECONFIG_SECRET_NAME: &str = "generic-token-kubeconfig";

pub struct Ctx {
    pub client: Client,
    pub config: Configuration,
    pub seed_name: Option<String>,
    pub garden_clients: GardenClientSource,
}

#[derive(Debug, Snafu, EnumDiscriminants)]
#[strum_discriminants(derive(IntoStaticStr))]
pub enum Error {
    #[snafu(display("Extension has no namespace"))]
    NoExtensionNamespace,

    #[snafu(display("failed to get Cluster {name}"))]
    GetCluster { source: kube::Error, name: String },

    #[snafu(display("failed to read shoot information from the Cluster resource"))]
    ReadShootInfo { source: extensions::ShootInfoError },

    #[snafu(display("failed to decode provider config"))]
    DecodeProviderConfig { source: crd::DecodeError },

    #[snafu(display("provider config is invalid"))]
    InvalidProviderConfig { source: ValidationErrors },

    #[snafu(display("failed to assemble deployment values"))]
    BuildValues { source: crate::values::Error },

    #[snafu(display("failed to get garden cluster client"))]
    GardenClient { source: garden::Error },

    #[snafu(display("failed to deploy managed resources"))]
    Deploy { source: deployer::Error },

    #[snafu(display("failed to delete managed resources"))]
    Delete { source: managed_resource::Error },

    #[snafu(display("failed to update finalizers on {name}"))]
    UpdateFinalizer { source: kube::Error, name: String },

    #[snafu(display("failed to patch status of {name}"))]
    PatchStatus { source: kube::Error, name: String },
}
type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
    pub fn category(&self) -> &'static str {
        ErrorDiscriminants::from(self).into()
    }
}

pub async fn start(ctx: Ctx) {
    let client = ctx.client.clone();
    Controller::new(
        Api::<Extension>::all(client),
        watcher::Config::default(),
    )
    .shutdown_on_signal()
    .run(reconcile, error_policy, Arc::new(ctx))
    .for_each_concurrent(16, |result| async move {
        match result {
            Ok((object, _)) => {
                tracing::debug!(controller = FULL_CONTROLLER_NAME, %object, "reconciled")
            }
            Err(error) => tracing::warn!(
                controller = FULL_CONTROLLER_NAME,
                %error,
                "reconcile failed"
            ),
        }
    })
    .await;
}

async fn reconcile(extension: Arc<Extension>, ctx: Arc<Ctx>) -> Result<Action> {
    if extension.spec.r#type != EXTENSION_TYPE {
        return Ok(Action::await_change());
    }
    let namespace = extension.namespace().context(NoExtensionNamespaceSnafu)?;
    let cert_class = parse_cert_class(extension.spec.class.as_deref());

    if extension.metadata.deletion_timestamp.is_some() {
        return cleanup(&extension, &ctx, &namespace, cert_class).await;
    }

    let shoot_info = if cert_class.is_shoot() {
        Api::<Cluster>::all(ctx.client.clone())
            .get(&namespace)
            .await
            .context(GetClusterSnafu { name: &namespace })?
            .shoot_info()
            .context(ReadShootInfoSnafu)?
    } else {
        ShootInfo::default()
    };

    let cert_config = match &extension.spec.provider_config {
        Some(raw) => crd::decode_cert_config(raw).context(DecodeProviderConfigSnafu)?,
        None => Default::default(),
    };
    let errors = validate_cert_config(&cert_config, &shoot_info.resources);
    if !errors.is_empty() {
        return Err(Error::InvalidProviderConfig {
            source: ValidationErrors(errors),
        });
    }

    ensure_finalizer(&extension, &ctx, &namespace).await?;

    let context = DeploymentContext {
        namespace: namespace.clone(),
        cert_class,
        restricted_domain: shoot_info.dns_domain.clone(),
        referenced_resources: shoot_info.resources.clone(),
        hibernated: shoot_info.hibernated,
        generic_kubeconfig_secret_name: cert_class
            .is_shoot()
            .then(|| GENERIC_KUBECONFIG_SECRET_NAME.to_string()),
        seed_name: ctx.seed_name.clone(),
    };
    let Some(values) =
        Values::build(&ctx.config, &cert_config, context).context(BuildValuesSnafu)?
    else {
        // Deliberate skip, the shoot domain will show up on a later reconcile.
        return Ok(Action::requeue(Duration::from_secs(30)));
    };

    let secret_refs = match cert_class {
        CertClass::Garden => {
            let garden_client = ctx.garden_clients.get().await.context(GardenClientSnafu)?;
            Deployer::new(garden_client, values)
                .deploy_internal_managed_resource()
                .await
                .context(DeploySnafu)?
        }
        CertClass::Shoot | CertClass::Seed => {
            let deployer = Deployer::new(ctx.client.clone(), values);
            let refs = deployer
                .deploy_seed_managed_resource()
                .await
                .context(DeploySnafu)?;
            deployer
                .deploy_shoot_managed_resource()
                .await
                .context(DeploySnafu)?;
            refs
        }
    };

    patch_status(&extension, &ctx, &namespace, secret_refs).await?;

    Ok(sync_action(&ctx.config))
}

/// Deletes the managed resources of this extension and blocks until the
/// resource-manager confirms their removal, then releases the finalizer.
async fn cleanup(
    extension: &Extension,
    ctx: &Ctx,
    namespace: &str,
    cert_class: CertClass,
) -> Result<Action> {
    match cert_class {
        CertClass::Garden => {
            let garden_client = ctx.garden_clients.get().await.context(GardenClientSnafu)?;
            delete_and_wait(&garden_client, namespace, INTERNAL_MANAGED_RESOURCE_NAME).await?;
        }
        CertClass::Shoot | CertClass::Seed => {
            delete_and_wait(&ctx.client, namespace, SHOOT_MANAGED_RESOURCE_NAME).await?;
            delete_and_wait(&ctx.client, namespace, SEED_MANAGED_RESOURCE_NAME).await?;
        }
    }
    remove_finalizer(extension, ctx, namespace).await?;
    Ok(Action::await_change())
}

async fn delete_and_wait(client: &Client, namespace: &str, name: &str) -> Result<()> {
    managed_resource::delete(client, namespace, name)
        .await
        .context(DeleteSnafu)?;
    managed_resource::wait_until_deleted(client, namespace, name)
        .await
        .context(DeleteSnafu)
}

async fn ensure_finalizer(extension: &Extension, ctx: &Ctx, namespace: &str) -> Result<()> {
    if extension.finalizers().iter().any(|f| f == FINALIZER) {
        return Ok(());
    }
    let mut finalizers = extension.finalizers().to_vec();
    finalizers.push(FINALIZER.to_string());
    patch_finalizers(extension, ctx, namespace, finalizers).await
}

async fn remove_finalizer(extension: &Extension, ctx: &Ctx, namespace: &str) -> Result<()> {
    if !extension.finalizers().iter().any(|f| f == FINALIZER) {
        return Ok(());
    }
    let finalizers = extension
        .finalizers()
        .iter()
        .filter(|f| *f != FINALIZER)
        .cloned()
        .collect();
    patch_finalizers(extension, ctx, namespace, finalizers).await
}

async fn patch_finalizers(
    extension: &Extension,
    ctx: &Ctx,
    namespace: &str,
    finalizers: Vec<String>,
) -> Result<()> {
    let name = extension.name_any();
    Api::<Extension>::namespaced(ctx.client.clone(), namespace)
        .patch(
            &name,
            &PatchParams::default(),
            &Patch::Merge(serde_json::json!({ "metadata": { "finalizers": finalizers } })),
        )
        .await
        .context(UpdateFinalizerSnafu { name })?;
    Ok(())
}

/// Publishes the generated issuer secrets on the Extension status so other
/// components can discover the credentials.
async fn patch_status(
    extension: &Extension,
    ctx: &Ctx,
    namespace: &str,
    secret_refs: Vec<NamedResourceReference>,
) -> Result<()> {
    let name = extension.name_any();
    Api::<Extension>::namespaced(ctx.client.clone(), namespace)
        .patch_status(
            &name,
            &PatchParams::default(),
            &Patch::Merge(serde_json::json!({ "status": { "resources": secret_refs } })),
        )
        .await
        .context(PatchStatusSnafu { name })?;
    Ok(())
}

fn parse_cert_class(class: Option<&str>) -> CertClass {
    match class {
        Some("garden") => CertClass::Garden,
        Some("seed") => CertClass::Seed,
        _ => CertClass::Shoot,
    }
}

fn sync_action(config: &Configuration) -> Action {
    match config
        .health_check
        .as_ref()
        .and_then(|h| h.sync_period_seconds)
    {
        Some(seconds) => Action::requeue(Duration::from_secs(seconds)),
        None => Action::await_change(),
    }
}

fn error_policy(_extension: Arc<Extension>, error: &Error, _ctx: Arc<Ctx>) -> Action {
    tracing::debug!(category = error.category(), "requeueing after error");
    Action::requeue(Duration::from_secs(30))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HealthCheckConfig;

    #[test]
    fn class_defaults_to_shoot() {
        assert_eq!(parse_cert_class(None), CertClass::Shoot);
        assert_eq!(parse_cert_class(Some("shoot")), CertClass::Shoot);
        assert_eq!(parse_cert_class(Some("seed")), CertClass::Seed);
        assert_eq!(parse_cert_class(Some("garden")), CertClass::Garden);
    }

    #[test]
    fn sync_action_honors_health_check_period() {
        let config = Configuration {
            health_check: Some(HealthCheckConfig {
                sync_period_seconds: Some(60),
            }),
            ..Configuration::default()
        };
        assert_eq!(sync_action(&config), Action::requeue(Duration::from_secs(60)));
        assert_eq!(sync_action(&Configuration::default()), Action::await_change());
    }
}
