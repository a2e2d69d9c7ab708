//! Lazily-initialized client for the garden runtime cluster.

use std::path::PathBuf;

use kube::{
    config::{KubeConfigOptions, Kubeconfig},
    Client, Config,
};
use snafu::{ResultExt, Snafu};
use tokio::sync::Mutex;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("failed to read garden kubeconfig {path}"))]
    ReadKubeconfig {
        source: kube::config::KubeconfigError,
        path: String,
    },

    #[snafu(display("failed to build garden client configuration"))]
    BuildConfig {
        source: kube::config::KubeconfigError,
    },

    #[snafu(display("failed to infer in-cluster garden client configuration"))]
    InferConfig { source: kube::Error },

    #[snafu(display("failed to construct garden client"))]
    BuildClient { source: kube::Error },
}

/// Hands out the client for the garden cluster. The client is created on
/// first use and cached for the lifetime of the process.
pub struct GardenClientSource {
    kubeconfig_path: Option<PathBuf>,
    cached: Mutex<Option<Client>>,
}

impl GardenClientSource {
    pub fn new(kubeconfig_path: Option<PathBuf>) -> Self {
        Self {
            kubeconfig_path,
            cached: Mutex::new(None),
        }
    }

    pub async fn get(&self) -> Result<Client, Error> {
        let mut cached = self.cached.lock().await;
        if let Some(client) = cached.as_ref() {
            return Ok(client.clone());
        }
        let client = match &self.kubeconfig_path {
            Some(path) => {
                let kubeconfig = Kubeconfig::read_from(path).context(ReadKubeconfigSnafu {
                    path: path.display().to_string(),
                })?;
                let config =
                    Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
                        .await
                        .context(BuildConfigSnafu)?;
                Client::try_from(config).context(BuildClientSnafu)?
            }
            None => Client::try_default().await.context(InferConfigSnafu)?,
        };
        *cached = Some(client.clone());
        Ok(client)
    }
}
