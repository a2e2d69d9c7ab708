use std::path::PathBuf;

use anyhow::Context;
use clap::{crate_description, crate_version, Parser};
use kube::CustomResourceExt;
use tracing_subscriber::EnvFilter;

use cert_service_operator::{
    config::Configuration,
    controller,
    external_crd::cert_management::{Certificate, Issuer},
    garden::GardenClientSource,
    validation::{validate_configuration, ValidationErrors},
    OPERATOR_NAME,
};

pub const APP_NAME: &str = "cert-service";
pub const ENV_VAR_LOGGING: &str = "CERT_SERVICE_LOG";

mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

#[derive(clap::Parser)]
#[clap(author, version)]
struct Opts {
    #[clap(subcommand)]
    cmd: Command,
}

#[derive(clap::Subcommand)]
enum Command {
    /// Print the CRDs this extension installs into target clusters.
    Crd,
    /// Run the extension controller.
    Run(CertServiceRun),
}

#[derive(clap::Parser)]
struct CertServiceRun {
    /// Path to the extension-wide service configuration file.
    #[arg(long, env)]
    config: PathBuf,

    /// Kubeconfig for the garden runtime cluster. In-cluster config is used
    /// when absent.
    #[arg(long, env)]
    garden_kubeconfig: Option<PathBuf>,

    /// Accepted for compatibility with the standard extension flags; leader
    /// election is handled by the surrounding controller deployment.
    #[arg(long, env = "LEADER_ELECTION_NAMESPACE")]
    leader_election_namespace: Option<String>,

    #[arg(long, env = "SEED_NAME")]
    seed_name: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let opts = Opts::parse();
    match opts.cmd {
        Command::Crd => {
            print!("{}", serde_yaml::to_string(&Issuer::crd())?);
            println!("---");
            print!("{}", serde_yaml::to_string(&Certificate::crd())?);
        }
        Command::Run(CertServiceRun {
            config,
            garden_kubeconfig,
            leader_election_namespace: _,
            seed_name,
        }) => {
            tracing_subscriber::fmt()
                .with_env_filter(
                    EnvFilter::try_from_env(ENV_VAR_LOGGING)
                        .unwrap_or_else(|_| EnvFilter::new("info")),
                )
                .init();
            tracing::info!(
                app = APP_NAME,
                version = crate_version!(),
                built_at = built_info::BUILT_TIME_UTC,
                rustc = built_info::RUSTC_VERSION,
                "starting {}",
                crate_description!()
            );

            let config = Configuration::load(&config)?;
            let errors = validate_configuration(&config);
            if !errors.is_empty() {
                return Err(ValidationErrors(errors))
                    .context("service configuration is invalid");
            }

            let client = kube::Client::try_default()
                .await
                .context(format!("failed to create client for {OPERATOR_NAME}"))?;
            controller::start(controller::Ctx {
                client,
                config,
                seed_name,
                garden_clients: GardenClientSource::new(garden_kubeconfig),
            })
            .await;
        }
    }
    Ok(())
}
