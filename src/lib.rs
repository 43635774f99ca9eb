//! meshctl CLI library

pub mod cluster;
pub mod commands;
pub mod config;
pub mod error;

pub use error::{Error, Result};

use clap::{Args, Parser, Subcommand};

/// meshctl - Istio service mesh inspection and VM onboarding
#[derive(Parser, Debug)]
#[command(name = "meshctl")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// Flags shared by every command
#[derive(Args, Debug, Clone, Default)]
pub struct GlobalArgs {
    /// Path to kubeconfig file (default: $MESHCTL_KUBECONFIG, config file, then kube defaults)
    #[arg(long, global = true)]
    pub kubeconfig: Option<String>,

    /// Kube context to use
    #[arg(long, global = true)]
    pub context: Option<String>,

    /// Namespace of the Istio control plane
    #[arg(short = 'i', long, global = true)]
    pub istio_namespace: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Validate an IstioOperator file
    Validate(commands::validate::ValidateArgs),
    /// Inspect control plane revisions
    Revision(commands::revision::RevisionArgs),
    /// Show proxy configuration sync status from controller payloads
    ProxyStatus(commands::proxy_status::ProxyStatusArgs),
    /// Generate and deliver sidecar bootstrap bundles for WorkloadEntries
    SidecarBootstrap(commands::sidecar_bootstrap::SidecarBootstrapArgs),
}

impl Cli {
    /// Run the CLI command
    pub async fn run(self) -> Result<()> {
        match self.command {
            Commands::Validate(args) => commands::validate::run(args),
            Commands::Revision(args) => commands::revision::run(args, &self.global).await,
            Commands::ProxyStatus(args) => commands::proxy_status::run(args),
            Commands::SidecarBootstrap(args) => {
                commands::sidecar_bootstrap::run(args, &self.global).await
            }
        }
    }
}
