//! Sidecar bootstrap command
//!
//! Generates the files a VM needs to join the mesh as the workload a
//! WorkloadEntry describes, and either saves them to a directory or shows
//! what copying them to the VM would do.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Args;
use kube::api::ListParams;
use kube::{Api, Client};
use meshctl_bootstrap::annotations::SUPPORTED;
use meshctl_bootstrap::{
    copy_bundle, infer_gateway_address, issue_identities, prepare_workloads, write_bundle,
    DirectoryWriter, DryRunHost, PreparedWorkload, ServiceLookup, SidecarData, TokenIssuer,
};
use meshctl_common::crd::WorkloadEntry;
use tracing::info;

use super::parse_duration;
use crate::cluster::{
    kube_client, namespace_proxy_config, KubeServiceLookup, KubeTokenIssuer, MeshInputs,
};
use crate::config::{load_config, resolve_istio_namespace};
use crate::{Error, GlobalArgs, Result};

const DEFAULT_NAMESPACE: &str = "default";

#[derive(Args, Debug)]
pub struct SidecarBootstrapArgs {
    /// WorkloadEntry to bootstrap, as `name[.namespace]`
    pub workload: Option<String>,

    /// Bootstrap every WorkloadEntry in the namespace
    #[arg(short, long, conflicts_with = "workload")]
    pub all: bool,

    /// Namespace of the WorkloadEntries
    #[arg(short, long)]
    pub namespace: Option<String>,

    /// Save the generated files to this directory
    #[arg(short = 'd', long, conflicts_with = "dry_run")]
    pub output_dir: Option<PathBuf>,

    /// Show the actions copying the files to each VM would take
    #[arg(long)]
    pub dry_run: bool,

    /// Also (re)start the sidecar container on each VM
    #[arg(long)]
    pub start_istio_proxy: bool,

    /// Lifetime of the generated ServiceAccount tokens
    #[arg(long, default_value = "24h")]
    pub duration: String,

    /// Remote user when a WorkloadEntry does not name one (default: $USER)
    #[arg(short = 'u', long)]
    pub ssh_user: Option<String>,

    /// Print the WorkloadEntry annotations this command understands
    #[arg(long)]
    pub docs: bool,
}

/// Where the bundles go
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    /// Files under a local directory
    Directory(PathBuf),
    /// Print the remote actions without performing them
    DryRun { start_proxy: bool },
}

impl SidecarBootstrapArgs {
    /// Workload name (if any) and namespace to read WorkloadEntries from
    pub fn target(&self) -> Result<(Option<String>, String)> {
        let default_ns = self.namespace.as_deref().unwrap_or(DEFAULT_NAMESPACE);
        match (&self.workload, self.all) {
            (Some(workload), false) => {
                let (name, ns) = match workload.split_once('.') {
                    Some((name, ns)) if !ns.is_empty() => (name, ns),
                    _ => (workload.trim_end_matches('.'), default_ns),
                };
                Ok((Some(name.to_string()), ns.to_string()))
            }
            (None, true) => Ok((None, default_ns.to_string())),
            _ => Err(Error::validation(
                "either a WorkloadEntry name or --all must be given",
            )),
        }
    }

    /// How the generated bundles are delivered
    pub fn delivery(&self) -> Result<Delivery> {
        match &self.output_dir {
            Some(dir) => Ok(Delivery::Directory(dir.clone())),
            None if self.dry_run => Ok(Delivery::DryRun {
                start_proxy: self.start_istio_proxy,
            }),
            None => Err(Error::validation(
                "copying over SSH is not supported; use --output-dir or --dry-run",
            )),
        }
    }
}

pub async fn run(args: SidecarBootstrapArgs, global: &GlobalArgs) -> Result<()> {
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    if args.docs {
        print_docs(&mut out)?;
        return Ok(());
    }

    let (name, namespace) = args.target()?;
    let delivery = args.delivery()?;
    let lifetime = parse_duration(&args.duration)?;
    let default_user = args
        .ssh_user
        .clone()
        .or_else(|| std::env::var("USER").ok())
        .unwrap_or_default();

    let config = load_config()?;
    let client = kube_client(global, &config).await?;
    let istio_namespace = resolve_istio_namespace(global.istio_namespace.as_deref(), &config);

    let entries = fetch_entries(&client, &namespace, name.as_deref()).await?;
    if entries.is_empty() {
        eprintln!("There are no WorkloadEntry(s) to bootstrap");
        return Ok(());
    }

    let inputs = MeshInputs::load(&client, &istio_namespace).await?;
    let overrides = namespace_proxy_config(&client, &namespace)
        .await?
        .into_iter()
        .collect();
    let prepared = prepare(
        &KubeTokenIssuer::new(client.clone()),
        &KubeServiceLookup::new(client),
        inputs,
        &istio_namespace,
        overrides,
        &entries,
        lifetime,
        &default_user,
    )
    .await?;

    deliver(&mut out, &prepared, &delivery, name.is_none()).await
}

async fn fetch_entries(
    client: &Client,
    namespace: &str,
    name: Option<&str>,
) -> Result<Vec<WorkloadEntry>> {
    let api: Api<WorkloadEntry> = Api::namespaced(client.clone(), namespace);
    match name {
        Some(name) => {
            let entry = api.get_opt(name).await.map_err(meshctl_common::Error::from)?;
            entry
                .map(|e| vec![e])
                .ok_or_else(|| meshctl_common::Error::not_found("WorkloadEntry", format!("{}/{}", namespace, name)).into())
        }
        None => Ok(api
            .list(&ListParams::default())
            .await
            .map_err(meshctl_common::Error::from)?
            .items),
    }
}

/// Resolve mesh-wide data, issue identities and build a plan per workload
#[allow(clippy::too_many_arguments)]
pub async fn prepare(
    issuer: &dyn TokenIssuer,
    lookup: &dyn ServiceLookup,
    inputs: MeshInputs,
    istio_namespace: &str,
    proxy_config_overrides: Vec<String>,
    entries: &[WorkloadEntry],
    lifetime: Duration,
    default_user: &str,
) -> Result<Vec<PreparedWorkload>> {
    let mut data = SidecarData {
        istio_namespace: istio_namespace.to_string(),
        mesh_config: inputs.mesh_config,
        values: inputs.values,
        ca_cert: inputs.ca_cert,
        gateway_address: String::new(),
        proxy_config_overrides,
    };
    data.check_preconditions()?;

    let network = data
        .values
        .pointer("/global/network")
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string();
    data.gateway_address = infer_gateway_address(
        lookup,
        istio_namespace,
        &data.mesh_config,
        &inputs.mesh_networks,
        &network,
    )
    .await
    .map_err(|e| {
        Error::command_failed(format!(
            "unable to proceed because mesh expansion is either disabled or misconfigured: {}",
            e
        ))
    })?;

    let identities = issue_identities(issuer, entries, lifetime).await?;
    Ok(prepare_workloads(&data, entries, &identities, default_user)?)
}

/// Hand every prepared workload to the chosen delivery
pub async fn deliver(
    w: &mut dyn Write,
    prepared: &[PreparedWorkload],
    delivery: &Delivery,
    multi: bool,
) -> Result<()> {
    match delivery {
        Delivery::Directory(dir) => {
            for workload in prepared {
                let mut writer = DirectoryWriter::for_workload(dir, &workload.name, multi);
                write_bundle(&workload.bundle, &mut writer)?;
                info!(workload = %workload.name, dir = %writer.root().display(), "wrote bundle");
            }
            print_next_steps(w, dir)
        }
        Delivery::DryRun { start_proxy } => {
            for workload in prepared {
                let host = DryRunHost::new(workload.target.clone());
                copy_bundle(&host, &workload.plan, *start_proxy).await?;
                writeln!(w, "# {}.{}", workload.name, workload.namespace)?;
                for action in host.into_actions() {
                    writeln!(w, "{}", action)?;
                }
            }
            Ok(())
        }
    }
}

fn print_next_steps(w: &mut dyn Write, dir: &Path) -> Result<()> {
    let dir = std::fs::canonicalize(dir).unwrap_or_else(|_| dir.to_path_buf());
    writeln!(
        w,
        "Generated files have been saved to the directory {dir}\n\n\
         Next steps:\n\n  \
         1. Copy the contents of {dir} to the remote host represented by the WorkloadEntry\n\n  \
         2. Once on the remote host, run <dir>/bin/start-istio-proxy.sh to start Istio Proxy in a Docker container",
        dir = dir.display()
    )?;
    Ok(())
}

fn print_docs(w: &mut dyn Write) -> Result<()> {
    writeln!(w, "WorkloadEntry annotations:\n")?;
    for (name, doc) in SUPPORTED {
        writeln!(w, "  {}\n      {}\n", name, doc)?;
    }
    Ok(())
}
