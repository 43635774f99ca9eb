//! Revision commands

use std::io::Write;

use clap::{Args, Subcommand};
use meshctl_common::DEFAULT_REVISION;
use meshctl_revision::printer::{print_description_table, print_json, print_revision_list_table};
use meshctl_revision::{describe_revision, list_revisions, ProfileRenderer, ProfileSet, RevisionSource, Section};
use meshctl_validate::validations::is_dns1123_label;

use super::OutputFormat;
use crate::cluster::{kube_client, KubeRevisionSource};
use crate::config::{load_config, resolve_istio_namespace};
use crate::{Error, GlobalArgs, Result};

/// Name accepted for the revision without an explicit label
const DEFAULT_REVISION_ALIAS: &str = "<default>";

/// Inspect control plane revisions
#[derive(Args, Debug)]
pub struct RevisionArgs {
    #[command(subcommand)]
    pub command: RevisionCommand,

    /// Output format
    #[arg(short, long, default_value = "table", global = true)]
    pub output: OutputFormat,

    /// Include customizations, namespace summary and pods
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Manifests directory holding `profiles/*.yaml` (default: built-in profiles)
    #[arg(short = 'd', long, global = true)]
    pub manifests: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum RevisionCommand {
    /// List revisions installed in the cluster
    List,
    /// Describe one revision
    Describe {
        /// Revision name (`<default>` for the unlabelled revision)
        revision: String,
    },
}

pub async fn run(args: RevisionArgs, global: &GlobalArgs) -> Result<()> {
    let config = load_config()?;
    let client = kube_client(global, &config).await?;
    let namespace = resolve_istio_namespace(global.istio_namespace.as_deref(), &config);
    let source = KubeRevisionSource::new(client, namespace);
    let profiles = match args.manifests.as_ref().or(config.manifests.as_ref()) {
        Some(dir) => ProfileSet::from_dir(dir),
        None => ProfileSet::builtin(),
    };

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    match &args.command {
        RevisionCommand::List => list(&mut out, &source, &profiles, &args).await,
        RevisionCommand::Describe { revision } => {
            describe(&mut out, &source, &profiles, revision, &args).await
        }
    }
}

async fn list(
    w: &mut dyn Write,
    source: &dyn RevisionSource,
    profiles: &dyn ProfileRenderer,
    args: &RevisionArgs,
) -> Result<()> {
    let revisions = list_revisions(source, profiles, args.verbose).await?;
    match args.output {
        OutputFormat::Table => print_revision_list_table(w, args.verbose, &revisions)?,
        OutputFormat::Json => print_json(w, &revisions)?,
    }
    Ok(())
}

/// Map the user-facing revision argument to the label value
pub fn normalize_revision(name: &str) -> Result<&str> {
    if name == DEFAULT_REVISION_ALIAS {
        return Ok(DEFAULT_REVISION);
    }
    if !is_dns1123_label(name) {
        return Err(Error::validation(format!(
            "revision {:?} must be a DNS-1123 label: lower case alphanumeric characters or '-', \
             starting and ending with an alphanumeric character, at most 63 characters",
            name
        )));
    }
    Ok(name)
}

async fn describe(
    w: &mut dyn Write,
    source: &dyn RevisionSource,
    profiles: &dyn ProfileRenderer,
    revision: &str,
    args: &RevisionArgs,
) -> Result<()> {
    let revision = normalize_revision(revision)?;
    let sections = if args.verbose {
        Section::VERBOSE
    } else {
        Section::DEFAULT
    };
    let report = describe_revision(source, profiles, revision, sections).await?;
    let description = report.into_result()?;
    match args.output {
        OutputFormat::Table => print_description_table(w, sections, &description)?,
        OutputFormat::Json => print_json(w, &description)?,
    }
    Ok(())
}
