//! Proxy status command
//!
//! Reads controller status payloads saved to disk, one file per controller.
//! `*.json` files hold syncz status lists; `*.pb` files hold a binary
//! discovery response with `ClientConfig` resources.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use clap::Args;
use envoy_types::pb::envoy::service::discovery::v3::DiscoveryResponse;
use meshctl_status::{StatusWriter, XdsStatusWriter, DEFAULT_XDS_COLUMNS};
use prost::Message;
use tracing::debug;

use crate::{Error, Result};

const DISCOVERY_RESPONSE_EXTENSION: &str = "pb";

#[derive(Args, Debug)]
pub struct ProxyStatusArgs {
    /// Status payload files; the file stem names the controller
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Only show proxies whose id contains this string
    #[arg(long)]
    pub proxy: Option<String>,

    /// Discovery types to show, as short names
    #[arg(long, value_delimiter = ',')]
    pub xds_cols: Vec<String>,
}

pub fn run(args: ProxyStatusArgs) -> Result<()> {
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    print_status(&mut out, &args)?;
    out.flush()?;
    Ok(())
}

fn controller_id(path: &Path) -> Result<String> {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .ok_or_else(|| Error::validation(format!("{} has no file name", path.display())))
}

fn is_discovery_response(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext == DISCOVERY_RESPONSE_EXTENSION)
}

/// Render the status table for `args.files` to `w`
pub fn print_status(w: &mut dyn Write, args: &ProxyStatusArgs) -> Result<()> {
    let binary = args.files.iter().filter(|f| is_discovery_response(f)).count();
    if binary != 0 && binary != args.files.len() {
        return Err(Error::validation(
            "payload files must be either all syncz JSON or all discovery responses",
        ));
    }

    if binary > 0 {
        let mut responses = BTreeMap::new();
        for file in &args.files {
            let raw = std::fs::read(file)?;
            let response = DiscoveryResponse::decode(raw.as_slice())
                .map_err(|e| Error::validation(format!("{}: {}", file.display(), e)))?;
            responses.insert(controller_id(file)?, response);
        }
        debug!(controllers = responses.len(), "rendering discovery responses");
        XdsStatusWriter.print_all(w, &responses)?;
        return Ok(());
    }

    let mut statuses = BTreeMap::new();
    for file in &args.files {
        statuses.insert(controller_id(file)?, std::fs::read(file)?);
    }
    let columns = if args.xds_cols.is_empty() {
        DEFAULT_XDS_COLUMNS.iter().map(|c| c.to_string()).collect()
    } else {
        args.xds_cols.clone()
    };
    let writer = StatusWriter::new(columns);
    match &args.proxy {
        Some(proxy) => writer.print_single(w, &statuses, proxy)?,
        None => writer.print_all(w, &statuses)?,
    }
    Ok(())
}
