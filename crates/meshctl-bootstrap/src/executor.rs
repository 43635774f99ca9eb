//! Plan executors
//!
//! [`DirectoryWriter`] lays a bundle out on the local filesystem.
//! [`copy_bundle`] pushes a plan to a node through a [`RemoteHost`];
//! [`DryRunHost`] records what would be done instead of doing it.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use meshctl_common::{Error, Result};
use tracing::{debug, warn};

#[cfg(test)]
use mockall::automock;

use crate::annotations::RemoteTarget;
use crate::bundle::BootstrapPlan;
use crate::script::BundleWriter;

// =============================================================================
// Local directory
// =============================================================================

/// Writes bundle files below a root directory
#[derive(Clone, Debug)]
pub struct DirectoryWriter {
    root: PathBuf,
}

impl DirectoryWriter {
    /// Writer rooted at `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Writer for one workload: `root/<workload>` when several workloads
    /// share the output directory, `root` otherwise
    pub fn for_workload(root: &Path, workload: &str, multi: bool) -> Self {
        if multi {
            Self::new(root.join(workload))
        } else {
            Self::new(root)
        }
    }

    /// Root directory
    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode))
}

#[cfg(not(unix))]
fn set_mode(_path: &Path, _mode: u32) -> std::io::Result<()> {
    Ok(())
}

impl BundleWriter for DirectoryWriter {
    fn write(&mut self, path: &str, mode: u32, content: &[u8]) -> Result<()> {
        let target = self.root.join(path);
        if let Some(dir) = target.parent() {
            fs::create_dir_all(dir).map_err(|e| Error::io(dir.display().to_string(), e))?;
        }
        fs::write(&target, content).map_err(|e| Error::io(target.display().to_string(), e))?;
        set_mode(&target, mode).map_err(|e| Error::io(target.display().to_string(), e))?;
        debug!(path = %target.display(), mode = format!("{:o}", mode), "wrote bundle file");
        Ok(())
    }
}

// =============================================================================
// Remote node
// =============================================================================

/// Shell and file copy access to a node
#[cfg_attr(test, automock)]
#[async_trait]
pub trait RemoteHost: Send + Sync {
    /// Run `cmd` on the node
    async fn exec(&self, cmd: &str) -> Result<()>;

    /// Copy `data` to `path` on the node with the given mode
    async fn copy(&self, data: &[u8], path: &str, mode: u32) -> Result<()>;
}

/// Copy the plan's files to the node, creating each directory once, and
/// run its commands when `start_proxy` is set. Failed required commands
/// abort; failed optional commands are logged.
pub async fn copy_bundle(host: &dyn RemoteHost, plan: &BootstrapPlan, start_proxy: bool) -> Result<()> {
    let mut created = BTreeSet::new();
    for file in &plan.files {
        if created.insert(file.dir.as_str()) {
            host.exec(&format!("mkdir -p {}", file.dir)).await?;
        }
        host.copy(&file.data, &file.path(), file.mode).await?;
    }

    if !start_proxy {
        return Ok(());
    }
    for command in &plan.commands {
        if let Err(e) = host.exec(&command.cmd).await {
            if command.required {
                return Err(e);
            }
            warn!(command = %command.cmd, error = %e, "optional command failed");
        }
    }
    Ok(())
}

/// Records the actions a real host would perform
#[derive(Debug)]
pub struct DryRunHost {
    target: RemoteTarget,
    actions: Mutex<Vec<String>>,
}

impl DryRunHost {
    /// Dry run against `target`
    pub fn new(target: RemoteTarget) -> Self {
        let actions = vec![format!(
            "[SSH client({}@{})] connect",
            target.user,
            target.address()
        )];
        Self {
            target,
            actions: Mutex::new(actions),
        }
    }

    fn record(&self, action: String) -> Result<()> {
        self.actions
            .lock()
            .map_err(|_| Error::internal("dry-run action log poisoned"))?
            .push(action);
        Ok(())
    }

    /// Everything recorded so far
    pub fn into_actions(self) -> Vec<String> {
        self.actions.into_inner().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl RemoteHost for DryRunHost {
    async fn exec(&self, cmd: &str) -> Result<()> {
        self.record(format!(
            "[SSH client({}@{})] exec: {}",
            self.target.user,
            self.target.address(),
            cmd
        ))
    }

    async fn copy(&self, data: &[u8], path: &str, mode: u32) -> Result<()> {
        self.record(format!(
            "[SSH client({}@{})] copy {} bytes to {} (mode {:o}) via {}",
            self.target.user,
            self.target.address(),
            data.len(),
            path,
            mode,
            self.target.scp_path
        ))
    }
}
