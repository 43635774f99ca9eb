//! Bootstrap bundles and the plans composed from them
//!
//! A [`BootstrapBundle`] is everything one workload needs to join the mesh.
//! [`compose`] turns it into a [`BootstrapPlan`]: the files to place in a
//! directory on the node and the commands that start the sidecar. Composing
//! does no I/O; executors consume the plan.

use crate::sidecar::WorkloadSidecar;

/// Mode of configuration files
pub const CONFIG_FILE_MODE: u32 = 0o644;
/// Mode of the identity token
pub const SECRET_FILE_MODE: u32 = 0o640;

/// Environment file name
pub const ENV_FILE: &str = "sidecar.env";
/// CA certificate file name
pub const CA_CERT_FILE: &str = "istio-ca.pem";
/// Identity token file name
pub const TOKEN_FILE: &str = "istio-token";

/// Path the agent reads the root certificate from
const CONTAINER_ROOT_CERT: &str = "/var/run/secrets/istio/root-cert.pem";
/// Path the agent reads the workload token from
const CONTAINER_TOKEN: &str = "/var/run/secrets/tokens/istio-token";

/// Inputs for one workload, fixed once built
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BootstrapBundle {
    /// Root certificate of the mesh CA
    pub ca_cert: Vec<u8>,
    /// Ingress gateway address the host aliases point at
    pub gateway_address: String,
    /// WorkloadEntry name
    pub workload_name: String,
    /// WorkloadEntry namespace
    pub workload_namespace: String,
    /// Service account token of the workload
    pub token: Vec<u8>,
    /// Sidecar parameters
    pub sidecar: WorkloadSidecar,
}

/// A file to place on the node
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlannedFile {
    /// File name
    pub name: String,
    /// Directory the file goes into
    pub dir: String,
    /// Unix permission bits
    pub mode: u32,
    /// Contents
    pub data: Vec<u8>,
}

impl PlannedFile {
    /// `dir/name`
    pub fn path(&self) -> String {
        format!("{}/{}", self.dir.trim_end_matches('/'), self.name)
    }
}

/// A shell command to run on the node
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlannedCommand {
    /// Command line
    pub cmd: String,
    /// Whether a failure aborts the bootstrap
    pub required: bool,
}

/// Files and commands for one workload, in execution order
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BootstrapPlan {
    /// Files, in copy order
    pub files: Vec<PlannedFile>,
    /// Commands, in execution order
    pub commands: Vec<PlannedCommand>,
}

/// Plan placing the bundle files in `remote_dir` and starting the sidecar
/// container from them
pub fn compose(bundle: &BootstrapBundle, remote_dir: &str) -> BootstrapPlan {
    let file = |name: &str, mode: u32, data: &[u8]| PlannedFile {
        name: name.to_string(),
        dir: remote_dir.to_string(),
        mode,
        data: data.to_vec(),
    };
    let files = vec![
        file(ENV_FILE, CONFIG_FILE_MODE, &bundle.sidecar.environment),
        file(CA_CERT_FILE, CONFIG_FILE_MODE, &bundle.ca_cert),
        file(TOKEN_FILE, SECRET_FILE_MODE, &bundle.token),
    ];

    let container = &bundle.sidecar.container_name;
    let mut run: Vec<String> = [
        "docker",
        "run",
        "-d",
        "--name",
        container,
        "--restart",
        "unless-stopped",
        "--network",
        "host",
        "-v",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();
    run.push(format!("{}/{}:{}", remote_dir, CA_CERT_FILE, CONTAINER_ROOT_CERT));
    run.push("-v".to_string());
    run.push(format!("{}/{}:{}", remote_dir, TOKEN_FILE, CONTAINER_TOKEN));
    run.push("--env-file".to_string());
    run.push(format!("{}/{}", remote_dir, ENV_FILE));
    for host in &bundle.sidecar.hosts {
        run.push("--add-host".to_string());
        run.push(format!("{}:{}", host, bundle.gateway_address));
    }
    run.push(bundle.sidecar.image.clone());
    run.extend(bundle.sidecar.args.iter().cloned());

    let commands = vec![
        PlannedCommand {
            cmd: format!("docker rm --force {}", container),
            required: false,
        },
        PlannedCommand {
            cmd: run.join(" "),
            required: true,
        },
    ];

    BootstrapPlan { files, commands }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bundle(hosts: &[&str]) -> BootstrapBundle {
        BootstrapBundle {
            ca_cert: b"CERT".to_vec(),
            gateway_address: "1.2.3.4".to_string(),
            workload_name: "vm-1".to_string(),
            workload_namespace: "bookinfo".to_string(),
            token: b"TOKEN".to_vec(),
            sidecar: WorkloadSidecar {
                container_name: "istio-proxy".to_string(),
                image: "docker.io/istio/proxyv2:1.8.0".to_string(),
                args: vec!["proxy".to_string(), "sidecar".to_string()],
                hosts: hosts.iter().map(|h| h.to_string()).collect(),
                environment: b"A=b\n".to_vec(),
            },
        }
    }

    #[test]
    fn files_come_in_fixed_order_with_modes() {
        let plan = compose(&bundle(&["istiod.istio-system.svc"]), "/tmp/istio-proxy");
        let files: Vec<(String, u32)> = plan.files.iter().map(|f| (f.path(), f.mode)).collect();
        assert_eq!(
            files,
            vec![
                ("/tmp/istio-proxy/sidecar.env".to_string(), 0o644),
                ("/tmp/istio-proxy/istio-ca.pem".to_string(), 0o644),
                ("/tmp/istio-proxy/istio-token".to_string(), 0o640),
            ]
        );
        assert_eq!(plan.files[2].data, b"TOKEN");
    }

    #[test]
    fn commands_remove_then_run() {
        let plan = compose(&bundle(&["istiod.istio-system.svc"]), "/tmp/istio-proxy");
        assert_eq!(plan.commands.len(), 2);
        assert_eq!(plan.commands[0].cmd, "docker rm --force istio-proxy");
        assert!(!plan.commands[0].required);
        assert!(plan.commands[1].required);
        assert_eq!(
            plan.commands[1].cmd,
            "docker run -d --name istio-proxy --restart unless-stopped --network host \
             -v /tmp/istio-proxy/istio-ca.pem:/var/run/secrets/istio/root-cert.pem \
             -v /tmp/istio-proxy/istio-token:/var/run/secrets/tokens/istio-token \
             --env-file /tmp/istio-proxy/sidecar.env \
             --add-host istiod.istio-system.svc:1.2.3.4 \
             docker.io/istio/proxyv2:1.8.0 proxy sidecar"
        );
    }

    #[test]
    fn one_add_host_per_alias() {
        let plan = compose(&bundle(&["a.svc", "b.example.com", "c.example.com"]), "/d");
        assert_eq!(plan.commands[1].cmd.matches("--add-host").count(), 3);
        assert!(plan.commands[1].cmd.contains("--add-host b.example.com:1.2.3.4"));
    }

    #[test]
    fn composing_twice_is_identical() {
        let b = bundle(&["istiod.istio-system.svc"]);
        assert_eq!(compose(&b, "/tmp/x"), compose(&b, "/tmp/x"));
    }
}
