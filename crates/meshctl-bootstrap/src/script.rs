//! Offline bundle layout and start script

use crate::bundle::{compose, BootstrapBundle, BootstrapPlan};
use meshctl_common::Result;

/// Variable the start script points at the bundle's `etc` directory
pub const FILES_DIR_VAR: &str = "VM_FILES_DIR";

/// Relative path of the start script inside a bundle
pub const START_SCRIPT: &str = "bin/start-istio-proxy.sh";

/// Mode of the start script
pub const SCRIPT_MODE: u32 = 0o755;

/// Destination for the files of an offline bundle
pub trait BundleWriter {
    /// Write `content` to `path`, relative to the bundle root
    fn write(&mut self, path: &str, mode: u32, content: &[u8]) -> Result<()>;
}

/// Script that runs the plan's commands from the bundle directory
pub fn start_script(plan: &BootstrapPlan) -> String {
    let mut script = format!(
        "#!/usr/bin/env bash\n\n\
         SCRIPT_DIR=$( cd \"$(dirname \"$0\")\" >/dev/null 2>&1 ; pwd -P )\n\n\
         BASE_DIR=\"${{SCRIPT_DIR}}/..\"\n\n\
         {}=\"${{BASE_DIR}}/etc\"\n\n",
        FILES_DIR_VAR
    );
    for command in &plan.commands {
        script.push_str(if command.required { "set -e\n" } else { "set +e\n" });
        script.push_str(&command.cmd);
        script.push_str("\n\n");
    }
    script
}

/// Write the bundle as `etc/*` plus the start script
pub fn write_bundle(bundle: &BootstrapBundle, writer: &mut dyn BundleWriter) -> Result<()> {
    let plan = compose(bundle, &format!("\"${{{}}}\"", FILES_DIR_VAR));
    for file in &plan.files {
        writer.write(&format!("etc/{}", file.name), file.mode, &file.data)?;
    }
    writer.write(START_SCRIPT, SCRIPT_MODE, start_script(&plan).as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sidecar::WorkloadSidecar;

    #[derive(Default)]
    struct Recorder(Vec<(String, u32, Vec<u8>)>);

    impl BundleWriter for Recorder {
        fn write(&mut self, path: &str, mode: u32, content: &[u8]) -> Result<()> {
            self.0.push((path.to_string(), mode, content.to_vec()));
            Ok(())
        }
    }

    fn bundle() -> BootstrapBundle {
        BootstrapBundle {
            ca_cert: b"CERT".to_vec(),
            gateway_address: "1.2.3.4".to_string(),
            token: b"TOKEN".to_vec(),
            sidecar: WorkloadSidecar {
                container_name: "istio-proxy".to_string(),
                image: "proxy:1".to_string(),
                args: vec!["proxy".to_string(), "sidecar".to_string()],
                hosts: vec!["istiod.istio-system.svc".to_string()],
                environment: b"A=b\n".to_vec(),
            },
            ..Default::default()
        }
    }

    #[test]
    fn bundle_layout() {
        let mut rec = Recorder::default();
        write_bundle(&bundle(), &mut rec).unwrap();
        let paths: Vec<(&str, u32)> = rec.0.iter().map(|(p, m, _)| (p.as_str(), *m)).collect();
        assert_eq!(
            paths,
            vec![
                ("etc/sidecar.env", 0o644),
                ("etc/istio-ca.pem", 0o644),
                ("etc/istio-token", 0o640),
                ("bin/start-istio-proxy.sh", 0o755),
            ]
        );
    }

    #[test]
    fn script_toggles_errexit_per_command() {
        let mut rec = Recorder::default();
        write_bundle(&bundle(), &mut rec).unwrap();
        let script = String::from_utf8(rec.0[3].2.clone()).unwrap();
        assert!(script.starts_with("#!/usr/bin/env bash\n"));
        assert!(script.contains("VM_FILES_DIR=\"${BASE_DIR}/etc\"\n"));
        assert!(script.contains("set +e\ndocker rm --force istio-proxy\n\nset -e\ndocker run -d"));
        assert!(script.contains("-v \"${VM_FILES_DIR}\"/istio-ca.pem:/var/run/secrets/istio/root-cert.pem"));
        assert!(script.contains("--env-file \"${VM_FILES_DIR}\"/sidecar.env"));
    }
}
