//! Install profiles
//!
//! A profile is an IstioOperator manifest. Every profile other than
//! `default` is an overlay applied on top of `default`. Profiles ship with
//! the binary and can be replaced by a manifests directory laid out as
//! `<dir>/profiles/<name>.yaml`.

use std::path::PathBuf;

use meshctl_common::merge::merged;
use meshctl_common::yaml::parse_yaml;
use meshctl_common::{Error, Result, DEFAULT_REVISION};
use serde_json::Value;
use tracing::debug;

#[cfg(test)]
use mockall::automock;

/// Produces the fully defaulted spec for a profile
#[cfg_attr(test, automock)]
pub trait ProfileRenderer: Send + Sync {
    /// The `spec` section of `profile`, as JSON
    fn render(&self, profile: &str) -> Result<Value>;
}

const BUILTIN_PROFILES: &[(&str, &str)] = &[
    ("default", include_str!("../profiles/default.yaml")),
    ("demo", include_str!("../profiles/demo.yaml")),
    ("minimal", include_str!("../profiles/minimal.yaml")),
    ("empty", include_str!("../profiles/empty.yaml")),
];

/// Profiles loaded from the binary or from a manifests directory
#[derive(Clone, Debug, Default)]
pub struct ProfileSet {
    manifests: Option<PathBuf>,
}

impl ProfileSet {
    /// Profiles compiled into the binary
    pub fn builtin() -> Self {
        Self { manifests: None }
    }

    /// Profiles read from `<dir>/profiles`
    pub fn from_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            manifests: Some(dir.into()),
        }
    }

    /// Names of the compiled-in profiles
    pub fn builtin_names() -> impl Iterator<Item = &'static str> {
        BUILTIN_PROFILES.iter().map(|(name, _)| *name)
    }

    fn load_spec(&self, name: &str) -> Result<Value> {
        let raw = match &self.manifests {
            Some(dir) => {
                let path = dir.join("profiles").join(format!("{}.yaml", name));
                debug!(path = %path.display(), "loading profile");
                std::fs::read_to_string(&path)
                    .map_err(|e| Error::io(path.display().to_string(), e))?
            }
            None => BUILTIN_PROFILES
                .iter()
                .find(|(n, _)| *n == name)
                .map(|(_, body)| body.to_string())
                .ok_or_else(|| Error::not_found("profile", name))?,
        };
        let doc = parse_yaml(&raw)?;
        Ok(doc
            .get("spec")
            .cloned()
            .unwrap_or_else(|| Value::Object(Default::default())))
    }
}

impl ProfileRenderer for ProfileSet {
    fn render(&self, profile: &str) -> Result<Value> {
        let base = self.load_spec(DEFAULT_REVISION)?;
        if profile.is_empty() || profile == DEFAULT_REVISION {
            return Ok(base);
        }
        let overlay = self.load_spec(profile)?;
        Ok(merged(&base, &overlay))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_builtin_profile_renders() {
        let profiles = ProfileSet::builtin();
        for name in ProfileSet::builtin_names() {
            let spec = profiles.render(name).unwrap();
            assert_eq!(spec["hub"], "docker.io/istio", "profile {name}");
        }
    }

    #[test]
    fn overlay_profile_changes_only_what_it_sets() {
        let profiles = ProfileSet::builtin();
        let demo = profiles.render("demo").unwrap();
        assert_eq!(demo["meshConfig"]["accessLogFile"], "/dev/stdout");
        assert_eq!(demo["values"]["pilot"]["autoscaleMin"], 1);
        assert_eq!(demo["values"]["pilot"]["autoscaleEnabled"], false);
    }

    #[test]
    fn unknown_builtin_profile_is_not_found() {
        let err = ProfileSet::builtin().render("nope").unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }

    #[test]
    fn manifests_directory_overrides_builtins() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("profiles")).unwrap();
        std::fs::write(
            dir.path().join("profiles/default.yaml"),
            "spec:\n  hub: registry.local/mesh\n",
        )
        .unwrap();
        std::fs::write(dir.path().join("profiles/custom.yaml"), "spec:\n  tag: dev\n").unwrap();

        let spec = ProfileSet::from_dir(dir.path()).render("custom").unwrap();
        assert_eq!(spec, serde_json::json!({"hub": "registry.local/mesh", "tag": "dev"}));
    }

    #[test]
    fn missing_profile_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = ProfileSet::from_dir(dir.path()).render("default").unwrap_err();
        assert!(matches!(err, Error::Io { .. }));
    }
}
