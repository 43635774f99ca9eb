//! Revision inventory
//!
//! Revisions are discovered from injection webhooks. IstioOperator resources
//! are attached to the revision they install, when that revision has a
//! webhook.

use std::collections::BTreeMap;

use meshctl_common::{Result, DEFAULT_REVISION};
use tracing::debug;

use crate::components::enabled_components;
use crate::diff::customizations;
use crate::model::{render_with_default, IstioOperatorCrInfo, RevisionDescription, WebhookInfo};
use crate::profile::ProfileRenderer;
use crate::source::RevisionSource;

/// Revisions keyed by name, `<default>` for the unlabelled revision
pub type RevisionMap = BTreeMap<String, RevisionDescription>;

/// Build the revision inventory. With `verbose` each IstioOperator carries
/// its customizations.
pub async fn list_revisions(
    source: &dyn RevisionSource,
    renderer: &dyn ProfileRenderer,
    verbose: bool,
) -> Result<RevisionMap> {
    let mut revisions = RevisionMap::new();

    for hook in source.list_webhooks().await? {
        let revision = render_with_default(hook.revision(), DEFAULT_REVISION);
        let info = WebhookInfo {
            name: hook.name.clone(),
            revision: revision.clone(),
            tag: hook.tag().to_string(),
        };
        match revisions.get_mut(&revision) {
            // the first webhook names the revision, later ones only add tags
            Some(desc) if !info.tag.is_empty() => desc.webhooks.push(info),
            Some(_) => {}
            None => {
                revisions.insert(
                    revision,
                    RevisionDescription {
                        webhooks: vec![info],
                        ..Default::default()
                    },
                );
            }
        }
    }

    for iop in source.list_operators().await? {
        let revision = render_with_default(&iop.spec.revision, DEFAULT_REVISION);
        let Some(desc) = revisions.get_mut(&revision) else {
            debug!(revision = %revision, name = ?iop.metadata.name, "operator without webhook");
            continue;
        };
        let customizations = if verbose {
            customizations(&iop.spec, renderer)?
        } else {
            Vec::new()
        };
        desc.istio_operator_crs.push(IstioOperatorCrInfo {
            namespace: iop.metadata.namespace.clone().unwrap_or_default(),
            name: iop.metadata.name.clone().unwrap_or_default(),
            profile: iop.spec.profile.clone(),
            components: enabled_components(&iop.spec),
            customizations,
        });
    }

    Ok(revisions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::MockProfileRenderer;
    use crate::source::{MockRevisionSource, MutatingWebhook};
    use meshctl_common::crd::{IstioOperator, IstioOperatorSpec};
    use meshctl_common::{REVISION_LABEL, TAG_LABEL};
    use serde_json::json;

    fn webhook(name: &str, revision: Option<&str>, tag: Option<&str>) -> MutatingWebhook {
        let mut labels = BTreeMap::new();
        if let Some(rev) = revision {
            labels.insert(REVISION_LABEL.to_string(), rev.to_string());
        }
        if let Some(tag) = tag {
            labels.insert(TAG_LABEL.to_string(), tag.to_string());
        }
        MutatingWebhook {
            name: name.to_string(),
            labels,
        }
    }

    fn operator(name: &str, revision: &str, tag: &str) -> IstioOperator {
        IstioOperator::new(
            name,
            IstioOperatorSpec {
                revision: revision.to_string(),
                tag: tag.to_string(),
                ..Default::default()
            },
        )
    }

    fn source() -> MockRevisionSource {
        let mut source = MockRevisionSource::new();
        source.expect_list_webhooks().returning(|| {
            Ok(vec![
                webhook("istio-sidecar-injector", None, None),
                webhook("istio-revision-tag-prod", Some("canary"), Some("prod")),
                webhook("istio-sidecar-injector-canary", Some("canary"), None),
                webhook("istio-revision-tag-beta", Some("canary"), Some("beta")),
            ])
        });
        source.expect_list_operators().returning(|| {
            Ok(vec![
                operator("installed-state", "", "1.8.0"),
                operator("installed-state-canary", "canary", ""),
                operator("orphan", "gone", ""),
            ])
        });
        source
    }

    #[tokio::test]
    async fn revisions_come_from_webhooks() {
        let mut renderer = MockProfileRenderer::new();
        renderer.expect_render().never();

        let revisions = list_revisions(&source(), &renderer, false).await.unwrap();
        assert_eq!(revisions.keys().collect::<Vec<_>>(), vec!["<default>", "canary"]);

        let canary = &revisions["canary"];
        let tags: Vec<_> = canary.webhooks.iter().map(|w| w.tag.as_str()).collect();
        assert_eq!(tags, vec!["prod", "beta"]);
        assert_eq!(canary.istio_operator_crs[0].name, "installed-state-canary");
        assert!(canary.istio_operator_crs[0].customizations.is_empty());
    }

    #[tokio::test]
    async fn unlabelled_operators_join_the_default_revision() {
        let mut renderer = MockProfileRenderer::new();
        renderer.expect_render().never();

        let revisions = list_revisions(&source(), &renderer, false).await.unwrap();
        let default = &revisions["<default>"];
        assert_eq!(default.istio_operator_crs.len(), 1);
        assert_eq!(default.istio_operator_crs[0].name, "installed-state");
        assert!(!revisions.contains_key("gone"));
    }

    #[tokio::test]
    async fn verbose_listing_adds_customizations() {
        let mut renderer = MockProfileRenderer::new();
        renderer
            .expect_render()
            .times(2)
            .returning(|_| Ok(json!({"tag": "latest"})));

        let revisions = list_revisions(&source(), &renderer, true).await.unwrap();
        let default = &revisions["<default>"].istio_operator_crs[0];
        assert_eq!(default.customizations.len(), 1);
        assert_eq!(default.customizations[0].path, "tag");
        assert_eq!(default.customizations[0].value, "\"1.8.0\"");
    }
}
