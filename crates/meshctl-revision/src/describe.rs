//! Revision description
//!
//! Gathers webhooks, IstioOperator resources and pods of one revision into
//! a [`RevisionDescription`]. A section that cannot be read is recorded and
//! the remaining sections are still filled.

use std::collections::BTreeMap;

use meshctl_common::crd::IstioOperator;
use meshctl_common::{Error, Result};
use tracing::{debug, warn};

use crate::components::enabled_components;
use crate::diff::customizations;
use crate::model::{IstioOperatorCrInfo, PodInfo, RevisionDescription, Section, WebhookInfo};
use crate::profile::ProfileRenderer;
use crate::source::{RevisionSource, EGRESS_COMPONENT, INGRESS_COMPONENT, PILOT_COMPONENT};

/// A description together with the section failures met while building it
#[derive(Debug, Default)]
pub struct RevisionReport {
    /// Whatever could be collected
    pub description: RevisionDescription,
    /// Failures of individual sections
    pub errors: Vec<Error>,
}

impl RevisionReport {
    /// The description, or all section failures joined
    pub fn into_result(self) -> Result<RevisionDescription> {
        Error::join(self.errors)?;
        Ok(self.description)
    }
}

/// IstioOperator resources installing `revision`
pub fn operators_for_revision(operators: Vec<IstioOperator>, revision: &str) -> Vec<IstioOperator> {
    operators
        .into_iter()
        .filter(|iop| iop.spec.matches_revision(revision))
        .collect()
}

fn operator_info(iop: &IstioOperator, renderer: &dyn ProfileRenderer) -> Result<IstioOperatorCrInfo> {
    Ok(IstioOperatorCrInfo {
        namespace: iop.metadata.namespace.clone().unwrap_or_default(),
        name: iop.metadata.name.clone().unwrap_or_default(),
        profile: iop.spec.profile.clone(),
        components: enabled_components(&iop.spec),
        customizations: customizations(&iop.spec, renderer)?,
    })
}

fn namespace_summary(pods: &[PodInfo]) -> BTreeMap<String, u32> {
    let mut summary = BTreeMap::new();
    for pod in pods {
        *summary.entry(pod.namespace.clone()).or_insert(0) += 1;
    }
    summary
}

/// Describe `revision`, filling only the requested sections
pub async fn describe_revision(
    source: &dyn RevisionSource,
    renderer: &dyn ProfileRenderer,
    revision: &str,
    sections: &[Section],
) -> Result<RevisionReport> {
    let operators = operators_for_revision(source.list_operators().await?, revision);
    let webhooks: Vec<_> = source
        .list_webhooks()
        .await?
        .into_iter()
        .filter(|wh| wh.matches_revision(revision))
        .collect();
    let control_plane = source.list_component_pods(revision, PILOT_COMPONENT).await?;

    if webhooks.is_empty() && operators.is_empty() && control_plane.is_empty() {
        return Err(Error::not_found("revision", revision));
    }
    debug!(
        revision,
        operators = operators.len(),
        webhooks = webhooks.len(),
        "describing revision"
    );

    let mut report = RevisionReport::default();
    let mut revision_pods: Option<Vec<PodInfo>> = None;

    for section in sections {
        match section {
            Section::IstioOperatorCr => {
                for iop in &operators {
                    match operator_info(iop, renderer) {
                        Ok(info) => report.description.istio_operator_crs.push(info),
                        Err(e) => {
                            warn!(error = %e, "failed to compute customizations");
                            report.errors.push(e);
                        }
                    }
                }
            }
            Section::Webhooks => {
                report.description.webhooks = webhooks
                    .iter()
                    .map(|wh| WebhookInfo {
                        name: wh.name.clone(),
                        revision: wh.revision().to_string(),
                        tag: wh.tag().to_string(),
                    })
                    .collect();
            }
            Section::ControlPlane => {
                report.description.control_plane_pods = control_plane.clone();
            }
            Section::Gateways => {
                match source.list_component_pods(revision, INGRESS_COMPONENT).await {
                    Ok(pods) => report.description.ingress_gateways = pods,
                    Err(e) => report.errors.push(e),
                }
                match source.list_component_pods(revision, EGRESS_COMPONENT).await {
                    Ok(pods) => report.description.egress_gateways = pods,
                    Err(e) => report.errors.push(e),
                }
            }
            Section::NamespaceSummary | Section::Pods => {
                if revision_pods.is_none() {
                    match source.list_revision_pods(revision).await {
                        Ok(pods) => revision_pods = Some(pods),
                        Err(e) => {
                            report.errors.push(e);
                            continue;
                        }
                    }
                }
                let pods = revision_pods.as_deref().unwrap_or_default();
                if *section == Section::Pods {
                    report.description.pods = pods.to_vec();
                } else {
                    report.description.namespace_summary = namespace_summary(pods);
                }
            }
        }
    }

    Ok(report)
}
