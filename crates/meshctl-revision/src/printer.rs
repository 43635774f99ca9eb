//! Table and JSON rendering of revision reports

use std::io::{self, Write};

use meshctl_common::table::TableWriter;
use meshctl_common::{Error, Result, DEFAULT_REVISION};
use serde::Serialize;

use crate::list::RevisionMap;
use crate::model::{render_with_default, PodInfo, RevisionDescription, Section};

const OUTPUT: &str = "<output>";

fn effective_profile(profile: &str) -> &str {
    if profile.is_empty() {
        DEFAULT_REVISION
    } else {
        profile
    }
}

fn write_err(e: io::Error) -> Error {
    Error::io(OUTPUT, e)
}

/// Pretty-printed JSON followed by a newline
pub fn print_json<W: Write + ?Sized, T: Serialize>(w: &mut W, value: &T) -> Result<()> {
    let out = serde_json::to_string_pretty(value)
        .map_err(|e| Error::serialization(format!("error while marshaling to JSON: {}", e)))?;
    writeln!(w, "{}", out).map_err(write_err)
}

// =============================================================================
// Revision list
// =============================================================================

/// One row per component or customization of each IstioOperator, then one
/// row per remaining tag. Revisions without IstioOperator print `<no-iop>`.
pub fn print_revision_list_table<W: Write + ?Sized>(
    w: &mut W,
    verbose: bool,
    revisions: &RevisionMap,
) -> Result<()> {
    let mut table = TableWriter::new(1);
    let mut header = vec!["REVISION", "TAG", "ISTIO-OPERATOR-CR", "PROFILE", "REQD-COMPONENTS"];
    if verbose {
        header.push("CUSTOMIZATIONS");
    }
    table.row(header);

    for (revision, desc) in revisions {
        let mut tags: Vec<String> = desc
            .webhooks
            .iter()
            .map(|wh| render_with_default(&wh.tag, "no-tag"))
            .collect();
        if tags.is_empty() {
            tags.push("<no-tag>".to_string());
        }

        let mut row_id = 0;
        for iop in &desc.istio_operator_crs {
            let mut custom: Vec<String> = iop
                .customizations
                .iter()
                .map(|c| format!("{}={}", c.path, c.value))
                .collect();
            if custom.is_empty() {
                custom.push("<no-customization>".to_string());
            }
            let rows = iop.components.len().max(1).max(custom.len());
            for i in 0..rows {
                let mut cells = vec![
                    if row_id == 0 { revision.clone() } else { String::new() },
                    tags.get(row_id).cloned().unwrap_or_default(),
                    if i == 0 {
                        format!("{}/{}", iop.namespace, iop.name)
                    } else {
                        String::new()
                    },
                    if i == 0 {
                        effective_profile(&iop.profile).to_string()
                    } else {
                        String::new()
                    },
                    iop.components.get(i).cloned().unwrap_or_default(),
                ];
                if verbose {
                    cells.push(custom.get(i).cloned().unwrap_or_default());
                }
                table.row(cells);
                row_id += 1;
            }
        }

        while row_id < tags.len() {
            let mut cells = vec![
                if row_id == 0 { revision.clone() } else { String::new() },
                tags[row_id].clone(),
                if row_id == 0 { "<no-iop>".to_string() } else { String::new() },
                String::new(),
                String::new(),
            ];
            if verbose {
                cells.push(String::new());
            }
            table.row(cells);
            row_id += 1;
        }
    }

    table.flush_to(w).map_err(write_err)
}

// =============================================================================
// Revision description
// =============================================================================

/// Print every requested section. A failing section does not stop the rest.
pub fn print_description_table<W: Write + ?Sized>(
    w: &mut W,
    sections: &[Section],
    desc: &RevisionDescription,
) -> Result<()> {
    let mut errors = Vec::new();
    for section in sections {
        let printed = match section {
            Section::IstioOperatorCr => print_operators(w, desc),
            Section::Webhooks => print_webhooks(w, desc),
            Section::ControlPlane => print_control_plane(w, desc),
            Section::Gateways => print_gateways(w, desc),
            Section::NamespaceSummary => print_namespace_summary(w, desc),
            Section::Pods => print_pods(w, desc),
        };
        if let Err(e) = printed {
            errors.push(Error::internal_with_context(
                section.name(),
                format!("error in section {}: {}", section, e),
            ));
        }
    }
    Error::join(errors)
}

fn print_pod_table<W: Write + ?Sized>(w: &mut W, pods: &[PodInfo]) -> io::Result<()> {
    let mut table = TableWriter::new(1);
    table.line("NAMESPACE\tNAME\tADDRESS\tSTATUS\tAGE");
    for pod in pods {
        table.row([
            pod.namespace.as_str(),
            pod.name.as_str(),
            pod.address.as_str(),
            pod.status.as_str(),
            pod.age.as_str(),
        ]);
    }
    table.flush_to(w)
}

fn print_operators<W: Write + ?Sized>(w: &mut W, desc: &RevisionDescription) -> io::Result<()> {
    writeln!(w, "\nISTIO-OPERATOR-CR: ({})", desc.istio_operator_crs.len())?;
    if desc.istio_operator_crs.is_empty() {
        if desc.webhooks.is_empty() {
            writeln!(w, "No CRs found.")?;
        } else {
            writeln!(w, "There are webhooks and Istiod could be external to the cluster")?;
        }
        return Ok(());
    }
    for (i, iop) in desc.istio_operator_crs.iter().enumerate() {
        writeln!(w, "\n{}. {}/{}", i + 1, iop.namespace, iop.name)?;
        writeln!(w, "  COMPONENTS:")?;
        for c in &iop.components {
            writeln!(w, "  - {}", c)?;
        }
        writeln!(w, "  CUSTOMIZATIONS:")?;
        for c in &iop.customizations {
            writeln!(w, "  - {}={}", c.path, c.value)?;
        }
    }
    Ok(())
}

fn print_webhooks<W: Write + ?Sized>(w: &mut W, desc: &RevisionDescription) -> io::Result<()> {
    writeln!(w, "\nMUTATING-WEBHOOKS: ({})", desc.webhooks.len())?;
    if desc.webhooks.is_empty() {
        writeln!(
            w,
            "No mutating webhook found for this revision. Something could be wrong with installation"
        )?;
        return Ok(());
    }
    let mut table = TableWriter::new(1);
    table.line("WEBHOOK\tTAG");
    for wh in &desc.webhooks {
        table.row([wh.name.clone(), render_with_default(&wh.tag, "no-tag")]);
    }
    table.flush_to(w)
}

fn print_control_plane<W: Write + ?Sized>(w: &mut W, desc: &RevisionDescription) -> io::Result<()> {
    writeln!(w, "\nCONTROL-PLANE-PODS (ISTIOD): ({})", desc.control_plane_pods.len())?;
    if desc.control_plane_pods.is_empty() {
        if desc.webhooks.is_empty() {
            writeln!(
                w,
                "No Istiod or the webhook found in this cluster for the revision. Something could be wrong"
            )?;
        } else {
            writeln!(
                w,
                "No Istiod found in this cluster for the revision. However there are webhooks. \
                 It is possible that Istiod is external to this cluster or perhaps it is not uninstalled properly"
            )?;
        }
        return Ok(());
    }
    print_pod_table(w, &desc.control_plane_pods)
}

fn print_gateway_pods<W: Write + ?Sized>(
    w: &mut W,
    title: &str,
    kind: &str,
    pods: &[PodInfo],
    enabled: bool,
) -> io::Result<()> {
    writeln!(w, "\n{}-GATEWAYS: ({})", title, pods.len())?;
    if pods.is_empty() {
        if enabled {
            writeln!(
                w,
                "{kind} gateway is enabled for this revision. However there are no such pods. \
                 It could be that it is replaced by {lower}-gateway from another revision \
                 (as it is still upgraded in-place) or it could be some issue with installation",
                kind = kind,
                lower = kind.to_lowercase()
            )?;
        } else {
            writeln!(w, "{} gateway is disabled for this revision", kind)?;
        }
        return Ok(());
    }
    if !enabled {
        writeln!(w, "WARNING: {} gateway is not enabled for this revision.", kind)?;
    }
    print_pod_table(w, pods)
}

fn print_gateways<W: Write + ?Sized>(w: &mut W, desc: &RevisionDescription) -> io::Result<()> {
    print_gateway_pods(
        w,
        "INGRESS",
        "Ingress",
        &desc.ingress_gateways,
        desc.ingress_gateway_enabled(),
    )?;
    print_gateway_pods(
        w,
        "EGRESS",
        "Egress",
        &desc.egress_gateways,
        desc.egress_gateway_enabled(),
    )
}

fn print_namespace_summary<W: Write + ?Sized>(w: &mut W, desc: &RevisionDescription) -> io::Result<()> {
    writeln!(w, "\nNAMESPACE-SUMMARY")?;
    let mut table = TableWriter::new(1);
    table.line("NAMESPACE\tPOD-COUNT");
    for (ns, count) in &desc.namespace_summary {
        table.row([ns.clone(), count.to_string()]);
    }
    table.flush_to(w)
}

fn print_pods<W: Write + ?Sized>(w: &mut W, desc: &RevisionDescription) -> io::Result<()> {
    writeln!(w, "\nPODS: ({})", desc.pods.len())?;
    if desc.pods.is_empty() {
        writeln!(w, "No pod is pointing to this revision. So it is safe to delete")?;
        return Ok(());
    }
    print_pod_table(w, &desc.pods)
}
