//! Sync status table from controller syncz payloads

use std::collections::BTreeMap;
use std::io::Write;

use meshctl_common::table::{TableWriter, DEFAULT_PADDING};
use meshctl_common::{Error, Result};
use tracing::debug;

use crate::model::{NormalizedStatus, SyncStatus};

/// Columns shown when none are requested
pub const DEFAULT_XDS_COLUMNS: &[&str] = &["CDS", "LDS", "EDS", "RDS"];

/// Renders proxy sync status from JSON syncz payloads
#[derive(Clone, Debug)]
pub struct StatusWriter {
    xds_cols: Vec<String>,
}

impl Default for StatusWriter {
    fn default() -> Self {
        Self::new(DEFAULT_XDS_COLUMNS.iter().map(|c| c.to_string()).collect())
    }
}

impl StatusWriter {
    /// Writer showing one column per discovery type in `xds_cols`
    pub fn new(xds_cols: Vec<String>) -> Self {
        Self { xds_cols }
    }

    /// Every proxy reported by any controller, sorted by proxy id.
    /// `statuses` maps controller id to its raw JSON payload.
    pub fn print_all<W: Write + ?Sized>(
        &self,
        w: &mut W,
        statuses: &BTreeMap<String, Vec<u8>>,
    ) -> Result<()> {
        self.print_matching(w, statuses, |_| true)
    }

    /// Only proxies whose id contains `proxy`
    pub fn print_single<W: Write + ?Sized>(
        &self,
        w: &mut W,
        statuses: &BTreeMap<String, Vec<u8>>,
        proxy: &str,
    ) -> Result<()> {
        self.print_matching(w, statuses, |s| s.proxy_id.contains(proxy))
    }

    fn print_matching<W, F>(&self, w: &mut W, statuses: &BTreeMap<String, Vec<u8>>, keep: F) -> Result<()>
    where
        W: Write + ?Sized,
        F: Fn(&NormalizedStatus) -> bool,
    {
        let all = collect_statuses(statuses)?;
        let mut table = TableWriter::new(DEFAULT_PADDING);
        table.line(&format!("NAME\t{}\tISTIOD\tVERSION", self.xds_cols.join("\t")));
        for status in all.iter().filter(|s| keep(s)) {
            let mut row = vec![status.proxy_id.clone()];
            row.extend(self.xds_cols.iter().map(|col| status.label(col).to_string()));
            row.push(status.controller.clone());
            row.push(status.version());
            table.row(row);
        }
        table
            .flush_to(w)
            .map_err(|e| Error::io("<output>", e))
    }
}

/// Decode every controller payload and sort the proxies by id
pub fn collect_statuses(statuses: &BTreeMap<String, Vec<u8>>) -> Result<Vec<NormalizedStatus>> {
    let mut all = Vec::new();
    for (controller, payload) in statuses {
        let decoded: Vec<SyncStatus> = serde_json::from_slice(payload).map_err(|e| {
            Error::serialization_for("SyncStatus", format!("payload from {}: {}", controller, e))
        })?;
        debug!(controller = %controller, proxies = decoded.len(), "decoded sync status");
        all.extend(
            decoded
                .into_iter()
                .map(|s| NormalizedStatus::from_sync(controller, s)),
        );
    }
    all.sort_by(|a, b| a.proxy_id.cmp(&b.proxy_id));
    Ok(all)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payloads() -> BTreeMap<String, Vec<u8>> {
        let first = r#"[
            {"proxy": "reviews-v1.bookinfo", "istio_version": "1.8.0",
             "cluster_sent": "n1", "cluster_acked": "n1",
             "listener_sent": "n2", "listener_acked": "n1",
             "route_sent": "n3"}
        ]"#;
        let second = r#"[
            {"proxy": "details-v1.bookinfo", "proxy_version": "1.7.5"}
        ]"#;
        [
            ("istiod-a".to_string(), first.as_bytes().to_vec()),
            ("istiod-b".to_string(), second.as_bytes().to_vec()),
        ]
        .into()
    }

    fn render(f: impl FnOnce(&mut Vec<u8>) -> Result<()>) -> String {
        let mut out = Vec::new();
        f(&mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn rows_are_sorted_by_proxy_id() {
        let out = render(|w| StatusWriter::default().print_all(w, &payloads()));
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("NAME"));
        assert!(lines[0].ends_with("ISTIOD       VERSION"));
        assert!(lines[1].starts_with("details-v1.bookinfo"));
        assert!(lines[1].ends_with("1.7.5*"));
        assert!(lines[2].starts_with("reviews-v1.bookinfo"));
        assert!(lines[2].contains("SYNCED"));
        assert!(lines[2].contains("STALE "));
        assert!(lines[2].contains("STALE (Never Acknowledged)"));
        assert!(lines[2].contains("istiod-a"));
    }

    #[test]
    fn exact_table_layout() {
        let payload: BTreeMap<String, Vec<u8>> = [(
            "istiod".to_string(),
            br#"[{"proxy": "app.ns", "istio_version": "1.8.0", "cluster_sent": "x", "cluster_acked": "x"}]"#.to_vec(),
        )]
        .into();
        let out = render(|w| StatusWriter::new(vec!["CDS".to_string()]).print_all(w, &payload));
        assert_eq!(
            out,
            "NAME       CDS        ISTIOD     VERSION\napp.ns     SYNCED     istiod     1.8.0\n"
        );
    }

    #[test]
    fn single_filters_by_substring() {
        let out = render(|w| StatusWriter::default().print_single(w, &payloads(), "reviews"));
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[1].starts_with("reviews-v1.bookinfo"));
    }

    #[test]
    fn custom_columns_use_generic_statuses() {
        let payload: BTreeMap<String, Vec<u8>> = [(
            "istiod".to_string(),
            br#"[{"proxy": "app.ns", "statuses": {"ECDS": {"nonce_sent": "a", "nonce_acked": "a"}}}]"#.to_vec(),
        )]
        .into();
        let out = render(|w| StatusWriter::new(vec!["ECDS".to_string()]).print_all(w, &payload));
        assert!(out.starts_with("NAME       ECDS       ISTIOD     VERSION\n"));
        assert!(out.contains("SYNCED"));
    }

    #[test]
    fn malformed_payload_is_a_serialization_error() {
        let payload: BTreeMap<String, Vec<u8>> = [("istiod".to_string(), b"{not json".to_vec())].into();
        let mut out = Vec::new();
        let err = StatusWriter::default().print_all(&mut out, &payload).unwrap_err();
        assert!(matches!(err, Error::Serialization { .. }));
    }
}
