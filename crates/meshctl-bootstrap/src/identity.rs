//! Workload identity tokens

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use meshctl_common::crd::WorkloadEntry;
use meshctl_common::{Error, Result};
use tracing::debug;

#[cfg(test)]
use mockall::automock;

/// Audience the mesh CA accepts tokens for
pub const TOKEN_AUDIENCE: &str = "istio-ca";

/// Issues service account tokens
#[cfg_attr(test, automock)]
#[async_trait]
pub trait TokenIssuer: Send + Sync {
    /// A token for `service_account` in `namespace`, bound to `audience`
    async fn issue_token(
        &self,
        namespace: &str,
        service_account: &str,
        audience: &str,
        lifetime: Duration,
    ) -> Result<String>;
}

/// Key of an identity: `namespace/service-account`
pub fn identity_key(namespace: &str, service_account: &str) -> String {
    format!("{}/{}", namespace, service_account)
}

fn entry_ref(entry: &WorkloadEntry) -> String {
    format!(
        "WorkloadEntry {}/{}",
        entry.metadata.namespace.as_deref().unwrap_or_default(),
        entry.metadata.name.as_deref().unwrap_or_default()
    )
}

/// Issue one token per distinct service account among `entries`
pub async fn issue_identities(
    issuer: &dyn TokenIssuer,
    entries: &[WorkloadEntry],
    lifetime: Duration,
) -> Result<BTreeMap<String, Vec<u8>>> {
    let mut tokens = BTreeMap::new();
    for entry in entries {
        let namespace = entry.metadata.namespace.as_deref().unwrap_or_default();
        let sa = entry.spec.service_account.as_str();
        if sa.is_empty() {
            return Err(Error::bootstrap(
                "identity",
                format!(
                    "cannot generate a ServiceAccount token for {} because ServiceAccount field is empty",
                    entry_ref(entry)
                ),
            ));
        }
        let key = identity_key(namespace, sa);
        if tokens.contains_key(&key) {
            continue;
        }
        debug!(service_account = %key, "issuing token");
        let token = issuer
            .issue_token(namespace, sa, TOKEN_AUDIENCE, lifetime)
            .await
            .map_err(|e| {
                Error::bootstrap(
                    "identity",
                    format!("failed to generate a ServiceAccount token for {}: {}", entry_ref(entry), e),
                )
            })?;
        tokens.insert(key, token.into_bytes());
    }
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;
    use meshctl_common::crd::WorkloadEntrySpec;
    use mockall::predicate::eq;

    fn entry(name: &str, sa: &str) -> WorkloadEntry {
        let mut we = WorkloadEntry::new(
            name,
            WorkloadEntrySpec {
                service_account: sa.to_string(),
                ..Default::default()
            },
        );
        we.metadata.namespace = Some("bookinfo".to_string());
        we
    }

    #[tokio::test]
    async fn one_token_per_service_account() {
        let mut issuer = MockTokenIssuer::new();
        issuer
            .expect_issue_token()
            .with(eq("bookinfo"), eq("ratings-sa"), eq("istio-ca"), eq(Duration::from_secs(3600)))
            .times(1)
            .returning(|_, _, _, _| Ok("tok-ratings".to_string()));
        issuer
            .expect_issue_token()
            .with(eq("bookinfo"), eq("reviews-sa"), eq("istio-ca"), eq(Duration::from_secs(3600)))
            .times(1)
            .returning(|_, _, _, _| Ok("tok-reviews".to_string()));

        let entries = vec![
            entry("vm-1", "ratings-sa"),
            entry("vm-2", "ratings-sa"),
            entry("vm-3", "reviews-sa"),
        ];
        let tokens = issue_identities(&issuer, &entries, Duration::from_secs(3600))
            .await
            .unwrap();
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens["bookinfo/ratings-sa"], b"tok-ratings");
    }

    #[tokio::test]
    async fn empty_service_account_is_an_error() {
        let mut issuer = MockTokenIssuer::new();
        issuer.expect_issue_token().never();
        let err = issue_identities(&issuer, &[entry("vm-1", "")], Duration::from_secs(60))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("WorkloadEntry bookinfo/vm-1"));
    }

    #[tokio::test]
    async fn issuer_failure_names_the_entry() {
        let mut issuer = MockTokenIssuer::new();
        issuer
            .expect_issue_token()
            .returning(|_, _, _, _| Err(Error::internal("forbidden")));
        let err = issue_identities(&issuer, &[entry("vm-1", "sa")], Duration::from_secs(60))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("failed to generate a ServiceAccount token"));
    }
}
