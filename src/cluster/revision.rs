//! Revision inventory read from the cluster

use async_trait::async_trait;
use k8s_openapi::api::admissionregistration::v1::MutatingWebhookConfiguration;
use k8s_openapi::api::core::v1::Pod;
use kube::api::ListParams;
use kube::{Api, Client};
use meshctl_common::crd::IstioOperator;
use meshctl_common::{OPERATOR_COMPONENT_LABEL, REVISION_LABEL};
use meshctl_revision::{MutatingWebhook, PodInfo, RevisionSource};
use tracing::debug;

use super::format_age;

/// [`RevisionSource`] over the Kubernetes API
pub struct KubeRevisionSource {
    client: Client,
    istio_namespace: String,
}

impl KubeRevisionSource {
    pub fn new(client: Client, istio_namespace: impl Into<String>) -> Self {
        Self {
            client,
            istio_namespace: istio_namespace.into(),
        }
    }

    async fn pods(&self, api: Api<Pod>, selector: &str) -> meshctl_common::Result<Vec<PodInfo>> {
        debug!(selector = %selector, "listing pods");
        let list = api.list(&ListParams::default().labels(selector)).await?;
        Ok(list.items.iter().map(pod_info).collect())
    }
}

fn pod_info(pod: &Pod) -> PodInfo {
    let status = pod.status.as_ref();
    PodInfo {
        namespace: pod.metadata.namespace.clone().unwrap_or_default(),
        name: pod.metadata.name.clone().unwrap_or_default(),
        address: status.and_then(|s| s.pod_ip.clone()).unwrap_or_default(),
        status: status.and_then(|s| s.phase.clone()).unwrap_or_default(),
        age: pod
            .metadata
            .creation_timestamp
            .as_ref()
            .map(|t| format_age(&t.0))
            .unwrap_or_else(|| "<unknown>".to_string()),
    }
}

#[async_trait]
impl RevisionSource for KubeRevisionSource {
    async fn list_webhooks(&self) -> meshctl_common::Result<Vec<MutatingWebhook>> {
        let api: Api<MutatingWebhookConfiguration> = Api::all(self.client.clone());
        let list = api.list(&ListParams::default()).await?;
        Ok(list
            .items
            .into_iter()
            .map(|wh| MutatingWebhook {
                name: wh.metadata.name.unwrap_or_default(),
                labels: wh.metadata.labels.unwrap_or_default(),
            })
            .collect())
    }

    async fn list_operators(&self) -> meshctl_common::Result<Vec<IstioOperator>> {
        let api: Api<IstioOperator> = Api::all(self.client.clone());
        Ok(api.list(&ListParams::default()).await?.items)
    }

    async fn list_component_pods(
        &self,
        revision: &str,
        component: &str,
    ) -> meshctl_common::Result<Vec<PodInfo>> {
        let api = Api::namespaced(self.client.clone(), &self.istio_namespace);
        let selector = format!(
            "{}={},{}={}",
            REVISION_LABEL, revision, OPERATOR_COMPONENT_LABEL, component
        );
        self.pods(api, &selector).await
    }

    async fn list_revision_pods(&self, revision: &str) -> meshctl_common::Result<Vec<PodInfo>> {
        let api = Api::all(self.client.clone());
        self.pods(api, &format!("{}={}", REVISION_LABEL, revision))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::PodStatus;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

    #[test]
    fn pod_info_from_pod() {
        let pod = Pod {
            metadata: ObjectMeta {
                name: Some("istiod-canary-5d8f".to_string()),
                namespace: Some("istio-system".to_string()),
                ..Default::default()
            },
            status: Some(PodStatus {
                pod_ip: Some("10.1.2.3".to_string()),
                phase: Some("Running".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        };
        let info = pod_info(&pod);
        assert_eq!(info.name, "istiod-canary-5d8f");
        assert_eq!(info.namespace, "istio-system");
        assert_eq!(info.address, "10.1.2.3");
        assert_eq!(info.status, "Running");
        assert_eq!(info.age, "<unknown>");
    }
}
