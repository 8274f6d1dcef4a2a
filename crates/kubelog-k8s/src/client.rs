//! Cluster access for the gateway's request/response routes

use anyhow::{Context, Result};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Pod;
use kube::Api;
use kube::api::{ListParams, LogParams};
use tracing::{debug, warn};

use kubelog_types::ContainerInfo;

/// Namespace file mounted into every pod with a service account
const SERVICE_ACCOUNT_NAMESPACE: &str = "/var/run/secrets/kubernetes.io/serviceaccount/namespace";

/// Point-in-time queries the gateway answers against its namespace
#[async_trait]
pub trait ClusterLogs: Send + Sync {
    /// The namespace every query is scoped to
    fn namespace(&self) -> &str;

    /// Every container of every pod currently listed by the cluster
    async fn list_containers(&self) -> Result<Vec<ContainerInfo>>;

    /// The last `lines` lines of one container's log
    async fn tail(&self, pod: &str, container: &str, lines: i64) -> Result<String>;

    /// Concatenated tails of every container in the namespace.
    ///
    /// A container whose logs cannot be fetched contributes an inline
    /// error marker instead of failing the whole response.
    async fn tail_all(&self, lines: i64) -> Result<String> {
        let containers = self.list_containers().await?;
        let mut output = String::new();

        for (i, c) in containers.iter().enumerate() {
            output.push_str(&format!("{}, {}/{}:\n", i, c.pod_name, c.container_name));
            match self.tail(&c.pod_name, &c.container_name, lines).await {
                Ok(logs) => {
                    output.push_str(&logs);
                    if !logs.is_empty() && !logs.ends_with('\n') {
                        output.push('\n');
                    }
                }
                Err(e) => {
                    warn!(pod = %c.pod_name, container = %c.container_name, "tail failed: {:#}", e);
                    output.push_str(&format!("<error: {:#}>\n", e));
                }
            }
        }

        Ok(output)
    }
}

/// Kubernetes client wrapper bound to a single namespace
#[derive(Clone)]
pub struct KubeClient {
    client: kube::Client,
    namespace: String,
}

impl KubeClient {
    /// Connect using the in-cluster service account, falling back to the
    /// local kubeconfig when not running inside a pod
    pub async fn connect(namespace_override: Option<&str>) -> Result<Self> {
        let config = match kube::Config::incluster() {
            Ok(config) => {
                debug!("using in-cluster configuration");
                config
            }
            Err(e) => {
                debug!("in-cluster configuration unavailable ({}), trying kubeconfig", e);
                kube::Config::infer()
                    .await
                    .context("Failed to load cluster configuration. Is kubectl configured?")?
            }
        };

        let namespace = resolve_namespace(
            namespace_override,
            read_service_account_namespace(),
            &config.default_namespace,
        );

        let client =
            kube::Client::try_from(config).context("Failed to create Kubernetes client")?;

        Ok(Self::from_client(client, namespace))
    }

    pub fn from_client(client: kube::Client, namespace: String) -> Self {
        Self { client, namespace }
    }

    /// The underlying client, for follow-mode log sources
    pub fn client(&self) -> kube::Client {
        self.client.clone()
    }

    fn pods(&self) -> Api<Pod> {
        Api::namespaced(self.client.clone(), &self.namespace)
    }
}

#[async_trait]
impl ClusterLogs for KubeClient {
    fn namespace(&self) -> &str {
        &self.namespace
    }

    async fn list_containers(&self) -> Result<Vec<ContainerInfo>> {
        let list = self
            .pods()
            .list(&ListParams::default())
            .await
            .context(format!("Failed to list pods in {}", self.namespace))?;

        Ok(list
            .items
            .into_iter()
            .flat_map(|pod| {
                let pod_name = pod.metadata.name.unwrap_or_default();
                let namespace = self.namespace.clone();
                pod.spec
                    .map(|spec| spec.containers)
                    .unwrap_or_default()
                    .into_iter()
                    .map(move |c| ContainerInfo::new(namespace.clone(), pod_name.clone(), c.name))
            })
            .collect())
    }

    async fn tail(&self, pod: &str, container: &str, lines: i64) -> Result<String> {
        let params = LogParams {
            container: Some(container.to_string()),
            tail_lines: Some(lines),
            ..Default::default()
        };

        self.pods()
            .logs(pod, &params)
            .await
            .context(format!("Failed to fetch logs for {}/{}", pod, container))
    }
}

fn read_service_account_namespace() -> Option<String> {
    std::fs::read_to_string(SERVICE_ACCOUNT_NAMESPACE).ok()
}

/// Pick the namespace to serve: explicit override, then the service
/// account's namespace, then the kubeconfig context default
pub fn resolve_namespace(
    namespace_override: Option<&str>,
    service_account: Option<String>,
    config_default: &str,
) -> String {
    let non_empty = |s: &str| {
        let s = s.trim();
        (!s.is_empty()).then(|| s.to_string())
    };

    namespace_override
        .and_then(non_empty)
        .or_else(|| service_account.as_deref().and_then(non_empty))
        .or_else(|| non_empty(config_default))
        .unwrap_or_else(|| "default".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FakeCluster {
        containers: Vec<ContainerInfo>,
    }

    #[async_trait]
    impl ClusterLogs for FakeCluster {
        fn namespace(&self) -> &str {
            "apps"
        }

        async fn list_containers(&self) -> Result<Vec<ContainerInfo>> {
            Ok(self.containers.clone())
        }

        async fn tail(&self, pod: &str, container: &str, lines: i64) -> Result<String> {
            if container == "broken" {
                anyhow::bail!("container not ready");
            }
            Ok(format!("{} lines of {}/{}", lines, pod, container))
        }
    }

    fn info(pod: &str, container: &str) -> ContainerInfo {
        ContainerInfo::new("apps".into(), pod.into(), container.into())
    }

    #[test]
    fn test_resolve_namespace_precedence() {
        assert_eq!(
            resolve_namespace(Some("override"), Some("sa\n".into()), "ctx"),
            "override"
        );
        assert_eq!(resolve_namespace(None, Some("sa\n".into()), "ctx"), "sa");
        assert_eq!(resolve_namespace(Some("  "), None, "ctx"), "ctx");
        assert_eq!(resolve_namespace(None, None, ""), "default");
    }

    #[tokio::test]
    async fn test_tail_all_concatenates_every_container() {
        let cluster = FakeCluster {
            containers: vec![info("web", "nginx"), info("web", "sidecar")],
        };

        let output = cluster.tail_all(20).await.unwrap();

        assert_eq!(
            output,
            "0, web/nginx:\n20 lines of web/nginx\n1, web/sidecar:\n20 lines of web/sidecar\n"
        );
    }

    #[tokio::test]
    async fn test_tail_all_marks_failed_container_inline() {
        let cluster = FakeCluster {
            containers: vec![info("web", "broken"), info("db", "postgres")],
        };

        let output = cluster.tail_all(5).await.unwrap();

        assert!(output.contains("0, web/broken:\n<error: container not ready>\n"));
        assert!(output.ends_with("1, db/postgres:\n5 lines of db/postgres\n"));
    }
}
