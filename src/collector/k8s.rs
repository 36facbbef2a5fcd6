//! Kubernetes-backed watch and list capabilities.
//!
//! - [`PodWatcher`] follows pod changes in one namespace, with bookmarks
//! - [`PodMetricsLister`] lists per-container usage from metrics-server
//!
//! # Prerequisites
//!
//! - Valid kubeconfig, or an in-cluster service account
//! - metrics-server installed in the cluster (for the lister)
//! - RBAC permissions to watch pods and read pod metrics

use super::{EventStream, Lister, WatchEvent, Watcher};
use crate::core::{MetricKey, PodstatsError, Reading, Result};
use futures::StreamExt;
use k8s_openapi::api::core::v1::Pod;
use kube::api::{Api, WatchEvent as KubeWatchEvent, WatchParams};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config};
use serde::Deserialize;
use std::path::Path;

/// Resource version used when there is no bookmark to resume from
const DEFAULT_RESOURCE_VERSION: &str = "0";

/// HTTP status the API server uses for a resource version that is too old
const GONE: u16 = 410;

/// Build a client from a kubeconfig file, or infer one when no path is given.
///
/// A path that cannot be read is an error; it never falls back to inference.
pub async fn connect(kubeconfig: Option<&Path>) -> Result<Client> {
    let _ = rustls::crypto::ring::default_provider().install_default();

    let config = match kubeconfig {
        Some(path) => {
            tracing::debug!("Loading kubeconfig from {:?}", path);
            let kubeconfig = Kubeconfig::read_from(path)?;
            Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default()).await?
        }
        None => Config::infer().await?,
    };

    Ok(Client::try_from(config)?)
}

/// Kind of pod change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PodEventKind {
    Added,
    Modified,
    Deleted,
}

impl PodEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PodEventKind::Added => "added",
            PodEventKind::Modified => "modified",
            PodEventKind::Deleted => "deleted",
        }
    }
}

/// A pod change as received from the watch stream.
#[derive(Debug, Clone)]
pub struct PodEvent {
    pub kind: PodEventKind,
    pub pod: Pod,
    /// RFC 3339 receive time; pods carry no observation time of their own
    pub observed_at: String,
}

impl PodEvent {
    pub fn new(kind: PodEventKind, pod: Pod) -> Self {
        Self {
            kind,
            pod,
            observed_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Watches the pods of one namespace.
pub struct PodWatcher {
    api: Api<Pod>,
    namespace: String,
}

impl PodWatcher {
    pub fn new(client: Client, namespace: &str) -> Self {
        Self {
            api: Api::namespaced(client, namespace),
            namespace: namespace.to_string(),
        }
    }
}

#[async_trait::async_trait]
impl Watcher for PodWatcher {
    type Raw = PodEvent;

    async fn watch(&self, resume_from: Option<&str>) -> Result<EventStream<PodEvent>> {
        // Bookmarks are requested by default
        let params = WatchParams::default();
        let version = resume_from.unwrap_or(DEFAULT_RESOURCE_VERSION);

        let events = self.api.watch(&params, version).await?;
        Ok(events.map(translate_event).boxed())
    }

    fn convert(&self, event: PodEvent) -> Result<Vec<Reading>> {
        pod_readings(&event, &self.namespace)
    }
}

fn translate_event(item: kube::Result<KubeWatchEvent<Pod>>) -> Result<WatchEvent<PodEvent>> {
    match item? {
        KubeWatchEvent::Added(pod) => Ok(WatchEvent::Data(PodEvent::new(PodEventKind::Added, pod))),
        KubeWatchEvent::Modified(pod) => {
            Ok(WatchEvent::Data(PodEvent::new(PodEventKind::Modified, pod)))
        }
        KubeWatchEvent::Deleted(pod) => {
            Ok(WatchEvent::Data(PodEvent::new(PodEventKind::Deleted, pod)))
        }
        KubeWatchEvent::Bookmark(bookmark) => {
            Ok(WatchEvent::Bookmark(bookmark.metadata.resource_version))
        }
        KubeWatchEvent::Error(status) if status.code == GONE => {
            Err(PodstatsError::ResourceExpired(status.message.clone()))
        }
        KubeWatchEvent::Error(status) => {
            Err(PodstatsError::watch(format!("{} ({})", status.message, status.code)))
        }
    }
}

/// Readings derived from one pod event:
/// - `podstats_pod_events_total{event,namespace}` counter, +1 per event
/// - `podstats_pod_running{namespace,pod}` 1 while the pod phase is Running
/// - `podstats_container_restarts{container,namespace,pod}` per container
pub fn pod_readings(event: &PodEvent, default_namespace: &str) -> Result<Vec<Reading>> {
    let metadata = &event.pod.metadata;
    let name = metadata
        .name
        .as_deref()
        .ok_or_else(|| PodstatsError::conversion("pod event without a pod name"))?;
    let namespace = metadata.namespace.as_deref().unwrap_or(default_namespace);
    let time = event.observed_at.as_str();

    let mut readings = Vec::new();

    readings.push(Reading::counter(
        MetricKey::new("podstats_pod_events_total")
            .label("event", event.kind.as_str())
            .label("namespace", namespace),
        1.0,
        time,
    ));

    let status = event.pod.status.as_ref();
    let running = event.kind != PodEventKind::Deleted
        && status.and_then(|s| s.phase.as_deref()) == Some("Running");
    readings.push(Reading::instant(
        MetricKey::new("podstats_pod_running")
            .label("namespace", namespace)
            .label("pod", name),
        if running { 1.0 } else { 0.0 },
        time,
    ));

    let containers = status
        .and_then(|s| s.container_statuses.as_ref())
        .map(Vec::as_slice)
        .unwrap_or_default();
    for container in containers {
        readings.push(Reading::instant(
            MetricKey::new("podstats_container_restarts")
                .label("container", container.name.as_str())
                .label("namespace", namespace)
                .label("pod", name),
            f64::from(container.restart_count),
            time,
        ));
    }

    Ok(readings)
}

/// Lists pod metrics of one namespace from the metrics API.
pub struct PodMetricsLister {
    client: Client,
    namespace: String,
}

impl PodMetricsLister {
    pub fn new(client: Client, namespace: &str) -> Self {
        Self {
            client,
            namespace: namespace.to_string(),
        }
    }
}

#[async_trait::async_trait]
impl Lister for PodMetricsLister {
    type Item = PodMetricsItem;

    async fn list(&self) -> Result<Vec<PodMetricsItem>> {
        // The metrics API is an aggregated API, so we use a raw request
        let path = format!("/apis/metrics.k8s.io/v1beta1/namespaces/{}/pods", self.namespace);
        let request = http::Request::builder()
            .method("GET")
            .uri(&path)
            .body(Vec::new())
            .map_err(|e| PodstatsError::list(format!("Failed to build request: {}", e)))?;

        let response: PodMetricsList = self
            .client
            .request(request)
            .await
            .map_err(|e| PodstatsError::list(format!("Metrics API error: {}", e)))?;

        Ok(response.items)
    }

    fn convert(&self, item: PodMetricsItem) -> Result<Vec<Reading>> {
        pod_metrics_readings(&item, &self.namespace)
    }
}

/// Response of the metrics API pod listing
#[derive(Debug, Deserialize)]
pub struct PodMetricsList {
    pub items: Vec<PodMetricsItem>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PodMetricsItem {
    pub metadata: PodMetricsMetadata,
    pub timestamp: String,
    pub containers: Vec<ContainerMetricsItem>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PodMetricsMetadata {
    pub name: String,
    #[serde(default)]
    pub namespace: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContainerMetricsItem {
    pub name: String,
    pub usage: ResourceUsage,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResourceUsage {
    pub cpu: String,
    pub memory: String,
}

/// Instant readings for CPU (cores) and memory (bytes) of every container.
/// The metrics timestamp is carried verbatim.
pub fn pod_metrics_readings(item: &PodMetricsItem, default_namespace: &str) -> Result<Vec<Reading>> {
    let namespace = item.metadata.namespace.as_deref().unwrap_or(default_namespace);
    let pod = item.metadata.name.as_str();

    let mut readings = Vec::with_capacity(item.containers.len() * 2);
    for container in &item.containers {
        let cpu = parse_quantity(&container.usage.cpu)?;
        let memory = parse_quantity(&container.usage.memory)?;

        let key = |name: &str| {
            MetricKey::new(name)
                .label("container", container.name.as_str())
                .label("namespace", namespace)
                .label("pod", pod)
        };

        readings.push(Reading::instant(key("podstats_container_cpu_cores"), cpu, item.timestamp.as_str()));
        readings.push(Reading::instant(
            key("podstats_container_memory_bytes"),
            memory,
            item.timestamp.as_str(),
        ));
    }

    Ok(readings)
}

/// Parse a Kubernetes resource quantity ("250m", "1.5", "128974848n", "64Mi", "1G").
pub fn parse_quantity(quantity: &str) -> Result<f64> {
    const SUFFIXES: [(&str, f64); 15] = [
        ("Ki", 1024.0),
        ("Mi", 1_048_576.0),
        ("Gi", 1_073_741_824.0),
        ("Ti", 1_099_511_627_776.0),
        ("Pi", 1_125_899_906_842_624.0),
        ("Ei", 1_152_921_504_606_846_976.0),
        ("n", 1e-9),
        ("u", 1e-6),
        ("m", 1e-3),
        ("k", 1e3),
        ("M", 1e6),
        ("G", 1e9),
        ("T", 1e12),
        ("P", 1e15),
        ("E", 1e18),
    ];

    let quantity = quantity.trim();
    let (number, multiplier) = SUFFIXES
        .iter()
        .find_map(|(suffix, multiplier)| {
            quantity.strip_suffix(suffix).map(|number| (number, *multiplier))
        })
        .unwrap_or((quantity, 1.0));

    number
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
        .map(|value| value * multiplier)
        .ok_or_else(|| PodstatsError::conversion(format!("invalid resource quantity {:?}", quantity)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::{ContainerStatus, PodStatus};
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

    fn pod(name: Option<&str>, phase: &str, restarts: &[(&str, i32)]) -> Pod {
        Pod {
            metadata: ObjectMeta {
                name: name.map(str::to_string),
                namespace: Some("web".to_string()),
                ..Default::default()
            },
            status: Some(PodStatus {
                phase: Some(phase.to_string()),
                container_statuses: Some(
                    restarts
                        .iter()
                        .map(|(container, count)| ContainerStatus {
                            name: container.to_string(),
                            restart_count: *count,
                            ..Default::default()
                        })
                        .collect(),
                ),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn event(kind: PodEventKind, pod: Pod) -> PodEvent {
        PodEvent {
            kind,
            pod,
            observed_at: "2024-05-01T10:00:00Z".to_string(),
        }
    }

    #[tokio::test]
    async fn test_missing_kubeconfig_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("kubeconfig");

        let result = connect(Some(missing.as_path())).await;
        assert!(matches!(result, Err(PodstatsError::Kubeconfig(_))));
    }

    #[test]
    fn test_parse_quantity() {
        assert_eq!(parse_quantity("250m").unwrap(), 0.25);
        assert_eq!(parse_quantity("2").unwrap(), 2.0);
        assert_eq!(parse_quantity("1.5").unwrap(), 1.5);
        assert!((parse_quantity("500000000n").unwrap() - 0.5).abs() < 1e-12);
        assert_eq!(parse_quantity("64Mi").unwrap(), 64.0 * 1024.0 * 1024.0);
        assert_eq!(parse_quantity("1Gi").unwrap(), 1_073_741_824.0);
        assert_eq!(parse_quantity("500M").unwrap(), 500_000_000.0);
        assert_eq!(parse_quantity("1000000").unwrap(), 1_000_000.0);
    }

    #[test]
    fn test_parse_quantity_rejects_garbage() {
        assert!(parse_quantity("").is_err());
        assert!(parse_quantity("Mi").is_err());
        assert!(parse_quantity("lots").is_err());
    }

    #[test]
    fn test_running_pod_readings() {
        let readings =
            pod_readings(&event(PodEventKind::Modified, pod(Some("api-0"), "Running", &[("app", 3)])), "default")
                .unwrap();

        assert_eq!(readings.len(), 3);
        assert_eq!(readings[0].key, r#"podstats_pod_events_total{event="modified",namespace="web"}"#);
        assert_eq!(readings[0].metric_type, crate::core::MetricType::Counter);
        assert_eq!(readings[1].key, r#"podstats_pod_running{namespace="web",pod="api-0"}"#);
        assert_eq!(readings[1].value, 1.0);
        assert_eq!(
            readings[2].key,
            r#"podstats_container_restarts{container="app",namespace="web",pod="api-0"}"#
        );
        assert_eq!(readings[2].value, 3.0);
        assert_eq!(readings[2].time, "2024-05-01T10:00:00Z");
    }

    #[test]
    fn test_deleted_pod_is_not_running() {
        let readings =
            pod_readings(&event(PodEventKind::Deleted, pod(Some("api-0"), "Running", &[])), "default")
                .unwrap();

        assert_eq!(readings[1].value, 0.0);
    }

    #[test]
    fn test_pod_without_name_fails_conversion() {
        let result = pod_readings(&event(PodEventKind::Added, pod(None, "Pending", &[])), "default");
        assert!(matches!(result, Err(PodstatsError::Conversion(_))));
    }

    #[test]
    fn test_pod_metrics_readings() {
        let list: PodMetricsList = serde_json::from_str(
            r#"{
                "kind": "PodMetricsList",
                "items": [{
                    "metadata": {"name": "api-0", "namespace": "web"},
                    "timestamp": "2024-05-01T10:00:00Z",
                    "window": "30s",
                    "containers": [{"name": "app", "usage": {"cpu": "250m", "memory": "64Mi"}}]
                }]
            }"#,
        )
        .unwrap();

        let readings = pod_metrics_readings(&list.items[0], "default").unwrap();

        assert_eq!(readings.len(), 2);
        assert_eq!(
            readings[0].key,
            r#"podstats_container_cpu_cores{container="app",namespace="web",pod="api-0"}"#
        );
        assert_eq!(readings[0].value, 0.25);
        assert_eq!(readings[1].value, 67_108_864.0);
        assert!(readings.iter().all(|r| r.time == "2024-05-01T10:00:00Z"));
    }

    #[test]
    fn test_bad_quantity_fails_item_conversion() {
        let item = PodMetricsItem {
            metadata: PodMetricsMetadata {
                name: "api-0".to_string(),
                namespace: None,
            },
            timestamp: "t".to_string(),
            containers: vec![ContainerMetricsItem {
                name: "app".to_string(),
                usage: ResourceUsage {
                    cpu: "fast".to_string(),
                    memory: "1Mi".to_string(),
                },
            }],
        };

        assert!(pod_metrics_readings(&item, "default").is_err());
    }
}
