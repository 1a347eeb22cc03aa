use crate::{Exporter, ResourceCollector};
use async_trait::async_trait;
use httpmock::prelude::*;
use nbmon_api::NetBirdClient;
use prometheus::core::Collector as PromCollector;
use prometheus::{IntGaugeVec, Opts};
use serde_json::json;
use std::sync::Arc;

async fn mock_endpoint(server: &MockServer, path: &str, body: serde_json::Value) {
    server
        .mock_async(|when, then| {
            when.method(GET)
                .path(path)
                .header("Authorization", "Token test-token");
            then.status(200)
                .header("content-type", "application/json")
                .json_body(body);
        })
        .await;
}

async fn mock_all_healthy(server: &MockServer) {
    mock_endpoint(
        server,
        "/api/peers",
        json!([
            {"id": "p1", "name": "office-gw", "connected": true, "os": "linux"},
            {"id": "p2", "name": "laptop", "connected": false, "os": "darwin"}
        ]),
    )
    .await;
    mock_endpoint(
        server,
        "/api/groups",
        json!([
            {"id": "g1", "name": "servers", "peers_count": 2, "issued": "api"}
        ]),
    )
    .await;
    mock_endpoint(
        server,
        "/api/users",
        json!([
            {"id": "u1", "email": "ops@example.com", "role": "admin", "status": "active"}
        ]),
    )
    .await;
    mock_endpoint(
        server,
        "/api/dns/nameservers",
        json!([
            {
                "id": "ns1",
                "name": "main",
                "enabled": true,
                "primary": true,
                "nameservers": [{"ip": "1.1.1.1", "ns_type": "udp", "port": 53}]
            }
        ]),
    )
    .await;
    mock_endpoint(
        server,
        "/api/dns/settings",
        json!({"items": {"disabled_management_groups": []}}),
    )
    .await;
    mock_endpoint(
        server,
        "/api/networks",
        json!([
            {"id": "n1", "name": "office", "routing_peers_count": 1}
        ]),
    )
    .await;
}

async fn exporter_for(server: &MockServer) -> Exporter {
    let client = NetBirdClient::new(&server.base_url(), "test-token").expect("client");
    Exporter::new(Arc::new(client)).expect("exporter")
}

#[tokio::test]
async fn should_render_metrics_from_all_domains() {
    let server = MockServer::start_async().await;
    mock_all_healthy(&server).await;
    let exporter = exporter_for(&server).await;

    let output = exporter.scrape().await.expect("scrape");

    assert!(output.contains("netbird_peers 2"));
    assert!(output.contains("netbird_peers_connected{connected=\"true\"} 1"));
    assert!(output.contains("netbird_groups 1"));
    assert!(output
        .contains("netbird_group_info{group_id=\"g1\",group_name=\"servers\",issued=\"api\"} 1"));
    assert!(output.contains("netbird_users_total 1"));
    assert!(output.contains("netbird_dns_nameserver_groups 1"));
    assert!(output.contains("netbird_dns_nameservers_by_type{ns_type=\"udp\"} 1"));
    assert!(output.contains("netbird_networks 1"));
    assert!(output.contains("netbird_exporter_scrape_duration_seconds_count 1"));
}

#[tokio::test]
async fn should_isolate_failing_domain_from_healthy_ones() {
    let server = MockServer::start_async().await;
    mock_endpoint(
        &server,
        "/api/peers",
        json!([{"id": "p1", "name": "office-gw", "connected": true}]),
    )
    .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/api/groups");
            then.status(500);
        })
        .await;
    mock_endpoint(&server, "/api/users", json!([])).await;
    mock_endpoint(&server, "/api/dns/nameservers", json!([])).await;
    mock_endpoint(
        &server,
        "/api/dns/settings",
        json!({"items": {"disabled_management_groups": []}}),
    )
    .await;
    mock_endpoint(&server, "/api/networks", json!([])).await;

    let exporter = exporter_for(&server).await;
    let output = exporter.scrape().await.expect("scrape");

    assert!(output.contains("netbird_groups_scrape_errors_total{error_type=\"fetch_groups\"} 1"));
    assert!(!output.contains("netbird_groups 1"));
    assert!(!output.contains("netbird_group_info"));
    assert!(output.contains("netbird_peers 1"));
    assert!(output.contains("netbird_users_total 0"));
}

#[tokio::test]
async fn should_accumulate_error_counters_across_failed_scrapes() {
    let server = MockServer::start_async().await;
    // No mocks at all: every fetch 404s.
    let exporter = exporter_for(&server).await;

    exporter.scrape().await.expect("first scrape");
    let output = exporter.scrape().await.expect("second scrape");

    assert!(output.contains("netbird_peers_scrape_errors_total{error_type=\"fetch_peers\"} 2"));
    assert!(output.contains("netbird_groups_scrape_errors_total{error_type=\"fetch_groups\"} 2"));
    assert!(output.contains("netbird_users_scrape_errors_total{error_type=\"fetch_users\"} 2"));
    assert!(output.contains(
        "netbird_dns_scrape_errors_total{error_type=\"fetch_nameserver_groups\"} 2"
    ));
    assert!(
        output.contains("netbird_dns_scrape_errors_total{error_type=\"fetch_dns_settings\"} 2")
    );
    assert!(
        output.contains("netbird_networks_scrape_errors_total{error_type=\"fetch_networks\"} 2")
    );
    assert!(!output.contains("netbird_peers 0"));
}

#[tokio::test]
async fn should_return_stable_descriptors_before_and_after_scrapes() {
    let server = MockServer::start_async().await;
    mock_all_healthy(&server).await;
    let exporter = exporter_for(&server).await;

    let before: Vec<String> = exporter
        .descs()
        .iter()
        .map(|desc| desc.fq_name.clone())
        .collect();
    assert!(!before.is_empty());

    exporter.scrape().await.expect("scrape");

    let after: Vec<String> = exporter
        .descs()
        .iter()
        .map(|desc| desc.fq_name.clone())
        .collect();
    assert_eq!(before, after);
}

#[tokio::test]
async fn should_serve_concurrent_scrapes_without_interleaving() {
    let server = MockServer::start_async().await;
    mock_all_healthy(&server).await;
    let exporter = Arc::new(exporter_for(&server).await);

    let (first, second) = tokio::join!(exporter.scrape(), exporter.scrape());

    let first = first.expect("first scrape");
    let second = second.expect("second scrape");
    assert!(first.contains("netbird_peers 2"));
    assert!(second.contains("netbird_peers 2"));
    assert!(second.contains("netbird_exporter_scrape_duration_seconds_count 2"));
}

struct PanickingCollector {
    gauge: IntGaugeVec,
}

impl PanickingCollector {
    fn new() -> Self {
        Self {
            gauge: IntGaugeVec::new(Opts::new("test_panicking_gauge", "test gauge"), &[])
                .expect("gauge"),
        }
    }
}

#[async_trait]
impl ResourceCollector for PanickingCollector {
    fn name(&self) -> &'static str {
        "panicking"
    }

    fn instruments(&self) -> Vec<Box<dyn PromCollector>> {
        vec![Box::new(self.gauge.clone())]
    }

    async fn collect(&self) {
        panic!("collector blew up");
    }
}

#[tokio::test]
async fn should_absorb_collector_panic_and_count_it() {
    let exporter =
        Exporter::from_parts(vec![Arc::new(PanickingCollector::new())]).expect("exporter");

    let output = exporter.scrape().await.expect("scrape survives panic");

    assert!(output.contains("netbird_exporter_scrape_errors_total 1"));
    assert!(output.contains("netbird_exporter_scrape_duration_seconds_count 1"));
}
