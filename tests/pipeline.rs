//! End-to-end crawl and merge against mocked upstream and PDS servers.

use chrono::{DateTime, TimeZone, Utc};
use pdslist::models::{Config, EndpointRecord, Registry, Snapshot};
use pdslist::pipeline::{StopReason, run_crawl, run_merge, run_pipeline};
use pdslist::services::{DescribeClient, PlcLogClient};
use pdslist::storage::{LocalStorage, SnapshotStore};
use pdslist::utils::FixedClock;
use tempfile::TempDir;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const DESCRIBE_PATH: &str = "/xrpc/com.atproto.server.describeServer";
const OFFICIAL: &str = "https://morel.us-east.host.bsky.network";

fn run_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 8, 0, 0, 0).unwrap()
}

fn pds_line(endpoint: &str, created_at: &str) -> String {
    serde_json::json!({
        "did": "did:plc:test",
        "createdAt": created_at,
        "operation": {
            "type": "plc_operation",
            "services": {
                "atproto_pds": {"type": "AtprotoPersonalDataServer", "endpoint": endpoint}
            }
        }
    })
    .to_string()
}

struct Fixture {
    _upstream: MockServer,
    open_pds: MockServer,
    broken_pds: MockServer,
    storage_dir: TempDir,
    config: Config,
}

impl Fixture {
    async fn start() -> Self {
        let upstream = MockServer::start().await;
        let open_pds = MockServer::start().await;
        let broken_pds = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(DESCRIBE_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "inviteCodeRequired": false,
                "phoneVerificationRequired": true
            })))
            .mount(&open_pds)
            .await;

        Mock::given(method("GET"))
            .and(path(DESCRIBE_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>down</html>"))
            .mount(&broken_pds)
            .await;

        let first_page = [
            pds_line(&open_pds.uri(), "2024-05-01T01:00:00.000Z"),
            pds_line(OFFICIAL, "2024-05-01T02:00:00.000Z"),
            r#"{"did":"did:plc:gone","createdAt":"2024-05-01T02:30:00.000Z","operation":{"type":"plc_tombstone"}}"#.to_string(),
            pds_line(&broken_pds.uri(), "2024-05-01T03:00:00.000Z"),
        ]
        .join("\n");

        Mock::given(method("GET"))
            .and(path("/export"))
            .and(query_param("after", "2024-05-01T00:00:00Z"))
            .respond_with(ResponseTemplate::new(200).set_body_string(first_page))
            .expect(1)
            .mount(&upstream)
            .await;

        Mock::given(method("GET"))
            .and(path("/export"))
            .and(query_param("after", "2024-05-01T03:00:00Z"))
            .respond_with(ResponseTemplate::new(200).set_body_string(""))
            .expect(1)
            .mount(&upstream)
            .await;

        let mut config = Config::default();
        config.crawler.log_url = format!("{}/export", upstream.uri());
        config.crawler.page_delay_ms = 0;

        Self {
            _upstream: upstream,
            open_pds,
            broken_pds,
            storage_dir: TempDir::new().unwrap(),
            config,
        }
    }

    fn storage(&self) -> LocalStorage {
        LocalStorage::with_config(self.storage_dir.path(), self.config.storage.clone())
    }

    fn clients(&self) -> (PlcLogClient, DescribeClient) {
        (
            PlcLogClient::new(&self.config.crawler).unwrap(),
            DescribeClient::new(&self.config.crawler.user_agent, &self.config.probe).unwrap(),
        )
    }

    fn read_registry(&self) -> Registry {
        let bytes = std::fs::read(self.storage_dir.path().join("list.json")).unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }
}

#[tokio::test]
async fn test_full_pipeline() {
    let fixture = Fixture::start().await;
    let storage = fixture.storage();
    let (fetcher, describer) = fixture.clients();

    let (crawl, merge) = run_pipeline(
        &fixture.config,
        &fetcher,
        &describer,
        &storage,
        &FixedClock(run_time()),
    )
    .await
    .unwrap();

    assert_eq!(crawl.pages_fetched, 2);
    assert_eq!(crawl.record_count, 4);
    assert_eq!(crawl.stop_reason, StopReason::CaughtUp);
    assert_eq!(crawl.endpoint_count, 3);
    assert_eq!(crawl.probe.official, 1);
    assert_eq!(crawl.probe.alive, 1);
    assert_eq!(crawl.probe.dead, 1);
    assert!(crawl.snapshot_path.ends_with("log/list-1715126400000.json"));

    let registry = fixture.read_registry();
    let urls: Vec<_> = registry.endpoints.iter().map(|e| e.url.clone()).collect();
    assert_eq!(urls, vec![OFFICIAL.to_string(), fixture.open_pds.uri()]);
    assert_eq!(registry.endpoints[1].invite_code_required, Some(false));
    assert_eq!(registry.endpoints[1].phone_verification_required, Some(true));
    assert!(!urls.contains(&fixture.broken_pds.uri()));

    assert_eq!(merge.snapshot_count, 1);
    assert_eq!(merge.counts.official, 1);
    assert_eq!(merge.counts.open_third_party, 1);
    assert_eq!(merge.diff.added.len(), 2);

    let report = std::fs::read_to_string(fixture.storage_dir.path().join("README.md")).unwrap();
    assert!(report.contains(OFFICIAL));
    assert!(report.contains("| Third-party, no invite code | 1 |"));
}

#[tokio::test]
async fn test_merge_is_byte_identical_on_rerun() {
    let fixture = Fixture::start().await;
    let storage = fixture.storage();
    let (fetcher, describer) = fixture.clients();

    run_crawl(
        &fixture.config,
        &fetcher,
        &describer,
        &storage,
        &FixedClock(run_time()),
    )
    .await
    .unwrap();

    let registry_path = fixture.storage_dir.path().join("list.json");
    run_merge(&fixture.config, &storage, run_time()).await.unwrap();
    let first = std::fs::read(&registry_path).unwrap();
    let second_summary = run_merge(&fixture.config, &storage, run_time()).await.unwrap();
    let second = std::fs::read(&registry_path).unwrap();

    assert_eq!(first, second);
    assert!(!second_summary.diff.has_changes());
}

#[tokio::test]
async fn test_retention_and_gap_filling_across_runs() {
    let fixture = Fixture::start().await;
    let storage = fixture.storage();
    let (fetcher, describer) = fixture.clients();
    let day = chrono::Duration::days(1);

    // Expired history: must be collected before merging.
    let stale = Snapshot {
        started_at: run_time() - day * 90,
        endpoints: vec![EndpointRecord {
            url: "https://stale.example".to_string(),
            created_at: run_time() - day * 90,
            alive: Some(true),
            invite_code_required: None,
            phone_verification_required: None,
        }],
    };
    storage.write_snapshot(&stale, run_time() - day * 60).await.unwrap();

    // Retained history that knows something the new crawl will not.
    let older = Snapshot {
        started_at: run_time() - day * 10,
        endpoints: vec![EndpointRecord {
            url: "https://quiet.example".to_string(),
            created_at: run_time() - day * 9,
            alive: Some(true),
            invite_code_required: Some(true),
            phone_verification_required: None,
        }],
    };
    storage.write_snapshot(&older, run_time() - day * 3).await.unwrap();

    let (_, merge) = run_pipeline(
        &fixture.config,
        &fetcher,
        &describer,
        &storage,
        &FixedClock(run_time()),
    )
    .await
    .unwrap();

    assert_eq!(merge.gc.deleted, 1);
    assert_eq!(merge.snapshot_count, 2);

    let registry = fixture.read_registry();
    assert!(registry.endpoints.iter().all(|e| e.url != "https://stale.example"));
    let quiet = registry
        .endpoints
        .iter()
        .find(|e| e.url == "https://quiet.example")
        .unwrap();
    assert_eq!(quiet.invite_code_required, Some(true));
    assert_eq!(registry.started_at, Some(run_time() - day * 10));

    // Third-party entries: open PDS observed later ranks ahead of quiet.
    let third_party: Vec<_> = registry.endpoints[1..].iter().map(|e| e.url.clone()).collect();
    assert_eq!(
        third_party,
        vec![fixture.open_pds.uri(), "https://quiet.example".to_string()]
    );
}
