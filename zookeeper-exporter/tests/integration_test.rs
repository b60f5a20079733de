//! Integration tests for the ZooKeeper exporter.
//!
//! These tests run scrapes against a fake ZooKeeper server and verify the
//! samples that end up in the exposition output.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower::ServiceExt;
use zk_fourletter::FourLetterWord;
use zookeeper_exporter::config::{HttpConfig, ZookeeperConfig};
use zookeeper_exporter::http::{OPENMETRICS_CONTENT_TYPE, create_router};
use zookeeper_exporter::{ExporterMetrics, HttpServer, ScrapeOutcome, Scraper, Target};

const MNTR: &str = "zk_version\t3.4.13-2d71af4dbe22557fda74f9a9b4309b15a7487f03, built on 06/29/2018 04:05 GMT\n\
zk_avg_latency\t0\n\
zk_max_latency\t12\n\
zk_min_latency\t0\n\
zk_packets_received\t2143\n\
zk_packets_sent\t2142\n\
zk_num_alive_connections\t2\n\
zk_outstanding_requests\t0\n\
zk_server_state\tleader\n\
zk_znode_count\t5\n\
zk_watch_count\t1\n\
zk_ephemerals_count\t0\n\
zk_approximate_data_size\t44\n\
zk_open_file_descriptor_count\t28\n\
zk_max_file_descriptor_count\t1048576\n\
zk_followers\t2\n\
zk_synced_followers\t2\n\
zk_pending_syncs\t0\n";

const WCHS: &str = "3 connections watching 4 paths\nTotal watches:5\n";

/// A fake ZooKeeper answering each four-letter word from a fixed table.
struct FakeZooKeeper {
    addr: SocketAddr,
    received: Arc<Mutex<Vec<String>>>,
}

impl FakeZooKeeper {
    async fn start(mntr: &'static str, wchs: &'static str) -> Self {
        let replies = HashMap::from([("mntr", mntr), ("wchs", wchs), ("srst", "Server stats reset.\n")]);
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let received = Arc::new(Mutex::new(Vec::new()));
        let log = received.clone();

        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    break;
                };
                let mut cmd = [0u8; 4];
                if socket.read_exact(&mut cmd).await.is_err() {
                    continue;
                }
                let cmd = String::from_utf8_lossy(&cmd).to_string();
                let reply = replies.get(cmd.as_str()).copied().unwrap_or("");
                log.lock().unwrap().push(cmd);
                let _ = socket.write_all(reply.as_bytes()).await;
            }
        });

        Self { addr, received }
    }

    fn target(&self) -> Target {
        Target::from(self.addr)
    }

    fn received(&self) -> Vec<String> {
        self.received.lock().unwrap().clone()
    }

    /// Wait until `command` has been received, up to two seconds.
    async fn wait_for(&self, command: &str) -> bool {
        for _ in 0..40 {
            if self.received().iter().any(|c| c == command) {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        false
    }
}

/// A port with nothing listening on it.
async fn unreachable_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}

fn create_scraper() -> Scraper {
    Scraper::new(&ZookeeperConfig::default(), ExporterMetrics::new())
}

/// Sample lines of an exposition body (no comments, no blank lines).
fn samples(body: &str) -> Vec<&str> {
    body.lines()
        .filter(|l| !l.starts_with('#') && !l.trim().is_empty())
        .collect()
}

#[tokio::test]
async fn test_full_scrape_of_healthy_server() {
    let server = FakeZooKeeper::start(MNTR, WCHS).await;
    let scraper = create_scraper();

    let result = scraper.scrape(server.target()).await;

    assert!(result.available());
    assert_eq!(result.value("zk_up"), Some(1.0));
    assert_eq!(result.value("zk_max_latency"), Some(12.0));
    assert_eq!(result.value("zk_packets_received"), Some(2143.0));
    assert_eq!(result.value("zk_max_file_descriptor_count"), Some(1048576.0));
    assert_eq!(result.value("zk_server_state"), Some(1.0));
    assert_eq!(result.value("zk_wchs_watch_connections"), Some(3.0));
    assert_eq!(result.value("zk_wchs_watch_paths"), Some(4.0));
    assert_eq!(result.value("zk_wchs_total_watch"), Some(5.0));
    // zk_version is not in the catalog
    assert_eq!(result.value("zk_version"), None);
    // 17 mntr keys + 3 wchs keys + zk_up
    assert_eq!(result.observations().len(), 21);

    let target = server.addr.to_string();
    let body = result.encode().unwrap();
    assert!(
        body.contains(&format!(
            "zk_server_state{{state=\"leader\",target_host=\"{}\"}} 1",
            target
        )),
        "Server state should carry the role as a label. Output: {}",
        body
    );
    assert!(body.contains(&format!("zk_up{{target_host=\"{}\"}} 1", target)));
}

#[tokio::test]
async fn test_latency_values_are_labeled_with_target() {
    let server = FakeZooKeeper::start("zk_avg_latency\t1.2\nzk_max_latency\t5\n", WCHS).await;

    let result = create_scraper().scrape(server.target()).await;

    assert_eq!(result.value("zk_avg_latency"), Some(1.2));
    assert_eq!(result.value("zk_max_latency"), Some(5.0));
    assert_eq!(result.value("zk_up"), Some(1.0));

    let target = server.addr.to_string();
    for observation in result.observations() {
        assert!(
            observation
                .labels
                .iter()
                .any(|(k, v)| *k == "target_host" && *v == target),
            "{} should be labeled with the target",
            observation.definition.name
        );
    }
}

#[tokio::test]
async fn test_malformed_line_forces_down() {
    let server =
        FakeZooKeeper::start("garbage_no_tab\nzk_znode_count\t7\n", WCHS).await;
    let metrics = ExporterMetrics::new();
    let scraper = Scraper::new(&ZookeeperConfig::default(), metrics.clone());

    let result = scraper.scrape(server.target()).await;

    assert!(!result.available());
    assert_eq!(result.value("zk_up"), Some(0.0));
    assert_eq!(result.value("zk_znode_count"), Some(7.0));
    assert_eq!(metrics.malformed_lines(), 1);
    assert_eq!(metrics.scrapes(ScrapeOutcome::Degraded), 1);
}

#[tokio::test]
async fn test_unparseable_value_becomes_zero() {
    let server = FakeZooKeeper::start("zk_znode_count\tNaNgarbage\n", WCHS).await;

    let result = create_scraper().scrape(server.target()).await;

    assert_eq!(result.value("zk_znode_count"), Some(0.0));
    assert_eq!(result.value("zk_up"), Some(1.0));
}

#[tokio::test]
async fn test_empty_mntr_reply_is_down() {
    let server = FakeZooKeeper::start("", WCHS).await;

    let result = create_scraper().scrape(server.target()).await;

    assert!(!result.available());
    assert_eq!(result.value("zk_up"), Some(0.0));
    assert_eq!(result.value("zk_znode_count"), None);
}

#[tokio::test]
async fn test_unusable_wchs_keeps_mntr_metrics() {
    // An empty wchs reply cannot be split into the expected fields
    let server = FakeZooKeeper::start(MNTR, "").await;

    let result = create_scraper().scrape(server.target()).await;

    assert_eq!(result.value("zk_up"), Some(0.0));
    assert_eq!(result.value("zk_znode_count"), Some(5.0));
    assert_eq!(result.value("zk_wchs_total_watch"), None);
}

#[tokio::test]
async fn test_unreachable_target_reports_only_down() {
    let addr = unreachable_addr().await;

    let body = create_scraper()
        .scrape(Target::from(addr))
        .await
        .encode()
        .unwrap();

    let samples = samples(&body);
    assert_eq!(samples.len(), 1, "Only zk_up expected. Output: {}", body);
    assert!(samples[0].starts_with(&format!("zk_up{{target_host=\"{}\"}} 0", addr)));
}

#[tokio::test]
async fn test_statistics_reset_after_scrape() {
    let server = FakeZooKeeper::start(MNTR, WCHS).await;

    create_scraper().scrape(server.target()).await;

    assert!(server.wait_for("srst").await, "srst should follow the scrape");
    assert_eq!(server.received(), vec!["mntr", "wchs", "srst"]);
}

#[tokio::test]
async fn test_statistics_reset_can_be_disabled() {
    let server = FakeZooKeeper::start(MNTR, WCHS).await;
    let config = ZookeeperConfig {
        reset_statistics: false,
        ..Default::default()
    };

    Scraper::new(&config, ExporterMetrics::new())
        .scrape(server.target())
        .await;
    tokio::time::sleep(Duration::from_millis(200)).await;

    assert_eq!(server.received(), vec!["mntr", "wchs"]);
}

#[tokio::test]
async fn test_concurrent_scrapes_are_isolated() {
    let leader = FakeZooKeeper::start("zk_server_state\tleader\nzk_znode_count\t10\n", WCHS).await;
    let follower =
        FakeZooKeeper::start("zk_server_state\tfollower\nzk_znode_count\t20\n", WCHS).await;
    let scraper = create_scraper();

    let handles: Vec<_> = (0..10)
        .map(|i| {
            let scraper = scraper.clone();
            let target = if i % 2 == 0 {
                leader.target()
            } else {
                follower.target()
            };
            tokio::spawn(async move {
                let body = scraper.scrape(target.clone()).await.encode().unwrap();
                (target, body)
            })
        })
        .collect();

    for handle in handles {
        let (target, body) = handle.await.unwrap();
        let other = if target == leader.target() {
            follower.target()
        } else {
            leader.target()
        };

        assert!(body.contains(&format!("target_host=\"{}\"", target)));
        assert!(
            !body.contains(&format!("target_host=\"{}\"", other)),
            "Scrape of {} leaked samples of {}",
            target,
            other
        );

        let expected_state = if target == leader.target() {
            "leader"
        } else {
            "follower"
        };
        assert!(body.contains(&format!("state=\"{}\"", expected_state)));
        assert_eq!(
            samples(&body)
                .iter()
                .filter(|l| l.starts_with("zk_up"))
                .count(),
            1
        );
    }
}

#[tokio::test]
async fn test_command_metrics_are_recorded() {
    let server = FakeZooKeeper::start(MNTR, WCHS).await;
    let metrics = ExporterMetrics::new();
    let scraper = Scraper::new(&ZookeeperConfig::default(), metrics.clone());

    scraper.scrape(server.target()).await;
    for _ in 0..40 {
        if metrics.commands(FourLetterWord::Srst, true) > 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    assert_eq!(metrics.commands(FourLetterWord::Mntr, true), 1);
    assert_eq!(metrics.commands(FourLetterWord::Wchs, true), 1);
    assert_eq!(metrics.commands(FourLetterWord::Srst, true), 1);
    assert_eq!(metrics.scrapes(ScrapeOutcome::Up), 1);
}

async fn get(router: &axum::Router, uri: &str) -> (StatusCode, Option<String>, String) {
    let response = router
        .clone()
        .oneshot(Request::get(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let content_type = response
        .headers()
        .get("content-type")
        .map(|v| v.to_str().unwrap().to_string());
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, content_type, String::from_utf8(bytes.to_vec()).unwrap())
}

#[tokio::test]
async fn test_scrape_route_serves_openmetrics() {
    let server = FakeZooKeeper::start(MNTR, WCHS).await;
    let unreachable = unreachable_addr().await;
    let router = create_router(create_scraper(), &HttpConfig::default());

    let (status, content_type, body) =
        get(&router, &format!("/scrape?target={}", server.addr)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(content_type.as_deref(), Some(OPENMETRICS_CONTENT_TYPE));
    assert!(
        body.contains(&format!("zk_up{{target_host=\"{}\"}} 1", server.addr)),
        "Output: {}",
        body
    );
    assert!(body.contains("zk_znode_count"));

    let (status, _, body) = get(&router, &format!("/scrape?target={}", unreachable)).await;
    assert_eq!(status, StatusCode::OK);
    let samples = samples(&body);
    assert_eq!(samples.len(), 1, "Only zk_up expected. Output: {}", body);
    assert!(samples[0].starts_with(&format!("zk_up{{target_host=\"{}\"}} 0", unreachable)));
}

#[tokio::test]
async fn test_http_server_scrape_endpoint() {
    let server = FakeZooKeeper::start(MNTR, WCHS).await;

    // Bind and release a port for the exporter
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let actual_addr = listener.local_addr().unwrap();
    drop(listener);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let http = HttpServer::new(create_scraper(), actual_addr, HttpConfig::default());
    let server_handle = tokio::spawn(async move { http.run(shutdown_rx).await });

    let client = reqwest::Client::new();
    let base = format!("http://{}", actual_addr);

    // Wait for the listener to come up
    let mut ready = false;
    for _ in 0..40 {
        if client.get(format!("{}/health", base)).send().await.is_ok() {
            ready = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    assert!(ready, "HTTP server did not start");

    let healthy = client
        .get(format!("{}/scrape?target={}", base, server.addr))
        .send()
        .await
        .unwrap();
    assert_eq!(healthy.status(), 200);
    let body = healthy.text().await.unwrap();
    assert!(body.contains(&format!("zk_up{{target_host=\"{}\"}} 1", server.addr)));

    let missing = client.get(format!("{}/scrape", base)).send().await.unwrap();
    assert_eq!(missing.status(), 400);
    assert_eq!(
        missing.text().await.unwrap(),
        "'target' parameter must be specified\n"
    );

    let hostname = client
        .get(format!("{}/scrape?target=not-an-ip:1234", base))
        .send()
        .await
        .unwrap();
    assert_eq!(hostname.status(), 400);

    shutdown_tx.send(true).unwrap();
    let result = tokio::time::timeout(Duration::from_secs(2), server_handle)
        .await
        .expect("server should stop after shutdown")
        .unwrap();
    assert!(result.is_ok());
}
