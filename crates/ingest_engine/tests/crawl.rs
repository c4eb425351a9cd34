use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use ingest_engine::{
    ChannelIndexer, CrawlClient, CrawlError, CrawlFailure, CrawlSettings, PageRecord, Pipeline,
    PipelineConfig, ReqwestCrawlClient, SharedRecord, StatsSnapshot,
};
use pretty_assertions::assert_eq;
use tokio::sync::mpsc;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn page(host: &str) -> String {
    format!(
        r#"<html><head><title>Docs</title></head><body>
<a href="/docs/a.html">a</a>
<a href="b.html">b</a>
<a href="http://{host}/docs/c.html">c</a>
<a href="https://elsewhere.example/docs/d.html">d</a>
<a name="no-href">e</a>
</body></html>"#
    )
}

fn crawl_config(hostname: String, max_in_flight: usize) -> PipelineConfig {
    PipelineConfig {
        crawl: CrawlSettings {
            hostname,
            max_in_flight,
            request_timeout_ms: 2_000,
            ..CrawlSettings::default()
        },
        heartbeat_interval_ms: 50,
        ..PipelineConfig::default()
    }
}

async fn next_indexed(rx: &mut mpsc::Receiver<SharedRecord>) -> SharedRecord {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for indexer")
        .expect("indexer channel closed")
}

async fn wait_for(pipeline: &Pipeline, done: impl Fn(&StatsSnapshot) -> bool) -> StatsSnapshot {
    for _ in 0..500 {
        let stats = pipeline.stats();
        if done(&stats) {
            return stats;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached: {}", pipeline.stats());
}

async fn requested_paths(server: &MockServer, expected: usize) -> BTreeSet<String> {
    for _ in 0..500 {
        let requests = server.received_requests().await.unwrap_or_default();
        if requests.len() >= expected {
            return requests.iter().map(|r| r.url.path().to_string()).collect();
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("server saw fewer than {expected} requests");
}

#[tokio::test]
async fn same_host_links_are_fetched_under_record_path() {
    ingest_logging::initialize_for_tests();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .mount(&server)
        .await;
    let host = server.address().to_string();

    let (indexer, mut rx) = ChannelIndexer::channel(16);
    let pipeline = Pipeline::new(crawl_config(host.clone(), 32), Arc::new(indexer)).unwrap();
    pipeline.pipe(PageRecord::shared("/docs/", page(&host))).await;

    let indexed = next_indexed(&mut rx).await;
    assert_eq!(indexed.title(), "Docs");

    let paths = requested_paths(&server, 3).await;
    let expected: BTreeSet<String> = ["/docs/a.html", "/docs/b.html", "/docs/c.html"]
        .into_iter()
        .map(String::from)
        .collect();
    assert_eq!(paths, expected);

    let stats = wait_for(&pipeline, |s| s.crawl_dispatched == 3).await;
    assert_eq!(stats.crawl_dropped, 0);
    assert_eq!(stats.crawl_failed, 0);
    pipeline.shutdown().await;
}

#[tokio::test]
async fn failed_crawl_does_not_block_indexing() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    let host = server.address().to_string();

    let (indexer, mut rx) = ChannelIndexer::channel(16);
    let pipeline = Pipeline::new(crawl_config(host, 32), Arc::new(indexer)).unwrap();
    pipeline
        .pipe(PageRecord::shared(
            "/docs/",
            "<title>One link</title><a href=\"gone.html\">gone</a>",
        ))
        .await;

    assert_eq!(next_indexed(&mut rx).await.title(), "One link");
    let stats = wait_for(&pipeline, |s| s.crawl_failed == 1).await;
    assert_eq!(stats.crawl_dispatched, 1);
    assert_eq!(stats.indexed, 1);
    pipeline.shutdown().await;
}

#[tokio::test]
async fn crawl_follows_decoded_href() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    let host = server.address().to_string();

    let (indexer, mut rx) = ChannelIndexer::channel(16);
    let pipeline = Pipeline::new(crawl_config(host, 32), Arc::new(indexer)).unwrap();
    pipeline
        .pipe(PageRecord::shared(
            "/docs/",
            "<title>Q&amp;A</title><a href=\"/docs/q&amp;a.html?x=1&amp;y=2\">faq</a>",
        ))
        .await;

    assert_eq!(next_indexed(&mut rx).await.title(), "Q&A");
    let paths = requested_paths(&server, 1).await;
    assert_eq!(paths, BTreeSet::from(["/docs/q&a.html".to_string()]));
    pipeline.shutdown().await;
}

struct StalledClient;

#[async_trait::async_trait]
impl CrawlClient for StalledClient {
    async fn get(&self, _url: &str) -> Result<(), CrawlError> {
        std::future::pending().await
    }
}

#[tokio::test]
async fn saturated_crawler_drops_extra_links() {
    let (indexer, mut rx) = ChannelIndexer::channel(16);
    let pipeline = Pipeline::with_crawl_client(
        crawl_config("docs.example.com".to_string(), 1),
        Arc::new(indexer),
        Arc::new(StalledClient),
    )
    .unwrap();
    pipeline
        .pipe(PageRecord::shared("/docs/", page("docs.example.com")))
        .await;

    next_indexed(&mut rx).await;
    let stats = pipeline.stats();
    assert_eq!(stats.crawl_dispatched, 1);
    assert_eq!(stats.crawl_dropped, 2);
    pipeline.shutdown().await;
}

#[tokio::test]
async fn crawling_is_off_without_hostname() {
    let (indexer, mut rx) = ChannelIndexer::channel(16);
    let pipeline = Pipeline::with_crawl_client(
        PipelineConfig::default(),
        Arc::new(indexer),
        Arc::new(StalledClient),
    )
    .unwrap();
    pipeline
        .pipe(PageRecord::shared("/docs/", page("docs.example.com")))
        .await;

    next_indexed(&mut rx).await;
    assert_eq!(pipeline.stats().crawl_dispatched, 0);
    pipeline.shutdown().await;
}

#[tokio::test]
async fn client_reports_http_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let client = ReqwestCrawlClient::new(&CrawlSettings::default()).unwrap();
    let err = client
        .get(&format!("{}/missing", server.uri()))
        .await
        .unwrap_err();
    assert_eq!(err.kind, CrawlFailure::HttpStatus(404));
}

#[tokio::test]
async fn client_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
        .mount(&server)
        .await;

    let settings = CrawlSettings {
        request_timeout_ms: 100,
        ..CrawlSettings::default()
    };
    let client = ReqwestCrawlClient::new(&settings).unwrap();
    let err = client
        .get(&format!("{}/slow", server.uri()))
        .await
        .unwrap_err();
    assert_eq!(err.kind, CrawlFailure::Timeout);
}

#[tokio::test]
async fn client_stops_at_redirect_limit() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/loop"))
        .respond_with(ResponseTemplate::new(302).insert_header("Location", "/loop"))
        .mount(&server)
        .await;

    let settings = CrawlSettings {
        redirect_limit: 2,
        ..CrawlSettings::default()
    };
    let client = ReqwestCrawlClient::new(&settings).unwrap();
    let err = client
        .get(&format!("{}/loop", server.uri()))
        .await
        .unwrap_err();
    assert_eq!(err.kind, CrawlFailure::RedirectLimitExceeded);
}

#[tokio::test]
async fn client_rejects_unparseable_url() {
    let client = ReqwestCrawlClient::new(&CrawlSettings::default()).unwrap();
    let err = client.get("not a url").await.unwrap_err();
    assert_eq!(err.kind, CrawlFailure::InvalidUrl);
}
