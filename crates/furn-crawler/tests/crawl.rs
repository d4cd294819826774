use std::fs;
use std::net::SocketAddr;
use std::time::Duration;

use axum::response::Html;
use axum::routing::get;
use axum::Router;
use furn_crawler::{anyhow, crawl_site, CrawlReport, CrawlerConfig, Document};
use furn_crawler::{HeadingScraper, HeadingScraperConfig, Scrapable, ScrapingContext};

const HOME: &str = r#"
    <html><body>
      <h1>Ektorp Sofa</h1>
      <h2>The best</h2>
      <a href="/beds">Beds</a>
      <a href="/missing">Gone</a>
      <a href="/private/stock">Stock</a>
      <a href="http://other.invalid/chairs">Elsewhere</a>
    </body></html>
"#;

const BEDS: &str = r#"
    <html><body>
      <h1>Malm Bed</h1>
      <a href="/">Home</a>
      <a href="/beds#top">Top</a>
    </body></html>
"#;

async fn serve() -> SocketAddr {
    let app = Router::new()
        .route("/", get(|| async { Html(HOME) }))
        .route("/beds", get(|| async { Html(BEDS) }))
        .route("/private/stock", get(|| async { Html("<h1>Secret Stock</h1>") }))
        .route(
            "/robots.txt",
            get(|| async { "User-agent: *\nDisallow: /private\n" }),
        );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
    addr
}

fn config_for(addr: SocketAddr) -> CrawlerConfig {
    CrawlerConfig {
        seeds: vec![format!("http://{addr}/")],
        delay: 0.0,
        timeout: 5.0,
        ..CrawlerConfig::default()
    }
}

#[derive(Default)]
struct Recorder {
    visited: Vec<String>,
}

impl Scrapable for Recorder {
    type Config = ();

    fn new(_config: &()) -> anyhow::Result<Self> {
        Ok(Self::default())
    }

    fn scrap(&mut self, _page: &Document, ctx: &ScrapingContext) -> anyhow::Result<()> {
        self.visited.push(ctx.location().path().to_string());
        Ok(())
    }
}

#[tokio::test]
async fn crawl_stays_on_site_and_obeys_robots() {
    let addr = serve().await;
    let mut recorder = Recorder::new(&()).unwrap();

    let report = crawl_site(&config_for(addr), &mut recorder).await.unwrap();

    assert_eq!(
        report,
        CrawlReport {
            fetched: 2,
            failed: 1,
            skipped: 1,
        }
    );
    assert_eq!(recorder.visited, ["/", "/beds"]);
}

async fn serve_with_robots(robots: &'static str) -> SocketAddr {
    let app = Router::new()
        .route("/", get(|| async { Html(HOME) }))
        .route("/beds", get(|| async { Html(BEDS) }))
        .route("/robots.txt", get(move || async move { robots }));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
    addr
}

#[tokio::test]
async fn oversized_crawl_delay_keeps_the_configured_delay() {
    for robots in [
        "User-agent: *\nCrawl-delay: 1e30\n",
        "User-agent: *\nCrawl-delay: inf\n",
    ] {
        let addr = serve_with_robots(robots).await;
        let mut recorder = Recorder::new(&()).unwrap();

        let report = tokio::time::timeout(
            Duration::from_secs(30),
            crawl_site(&config_for(addr), &mut recorder),
        )
        .await
        .expect("crawl finished")
        .unwrap();

        assert_eq!(
            report,
            CrawlReport {
                fetched: 2,
                failed: 2,
                skipped: 0,
            }
        );
        assert_eq!(recorder.visited, ["/", "/beds"]);
    }
}

#[tokio::test]
async fn robots_can_be_ignored() {
    let addr = serve().await;
    let mut recorder = Recorder::new(&()).unwrap();
    let config = CrawlerConfig {
        obey_robots: false,
        ..config_for(addr)
    };

    let report = crawl_site(&config, &mut recorder).await.unwrap();

    assert_eq!(report.fetched, 3);
    assert_eq!(report.skipped, 0);
    assert_eq!(recorder.visited, ["/", "/beds", "/private/stock"]);
}

#[tokio::test]
async fn page_limit_caps_each_seed() {
    let addr = serve().await;
    let mut recorder = Recorder::new(&()).unwrap();
    let config = CrawlerConfig {
        max_pages_per_seed: Some(1),
        ..config_for(addr)
    };

    let report = crawl_site(&config, &mut recorder).await.unwrap();

    assert_eq!(report.fetched, 1);
    assert_eq!(recorder.visited, ["/"]);
}

#[tokio::test]
async fn unreachable_seed_is_counted_as_failed() {
    let mut recorder = Recorder::new(&()).unwrap();
    let config = CrawlerConfig {
        seeds: vec!["http://127.0.0.1:9/".to_string(), "not a url".to_string()],
        delay: 0.0,
        timeout: 2.0,
        ..CrawlerConfig::default()
    };

    let report = crawl_site(&config, &mut recorder).await.unwrap();

    assert_eq!(report.fetched, 0);
    assert_eq!(report.failed, 1);
    assert!(recorder.visited.is_empty());
}

#[tokio::test]
async fn heading_words_land_in_the_queue() {
    let addr = serve().await;
    let dir = tempfile::tempdir().unwrap();
    let queue = dir.path().join("furniture_data.csv");
    let mut scraper = HeadingScraper::new(&HeadingScraperConfig {
        queue: queue.clone(),
        file_mode: Default::default(),
    })
    .unwrap();

    crawl_site(&config_for(addr), &mut scraper).await.unwrap();

    assert_eq!(scraper.rows_written(), 5);
    assert_eq!(
        fs::read_to_string(&queue).unwrap(),
        "text\nEktorp\nSofa\nbest\nBed\nMalm\n"
    );
}

#[test]
fn heading_scraper_refuses_a_queue_mid_drain() {
    let dir = tempfile::tempdir().unwrap();
    let queue = dir.path().join("furniture_data.csv");
    fs::write(&queue, "text\nHemnes\n").unwrap();
    fs::write(dir.path().join("furniture_data.csv.drain.json"), "{}").unwrap();

    let config = HeadingScraperConfig {
        queue: queue.clone(),
        file_mode: Default::default(),
    };
    let err = HeadingScraper::new(&config).err().unwrap();

    assert!(err.to_string().contains("unfinished"), "{err}");
    assert_eq!(fs::read_to_string(&queue).unwrap(), "text\nHemnes\n");
}
