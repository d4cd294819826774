//! Web front of the product-name tagger.
//!
//! `GET /` renders a form, `POST /extract` takes its `url` field, downloads the
//! page, strips it to visible text and answers with the words tagged as
//! product names.

use std::sync::Arc;

use axum::extract::{Form, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use furn_crawler::extract::page_text;
use furn_crawler::{parse_url, Document, Fetcher};
use furn_ner::{product_names, Tagger};
use serde::Deserialize;
use serde_json::json;

const INDEX: &str = r#"<form action="/extract" method="post">
    <label for="url">Enter URL:</label>
    <input type="text" name="url" id="url" required>
    <button type="submit">Extract products</button>
</form>
"#;

const LOAD_FAILED: &str = "The URL content could not be loaded";
const TAGGING_FAILED: &str = "The products could not be extracted";

/// Shared by every request.
pub struct AppState<T> {
    tagger: Arc<T>,
    fetcher: Fetcher,
    product_tags: Arc<Vec<String>>,
}

impl<T> AppState<T> {
    pub fn new(tagger: Arc<T>, fetcher: Fetcher, product_tags: Vec<String>) -> Self {
        Self {
            tagger,
            fetcher,
            product_tags: Arc::new(product_tags),
        }
    }
}

impl<T> Clone for AppState<T> {
    fn clone(&self) -> Self {
        Self {
            tagger: self.tagger.clone(),
            fetcher: self.fetcher.clone(),
            product_tags: self.product_tags.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ExtractForm {
    pub url: String,
}

pub fn router<T>(state: AppState<T>) -> Router
where
    T: Tagger + Send + Sync + 'static,
{
    Router::new()
        .route("/", get(index))
        .route("/extract", post(extract::<T>))
        .with_state(state)
}

/// Serves until the process is stopped.
pub async fn serve<T>(bind: &str, state: AppState<T>) -> anyhow::Result<()>
where
    T: Tagger + Send + Sync + 'static,
{
    let listener = tokio::net::TcpListener::bind(bind).await?;
    log::info!("Listening on http://{}", listener.local_addr()?);
    axum::serve(listener, router(state)).await?;
    Ok(())
}

async fn index() -> Html<&'static str> {
    Html(INDEX)
}

async fn extract<T>(State(state): State<AppState<T>>, Form(form): Form<ExtractForm>) -> Response
where
    T: Tagger + Send + Sync + 'static,
{
    let url = match parse_url(&form.url) {
        Ok(url) => url,
        Err(e) => {
            log::warn!("Extraction failed: {e}");
            return failure(LOAD_FAILED);
        }
    };
    let body = match state.fetcher.fetch(&url).await {
        Ok(body) => body,
        Err(e) => {
            log::warn!("Extraction failed: {e}");
            return failure(LOAD_FAILED);
        }
    };
    let text = page_text(&Document::from(body.as_str()));

    let tagger = state.tagger.clone();
    let tags = state.product_tags.clone();
    let tagged = tokio::task::spawn_blocking(move || product_names(&*tagger, &text, &tags)).await;
    match tagged {
        Ok(Ok(products)) => {
            log::info!("Extracted products from {url}");
            Json(json!({ "products": products })).into_response()
        }
        Ok(Err(e)) => {
            log::error!("Tagging {url} failed: {e}");
            failure(TAGGING_FAILED)
        }
        Err(e) => {
            log::error!("Tagging {url} panicked: {e}");
            failure(TAGGING_FAILED)
        }
    }
}

fn failure(message: &str) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": message })),
    )
        .into_response()
}
