// Integration tests for the dispatch pipeline: route table fallbacks,
// the 404/500 protocol, data requests, and conditional responses.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use pretty_assertions::assert_eq;
use serde_json::Value as JsonValue;

use vellum_server::{
    Config, ManifestPageLoader, Page, PageContext, Rendered, VellumServer, ERROR_PAGE, NO_CACHE,
};

struct StubPage;

#[async_trait]
impl Page for StubPage {
    async fn props(&self, ctx: &PageContext) -> anyhow::Result<JsonValue> {
        Ok(serde_json::json!({
            "pathname": ctx.pathname,
            "dataOnly": ctx.data_only,
        }))
    }

    async fn render(&self, ctx: &PageContext, _props: JsonValue) -> anyhow::Result<Rendered> {
        Ok(Rendered::Html(format!("<main>{}</main>", ctx.pathname)))
    }
}

struct FailingPage;

#[async_trait]
impl Page for FailingPage {
    async fn render(&self, _ctx: &PageContext, _props: JsonValue) -> anyhow::Result<Rendered> {
        Err(anyhow::anyhow!("template blew up"))
    }
}

fn temp_root() -> PathBuf {
    let root = std::env::temp_dir().join(format!("vellum-test-{}", uuid::Uuid::new_v4()));
    fs::create_dir_all(root.join(".next")).unwrap();
    fs::write(root.join(".next").join("BUILD_ID"), "test-build-1\n").unwrap();
    root
}

fn server_with(pages: &[(&str, Arc<dyn Page>)]) -> VellumServer {
    let root = temp_root();
    let mut loader = ManifestPageLoader::new();
    for (route, page) in pages {
        loader.register(*route, page.clone());
    }
    VellumServer::with_loader(root, Config::default(), Arc::new(loader)).unwrap()
}

fn get(path: &str) -> Request<Body> {
    Request::builder().uri(path).body(Body::empty()).unwrap()
}

fn request(method: Method, path: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(path)
        .body(Body::empty())
        .unwrap()
}

async fn body_string(response: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[test]
fn test_missing_build_is_fatal() {
    let root = std::env::temp_dir().join(format!("vellum-test-{}", uuid::Uuid::new_v4()));
    fs::create_dir_all(&root).unwrap();

    let err = match VellumServer::with_loader(
        root,
        Config::default(),
        Arc::new(ManifestPageLoader::new()),
    ) {
        Err(err) => err,
        Ok(_) => panic!("expected construction to fail without a build"),
    };
    assert!(format!("{err:#}").contains("Run the build"));
}

#[tokio::test]
async fn test_page_renders_html() {
    let server = server_with(&[("/about", Arc::new(StubPage))]);
    let response = server.handle(get("/about")).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "text/html; charset=utf-8"
    );
    assert_eq!(body_string(response).await, "<main>/about</main>");
}

#[tokio::test]
async fn test_unknown_page_is_404_with_no_cache() {
    let server = server_with(&[]);
    let response = server.handle(get("/missing")).await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(
        response.headers().get(header::CACHE_CONTROL).unwrap(),
        NO_CACHE
    );
    let body = body_string(response).await;
    assert!(body.contains("404"));
}

#[tokio::test]
async fn test_internal_namespace_is_always_404() {
    // Even a page registered under the reserved prefix must not render:
    // the namespace route shadows the catch-all.
    let server = server_with(&[("/_next/secret", Arc::new(StubPage))]);
    let response = server.handle(get("/_next/secret")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_blocked_pages_are_404() {
    let server = server_with(&[
        ("/_app", Arc::new(StubPage) as Arc<dyn Page>),
        ("/_document", Arc::new(StubPage) as Arc<dyn Page>),
    ]);
    for path in ["/_app", "/_document"] {
        let response = server.handle(get(path)).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "{path}");
    }
}

#[tokio::test]
async fn test_data_request_returns_props_json() {
    let server = server_with(&[("/about", Arc::new(StubPage))]);
    let response = server.handle(get("/about.json")).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "application/json"
    );
    let props: JsonValue = serde_json::from_str(&body_string(response).await).unwrap();
    assert_eq!(props["pathname"], "/about");
    assert_eq!(props["dataOnly"], true);
}

#[tokio::test]
async fn test_malformed_escape_is_400() {
    let server = server_with(&[]);
    let response = server.handle(get("/%zz")).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_render_failure_is_500_with_error_page() {
    let server = server_with(&[("/broken", Arc::new(FailingPage))]);
    let response = server.handle(get("/broken")).await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        response.headers().get(header::CACHE_CONTROL).unwrap(),
        NO_CACHE
    );
    let body = body_string(response).await;
    assert!(body.contains("500"));
}

#[tokio::test]
async fn test_unmatched_non_get_is_501() {
    let root = temp_root();
    let mut config = Config::default();
    config.serve.use_filesystem_public_routes = false;

    let server =
        VellumServer::with_loader(root, config, Arc::new(ManifestPageLoader::new())).unwrap();

    let response = server.handle(request(Method::POST, "/anything")).await;
    assert_eq!(response.status(), StatusCode::NOT_IMPLEMENTED);
    assert_eq!(body_string(response).await, "Not Implemented");
}

#[tokio::test]
async fn test_unmatched_get_still_renders_404() {
    let root = temp_root();
    let mut config = Config::default();
    config.serve.use_filesystem_public_routes = false;

    let server =
        VellumServer::with_loader(root, config, Arc::new(ManifestPageLoader::new())).unwrap();

    let response = server.handle(get("/anything")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_head_keeps_headers_elides_body() {
    let server = server_with(&[("/about", Arc::new(StubPage))]);

    let full = server.handle(get("/about")).await;
    let expected_length = full
        .headers()
        .get(header::CONTENT_LENGTH)
        .unwrap()
        .clone();

    let head = server.handle(request(Method::HEAD, "/about")).await;
    assert_eq!(head.status(), StatusCode::OK);
    assert_eq!(
        head.headers().get(header::CONTENT_LENGTH).unwrap(),
        expected_length
    );
    assert_eq!(body_string(head).await, "");
}

#[tokio::test]
async fn test_error_page_failure_hits_last_resort_500() {
    // When the error page itself cannot render, nothing recovers: the
    // dispatcher answers with its fixed literal body.
    let server = server_with(&[(ERROR_PAGE, Arc::new(FailingPage))]);
    let response = server.handle(get("/missing")).await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_string(response).await, "Internal Server Error");
}

#[tokio::test]
async fn test_conditional_404_revalidates_to_304() {
    let server = server_with(&[]);

    let first = server.handle(get("/missing")).await;
    assert_eq!(first.status(), StatusCode::NOT_FOUND);
    let etag = first.headers().get(header::ETAG).unwrap().clone();
    assert!(!body_string(first).await.is_empty());

    let mut conditional = get("/missing");
    conditional
        .headers_mut()
        .insert(header::IF_NONE_MATCH, etag);

    let second = server.handle(conditional).await;
    assert_eq!(second.status(), StatusCode::NOT_MODIFIED);
    assert_eq!(body_string(second).await, "");
}

#[tokio::test]
async fn test_etag_round_trip_yields_304() {
    let server = server_with(&[("/about", Arc::new(StubPage))]);

    let first = server.handle(get("/about")).await;
    let etag = first.headers().get(header::ETAG).unwrap().clone();

    let mut conditional = get("/about");
    conditional
        .headers_mut()
        .insert(header::IF_NONE_MATCH, etag);

    let second = server.handle(conditional).await;
    assert_eq!(second.status(), StatusCode::NOT_MODIFIED);
    assert_eq!(body_string(second).await, "");
}

#[tokio::test]
async fn test_etags_disabled_by_config() {
    let root = temp_root();
    let mut config = Config::default();
    config.serve.generate_etags = false;

    let mut loader = ManifestPageLoader::new();
    loader.register("/about", Arc::new(StubPage));
    let server = VellumServer::with_loader(root, config, Arc::new(loader)).unwrap();

    let response = server.handle(get("/about")).await;
    assert!(!response.headers().contains_key(header::ETAG));
}

#[tokio::test]
async fn test_manifest_gates_unlisted_routes() {
    let root = temp_root();
    fs::write(
        root.join(".next").join("pages-manifest.json"),
        r#"{ "/listed": "pages/listed.js" }"#,
    )
    .unwrap();

    let mut loader = ManifestPageLoader::from_dir(&root.join(".next")).unwrap();
    loader.register("/listed", Arc::new(StubPage));
    loader.register("/unlisted", Arc::new(StubPage));
    let server = VellumServer::with_loader(root, Config::default(), Arc::new(loader)).unwrap();

    let listed = server.handle(get("/listed")).await;
    assert_eq!(listed.status(), StatusCode::OK);

    let unlisted = server.handle(get("/unlisted")).await;
    assert_eq!(unlisted.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_query_is_visible_to_props() {
    let server = server_with(&[("/search", Arc::new(StubPage))]);
    let response = server.handle(get("/search?q=hello&tag=a&tag=b")).await;
    // The stub ignores query contents; this just asserts a query string
    // does not disturb route matching or the data suffix.
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_string(response).await, "<main>/search</main>");
}

#[tokio::test]
async fn test_trailing_slash_resolves_same_route() {
    let server = server_with(&[("/about", Arc::new(StubPage))]);
    let response = server.handle(get("/about/")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_string(response).await, "<main>/about</main>");
}
