// File: src/page.rs
// Purpose: The render-function contract and the normalized request view

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use axum::http::{HeaderMap, Method, Request, StatusCode};
use axum::response::Response;
use serde_json::Value as JsonValue;
use vellum_router::{ParamValue, Params};

use crate::config::RenderOptions;

/// Route name of the framework error page.
pub const ERROR_PAGE: &str = "/_error";

/// Parsed query mapping; values are single strings or ordered sequences.
pub type Query = HashMap<String, ParamValue>;

/// The outcome of a page render.
pub enum Rendered {
    /// An HTML document for the sender to serialize to the wire.
    Html(String),
    /// The page produced (or streamed) the response itself; the
    /// orchestrator must not attempt to send a body.
    Raw(Response),
}

/// The method and headers of the inbound request, detached from its body
/// so the dispatch pipeline can hold them past the transfer handoff.
#[derive(Debug, Clone)]
pub struct RequestMeta {
    pub method: Method,
    pub headers: HeaderMap,
}

impl RequestMeta {
    pub fn of<B>(req: &Request<B>) -> Self {
        Self {
            method: req.method().clone(),
            headers: req.headers().clone(),
        }
    }
}

/// Normalized view of one request, handed to page render functions.
///
/// `pathname` is the logical route path: the data-request suffix is
/// already stripped, so a data request for `/foo.json` carries `/foo`
/// with `data_only` set.
pub struct PageContext {
    pub method: Method,
    pub pathname: String,
    pub query: Query,
    pub params: Params,
    /// Serialized-state request: respond with props, not a document.
    pub data_only: bool,
    /// AMP rendering: requested via query flag, globally enabled, and
    /// supported by the loaded artifact.
    pub amp: bool,
    /// The status the response will carry; pages other than the error
    /// page see `200 OK`.
    pub status: StatusCode,
    /// For error-page renders, a description of the original failure.
    /// `None` for the 404 protocol.
    pub err: Option<String>,
    pub options: Arc<RenderOptions>,
}

/// A compiled page implementation.
///
/// `props` produces the page's serialized state — the body of a
/// data-only response and the input to `render`. Pages without state can
/// rely on the default.
#[async_trait]
pub trait Page: Send + Sync {
    async fn props(&self, _ctx: &PageContext) -> anyhow::Result<JsonValue> {
        Ok(JsonValue::Null)
    }

    async fn render(&self, ctx: &PageContext, props: JsonValue) -> anyhow::Result<Rendered>;
}

/// Built-in error page, registered under [`ERROR_PAGE`] by default so a
/// fresh server renders presentable 404/500 bodies.
pub struct DefaultErrorPage;

#[async_trait]
impl Page for DefaultErrorPage {
    async fn props(&self, ctx: &PageContext) -> anyhow::Result<JsonValue> {
        Ok(serde_json::json!({ "statusCode": ctx.status.as_u16() }))
    }

    async fn render(&self, ctx: &PageContext, _props: JsonValue) -> anyhow::Result<Rendered> {
        let title = if ctx.status == StatusCode::NOT_FOUND {
            "This page could not be found"
        } else {
            "An unexpected error has occurred"
        };
        let html = format!(
            r#"<!DOCTYPE html>
<html>
<head><title>{status} | {title}</title></head>
<body>
  <h1>{status}</h1>
  <p>{title}</p>
</body>
</html>"#,
            status = ctx.status.as_u16(),
            title = title
        );
        Ok(Rendered::Html(html))
    }
}

/// Parses a raw query string into the single-or-many value mapping.
/// Repeated keys accumulate in order.
pub fn parse_query(raw: Option<&str>) -> Query {
    let mut query = Query::new();
    let Some(raw) = raw else {
        return query;
    };

    for pair in raw.split('&').filter(|p| !p.is_empty()) {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        let key = decode_component(key);
        let value = decode_component(value);

        match query.entry(key) {
            Entry::Vacant(slot) => {
                slot.insert(ParamValue::Single(value));
            }
            Entry::Occupied(mut slot) => {
                let mut values = match slot.insert(ParamValue::Many(Vec::new())) {
                    ParamValue::Single(prev) => vec![prev],
                    ParamValue::Many(prev) => prev,
                };
                values.push(value);
                slot.insert(ParamValue::Many(values));
            }
        }
    }

    query
}

fn decode_component(raw: &str) -> String {
    // Queries are best-effort: an undecodable component stays verbatim
    // rather than failing the request (only path decoding is strict).
    urlencoding::decode(raw)
        .map(|decoded| decoded.into_owned())
        .unwrap_or_else(|_| raw.to_string())
}
