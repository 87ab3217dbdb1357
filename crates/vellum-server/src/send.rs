// File: src/send.rs
// Purpose: Serializes a final payload to the wire with conditional-request support

use axum::body::Body;
use axum::http::{header, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use sha2::{Digest, Sha256};

use crate::page::RequestMeta;

/// What kind of payload is being sent; decides the content type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Payload {
    Html,
    Json,
}

impl Payload {
    fn content_type(self) -> &'static str {
        match self {
            Payload::Html => "text/html; charset=utf-8",
            Payload::Json => "application/json",
        }
    }
}

/// Writes a rendered payload as an HTTP response.
///
/// With etag generation enabled, a matching `If-None-Match` short-circuits
/// to 304 with no body. HEAD requests keep all headers (including the
/// content length of the document they describe) but omit the body.
pub fn send(
    meta: &RequestMeta,
    status: StatusCode,
    body: String,
    kind: Payload,
    generate_etag: bool,
) -> Response {
    let etag = generate_etag.then(|| format!("\"{}\"", hex::encode(Sha256::digest(body.as_bytes()))));

    if let Some(tag) = &etag {
        let matched = meta
            .headers
            .get(header::IF_NONE_MATCH)
            .and_then(|value| value.to_str().ok())
            == Some(tag.as_str());
        if matched {
            let mut response = StatusCode::NOT_MODIFIED.into_response();
            set_etag(&mut response, tag);
            return response;
        }
    }

    let length = body.len();
    let body = if meta.method == Method::HEAD {
        Body::empty()
    } else {
        Body::from(body)
    };

    let mut response = (status, body).into_response();
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(kind.content_type()),
    );
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(length));
    if let Some(tag) = &etag {
        set_etag(&mut response, tag);
    }
    response
}

fn set_etag(response: &mut Response, tag: &str) {
    // The tag is quoted hex, always a valid header value.
    if let Ok(value) = HeaderValue::from_str(tag) {
        response.headers_mut().insert(header::ETAG, value);
    }
}
