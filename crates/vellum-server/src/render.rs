// File: src/render.rs
// Purpose: The render pipeline — artifact loading, page invocation, 404/500 protocol

use std::sync::Arc;

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::Response;
use tracing::{debug, error};
use vellum_router::{ParamValue, Params};

use crate::config::RenderOptions;
use crate::error::DispatchError;
use crate::loader::{BuildArtifactSet, PageLoader};
use crate::page::{PageContext, Query, Rendered, RequestMeta, ERROR_PAGE};
use crate::send::{send, Payload};

/// Reserved internal pages that must never render directly.
const BLOCKED_PAGES: [&str; 2] = ["/_app", "/_document"];

/// Cache policy for every 404 and error response.
pub const NO_CACHE: &str = "no-cache, no-store, max-age=0, must-revalidate";

/// Suffix marking a request for a page's serialized state rather than
/// its document.
const DATA_SUFFIX: &str = ".json";

/// Drives one render: loads the page artifact for the logical route,
/// invokes it, and funnels failures into the 404/500 fallback protocol.
pub struct RenderOrchestrator {
    loader: Arc<dyn PageLoader>,
    options: Arc<RenderOptions>,
}

impl RenderOrchestrator {
    pub fn new(loader: Arc<dyn PageLoader>, options: Arc<RenderOptions>) -> Self {
        Self { loader, options }
    }

    /// Renders the page for `pathname`.
    ///
    /// Missing artifacts and blocked pathnames go through the 404
    /// protocol; load/render defects are logged and answered with the
    /// error page at 500. The only `Err` this returns is a failure of
    /// the error-page render itself, which the caller's last-resort
    /// handler deals with.
    pub async fn render(
        &self,
        meta: &RequestMeta,
        pathname: &str,
        query: &Query,
        params: Params,
    ) -> Result<Response, DispatchError> {
        let (route, data_only) = split_data_request(pathname);

        if BLOCKED_PAGES.contains(&route.as_str()) {
            return self.render_not_found(meta, query).await;
        }

        let artifact = match self.loader.load(&route).await {
            Ok(artifact) => artifact,
            Err(DispatchError::NotFound) => {
                debug!(route = %route, "no build artifact for route");
                return self.render_not_found(meta, query).await;
            }
            Err(err) => {
                error!(route = %route, error = %format!("{err:#}"), "failed to load page artifact");
                return self
                    .render_error(meta, query, StatusCode::INTERNAL_SERVER_ERROR, Some(err.to_string()))
                    .await;
            }
        };

        let ctx = PageContext {
            method: meta.method.clone(),
            pathname: route.clone(),
            query: query.clone(),
            params,
            data_only,
            amp: self.amp_requested(query, &artifact),
            status: StatusCode::OK,
            err: None,
            options: self.options.clone(),
        };

        match self.invoke(meta, &artifact, &ctx).await {
            Ok(response) => Ok(response),
            Err(err) => {
                error!(route = %route, error = %format!("{err:#}"), "page render failed");
                self.render_error(meta, query, StatusCode::INTERNAL_SERVER_ERROR, Some(format!("{err:#}")))
                    .await
            }
        }
    }

    /// The 404 protocol: status 404, caching cleared, error page rendered
    /// with a null error through the same pipeline as real failures.
    pub async fn render_not_found(
        &self,
        meta: &RequestMeta,
        query: &Query,
    ) -> Result<Response, DispatchError> {
        self.render_error(meta, query, StatusCode::NOT_FOUND, None).await
    }

    /// Renders the error page through the same load/render path as a real
    /// page. A second failure in here is deliberately not guarded: it
    /// propagates to the caller's last-resort handler rather than being
    /// masked by a nested recovery attempt.
    pub async fn render_error(
        &self,
        meta: &RequestMeta,
        query: &Query,
        status: StatusCode,
        err: Option<String>,
    ) -> Result<Response, DispatchError> {
        let artifact = self.loader.load(ERROR_PAGE).await?;
        let ctx = PageContext {
            method: meta.method.clone(),
            pathname: ERROR_PAGE.to_string(),
            query: query.clone(),
            params: Params::new(),
            data_only: false,
            amp: false,
            status,
            err,
            options: self.options.clone(),
        };

        let mut response = self
            .invoke(meta, &artifact, &ctx)
            .await
            .map_err(DispatchError::internal)?;
        // A conditional re-request may have revalidated; the 304 from the
        // sender must survive, not be clobbered back to the error status.
        if response.status() == StatusCode::NOT_MODIFIED {
            return Ok(response);
        }
        *response.status_mut() = status;
        response
            .headers_mut()
            .insert(header::CACHE_CONTROL, HeaderValue::from_static(NO_CACHE));
        Ok(response)
    }

    /// Invokes the page: props first (also the data-only body), then the
    /// document render, then the sender.
    async fn invoke(
        &self,
        meta: &RequestMeta,
        artifact: &BuildArtifactSet,
        ctx: &PageContext,
    ) -> anyhow::Result<Response> {
        let props = artifact.page.props(ctx).await?;

        if ctx.data_only {
            let payload = serde_json::to_string(&props)?;
            return Ok(send(meta, ctx.status, payload, Payload::Json, self.options.generate_etags));
        }

        match artifact.page.render(ctx, props).await? {
            Rendered::Html(html) => {
                Ok(send(meta, ctx.status, html, Payload::Html, self.options.generate_etags))
            }
            // The page already completed the response; nothing to send.
            Rendered::Raw(response) => Ok(response),
        }
    }

    fn amp_requested(&self, query: &Query, artifact: &BuildArtifactSet) -> bool {
        let flagged = matches!(
            query.get("amp"),
            Some(ParamValue::Single(value)) if value == "1"
        );
        flagged && self.options.amp_enabled && artifact.has_amp
    }
}

/// Splits the data-request suffix off a pathname, yielding the logical
/// route and whether this is a serialized-state request.
pub fn split_data_request(pathname: &str) -> (String, bool) {
    let trimmed = if pathname.len() > 1 {
        pathname.trim_end_matches('/')
    } else {
        pathname
    };
    let trimmed = if trimmed.is_empty() { "/" } else { trimmed };

    match trimmed.strip_suffix(DATA_SUFFIX) {
        Some(route) if !route.is_empty() && route != "/" => (route.to_string(), true),
        _ => (trimmed.to_string(), false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_data_request_strips_suffix() {
        assert_eq!(split_data_request("/foo.json"), ("/foo".to_string(), true));
        assert_eq!(
            split_data_request("/nested/page.json"),
            ("/nested/page".to_string(), true)
        );
    }

    #[test]
    fn test_split_data_request_document_paths() {
        assert_eq!(split_data_request("/foo"), ("/foo".to_string(), false));
        assert_eq!(split_data_request("/"), ("/".to_string(), false));
        assert_eq!(split_data_request("/foo/"), ("/foo".to_string(), false));
    }

    #[test]
    fn test_split_data_request_bare_suffix_is_literal() {
        // "/.json" has no route underneath; treat it as a literal path.
        assert_eq!(split_data_request("/.json"), ("/.json".to_string(), false));
    }
}
