// File: src/server.rs
// Purpose: Process-wide server state, the route table, and top-level dispatch

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use tracing::{debug, error};
use vellum_router::{Params, ParamValue, PathPattern, Router};

use crate::assets::AssetGateway;
use crate::config::{Config, RenderOptions};
use crate::error::DispatchError;
use crate::loader::{ManifestPageLoader, PageLoader};
use crate::page::{parse_query, Query, RequestMeta};
use crate::render::RenderOrchestrator;

/// File under the build output directory holding the build identifier.
pub const BUILD_ID_FILE: &str = "BUILD_ID";

/// The reserved path prefix for framework-generated assets.
pub const INTERNAL_PREFIX: &str = "/_next";

/// Dispatch targets for the route table. Method references rather than
/// closures: the table stays a plain ordered list and the server passes
/// its own state explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteHandler {
    /// `/_next/static/*` — versioned client assets from the build output.
    BuildAsset,
    /// `/_next/*` — anything else in the internal namespace is always 404.
    ReservedNamespace,
    /// `/static/*` — public assets rooted at the project directory.
    PublicAsset,
    /// `/*` — dynamic page rendering (optional catch-all).
    Page,
}

/// Process-wide server state: resolved directories, build identifier,
/// the compiled route table, and the render collaborators. Created once
/// at construction; immutable afterwards except the asset prefix.
pub struct VellumServer {
    dist_dir: PathBuf,
    options: Arc<RenderOptions>,
    router: Router<RouteHandler>,
    assets: AssetGateway,
    orchestrator: RenderOrchestrator,
}

impl VellumServer {
    /// Builds a server with the default manifest-gated page loader.
    pub fn new(root_dir: impl Into<PathBuf>, config: Config) -> Result<Self> {
        let root_dir = root_dir.into();
        let dist_dir = root_dir.join(&config.build.dist_dir);
        let loader = ManifestPageLoader::from_dir(&dist_dir)?;
        Self::with_loader(root_dir, config, Arc::new(loader))
    }

    /// Builds a server around a caller-supplied page loader.
    ///
    /// Reading the build identifier is the startup gate: without it the
    /// server must not start serving traffic.
    pub fn with_loader(
        root_dir: impl Into<PathBuf>,
        config: Config,
        loader: Arc<dyn PageLoader>,
    ) -> Result<Self> {
        let root_dir = root_dir.into();
        let dist_dir = root_dir.join(&config.build.dist_dir);

        let build_id = fs::read_to_string(dist_dir.join(BUILD_ID_FILE))
            .map(|id| id.trim().to_string())
            .with_context(|| {
                format!(
                    "Could not find a production build in {}. Run the build step before starting the server",
                    dist_dir.display()
                )
            })?;

        let options = Arc::new(RenderOptions::from_config(&config, build_id));
        let router = build_route_table(config.serve.use_filesystem_public_routes)?;
        let assets = AssetGateway::new(
            dist_dir.join("static"),
            root_dir.join(&config.build.static_dir),
        );
        let orchestrator = RenderOrchestrator::new(loader, options.clone());

        Ok(Self {
            dist_dir,
            options,
            router,
            assets,
            orchestrator,
        })
    }

    pub fn build_id(&self) -> &str {
        &self.options.build_id
    }

    pub fn options(&self) -> &Arc<RenderOptions> {
        &self.options
    }

    pub fn dist_dir(&self) -> &PathBuf {
        &self.dist_dir
    }

    /// Startup-only hook for pointing asset URLs at a CDN.
    pub fn set_asset_prefix(&self, prefix: &str) {
        self.options.set_asset_prefix(prefix);
    }

    /// Request entry point. Always resolves to a completed response;
    /// nothing propagates past this boundary.
    pub async fn handle(&self, req: Request<Body>) -> Response {
        let method = req.method().clone();
        let path = req.uri().path().to_string();
        let meta = RequestMeta::of(&req);
        let query = parse_query(req.uri().query());
        debug!(%method, %path, "dispatching request");

        let outcome = match self.router.recognize(&path) {
            Ok(Some(matched)) => {
                let handler = *matched.handler;
                let params = matched.params;
                self.dispatch(handler, req, params, &meta, &query).await
            }
            Ok(None) if method == Method::GET || method == Method::HEAD => {
                self.orchestrator.render_not_found(&meta, &query).await
            }
            Ok(None) => Ok((StatusCode::NOT_IMPLEMENTED, "Not Implemented").into_response()),
            Err(_) => {
                // Malformed percent-encoding: 400 via the error-page
                // pipeline with a null error, not an unmatched-route 404.
                self.orchestrator
                    .render_error(&meta, &query, StatusCode::BAD_REQUEST, None)
                    .await
            }
        };

        match outcome {
            Ok(response) => response,
            // A NotFound that escaped the orchestrator means even the
            // error page could not be located; answer plainly.
            Err(DispatchError::NotFound) => (StatusCode::NOT_FOUND, "Not Found").into_response(),
            Err(err) => {
                error!(%path, error = %format!("{err:#}"), "unhandled failure while serving request");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response()
            }
        }
    }

    async fn dispatch(
        &self,
        handler: RouteHandler,
        req: Request<Body>,
        params: Params,
        meta: &RequestMeta,
        query: &Query,
    ) -> Result<Response, DispatchError> {
        match handler {
            RouteHandler::BuildAsset => {
                let tail = wildcard_segments(&params, "path");
                let immutable = tail.first().is_some_and(|first| {
                    first == "runtime" || first == "chunks" || *first == self.options.build_id
                });
                let target = self.assets.build_asset_path(tail);
                match self.assets.serve(req, &target, immutable).await {
                    Err(DispatchError::NotFound) => {
                        self.orchestrator.render_not_found(meta, query).await
                    }
                    outcome => outcome,
                }
            }
            RouteHandler::ReservedNamespace => {
                self.orchestrator.render_not_found(meta, query).await
            }
            RouteHandler::PublicAsset => {
                let tail = wildcard_segments(&params, "path");
                let target = self.assets.public_asset_path(tail);
                match self.assets.serve(req, &target, false).await {
                    Err(DispatchError::NotFound) => {
                        self.orchestrator.render_not_found(meta, query).await
                    }
                    outcome => outcome,
                }
            }
            RouteHandler::Page => self.render(req, params).await,
        }
    }

    /// Renders a page for the given request. Public so embedders can
    /// drive the pipeline directly; internal-namespace paths arriving
    /// here are handed back to `handle`, whose route table resolves them
    /// before the page catch-all is reached — so this cannot recurse.
    pub async fn render(
        &self,
        req: Request<Body>,
        params: Params,
    ) -> Result<Response, DispatchError> {
        if req.uri().path().starts_with(INTERNAL_PREFIX) {
            return Ok(Box::pin(self.handle(req)).await);
        }

        let meta = RequestMeta::of(&req);
        let query = parse_query(req.uri().query());
        let pathname = req.uri().path().to_string();
        self.orchestrator.render(&meta, &pathname, &query, params).await
    }
}

/// The fixed route table. Registration order is security-relevant: the
/// internal namespaces and the public static prefix must be claimed
/// before the generic catch-all, or arbitrary paths could shadow them.
fn build_route_table(serve_pages: bool) -> Result<Router<RouteHandler>> {
    let mut router = Router::new();
    router.push(
        PathPattern::compile("/_next/static/:path*")?,
        RouteHandler::BuildAsset,
    );
    router.push(
        PathPattern::compile("/_next/:path*")?,
        RouteHandler::ReservedNamespace,
    );
    router.push(
        PathPattern::compile("/static/:path*")?,
        RouteHandler::PublicAsset,
    );
    if serve_pages {
        router.push(PathPattern::compile("/:path*")?, RouteHandler::Page);
    }
    Ok(router)
}

fn wildcard_segments<'a>(params: &'a Params, name: &str) -> &'a [String] {
    match params.get(name) {
        Some(ParamValue::Many(segments)) => segments,
        _ => &[],
    }
}
