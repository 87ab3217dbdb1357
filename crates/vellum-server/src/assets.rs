// File: src/assets.rs
// Purpose: Resolves asset paths under the permitted roots and delegates transfer

use std::path::{Path, PathBuf};

use axum::body::Body;
use axum::http::{header, HeaderValue, Request, StatusCode};
use axum::response::Response;
use tower::ServiceExt;
use tower_http::services::ServeFile;

use crate::error::DispatchError;

/// Cache policy for content-addressed asset namespaces: the bytes at a
/// versioned path never change without a new build identifier.
pub const IMMUTABLE_CACHE: &str = "public, max-age=31536000, immutable";

/// Serves static assets from the two permitted roots.
///
/// The containment check before any I/O is the sole defense against
/// path traversal via crafted wildcard captures; byte transfer itself
/// (ranges, mime types, etags for files) is delegated to `tower-http`.
pub struct AssetGateway {
    build_static_dir: PathBuf,
    public_static_dir: PathBuf,
}

impl AssetGateway {
    pub fn new(build_static_dir: PathBuf, public_static_dir: PathBuf) -> Self {
        Self {
            build_static_dir,
            public_static_dir,
        }
    }

    /// Filesystem target for a `/_next/static/*` capture.
    pub fn build_asset_path(&self, segments: &[String]) -> PathBuf {
        join_segments(&self.build_static_dir, segments)
    }

    /// Filesystem target for a `/static/*` capture.
    pub fn public_asset_path(&self, segments: &[String]) -> PathBuf {
        join_segments(&self.public_static_dir, segments)
    }

    /// Transfers the file at `target`, which must canonicalize to a
    /// descendant of one of the permitted roots. Escapes and missing
    /// files both come back as `NotFound` so the caller can fall through
    /// to the 404 protocol rather than erroring.
    pub async fn serve(
        &self,
        req: Request<Body>,
        target: &Path,
        immutable: bool,
    ) -> Result<Response, DispatchError> {
        let resolved = match tokio::fs::canonicalize(target).await {
            Ok(resolved) => resolved,
            Err(_) => return Err(DispatchError::NotFound),
        };
        if !self.is_permitted(&resolved).await {
            return Err(DispatchError::NotFound);
        }

        let response = match ServeFile::new(&resolved).oneshot(req).await {
            Ok(response) => response,
            Err(never) => match never {},
        };
        if response.status() == StatusCode::NOT_FOUND {
            return Err(DispatchError::NotFound);
        }

        let mut response = response.map(Body::new);
        if immutable {
            response
                .headers_mut()
                .insert(header::CACHE_CONTROL, HeaderValue::from_static(IMMUTABLE_CACHE));
        }
        Ok(response)
    }

    async fn is_permitted(&self, resolved: &Path) -> bool {
        for root in [&self.build_static_dir, &self.public_static_dir] {
            if let Ok(root) = tokio::fs::canonicalize(root).await {
                if resolved.starts_with(&root) {
                    return true;
                }
            }
        }
        false
    }
}

fn join_segments(base: &Path, segments: &[String]) -> PathBuf {
    let mut path = base.to_path_buf();
    for segment in segments {
        path.push(segment);
    }
    path
}
