// File: src/loader.rs
// Purpose: Loads compiled page artifacts on demand; swappable boundary

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;

use crate::error::DispatchError;
use crate::page::{DefaultErrorPage, Page, ERROR_PAGE};

/// Manifest file the build step writes into the build output directory,
/// mapping route names to artifact entries.
pub const PAGES_MANIFEST: &str = "pages-manifest.json";

/// A loaded page implementation plus its declared capabilities.
#[derive(Clone)]
pub struct BuildArtifactSet {
    pub page: Arc<dyn Page>,
    /// Whether the artifact supports the AMP rendering mode.
    pub has_amp: bool,
}

/// Locates and loads the compiled render function for a route.
///
/// Collaborator boundary: the orchestrator only relies on the
/// `NotFound`-vs-`Internal` discrimination of the result. Per-route
/// caching is the implementation's business.
#[async_trait]
pub trait PageLoader: Send + Sync {
    async fn load(&self, route: &str) -> Result<BuildArtifactSet, DispatchError>;
}

/// Default loader: compiled `Page` implementations registered in-process,
/// gated by the build's pages manifest when one exists.
///
/// A route absent from the manifest or the registry is `NotFound` — the
/// common case of a genuinely missing page, distinct from a defect. The
/// error page is exempt from manifest gating so 404/500 rendering works
/// on a registry alone.
pub struct ManifestPageLoader {
    manifest: Option<HashMap<String, String>>,
    registry: HashMap<String, BuildArtifactSet>,
}

impl ManifestPageLoader {
    /// A loader with no manifest gating; routes serve from the registry
    /// alone. The default error page is pre-registered.
    pub fn new() -> Self {
        Self {
            manifest: None,
            registry: default_registry(),
        }
    }

    /// Reads the pages manifest from the build output directory. A missing
    /// manifest file disables gating; an unreadable one is a real error.
    pub fn from_dir(dist_dir: &Path) -> anyhow::Result<Self> {
        let path = dist_dir.join(PAGES_MANIFEST);
        let manifest = if path.exists() {
            let content = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read pages manifest: {:?}", path))?;
            Some(
                serde_json::from_str(&content)
                    .with_context(|| format!("Failed to parse pages manifest: {:?}", path))?,
            )
        } else {
            None
        };

        Ok(Self {
            manifest,
            registry: default_registry(),
        })
    }

    /// Registers a compiled page under a route name.
    pub fn register(&mut self, route: impl Into<String>, page: Arc<dyn Page>) {
        self.register_with_amp(route, page, false);
    }

    pub fn register_with_amp(&mut self, route: impl Into<String>, page: Arc<dyn Page>, has_amp: bool) {
        self.registry
            .insert(route.into(), BuildArtifactSet { page, has_amp });
    }

    /// Registered route names, unordered.
    pub fn routes(&self) -> impl Iterator<Item = &str> {
        self.registry.keys().map(String::as_str)
    }
}

impl Default for ManifestPageLoader {
    fn default() -> Self {
        Self::new()
    }
}

fn default_registry() -> HashMap<String, BuildArtifactSet> {
    let mut registry = HashMap::new();
    registry.insert(
        ERROR_PAGE.to_string(),
        BuildArtifactSet {
            page: Arc::new(DefaultErrorPage) as Arc<dyn Page>,
            has_amp: false,
        },
    );
    registry
}

#[async_trait]
impl PageLoader for ManifestPageLoader {
    async fn load(&self, route: &str) -> Result<BuildArtifactSet, DispatchError> {
        if route != ERROR_PAGE {
            if let Some(manifest) = &self.manifest {
                if !manifest.contains_key(route) {
                    return Err(DispatchError::NotFound);
                }
            }
        }
        self.registry
            .get(route)
            .cloned()
            .ok_or(DispatchError::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::{PageContext, Rendered};
    use serde_json::Value as JsonValue;

    struct NullPage;

    #[async_trait]
    impl Page for NullPage {
        async fn render(&self, _ctx: &PageContext, _props: JsonValue) -> anyhow::Result<Rendered> {
            Ok(Rendered::Html(String::new()))
        }
    }

    #[tokio::test]
    async fn test_unregistered_route_is_not_found() {
        let loader = ManifestPageLoader::new();
        let err = match loader.load("/missing").await {
            Err(err) => err,
            Ok(_) => panic!("expected a missing route to fail"),
        };
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_error_page_registered_by_default() {
        let loader = ManifestPageLoader::new();
        assert!(loader.load(ERROR_PAGE).await.is_ok());
    }

    #[tokio::test]
    async fn test_registered_route_loads() {
        let mut loader = ManifestPageLoader::new();
        loader.register("/about", Arc::new(NullPage));
        let artifact = loader.load("/about").await.unwrap();
        assert!(!artifact.has_amp);
    }

    #[tokio::test]
    async fn test_amp_capability_carried_on_artifact() {
        let mut loader = ManifestPageLoader::new();
        loader.register_with_amp("/amp-page", Arc::new(NullPage), true);
        assert!(loader.load("/amp-page").await.unwrap().has_amp);
    }
}
