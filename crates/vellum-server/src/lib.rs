//! # Vellum Server
//!
//! The production request dispatcher: an ordered route table mapping the
//! reserved asset namespaces and a generic page catch-all onto static
//! transfer and the render pipeline.
//!
//! The entry point is [`VellumServer::handle`], which always resolves to a
//! completed response — misses fall through a layered protocol (build
//! assets, the reserved internal namespace, public assets, pages, the 404
//! protocol, the error page) and defects end at a last-resort plain-text
//! answer rather than escaping the dispatcher.

pub mod assets;
pub mod config;
pub mod error;
pub mod loader;
pub mod page;
pub mod render;
pub mod send;
pub mod server;

pub use assets::{AssetGateway, IMMUTABLE_CACHE};
pub use config::{Config, RenderOptions};
pub use error::DispatchError;
pub use loader::{BuildArtifactSet, ManifestPageLoader, PageLoader, PAGES_MANIFEST};
pub use page::{DefaultErrorPage, Page, PageContext, Query, Rendered, RequestMeta, ERROR_PAGE};
pub use render::{RenderOrchestrator, NO_CACHE};
pub use send::{send, Payload};
pub use server::{RouteHandler, VellumServer, BUILD_ID_FILE};
