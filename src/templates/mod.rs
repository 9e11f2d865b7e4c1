//! Template Store seam.
//!
//! The engine never decides where templates come from. The caller hands it a
//! [`TemplateResolver`]: a registry client when online, a local store when
//! offline. Either way "no template" is an ordinary answer, and resolver
//! failures are downgraded to it by the engine.

pub mod cache;
pub mod enroll;
pub mod store;

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{Template, TemplateKey, TemplateSource};

pub use cache::CachingResolver;
pub use enroll::enroll_template;
pub use store::{DirectoryTemplateStore, InMemoryTemplateStore, NoTemplateResolver};

#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("Template I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed template {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Unsupported template schema v{found} (expected v{expected})")]
    Schema { expected: u32, found: u32 },

    #[error("Template file holds {found}, requested {requested}")]
    KeyMismatch {
        requested: TemplateKey,
        found: TemplateKey,
    },

    #[error("Template source unavailable: {0}")]
    Unavailable(String),
}

/// Looks up the template for an institution and certificate type.
#[async_trait]
pub trait TemplateResolver: Send + Sync {
    /// `Ok(None)` means the key is unknown to this source.
    async fn resolve(&self, key: &TemplateKey) -> Result<Option<Arc<Template>>, ResolveError>;

    /// Self-description recorded in the report's verification context.
    fn source(&self) -> TemplateSource {
        TemplateSource::Unspecified
    }
}

#[async_trait]
impl<T: TemplateResolver + ?Sized> TemplateResolver for Arc<T> {
    async fn resolve(&self, key: &TemplateKey) -> Result<Option<Arc<Template>>, ResolveError> {
        (**self).resolve(key).await
    }

    fn source(&self) -> TemplateSource {
        (**self).source()
    }
}
