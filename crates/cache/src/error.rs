use thiserror::Error;

#[derive(Debug, Error)]
pub enum CacheError {
    /// The wrapped content failed to render.
    #[error("fragment render failed: {0}")]
    Render(String),

    /// The store rejected an insert.
    #[error("fragment cache insert failed: {0}")]
    Insert(String),

    /// The vary-by-custom resolver failed.
    #[error("vary-by-custom resolver failed for '{custom}': {detail}")]
    Resolver { custom: String, detail: String },
}
