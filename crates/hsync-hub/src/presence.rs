use crate::error::Result;

/// Renders the fragment pushed to every client when the online count changes.
///
/// Implemented for any `Fn(usize) -> Result<String>` closure, so callers can
/// pass their template function directly.
pub trait PresenceRenderer: Send + Sync {
    fn render(&self, online: usize) -> Result<String>;
}

impl<F> PresenceRenderer for F
where
    F: Fn(usize) -> Result<String> + Send + Sync,
{
    fn render(&self, online: usize) -> Result<String> {
        self(online)
    }
}
