use async_trait::async_trait;

use crate::error::JobResult;

/// Translation provider boundary. One call translates one string; chunking
/// to provider-acceptable sizes is the caller's job.
#[async_trait]
pub trait Translator: Send + Sync {
    /// Translate `text` into `target`. A `None` source means auto-detect.
    async fn translate(&self, text: &str, source: Option<&str>, target: &str) -> JobResult<String>;

    fn name(&self) -> &str {
        "translator"
    }
}
