use crate::DomainResult;
use crate::content::ContentKind;
use crate::ports::BoxFuture;

/// Read access to the content storage owned by the surrounding application.
pub trait ContentDirectory: Send + Sync {
    fn kind_of(&self, content_id: i64) -> BoxFuture<'_, DomainResult<Option<ContentKind>>>;

    /// Live (not soft-deleted) replies under a post.
    fn count_replies(&self, post_id: i64) -> BoxFuture<'_, DomainResult<i64>>;
}
