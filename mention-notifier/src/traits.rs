use crate::types::{Delivery, Item, MessageSpec, NaturalKey, Result, SeenTable};
use async_trait::async_trait;

/// An upstream API watched for new mentions of the configured tag.
#[async_trait]
pub trait Source: Send + Sync {
    /// Registry name, also used in SOURCES / SKIP_SOURCES.
    fn name(&self) -> &'static str;

    /// Table the source records its seen items in.
    fn table(&self) -> SeenTable;

    /// Fetch every currently matching item, already relevance filtered,
    /// in upstream order. Any transport or decode error aborts the fetch.
    async fn fetch(&self) -> Result<Vec<Box<dyn Item>>>;
}

/// Durable "have we announced this already" record.
#[async_trait]
pub trait DedupStore: Send + Sync {
    /// Idempotently prepares the table for `table`.
    async fn ensure_schema(&self, table: &SeenTable) -> Result<()>;

    async fn exists(&self, table: &SeenTable, key: &NaturalKey) -> Result<bool>;

    /// Records `key` once. Callers check `exists` first.
    async fn insert(&self, table: &SeenTable, key: &NaturalKey, title: &str) -> Result<()>;
}

/// Chat destination for new-item messages.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver one message. Returns `Delivery::Skipped` without any outbound
    /// call when notifications are disabled.
    async fn notify(&self, message: &MessageSpec) -> Result<Delivery>;

    /// Human-readable name for this channel
    fn channel_name(&self) -> &str;
}
