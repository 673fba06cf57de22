use crate::traits::{DedupStore, Notifier, Source};
use crate::types::{Delivery, Result, RunSummary};
use std::sync::Arc;
use tracing::{error, info, info_span, Instrument};

/// Runs one source through fetch → dedup check → insert → notify.
///
/// Schema and fetch failures abort the source. Everything after that is
/// per item: a failed check, insert or notify is logged and the next item
/// is processed. An item whose notify fails stays recorded as seen and is
/// never announced.
pub struct PipelineRunner {
    store: Arc<dyn DedupStore>,
    notifier: Arc<dyn Notifier>,
}

impl PipelineRunner {
    pub fn new(store: Arc<dyn DedupStore>, notifier: Arc<dyn Notifier>) -> Self {
        Self { store, notifier }
    }

    pub async fn run(&self, source: &dyn Source) -> Result<RunSummary> {
        let span = info_span!("pipeline", source = source.name());
        self.run_inner(source).instrument(span).await
    }

    async fn run_inner(&self, source: &dyn Source) -> Result<RunSummary> {
        let table = source.table();
        self.store.ensure_schema(&table).await?;

        info!("Fetching items");
        let items = source.fetch().await?;

        let mut summary = RunSummary {
            processed: items.len(),
            ..RunSummary::default()
        };
        info!(item_count = items.len(), "Processing items");

        for item in items {
            let key = item.natural_key();
            let title = item.title();

            match self.store.exists(&table, &key).await {
                Ok(true) => continue,
                Ok(false) => {}
                Err(e) => {
                    error!(natural_key = %key, title = %title, error = %e, "error checking whether item was seen");
                    continue;
                }
            }

            info!(natural_key = %key, title = %title, "Inserting new item");
            if let Err(e) = self.store.insert(&table, &key, &title).await {
                error!(natural_key = %key, title = %title, error = %e, "error inserting item into database");
                continue;
            }
            summary.inserted += 1;

            match self.notifier.notify(&item.to_message()).await {
                Ok(Delivery::Sent) => summary.notified += 1,
                Ok(Delivery::Skipped) => {}
                Err(e) => {
                    error!(
                        natural_key = %key,
                        title = %title,
                        channel = self.notifier.channel_name(),
                        error = %e,
                        "error posting item to chat"
                    );
                }
            }
        }

        info!(
            processed_count = summary.processed,
            inserted_count = summary.inserted,
            notified_count = summary.notified,
            "Done"
        );
        Ok(summary)
    }
}
