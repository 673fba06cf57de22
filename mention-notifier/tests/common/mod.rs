#![allow(dead_code)]

use async_trait::async_trait;
use mention_notifier::{
    DedupStore, Delivery, Item, KeyKind, MessageSpec, NaturalKey, Notifier, NotifierError, Result, SeenStore, SeenTable,
    Source,
};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};

static INIT: Once = Once::new();

pub fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::INFO)
            .with_test_writer()
            .try_init()
            .ok();
    });
}

pub const QUESTIONS: SeenTable = SeenTable {
    name: "questions",
    key_column: "question_id",
    key_kind: KeyKind::Integer,
};

pub const POSTS: SeenTable = SeenTable {
    name: "posts",
    key_column: "post_id",
    key_kind: KeyKind::Text,
};

pub struct FakeItem {
    pub key: NaturalKey,
    pub title: String,
}

impl Item for FakeItem {
    fn natural_key(&self) -> NaturalKey {
        self.key.clone()
    }

    fn title(&self) -> String {
        self.title.clone()
    }

    fn to_message(&self) -> MessageSpec {
        let link = format!("https://example.com/items/{}", self.key);
        MessageSpec {
            text: format!("New item on <{}|Example>", link),
            fallback: "New item on Example!".to_string(),
            username: "Example Item Notifications".to_string(),
            icon_emoji: ":example:".to_string(),
            author_name: "tester".to_string(),
            author_link: None,
            author_icon: None,
            title: Some(self.title.clone()),
            title_link: link,
            body: None,
            footer: "Example Item Notification".to_string(),
            footer_icon: "https://example.com/icon.png".to_string(),
            ts: 1_700_000_000,
            fields: Vec::new(),
        }
    }
}

/// Source returning a fixed list of items, or a fetch error.
pub struct ScriptedSource {
    pub name: &'static str,
    pub table: SeenTable,
    pub keys: Vec<NaturalKey>,
    pub fail_fetch: bool,
    pub fetches: AtomicUsize,
    pub run_log: Option<Arc<Mutex<Vec<&'static str>>>>,
}

impl ScriptedSource {
    pub fn new(name: &'static str, table: SeenTable, keys: Vec<NaturalKey>) -> Self {
        Self {
            name,
            table,
            keys,
            fail_fetch: false,
            fetches: AtomicUsize::new(0),
            run_log: None,
        }
    }

    pub fn ints(name: &'static str, ids: impl IntoIterator<Item = i64>) -> Self {
        Self::new(name, QUESTIONS, ids.into_iter().map(NaturalKey::Int).collect())
    }

    pub fn failing(name: &'static str) -> Self {
        let mut source = Self::new(name, QUESTIONS, Vec::new());
        source.fail_fetch = true;
        source
    }

    pub fn logging_to(mut self, log: Arc<Mutex<Vec<&'static str>>>) -> Self {
        self.run_log = Some(log);
        self
    }
}

#[async_trait]
impl Source for ScriptedSource {
    fn name(&self) -> &'static str {
        self.name
    }

    fn table(&self) -> SeenTable {
        self.table
    }

    async fn fetch(&self) -> Result<Vec<Box<dyn Item>>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if let Some(log) = &self.run_log {
            log.lock().unwrap().push(self.name);
        }
        if self.fail_fetch {
            return Err(NotifierError::UpstreamStatus {
                url: format!("https://example.com/{}", self.name),
                status: 503,
                body: "unavailable".to_string(),
            });
        }

        Ok(self
            .keys
            .iter()
            .map(|key| {
                Box::new(FakeItem {
                    key: key.clone(),
                    title: format!("Item {}", key),
                }) as Box<dyn Item>
            })
            .collect())
    }
}

/// Notifier that records what it was asked to send. Calls listed in
/// `fail_on` (1-based) return an error instead.
pub struct RecordingNotifier {
    pub enabled: bool,
    pub fail_on: Vec<usize>,
    pub attempts: AtomicUsize,
    pub sent: Mutex<Vec<MessageSpec>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self {
            enabled: true,
            fail_on: Vec::new(),
            attempts: AtomicUsize::new(0),
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::new()
        }
    }

    pub fn failing_on(fail_on: Vec<usize>) -> Self {
        Self {
            fail_on,
            ..Self::new()
        }
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn sent_titles(&self) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter_map(|m| m.title.clone())
            .collect()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, message: &MessageSpec) -> Result<Delivery> {
        if !self.enabled {
            return Ok(Delivery::Skipped);
        }

        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_on.contains(&attempt) {
            return Err(NotifierError::Slack {
                error: "channel_not_found".to_string(),
            });
        }

        self.sent.lock().unwrap().push(message.clone());
        Ok(Delivery::Sent)
    }

    fn channel_name(&self) -> &str {
        "recording"
    }
}

/// Wraps a real store and injects failures.
pub struct FlakyStore {
    pub inner: SeenStore,
    pub fail_schema: bool,
    pub fail_insert_for: HashSet<NaturalKey>,
    pub fail_exists_for: HashSet<NaturalKey>,
}

impl FlakyStore {
    pub async fn new() -> Self {
        Self {
            inner: SeenStore::in_memory().await.unwrap(),
            fail_schema: false,
            fail_insert_for: HashSet::new(),
            fail_exists_for: HashSet::new(),
        }
    }
}

#[async_trait]
impl DedupStore for FlakyStore {
    async fn ensure_schema(&self, table: &SeenTable) -> Result<()> {
        if self.fail_schema {
            return Err(NotifierError::Config("disk full".to_string()));
        }
        self.inner.ensure_schema(table).await
    }

    async fn exists(&self, table: &SeenTable, key: &NaturalKey) -> Result<bool> {
        if self.fail_exists_for.contains(key) {
            return Err(NotifierError::Config("read failed".to_string()));
        }
        self.inner.exists(table, key).await
    }

    async fn insert(&self, table: &SeenTable, key: &NaturalKey, title: &str) -> Result<()> {
        if self.fail_insert_for.contains(key) {
            return Err(NotifierError::Config("write failed".to_string()));
        }
        self.inner.insert(table, key, title).await
    }
}
