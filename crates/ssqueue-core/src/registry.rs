// Topic registry: name -> queue, created on first access.
use crate::item::{Item, mint_id};
use crate::queue::TopicQueue;
use crate::snapshot;
use crate::{QueueError, Result};
use ahash::RandomState;
use hashbrown::HashMap;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Process-wide set of topic queues plus the readiness gate.
///
/// ```
/// use ssqueue_core::Registry;
/// use std::time::Duration;
///
/// let registry = Registry::new();
/// registry.startup();
/// let rt = tokio::runtime::Runtime::new().expect("rt");
/// rt.block_on(async {
///     let id = registry
///         .send("alerts", "disk full", None, true)
///         .expect("persistent send");
///     let item = registry
///         .get_timeout("alerts", Duration::from_secs(1))
///         .await
///         .expect("ready")
///         .expect("item");
///     assert_eq!(item.id(), id);
///     assert_eq!(item.data(), "disk full");
/// });
/// ```
#[derive(Debug)]
pub struct Registry {
    // Shared lock for lookups; exclusive only to insert a new topic.
    queues: RwLock<HashMap<String, Arc<TopicQueue>, RandomState>>,
    ready: AtomicBool,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    // Starts not ready; call `startup` once restore is done.
    pub fn new() -> Self {
        Self {
            queues: RwLock::new(HashMap::with_hasher(RandomState::new())),
            ready: AtomicBool::new(false),
        }
    }

    pub fn startup(&self) {
        self.ready.store(true, Ordering::Release);
        tracing::info!("registry ready");
    }

    /// Reject new send/get calls. In-flight pops are left to finish or time out.
    pub fn begin_shutdown(&self) {
        self.ready.store(false, Ordering::Release);
        tracing::info!("registry shutting down");
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    /// Look up the queue for `topic`, creating it on first access.
    pub fn resolve(&self, topic: &str) -> Arc<TopicQueue> {
        {
            let queues = self.queues.read();
            if let Some(queue) = queues.get(topic) {
                return Arc::clone(queue);
            }
        }

        let mut queues = self.queues.write();
        // Another caller may have inserted while we waited for the write lock.
        if let Some(queue) = queues.get(topic) {
            return Arc::clone(queue);
        }
        let queue = Arc::new(TopicQueue::new(topic));
        queues.insert(topic.to_string(), Arc::clone(&queue));
        metrics::gauge!("ssqueue_topics").set(queues.len() as f64);
        tracing::debug!(topic, "topic created");
        queue
    }

    pub fn contains_topic(&self, topic: &str) -> bool {
        self.queues.read().contains_key(topic)
    }

    /// Registered topic names, sorted.
    pub fn topics(&self) -> Vec<String> {
        let mut topics: Vec<String> = self.queues.read().keys().cloned().collect();
        topics.sort_unstable();
        topics
    }

    /// Enqueue `data` on `topic` and return the minted message id.
    ///
    /// Non-persistent messages are refused with `NoConsumers` when nobody is
    /// waiting on the topic; the minted id is discarded in that case.
    pub fn send(
        &self,
        topic: &str,
        data: impl Into<String>,
        name: Option<String>,
        persistent: bool,
    ) -> Result<String> {
        self.ensure_ready()?;
        metrics::counter!("ssqueue_method_send_total", "topic" => topic.to_string()).increment(1);

        let id = mint_id();
        let item = Item::new(id.clone(), data).with_name(name);
        match self.resolve(topic).push(item, persistent) {
            Ok(()) => Ok(id),
            Err(_rejected) => Err(QueueError::NoConsumers {
                topic: topic.to_string(),
            }),
        }
    }

    /// Wait for the next item on `topic` until `cancel` resolves.
    ///
    /// The caller counts as a waiting consumer for the whole call; dropping
    /// the returned future releases that registration too.
    pub async fn get<F>(&self, topic: &str, cancel: F) -> Result<Option<Item>>
    where
        F: Future<Output = ()>,
    {
        self.ensure_ready()?;
        metrics::counter!("ssqueue_method_get_total", "topic" => topic.to_string()).increment(1);

        let queue = self.resolve(topic);
        let _consumer = queue.register_consumer();
        Ok(queue.pop(cancel).await)
    }

    pub async fn get_timeout(&self, topic: &str, timeout: Duration) -> Result<Option<Item>> {
        self.get(topic, tokio::time::sleep(timeout)).await
    }

    /// Serialize every non-empty topic. `None` when nothing is pending.
    pub fn export_all(&self) -> Result<Option<Vec<u8>>> {
        let queues = self.queues.read();
        let mut topics = BTreeMap::new();
        for (topic, queue) in queues.iter() {
            if let Some(records) = queue.export_records()? {
                topics.insert(topic.clone(), records);
            }
        }
        if topics.is_empty() {
            return Ok(None);
        }
        snapshot::encode_registry(&topics)
            .map(Some)
            .map_err(QueueError::Encode)
    }

    /// Restore topics from an `export_all` blob and return how many were
    /// restored.
    ///
    /// Every topic is decoded before any queue is replaced; one malformed
    /// topic fails the whole import and names that topic. Topics absent from
    /// the blob are left alone.
    pub fn import_all(&self, bytes: &[u8]) -> Result<usize> {
        let topics = snapshot::decode_registry(bytes).map_err(QueueError::RegistrySnapshot)?;

        let mut decoded = Vec::with_capacity(topics.len());
        for (topic, records) in topics {
            let items = snapshot::decode_items(records.as_bytes()).map_err(|source| {
                QueueError::TopicSnapshot {
                    topic: topic.clone(),
                    source,
                }
            })?;
            decoded.push((topic, items));
        }

        let restored = decoded.len();
        for (topic, items) in decoded {
            let count = items.len();
            self.resolve(&topic).replace_items(items);
            tracing::debug!(topic = %topic, items = count, "topic restored");
        }
        Ok(restored)
    }

    fn ensure_ready(&self) -> Result<()> {
        if !self.is_ready() {
            return Err(QueueError::NotReady);
        }
        Ok(())
    }
}
