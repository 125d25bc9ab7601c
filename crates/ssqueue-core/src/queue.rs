// Per-topic FIFO with consumer-aware admission and broadcast wake-up.
use crate::item::Item;
use crate::snapshot;
use crate::{QueueError, Result};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Notify;

const INITIAL_CAPACITY: usize = 256;

#[derive(Debug)]
pub struct TopicQueue {
    topic: String,
    // Pending items in delivery order.
    items: Mutex<VecDeque<Item>>,
    // Mirrors items.len(); written under the items lock, read without it.
    pending: AtomicUsize,
    // Requests currently blocked in pop. Not covered by the items lock.
    consumers: AtomicUsize,
    // Woken with notify_waiters on every successful push.
    notify: Notify,
}

impl TopicQueue {
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            items: Mutex::new(VecDeque::with_capacity(INITIAL_CAPACITY)),
            pending: AtomicUsize::new(0),
            consumers: AtomicUsize::new(0),
            notify: Notify::new(),
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn consumers(&self) -> usize {
        self.consumers.load(Ordering::Acquire)
    }

    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::Acquire)
    }

    pub fn inc_consumers(&self) {
        self.consumers.fetch_add(1, Ordering::AcqRel);
    }

    pub fn dec_consumers(&self) {
        let _ = self
            .consumers
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |v| v.checked_sub(1));
    }

    /// Count the caller as a waiting consumer until the guard is dropped.
    pub fn register_consumer(&self) -> ConsumerGuard<'_> {
        self.inc_consumers();
        ConsumerGuard { queue: self }
    }

    /// Append `item` to the tail and wake every blocked popper.
    ///
    /// A non-persistent item is only admitted while at least one consumer is
    /// registered; otherwise it is handed back untouched. The check is a
    /// point-in-time read: the consumer that justified admission may give up
    /// before popping, leaving the item buffered for the next one.
    pub fn push(&self, item: Item, persistent: bool) -> std::result::Result<(), Item> {
        if !persistent && self.consumers() == 0 {
            return Err(item);
        }

        {
            let mut items = self.items.lock();
            items.push_back(item);
            self.pending.store(items.len(), Ordering::Release);
        }
        self.notify.notify_waiters();
        Ok(())
    }

    /// Remove the head item without waiting.
    pub fn try_pop(&self) -> Option<Item> {
        let mut items = self.items.lock();
        let item = items.pop_front()?;
        self.pending.store(items.len(), Ordering::Release);
        Some(item)
    }

    /// Wait for the head item until `cancel` resolves.
    ///
    /// Returns `None` only if `cancel` completes while the queue is empty. A
    /// waiter that loses the race for an item simply waits for the next push.
    pub async fn pop<F>(&self, cancel: F) -> Option<Item>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(cancel);
        loop {
            // Register before checking so a push landing between the check
            // and the await still wakes us.
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(item) = self.try_pop() {
                return Some(item);
            }

            tokio::select! {
                biased;
                _ = &mut notified => {}
                _ = &mut cancel => return None,
            }
        }
    }

    /// Serialize pending items (id and data only). `None` when empty.
    pub fn export_snapshot(&self) -> Result<Option<Vec<u8>>> {
        Ok(self.export_records()?.map(String::into_bytes))
    }

    pub(crate) fn export_records(&self) -> Result<Option<String>> {
        let items = self.items.lock();
        if items.is_empty() {
            return Ok(None);
        }
        snapshot::encode_items(items.iter())
            .map(Some)
            .map_err(QueueError::Encode)
    }

    /// Replace the pending items with the decoded snapshot.
    ///
    /// Decoding completes before the queue is touched, so a malformed blob
    /// leaves the current items in place.
    pub fn import_snapshot(&self, bytes: &[u8]) -> Result<()> {
        let items = snapshot::decode_items(bytes).map_err(|source| QueueError::TopicSnapshot {
            topic: self.topic.clone(),
            source,
        })?;
        self.replace_items(items);
        Ok(())
    }

    pub(crate) fn replace_items(&self, replacement: VecDeque<Item>) {
        let restored = replacement.len();
        {
            let mut items = self.items.lock();
            *items = replacement;
            self.pending.store(items.len(), Ordering::Release);
        }
        if restored > 0 {
            self.notify.notify_waiters();
        }
    }
}

/// Waiting-consumer registration; decrements the count on drop, including
/// when the pop future is cancelled.
#[derive(Debug)]
#[must_use = "dropping the guard unregisters the consumer"]
pub struct ConsumerGuard<'a> {
    queue: &'a TopicQueue,
}

impl Drop for ConsumerGuard<'_> {
    fn drop(&mut self) {
        self.queue.dec_consumers();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    fn item(id: &str) -> Item {
        Item::new(id, format!("data-{id}"))
    }

    #[test]
    fn non_persistent_push_requires_consumer() {
        let queue = TopicQueue::new("alerts");
        let rejected = queue.push(item("1"), false).expect_err("no consumers");
        assert_eq!(rejected.id(), "1");
        assert_eq!(queue.pending(), 0);

        queue.push(item("1"), true).expect("persistent");
        assert_eq!(queue.pending(), 1);

        let _guard = queue.register_consumer();
        queue.push(item("2"), false).expect("consumer registered");
        assert_eq!(queue.pending(), 2);
    }

    #[test]
    fn consumer_guard_restores_count() {
        let queue = TopicQueue::new("t");
        {
            let _a = queue.register_consumer();
            let _b = queue.register_consumer();
            assert_eq!(queue.consumers(), 2);
        }
        assert_eq!(queue.consumers(), 0);
        queue.dec_consumers();
        assert_eq!(queue.consumers(), 0, "count never underflows");
    }

    #[tokio::test]
    async fn pop_returns_items_in_push_order() {
        let queue = TopicQueue::new("orders");
        for id in ["1", "2", "3"] {
            queue.push(item(id), true).expect("push");
        }
        for id in ["1", "2", "3"] {
            let popped = queue.pop(std::future::pending()).await.expect("item");
            assert_eq!(popped.id(), id);
        }
        assert_eq!(queue.pending(), 0);
    }

    #[tokio::test]
    async fn pop_times_out_without_touching_state() {
        let queue = TopicQueue::new("idle");
        let popped = queue.pop(tokio::time::sleep(Duration::from_millis(20))).await;
        assert!(popped.is_none());
        assert_eq!(queue.pending(), 0);
    }

    #[tokio::test]
    async fn pending_item_wins_over_fired_cancel() {
        let queue = TopicQueue::new("t");
        queue.push(item("1"), true).expect("push");
        let popped = queue.pop(std::future::ready(())).await;
        assert_eq!(popped.map(|i| i.id().to_string()), Some("1".to_string()));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn blocked_pop_wakes_on_push() {
        let queue = Arc::new(TopicQueue::new("orders"));
        let waiter = {
            let queue = Arc::clone(&queue);
            tokio::spawn(async move {
                let _consumer = queue.register_consumer();
                queue.pop(tokio::time::sleep(Duration::from_secs(5))).await
            })
        };

        while queue.consumers() == 0 {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
        queue.push(item("1"), false).expect("consumer waiting");

        let popped = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("woken before deadline")
            .expect("join");
        assert_eq!(popped.expect("item").id(), "1");
        assert_eq!(queue.consumers(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn push_wakes_all_waiters_and_each_item_is_delivered_once() {
        let queue = Arc::new(TopicQueue::new("fanout"));
        let mut waiters = Vec::new();
        for _ in 0..8 {
            let queue = Arc::clone(&queue);
            waiters.push(tokio::spawn(async move {
                let _consumer = queue.register_consumer();
                queue.pop(tokio::time::sleep(Duration::from_millis(500))).await
            }));
        }
        while queue.consumers() < 8 {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }

        for i in 0..3 {
            queue.push(item(&i.to_string()), false).expect("push");
        }

        let mut delivered = Vec::new();
        for waiter in waiters {
            if let Some(item) = waiter.await.expect("join") {
                delivered.push(item.id().to_string());
            }
        }
        delivered.sort();
        assert_eq!(delivered, vec!["0", "1", "2"]);
        assert_eq!(queue.pending(), 0);
        assert_eq!(queue.consumers(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_producers_and_consumers_preserve_each_item_once() {
        let queue = Arc::new(TopicQueue::new("busy"));
        let producers: Vec<_> = (0..4)
            .map(|p| {
                let queue = Arc::clone(&queue);
                tokio::spawn(async move {
                    for i in 0..250 {
                        queue.push(item(&format!("{p}-{i}")), true).expect("push");
                    }
                })
            })
            .collect();
        let consumers: Vec<_> = (0..4)
            .map(|_| {
                let queue = Arc::clone(&queue);
                tokio::spawn(async move {
                    let mut seen = Vec::new();
                    while let Some(item) = queue
                        .pop(tokio::time::sleep(Duration::from_millis(200)))
                        .await
                    {
                        seen.push(item.id().to_string());
                    }
                    seen
                })
            })
            .collect();

        for producer in producers {
            producer.await.expect("producer");
        }
        let mut all = Vec::new();
        for consumer in consumers {
            let seen = consumer.await.expect("consumer");
            // Per producer, a single consumer observes increasing sequence numbers.
            for p in 0..4 {
                let prefix = format!("{p}-");
                let seq: Vec<u32> = seen
                    .iter()
                    .filter_map(|id| id.strip_prefix(&prefix))
                    .map(|n| n.parse().expect("seq"))
                    .collect();
                assert!(seq.windows(2).all(|w| w[0] < w[1]));
            }
            all.extend(seen);
        }
        let total = all.len();
        all.sort();
        all.dedup();
        assert_eq!(total, 1000);
        assert_eq!(all.len(), 1000);
    }

    #[test]
    fn snapshot_round_trip_preserves_order_and_drops_name() {
        let source = TopicQueue::new("orders");
        source
            .push(Item::new("1", "a").with_name(Some("svc".into())), true)
            .expect("push");
        source.push(Item::new("2", "b"), true).expect("push");
        let bytes = source.export_snapshot().expect("export").expect("non-empty");

        let restored = TopicQueue::new("orders");
        restored.push(Item::new("stale", "x"), true).expect("push");
        restored.import_snapshot(&bytes).expect("import");
        assert_eq!(restored.pending(), 2);
        assert_eq!(restored.try_pop(), Some(Item::new("1", "a")));
        assert_eq!(restored.try_pop(), Some(Item::new("2", "b")));
        assert_eq!(restored.try_pop(), None);
    }

    #[test]
    fn empty_queue_exports_nothing() {
        let queue = TopicQueue::new("empty");
        assert!(queue.export_snapshot().expect("export").is_none());
    }

    #[test]
    fn malformed_import_leaves_items_untouched() {
        let queue = TopicQueue::new("orders");
        queue.push(item("1"), true).expect("push");
        let err = queue
            .import_snapshot(br#"[{"id":"2","data":"b"}, 17]"#)
            .expect_err("malformed");
        assert!(matches!(err, QueueError::TopicSnapshot { ref topic, .. } if topic == "orders"));
        assert_eq!(queue.pending(), 1);
        assert_eq!(queue.try_pop().map(|i| i.id().to_string()), Some("1".into()));
    }
}
