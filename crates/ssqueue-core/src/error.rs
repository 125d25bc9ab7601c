#[derive(thiserror::Error, Debug)]
pub enum QueueError {
    #[error("not ready")]
    NotReady,
    #[error("no consumers for topic {topic}")]
    NoConsumers { topic: String },
    #[error("malformed snapshot for topic {topic}: {source}")]
    TopicSnapshot {
        topic: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("malformed registry snapshot: {0}")]
    RegistrySnapshot(#[source] serde_json::Error),
    #[error("encode snapshot: {0}")]
    Encode(#[source] serde_json::Error),
}
