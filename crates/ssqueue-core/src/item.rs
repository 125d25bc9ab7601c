// Message envelope travelling through a topic queue.
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngCore;

// 128 bits of OS-seeded CSPRNG output per identifier.
const ID_BYTES: usize = 16;

/// A single message owned by exactly one queue until it is popped.
///
/// `name` is the optional producer label handed back to the consumer. It is
/// transient: snapshots only carry `id` and `data`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    id: String,
    data: String,
    name: Option<String>,
}

impl Item {
    pub fn new(id: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            data: data.into(),
            name: None,
        }
    }

    pub fn with_name(mut self, name: Option<String>) -> Self {
        self.name = name.filter(|name| !name.is_empty());
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn data(&self) -> &str {
        &self.data
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn into_parts(self) -> (String, String, Option<String>) {
        (self.id, self.data, self.name)
    }
}

/// Mint a fresh message identifier (URL-safe, unpadded base64).
pub fn mint_id() -> String {
    let mut bytes = [0u8; ID_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}
