//! Request and response bodies for the HTTP API.
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendRequest {
    #[serde(default)]
    pub topic: String,
    #[serde(default)]
    pub data: String,
    // Producer label, echoed to the consumer as `from`.
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub persistent: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendResponse {
    pub id: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GetQuery {
    #[serde(default)]
    pub topic: String,
    // Consumer label, only used for trace logging.
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub timeout: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetResponse {
    pub id: String,
    pub from: String,
    pub data: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TagQuery {
    #[serde(default)]
    pub tag: String,
}
