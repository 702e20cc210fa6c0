//! Documents written to and read from the document store.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Collection holding one document per served prediction.
pub const PREDICTIONS: &str = "predictions";

/// Collection holding registered users.
pub const USERS: &str = "users";

/// Outcome of a single `/predict` call.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct PredictionRecord {
    pub timestamp: DateTime<Utc>,
    pub prediction: String,
    pub confidence: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

impl PredictionRecord {
    pub fn new(prediction: String, confidence: f32, user_id: Option<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            prediction,
            confidence,
            user_id,
        }
    }
}

/// Registered user. `password_hash` is a PHC string with the salt embedded.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct UserRecord {
    pub username: String,
    pub password_hash: String,
}
