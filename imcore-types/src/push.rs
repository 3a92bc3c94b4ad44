use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Which push transport a subscription targets. Used both to tag the
/// subscription itself and to gate an Application's push capability matrix.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "sqlx",
    sqlx(type_name = "push_provider", rename_all = "lowercase")
)]
pub enum PushProvider {
    Fcm,
    Apn,
    Web,
}

/// Exactly one transport's credentials. Encoded as a tagged enum rather
/// than three optional fields so a session can never hold more than one.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "provider", rename_all = "lowercase")]
pub enum PushSubscription {
    Fcm { token: String },
    Apn { token: String },
    Web {
        endpoint: String,
        keys: HashMap<String, String>,
    },
}

impl PushSubscription {
    pub fn provider(&self) -> PushProvider {
        match self {
            PushSubscription::Fcm { .. } => PushProvider::Fcm,
            PushSubscription::Apn { .. } => PushProvider::Apn,
            PushSubscription::Web { .. } => PushProvider::Web,
        }
    }
}
