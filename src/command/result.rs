use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

use crate::error::ErrorKind;

/// Outcome of routing one command. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommandResult {
    pub success: bool,
    pub message: String,
    pub data: BTreeMap<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorKind>,
}

impl CommandResult {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: BTreeMap::new(),
            error: None,
        }
    }

    pub fn failure(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            data: BTreeMap::new(),
            error: Some(kind),
        }
    }

    /// Attach a data entry.
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.data.insert(key.to_string(), value.into());
        self
    }

    /// Attach any serializable value; values that fail to serialize become `null`.
    pub fn with_serialized<T: Serialize>(self, key: &str, value: &T) -> Self {
        let value = serde_json::to_value(value).unwrap_or(Value::Null);
        self.with(key, value)
    }

    pub fn is_error(&self, kind: ErrorKind) -> bool {
        self.error == Some(kind)
    }
}
