//! Event payloads for externally triggered runs

use serde::{Deserialize, Serialize};

use crate::source::CsvSource;

/// Either a bucket object reference or the CSV text itself
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InvocationEvent {
    Object { bucket: String, file: String },
    Inline { data: String },
}

impl From<InvocationEvent> for CsvSource {
    fn from(event: InvocationEvent) -> Self {
        match event {
            InvocationEvent::Object { bucket, file } => CsvSource::Object { bucket, key: file },
            InvocationEvent::Inline { data } => CsvSource::Inline(data),
        }
    }
}
