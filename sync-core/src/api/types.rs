use crate::record::LocalUserRecord;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A user resource as returned by the directory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteUserRecord {
    pub id: String,
    #[serde(rename = "userName")]
    pub user_name: String,
    /// Attributes not interpreted by the sync
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

impl RemoteUserRecord {
    pub fn new(id: impl Into<String>, user_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            user_name: user_name.into(),
            extra: HashMap::new(),
        }
    }

    /// Lower-cased userName used to match against local emails
    pub fn match_key(&self) -> String {
        self.user_name.to_lowercase()
    }
}

/// `GET /Users` response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserListResponse {
    #[serde(rename = "totalResults", default)]
    pub total_results: u64,
    #[serde(rename = "Resources", default)]
    pub resources: Vec<RemoteUserRecord>,
}

/// `POST /Users` request body
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScimUserPayload {
    pub user_name: String,
    pub name: ScimName,
    pub display_name: String,
    pub emails: Vec<ScimEmail>,
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScimName {
    pub family_name: String,
    pub given_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScimEmail {
    pub value: String,
    pub r#type: String,
    pub primary: bool,
}

impl From<&LocalUserRecord> for ScimUserPayload {
    fn from(record: &LocalUserRecord) -> Self {
        Self {
            user_name: record.email.clone(),
            name: ScimName {
                family_name: record.family_name.clone(),
                given_name: record.given_name.clone(),
            },
            display_name: record.display_name.clone(),
            emails: vec![ScimEmail {
                value: record.email.clone(),
                r#type: "work".to_string(),
                primary: true,
            }],
            active: true,
        }
    }
}

/// The part of a `POST /Users` response the sync needs
#[derive(Debug, Clone, Deserialize)]
pub struct CreatedUser {
    pub id: String,
}
