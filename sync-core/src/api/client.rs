use super::{error::*, types::*, DirectoryApi};
use crate::config::DirectoryConfig;
use crate::record::LocalUserRecord;
use async_trait::async_trait;
use reqwest::{ClientBuilder, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// SCIM directory client
///
/// Every call is a single authenticated request. Failures are reported as they
/// come back; nothing is retried.
#[derive(Debug, Clone)]
pub struct ScimClient {
    http_client: reqwest::Client,
    base_url: String,
    token: String,
}

impl ScimClient {
    /// Create a client with default timeouts
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Result<Self> {
        ScimClientBuilder::new(base_url, token).build()
    }

    /// Create a client from the `[directory]` configuration section
    pub fn from_config(config: &DirectoryConfig) -> Result<Self> {
        ScimClientBuilder::new(&config.endpoint, &config.token)
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .user_agent(&config.user_agent)
            .build()
    }

    /// Create a client around an existing HTTP client
    pub fn with_client(
        base_url: impl Into<String>,
        token: impl Into<String>,
        http_client: reqwest::Client,
    ) -> Result<Self> {
        let base_url = base_url.into();
        Url::parse(&base_url)?;

        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.into(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn users_url(&self) -> String {
        format!("{}/Users", self.base_url)
    }

    fn user_url(&self, id: &str) -> String {
        format!("{}/Users/{}", self.base_url, id)
    }

    async fn handle_response<T: DeserializeOwned>(&self, response: reqwest::Response) -> Result<T> {
        if response.status().is_success() {
            let body = response.text().await?;
            Ok(serde_json::from_str(&body)?)
        } else {
            Err(self.parse_error_response(response).await)
        }
    }

    async fn parse_error_response(&self, response: reqwest::Response) -> DirectoryError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        match status {
            StatusCode::UNAUTHORIZED => DirectoryError::Authentication(body),
            StatusCode::FORBIDDEN => DirectoryError::Authorization(body),
            StatusCode::NOT_FOUND => DirectoryError::NotFound(body),
            StatusCode::CONFLICT => DirectoryError::Conflict(body),
            status => DirectoryError::Server {
                status: status.as_u16(),
                message: body,
            },
        }
    }
}

#[async_trait]
impl DirectoryApi for ScimClient {
    async fn list_users(&self) -> Result<Vec<RemoteUserRecord>> {
        let url = self.users_url();
        debug!("SCIM GET {}", url);

        let response = self
            .http_client
            .get(&url)
            .bearer_auth(&self.token)
            .send()
            .await?;

        let list: UserListResponse = self.handle_response(response).await?;
        debug!(
            total_results = list.total_results,
            returned = list.resources.len(),
            "Listed directory users"
        );

        // No pagination: a short page must not pass for the full set
        if list.total_results > list.resources.len() as u64 {
            return Err(DirectoryError::IncompleteListing {
                total: list.total_results,
                returned: list.resources.len(),
            });
        }
        Ok(list.resources)
    }

    async fn create_user(
        &self,
        record: &LocalUserRecord,
    ) -> std::result::Result<String, CreateError> {
        let url = self.users_url();
        debug!(email = %record.email, "SCIM POST {}", url);

        let payload = ScimUserPayload::from(record);
        let response = self
            .http_client
            .post(&url)
            .bearer_auth(&self.token)
            .json(&payload)
            .send()
            .await
            .map_err(|e| CreateError::Other(record.clone(), e.into()))?;

        match self.handle_response::<CreatedUser>(response).await {
            Ok(created) => Ok(created.id),
            Err(DirectoryError::Conflict(_)) => Err(CreateError::Conflict(record.clone())),
            Err(e) => Err(CreateError::Other(record.clone(), e)),
        }
    }

    async fn delete_user(&self, id: &str) -> std::result::Result<(), DeleteError> {
        let url = self.user_url(id);
        debug!("SCIM DELETE {}", url);

        let response = self
            .http_client
            .delete(&url)
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| DeleteError::Other(id.to_string(), e.into()))?;

        if response.status().is_success() {
            return Ok(());
        }

        match self.parse_error_response(response).await {
            DirectoryError::NotFound(_) => Err(DeleteError::NotFound(id.to_string())),
            e => Err(DeleteError::Other(id.to_string(), e)),
        }
    }
}

/// Builder for [`ScimClient`] HTTP settings
pub struct ScimClientBuilder {
    base_url: String,
    token: String,
    timeout: Option<Duration>,
    connect_timeout: Option<Duration>,
    user_agent: Option<String>,
}

impl ScimClientBuilder {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            token: token.into(),
            timeout: None,
            connect_timeout: None,
            user_agent: None,
        }
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    pub fn build(self) -> Result<ScimClient> {
        let mut client_builder = ClientBuilder::new()
            .timeout(self.timeout.unwrap_or(Duration::from_secs(30)))
            .connect_timeout(self.connect_timeout.unwrap_or(Duration::from_secs(10)));

        client_builder = match self.user_agent {
            Some(user_agent) => client_builder.user_agent(user_agent),
            None => client_builder.user_agent(concat!("csv-sync/", env!("CARGO_PKG_VERSION"))),
        };

        let http_client = client_builder.build()?;
        ScimClient::with_client(self.base_url, self.token, http_client)
    }
}
