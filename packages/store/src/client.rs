// ABOUTME: REST implementation of the persistence collaborator
// ABOUTME: Maps HTTP status codes onto StoreError kinds

use async_trait::async_trait;
use crs_core::{CrsDocument, CrsStatus};
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use crate::error::{Result, StoreError};
use crate::persistence::Persistence;

#[derive(Debug, Serialize)]
struct SaveContentRequest<'a> {
    content: &'a str,
    expected_edit_version: u64,
}

#[derive(Debug, Serialize)]
struct UpdateStatusRequest {
    status: CrsStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<String>,
}

/// Body the server sends with a 409
#[derive(Debug, Default, Deserialize)]
struct ConflictBody {
    #[serde(default)]
    current_edit_version: Option<u64>,
}

/// Talks to the CRS REST endpoints
#[derive(Clone)]
pub struct RestPersistence {
    http_client: Client,
    base_url: Url,
    access_token: Option<String>,
}

impl RestPersistence {
    pub fn new(base_url: Url, timeout: Duration) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| StoreError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url,
            access_token: None,
        })
    }

    /// Attach a bearer token to every request
    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|e| StoreError::InvalidResponse(format!("Bad endpoint {}: {}", path, e)))
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.access_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn read_document(response: Response, what: String) -> Result<CrsDocument> {
        match response.status() {
            status if status.is_success() => response
                .json::<CrsDocument>()
                .await
                .map_err(|e| StoreError::InvalidResponse(e.to_string())),
            StatusCode::NOT_FOUND => Err(StoreError::NotFound(what)),
            status => Err(api_error(status, response).await),
        }
    }
}

async fn api_error(status: StatusCode, response: Response) -> StoreError {
    let message = response
        .text()
        .await
        .unwrap_or_else(|_| status.to_string());
    StoreError::Api {
        status: status.as_u16(),
        message,
    }
}

#[async_trait]
impl Persistence for RestPersistence {
    async fn fetch_latest_document(&self, project_id: i64) -> Result<Option<CrsDocument>> {
        let url = self.endpoint(&format!("api/projects/{}/crs/latest", project_id))?;
        debug!(project_id, %url, "Fetching latest CRS document");

        let response = self.authorize(self.http_client.get(url)).send().await?;

        match response.status() {
            StatusCode::NOT_FOUND | StatusCode::NO_CONTENT => Ok(None),
            _ => Self::read_document(response, format!("project {}", project_id))
                .await
                .map(Some),
        }
    }

    async fn fetch_document(&self, document_id: i64) -> Result<CrsDocument> {
        let url = self.endpoint(&format!("api/crs/{}", document_id))?;
        debug!(document_id, %url, "Fetching CRS document");

        let response = self.authorize(self.http_client.get(url)).send().await?;
        Self::read_document(response, format!("document {}", document_id)).await
    }

    async fn save_content(
        &self,
        document_id: i64,
        content: &str,
        expected_edit_version: u64,
    ) -> Result<CrsDocument> {
        let url = self.endpoint(&format!("api/crs/{}/content", document_id))?;
        let body = SaveContentRequest {
            content,
            expected_edit_version,
        };

        let response = self
            .authorize(self.http_client.put(url))
            .json(&body)
            .send()
            .await?;

        if response.status() == StatusCode::CONFLICT {
            let conflict = response.json::<ConflictBody>().await.unwrap_or_default();
            warn!(
                document_id,
                expected_edit_version,
                server_edit_version = ?conflict.current_edit_version,
                "Save rejected with stale edit version"
            );
            return Err(StoreError::VersionConflict {
                expected: expected_edit_version,
                actual: conflict.current_edit_version,
            });
        }

        Self::read_document(response, format!("document {}", document_id)).await
    }

    async fn update_status(
        &self,
        document_id: i64,
        status: CrsStatus,
        reason: Option<String>,
    ) -> Result<CrsDocument> {
        let url = self.endpoint(&format!("api/crs/{}/status", document_id))?;
        let body = UpdateStatusRequest { status, reason };

        let response = self
            .authorize(self.http_client.put(url))
            .json(&body)
            .send()
            .await?;

        Self::read_document(response, format!("document {}", document_id)).await
    }
}
