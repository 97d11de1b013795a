//! HTTP gateway client implementation

use std::collections::HashMap;

use async_trait::async_trait;
use reqwest::{header, Client};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, error};

use crate::errors::ConsoleError;
use crate::gateway::responses::{
    ActionResponse, JobStatusResponse, ProjectCommandResponse, ProjectList, ProjectListDocument,
    StatusDocument,
};
use crate::models::project::CreateProjectRequest;
use crate::models::service::{GlobalAction, Service, ServiceAction, ServiceKind};
use crate::utils::generate_uuid;

/// Gateway trait for testability
#[async_trait]
pub trait GatewayApi: Send + Sync {
    /// Fetch the full service snapshot
    async fn fetch_status(&self) -> Result<HashMap<String, Service>, ConsoleError>;

    /// Dispatch a control action against a single service
    async fn service_action(
        &self,
        kind: ServiceKind,
        service: &str,
        action: ServiceAction,
    ) -> Result<ActionResponse, ConsoleError>;

    /// Dispatch a bulk action across all services
    async fn global_action(&self, action: GlobalAction) -> Result<ActionResponse, ConsoleError>;

    /// Query the status of a dispatched job
    async fn job_status(&self, job_id: &str) -> Result<JobStatusResponse, ConsoleError>;

    /// Fetch the authoritative project list
    async fn list_projects(&self) -> Result<ProjectList, ConsoleError>;

    /// Create a project
    async fn create_project(
        &self,
        request: &CreateProjectRequest,
    ) -> Result<ProjectCommandResponse, ConsoleError>;

    /// Delete a project by slug
    async fn delete_project(&self, slug: &str) -> Result<ProjectCommandResponse, ConsoleError>;
}

/// HTTP client for one environment's gateway
pub struct GatewayClient {
    client: Client,
    base_url: String,
    api_token: Option<SecretString>,
}

impl GatewayClient {
    /// Create a new gateway client
    pub fn new(base_url: &str) -> Result<Self, ConsoleError> {
        let parsed = url::Url::parse(base_url)
            .map_err(|e| ConsoleError::ConfigError(format!("Invalid gateway URL {base_url}: {e}")))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ConsoleError::ConfigError(format!(
                "Unsupported gateway URL scheme: {}",
                parsed.scheme()
            )));
        }

        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_token: None,
        })
    }

    /// Create a new gateway client that authenticates with a bearer token
    pub fn with_token(base_url: &str, api_token: SecretString) -> Result<Self, ConsoleError> {
        let mut gateway = Self::new(base_url)?;
        gateway.api_token = Some(api_token);
        Ok(gateway)
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Make a GET request
    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ConsoleError> {
        let url = format!("{}{}", self.base_url, path);
        debug!("GET {}", url);

        let mut request = self.client.get(&url).header("X-Request-ID", generate_uuid());

        if let Some(token) = &self.api_token {
            request = request.header(
                header::AUTHORIZATION,
                format!("Bearer {}", token.expose_secret()),
            );
        }

        let response = request.send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!("HTTP GET failed: {} - {}", status, body);
            if status == reqwest::StatusCode::NOT_FOUND {
                return Err(ConsoleError::NotFound(format!("{}: {}", url, body)));
            }
            return Err(ConsoleError::GatewayError(format!("{}: {}", status, body)));
        }

        let body = response.json().await?;
        Ok(body)
    }

    /// Make a POST request
    async fn post<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ConsoleError> {
        let url = format!("{}{}", self.base_url, path);
        debug!("POST {}", url);

        let mut request = self
            .client
            .post(&url)
            .header("X-Request-ID", generate_uuid())
            .json(body);

        if let Some(token) = &self.api_token {
            request = request.header(
                header::AUTHORIZATION,
                format!("Bearer {}", token.expose_secret()),
            );
        }

        let response = request.send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!("HTTP POST failed: {} - {}", status, body);
            return Err(ConsoleError::GatewayError(format!("{}: {}", status, body)));
        }

        let body = response.json().await?;
        Ok(body)
    }

    /// Make a DELETE request
    async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T, ConsoleError> {
        let url = format!("{}{}", self.base_url, path);
        debug!("DELETE {}", url);

        let mut request = self
            .client
            .delete(&url)
            .header("X-Request-ID", generate_uuid());

        if let Some(token) = &self.api_token {
            request = request.header(
                header::AUTHORIZATION,
                format!("Bearer {}", token.expose_secret()),
            );
        }

        let response = request.send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!("HTTP DELETE failed: {} - {}", status, body);
            return Err(ConsoleError::GatewayError(format!("{}: {}", status, body)));
        }

        let body = response.json().await?;
        Ok(body)
    }
}

#[async_trait]
impl GatewayApi for GatewayClient {
    async fn fetch_status(&self) -> Result<HashMap<String, Service>, ConsoleError> {
        let document: StatusDocument = self.get("/status").await?;
        Ok(document.into_services())
    }

    async fn service_action(
        &self,
        kind: ServiceKind,
        service: &str,
        action: ServiceAction,
    ) -> Result<ActionResponse, ConsoleError> {
        let path = format!("/{}/{}/{}", kind.path_segment(), service, action);
        self.post(&path, &serde_json::json!({})).await
    }

    async fn global_action(&self, action: GlobalAction) -> Result<ActionResponse, ConsoleError> {
        let path = format!("/{}", action);
        self.post(&path, &serde_json::json!({})).await
    }

    async fn job_status(&self, job_id: &str) -> Result<JobStatusResponse, ConsoleError> {
        let path = format!("/jobs/{}", job_id);
        self.get(&path).await
    }

    async fn list_projects(&self) -> Result<ProjectList, ConsoleError> {
        let document: ProjectListDocument = self.get("/projects").await?;
        Ok(document.into_list())
    }

    async fn create_project(
        &self,
        request: &CreateProjectRequest,
    ) -> Result<ProjectCommandResponse, ConsoleError> {
        self.post("/projects", request).await
    }

    async fn delete_project(&self, slug: &str) -> Result<ProjectCommandResponse, ConsoleError> {
        let path = format!("/projects/{}", slug);
        self.delete(&path).await
    }
}
