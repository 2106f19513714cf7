//! Build server HTTP client
//!
//! Jenkins-style servers guard POST endpoints with a per-origin CSRF
//! token (a "crumb") fetched from a well-known issuer path. Servers
//! without an issuer simply accept the POST bare.

use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use reqwest::{Client, RequestBuilder, StatusCode, Url};
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::config::BuildServerConfig;

/// Body signature of a job that exists but is disabled upstream
static NOT_BUILDABLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^java\.io\.IOException: .* is not buildable").expect("not-buildable pattern")
});

/// CSRF token issued by a build server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Crumb {
    /// Header name the server expects the token under
    pub field: String,
    pub value: String,
}

#[derive(Debug, Deserialize)]
struct CrumbResponse {
    crumb: String,
    #[serde(rename = "crumbRequestField")]
    crumb_request_field: String,
}

/// Classified outcome of POSTing a build trigger
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerResponse {
    /// Build accepted
    Started,
    /// Job no longer exists; nothing left to do
    Missing,
    /// Crumb rejected; refresh it and try again
    Forbidden,
    /// Job exists but is disabled; nothing left to do
    NotBuildable,
    /// Anything else, worth retrying later
    Failed { status: u16, body: String },
}

/// Errors talking to a build server
#[derive(Debug, Error)]
pub enum TriggerError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid build url {url:?}: {reason}")]
    BadUrl { url: String, reason: String },
}

/// The `scheme://host[:port]` part of a build url. Crumbs are cached
/// per origin, since one server hosts many jobs.
pub fn origin_of(url: &str) -> Result<String, TriggerError> {
    let parsed = Url::parse(url).map_err(|e| TriggerError::BadUrl {
        url: url.to_string(),
        reason: e.to_string(),
    })?;
    let host = parsed.host_str().ok_or_else(|| TriggerError::BadUrl {
        url: url.to_string(),
        reason: "missing host".to_string(),
    })?;
    let mut origin = format!("{}://{}", parsed.scheme(), host);
    if let Some(port) = parsed.port() {
        origin.push_str(&format!(":{port}"));
    }
    Ok(origin)
}

/// HTTP access to build servers
#[async_trait]
pub trait TriggerClient: Send + Sync {
    /// Fetch the crumb for a server origin. `Ok(None)` means the server
    /// does not issue crumbs at all.
    async fn fetch_crumb(&self, origin: &str) -> Result<Option<Crumb>, TriggerError>;

    /// POST the build trigger and classify the response
    async fn start_build(&self, url: &str, crumb: Option<&Crumb>)
    -> Result<TriggerResponse, TriggerError>;
}

/// Jenkins-style build server client with optional basic auth
pub struct JenkinsClient {
    http: Client,
    username: Option<String>,
    api_token: Option<String>,
}

impl JenkinsClient {
    pub fn from_config(config: &BuildServerConfig) -> Result<Self, TriggerError> {
        let http = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(TriggerError::Network)?;
        let username = Some(config.username.clone()).filter(|u| !u.is_empty());
        Ok(Self {
            http,
            username,
            api_token: config.api_token(),
        })
    }

    fn with_auth(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.username {
            Some(user) => request.basic_auth(user, self.api_token.as_deref()),
            None => request,
        }
    }
}

#[async_trait]
impl TriggerClient for JenkinsClient {
    async fn fetch_crumb(&self, origin: &str) -> Result<Option<Crumb>, TriggerError> {
        let url = format!("{origin}/crumbIssuer/api/json");
        debug!(%origin, "JenkinsClient::fetch_crumb: called");
        let response = self.with_auth(self.http.get(&url)).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            debug!(%origin, "No crumb issuer; server does not use crumbs");
            return Ok(None);
        }
        let response = response.error_for_status()?;
        let body: CrumbResponse = response.json().await?;
        Ok(Some(Crumb {
            field: body.crumb_request_field,
            value: body.crumb,
        }))
    }

    async fn start_build(
        &self,
        url: &str,
        crumb: Option<&Crumb>,
    ) -> Result<TriggerResponse, TriggerError> {
        debug!(%url, has_crumb = crumb.is_some(), "JenkinsClient::start_build: called");
        let mut request = self.with_auth(self.http.post(url));
        if let Some(crumb) = crumb {
            request = request.header(crumb.field.as_str(), crumb.value.as_str());
        }
        let response = request.send().await?;
        let status = response.status();

        if status.is_success() {
            return Ok(TriggerResponse::Started);
        }
        if status == StatusCode::NOT_FOUND {
            return Ok(TriggerResponse::Missing);
        }
        if status == StatusCode::FORBIDDEN {
            return Ok(TriggerResponse::Forbidden);
        }

        let code = status.as_u16();
        let body = response.text().await.unwrap_or_default();
        if (code == 409 || code >= 500) && NOT_BUILDABLE.is_match(body.trim()) {
            return Ok(TriggerResponse::NotBuildable);
        }
        Ok(TriggerResponse::Failed { status: code, body })
    }
}
