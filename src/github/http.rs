//! GitHub REST implementation of the repository client
//!
//! Works against both github.com and GitHub Enterprise; the API base url
//! comes from configuration. All git-data endpoints live under
//! `/repos/{owner}/{repo}`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue, USER_AGENT};
use reqwest::{Client, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::{debug, warn};

use crate::config::GitHubConfig;

use super::client::RepoClient;
use super::error::RepoError;
use super::types::{
    CommitComparison, FullCommit, GitBlob, GitCommit, GitRef, GitTree, NewBlob, NewCommit, NewTree,
    ObjectRef,
};

/// Repository client backed by the GitHub REST API
pub struct GitHubClient {
    base_url: String,
    http: Client,
}

impl GitHubClient {
    /// Build a client from configuration. The API token is read from the
    /// configured environment variable; without one, requests go out
    /// unauthenticated.
    pub fn new(config: &GitHubConfig) -> Result<Self, RepoError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&config.user_agent)
                .map_err(|e| RepoError::Config(format!("invalid user-agent: {e}")))?,
        );
        match config.token() {
            Some(token) => {
                let mut value = HeaderValue::from_str(&format!("token {token}"))
                    .map_err(|e| RepoError::Config(format!("invalid API token: {e}")))?;
                value.set_sensitive(true);
                headers.insert(AUTHORIZATION, value);
            }
            None => {
                warn!(env = %config.token_env, "No API token set; requests will be unauthenticated");
            }
        }

        let http = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .default_headers(headers)
            .build()
            .map_err(RepoError::Network)?;

        Ok(Self {
            base_url: config.api_base.trim_end_matches('/').to_string(),
            http,
        })
    }

    fn repo_url(&self, owner: &str, repo: &str, tail: &str) -> String {
        format!("{}/repos/{}/{}/{}", self.base_url, owner, repo, tail)
    }

    async fn error_from(url: &str, response: reqwest::Response) -> RepoError {
        let status = response.status().as_u16();
        let message = response.text().await.unwrap_or_default();
        RepoError::Api {
            status,
            url: url.to_string(),
            message,
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, url: String) -> Result<T, RepoError> {
        debug!(%url, "GitHubClient::get_json: called");
        let response = self.http.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(Self::error_from(&url, response).await);
        }
        Ok(response.json().await?)
    }

    /// GET that maps 404 and 422 (unresolvable ref) to `Ok(None)`
    async fn get_json_opt<T: DeserializeOwned>(&self, url: String) -> Result<Option<T>, RepoError> {
        debug!(%url, "GitHubClient::get_json_opt: called");
        let response = self.http.get(&url).send().await?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND || status == StatusCode::UNPROCESSABLE_ENTITY {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(Self::error_from(&url, response).await);
        }
        Ok(Some(response.json().await?))
    }

    async fn post_json<B: Serialize, T: DeserializeOwned>(
        &self,
        url: String,
        body: &B,
    ) -> Result<T, RepoError> {
        debug!(%url, "GitHubClient::post_json: called");
        let response = self.http.post(&url).json(body).send().await?;
        if !response.status().is_success() {
            return Err(Self::error_from(&url, response).await);
        }
        Ok(response.json().await?)
    }
}

#[async_trait]
impl RepoClient for GitHubClient {
    async fn get_latest_commit_id(
        &self,
        owner: &str,
        repo: &str,
        branch: &str,
    ) -> Result<Option<String>, RepoError> {
        let url = self.repo_url(owner, repo, &format!("commits/{branch}"));
        let head: Option<ObjectRef> = self.get_json_opt(url).await?;
        Ok(head.map(|h| h.sha))
    }

    async fn get_commit(
        &self,
        owner: &str,
        repo: &str,
        sha: &str,
    ) -> Result<GitCommit, RepoError> {
        let url = self.repo_url(owner, repo, &format!("git/commits/{sha}"));
        self.get_json(url).await
    }

    async fn get_tree(&self, owner: &str, repo: &str, sha: &str) -> Result<GitTree, RepoError> {
        let url = self.repo_url(owner, repo, &format!("git/trees/{sha}"));
        self.get_json(url).await
    }

    async fn get_blob(&self, owner: &str, repo: &str, sha: &str) -> Result<GitBlob, RepoError> {
        let url = self.repo_url(owner, repo, &format!("git/blobs/{sha}"));
        self.get_json(url).await
    }

    async fn create_blob(
        &self,
        owner: &str,
        repo: &str,
        content: &str,
    ) -> Result<String, RepoError> {
        let url = self.repo_url(owner, repo, "git/blobs");
        let created: ObjectRef = self.post_json(url, &NewBlob::from_text(content)).await?;
        Ok(created.sha)
    }

    async fn create_tree(
        &self,
        owner: &str,
        repo: &str,
        tree: &NewTree,
    ) -> Result<String, RepoError> {
        let url = self.repo_url(owner, repo, "git/trees");
        let created: ObjectRef = self.post_json(url, tree).await?;
        Ok(created.sha)
    }

    async fn create_commit(
        &self,
        owner: &str,
        repo: &str,
        commit: &NewCommit,
    ) -> Result<String, RepoError> {
        let url = self.repo_url(owner, repo, "git/commits");
        let created: ObjectRef = self.post_json(url, commit).await?;
        Ok(created.sha)
    }

    async fn compare_commits(
        &self,
        owner: &str,
        repo: &str,
        base: &str,
        head: &str,
    ) -> Result<Option<CommitComparison>, RepoError> {
        let url = self.repo_url(owner, repo, &format!("compare/{base}...{head}"));
        self.get_json_opt(url).await
    }

    async fn get_full_commit(
        &self,
        owner: &str,
        repo: &str,
        sha: &str,
    ) -> Result<Option<FullCommit>, RepoError> {
        let url = self.repo_url(owner, repo, &format!("commits/{sha}"));
        self.get_json_opt(url).await
    }

    async fn create_branch(
        &self,
        owner: &str,
        repo: &str,
        branch: &str,
        sha: &str,
    ) -> Result<(), RepoError> {
        let url = self.repo_url(owner, repo, "git/refs");
        let body = json!({ "ref": format!("refs/heads/{branch}"), "sha": sha });
        let _created: GitRef = self.post_json(url, &body).await?;
        Ok(())
    }

    async fn update_branch(
        &self,
        owner: &str,
        repo: &str,
        branch: &str,
        expected_sha: &str,
        new_sha: &str,
    ) -> Result<bool, RepoError> {
        let url = self.repo_url(owner, repo, &format!("git/refs/heads/{branch}"));
        debug!(%url, expected = %expected_sha, new = %new_sha, "GitHubClient::update_branch: called");

        // A non-forced ref update is the compare-and-swap: the server
        // rejects it unless the new commit descends from the current tip.
        let body = json!({ "sha": new_sha, "force": false });
        let response = self.http.patch(&url).json(&body).send().await?;
        let status = response.status();
        if status == StatusCode::CONFLICT || status == StatusCode::UNPROCESSABLE_ENTITY {
            debug!(%branch, "update_branch: rejected, ref moved");
            return Ok(false);
        }
        if !status.is_success() {
            return Err(Self::error_from(&url, response).await);
        }
        let updated: GitRef = response.json().await?;
        Ok(updated.object.sha == new_sha)
    }
}
