//! GitHub release API lookups.

use crate::error::{error_chain, PptError, Result};
use crate::types::GitHubRelease;
use reqwest::{StatusCode, Url};

/// Build the "latest release" API URL for a repository hosted at the host of
/// `source_url` (`github.com` is served by `api.github.com`).
pub fn build_latest_release_url(source_url: &str, owner: &str, repo: &str) -> Result<String> {
    let parsed = Url::parse(source_url).map_err(|e| PptError::MalformedUrl {
        url: source_url.to_string(),
        reason: e.to_string(),
    })?;
    let host = parsed.host_str().ok_or_else(|| PptError::MalformedUrl {
        url: source_url.to_string(),
        reason: "missing host".to_string(),
    })?;
    let host = host.strip_prefix("www.").unwrap_or(host);

    let authority = match parsed.port() {
        Some(port) => format!("api.{}:{}", host, port),
        None => format!("api.{}", host),
    };
    Ok(format!(
        "{}://{}/repos/{}/{}/releases/latest",
        parsed.scheme(),
        authority,
        owner,
        repo
    ))
}

pub async fn get_latest_tag(
    client: &reqwest::Client,
    token: Option<&str>,
    source_url: &str,
    owner: &str,
    repo: &str,
) -> Result<String> {
    let url = build_latest_release_url(source_url, owner, repo)?;
    fetch_tag_name(client, token, &url).await
}

pub(crate) async fn fetch_tag_name(client: &reqwest::Client, token: Option<&str>, url: &str) -> Result<String> {
    tracing::debug!("Fetching latest release info from: {}", url);

    let mut request = client
        .get(url)
        .header("Accept", "application/vnd.github.v3+json");
    if let Some(token) = token {
        request = request.header("Authorization", format!("token {}", token));
        tracing::debug!("Using GITHUB_TOKEN");
    }

    let response = request.send().await.map_err(|e| PptError::request(url, &e))?;
    let status = response.status();
    if status == StatusCode::NOT_FOUND {
        return Err(PptError::transfer(url, "no published release found (404)"));
    }
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unable to read error response".to_string());
        let body = body.lines().next().unwrap_or_default().to_string();
        return Err(PptError::transfer(url, format!("HTTP {} {}", status, body)));
    }

    let release: GitHubRelease = response
        .json()
        .await
        .map_err(|e| PptError::transfer(url, format!("unexpected response: {}", error_chain(&e))))?;
    if release.tag_name.trim().is_empty() {
        return Err(PptError::transfer(url, "release has an empty tag_name"));
    }
    Ok(release.tag_name)
}
