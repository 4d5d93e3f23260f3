use crate::error::{PptError, Result};
use crate::github;
use crate::report::Reporter;
use futures_util::StreamExt;
use reqwest::Url;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const USER_AGENT: &str = concat!("ppt/", env!("CARGO_PKG_VERSION"));
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Network side of the pipeline. Commands are generic over it so they can run
/// against an in-memory source.
#[allow(async_fn_in_trait)]
pub trait ReleaseSource {
    /// Stream `url` into `dest_dir`, named after the URL's last path segment.
    async fn download(&self, url: &str, dest_dir: &Path, reporter: &dyn Reporter) -> Result<PathBuf>;

    /// Tag name of the newest release of `owner/repo`.
    async fn latest_tag(&self, source_url: &str, owner: &str, repo: &str) -> Result<String>;
}

pub struct GitHubSource {
    client: reqwest::Client,
    token: Option<String>,
}

impl GitHubSource {
    pub fn new(timeout: Duration, token: Option<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(timeout)
            .build()
            .map_err(|e| PptError::request("<client>", &e))?;
        Ok(Self { client, token })
    }
}

impl ReleaseSource for GitHubSource {
    async fn download(&self, url: &str, dest_dir: &Path, reporter: &dyn Reporter) -> Result<PathBuf> {
        download_file(&self.client, url, dest_dir, reporter).await
    }

    async fn latest_tag(&self, source_url: &str, owner: &str, repo: &str) -> Result<String> {
        github::get_latest_tag(&self.client, self.token.as_deref(), source_url, owner, repo).await
    }
}

/// Final path segment of `url`, used as the local file name.
pub fn local_file_name(url: &str) -> String {
    Url::parse(url)
        .ok()
        .and_then(|u| {
            u.path_segments()
                .and_then(|mut s| s.next_back().map(str::to_string))
        })
        .filter(|name| !name.is_empty() && name != "." && name != "..")
        .unwrap_or_else(|| "download".to_string())
}

pub async fn download_file(
    client: &reqwest::Client,
    url: &str,
    dest_dir: &Path,
    reporter: &dyn Reporter,
) -> Result<PathBuf> {
    let file_name = local_file_name(url);
    let local_path = dest_dir.join(&file_name);
    tracing::info!("Downloading {}...", file_name);
    tracing::debug!("GET {}", url);

    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| PptError::request(url, &e))?;

    let status = response.status();
    if !status.is_success() {
        return Err(PptError::transfer(url, format!("HTTP {}", status)));
    }

    let total_size = response.content_length();
    let progress = reporter.begin_transfer(&file_name, total_size);

    fs::create_dir_all(dest_dir)
        .map_err(|e| PptError::io(format!("Could not create {}", dest_dir.display()), e))?;
    let mut file = fs::File::create(&local_path)
        .map_err(|e| PptError::io(format!("Could not create {}", local_path.display()), e))?;

    let mut downloaded = 0u64;
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| PptError::request(url, &e))?;
        file.write_all(&chunk)
            .map_err(|e| PptError::io(format!("Could not write {}", local_path.display()), e))?;
        downloaded += chunk.len() as u64;
        progress.advance(chunk.len() as u64);
    }
    file.flush()
        .map_err(|e| PptError::io(format!("Could not write {}", local_path.display()), e))?;

    progress.finish();

    if let Some(total) = total_size {
        if downloaded != total {
            return Err(PptError::transfer(
                url,
                format!("received {} of {} bytes", downloaded, total),
            ));
        }
    }

    tracing::debug!("Saved {} bytes to {}", downloaded, local_path.display());
    Ok(local_path)
}

#[cfg(test)]
pub(crate) mod test_server {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve a single canned HTTP response on localhost and return its base URL.
    pub async fn serve_once(status_line: &str, headers: Vec<String>, body: Vec<u8>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let status_line = status_line.to_string();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 4096];
            let mut request = Vec::new();
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
                if request.windows(4).any(|w| w == b"\r\n\r\n") {
                    break;
                }
            }

            let mut head = format!("HTTP/1.1 {}\r\nConnection: close\r\n", status_line);
            for header in headers {
                head.push_str(&header);
                head.push_str("\r\n");
            }
            head.push_str("\r\n");
            socket.write_all(head.as_bytes()).await.unwrap();
            socket.write_all(&body).await.unwrap();
            socket.shutdown().await.ok();
        });

        format!("http://{}", addr)
    }
}
