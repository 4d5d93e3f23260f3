use crate::error::{PptError, Result};
use reqwest::Url;
use std::fmt;

/// Identity of a release asset, parsed from a URL of the form
/// `<scheme>://<host>/<owner>/<repo>/releases/download/<version>/<asset>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseUrl {
    pub owner: String,
    pub repo: String,
    pub version: String,
    pub asset_filename: String,
    /// Everything before the `releases` segment, with a trailing slash,
    /// e.g. `https://github.com/acme/tool/`.
    pub release_listing_url: String,
}

impl ReleaseUrl {
    /// Parse a release asset URL. No network access happens here.
    ///
    /// Tags containing slashes (`cli/v1.0.0`) are supported: every segment
    /// between `download` and the asset filename belongs to the version.
    pub fn parse(url: &str) -> Result<Self> {
        let malformed = |reason: &str| PptError::MalformedUrl {
            url: url.to_string(),
            reason: reason.to_string(),
        };

        let parsed = Url::parse(url.trim()).map_err(|e| malformed(&e.to_string()))?;
        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return Err(malformed("only http and https URLs are supported"));
        }
        if parsed.host_str().is_none() {
            return Err(malformed("missing host"));
        }

        let segments: Vec<&str> = parsed
            .path_segments()
            .map(|s| s.collect())
            .unwrap_or_default();

        // owner, repo, "releases", "download", version, asset
        if segments.len() < 6 {
            return Err(malformed(
                "expected <owner>/<repo>/releases/download/<version>/<asset>",
            ));
        }
        if segments[2] != "releases" || segments[3] != "download" {
            return Err(malformed("path does not contain /releases/download/"));
        }

        let owner = segments[0];
        let repo = segments[1];
        let asset_filename = segments[segments.len() - 1];
        let version = segments[4..segments.len() - 1].join("/");

        if owner.is_empty() || repo.is_empty() {
            return Err(malformed("missing owner or repository"));
        }
        if version.is_empty() || version.split('/').any(str::is_empty) {
            return Err(malformed("missing release version"));
        }
        if asset_filename.is_empty() {
            return Err(malformed("missing asset filename"));
        }

        let mut listing = parsed.clone();
        listing.set_query(None);
        listing.set_fragment(None);
        listing.set_path(&format!("/{}/{}/", owner, repo));

        Ok(ReleaseUrl {
            owner: owner.to_string(),
            repo: repo.to_string(),
            version,
            asset_filename: asset_filename.to_string(),
            release_listing_url: listing.to_string(),
        })
    }

    /// Name the program is installed and recorded under.
    pub fn program_name(&self) -> &str {
        &self.repo
    }

    pub fn download_url(&self) -> String {
        build_download_url(&self.release_listing_url, &self.version, &self.asset_filename)
    }
}

/// Rebuild an asset download URL from a release listing URL.
pub fn build_download_url(release_listing_url: &str, version: &str, asset_filename: &str) -> String {
    let base = release_listing_url.trim_end_matches('/');
    format!("{}/releases/download/{}/{}", base, version, asset_filename)
}

impl fmt::Display for ReleaseUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}@{}", self.owner, self.repo, self.version)
    }
}
