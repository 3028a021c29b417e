use crate::collab::build_client;
use crate::editor::codec::InlineImage;
use anyhow::{anyhow, bail, Context, Result};
use reqwest::blocking::Client;
use url::Url;

/// Resolves an image reference to its bytes.
pub trait ImageFetcher: Send + Sync {
    fn fetch(&self, reference: &str) -> Result<InlineImage>;
}

/// Handles `http(s)://`, `file://` and inline `data:` references.
pub struct HttpImageFetcher {
    client: Client,
}

impl HttpImageFetcher {
    pub fn new() -> Result<Self> {
        Ok(Self {
            client: build_client()?,
        })
    }
}

impl ImageFetcher for HttpImageFetcher {
    fn fetch(&self, reference: &str) -> Result<InlineImage> {
        let reference = reference.trim();
        if reference.starts_with("data:") {
            return InlineImage::parse(reference).map_err(|err| anyhow!(err));
        }

        let url = Url::parse(reference).with_context(|| format!("parse image reference {reference}"))?;
        match url.scheme() {
            "file" => {
                let path = url
                    .to_file_path()
                    .map_err(|_| anyhow!("not a local file url: {url}"))?;
                let bytes =
                    std::fs::read(&path).with_context(|| format!("read image {}", path.display()))?;
                Ok(InlineImage::from_bytes(bytes))
            }
            "http" | "https" => {
                let resp = self
                    .client
                    .get(url.as_str())
                    .send()
                    .with_context(|| format!("fetch image {url}"))?
                    .error_for_status()
                    .with_context(|| format!("fetch image {url}"))?;
                let bytes = resp.bytes().context("read image body")?;
                Ok(InlineImage::from_bytes(bytes.to_vec()))
            }
            other => bail!("unsupported image reference scheme: {other}"),
        }
    }
}
