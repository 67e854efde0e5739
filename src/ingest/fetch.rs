//! Fetching the data archive.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tokio::io::AsyncWriteExt;

use crate::error::{PipelineError, Result};

/// Retrieves the compressed archive and spools it to disk.
#[async_trait]
pub trait ArchiveFetcher: Send + Sync {
    /// Human-readable description of where the archive comes from.
    fn location(&self) -> &str;

    /// Write the archive bytes to `dest`, returning the number of bytes written.
    async fn fetch_to(&self, dest: &Path) -> Result<u64>;
}

/// Fetches the archive with a single HTTP GET.
#[derive(Debug, Clone)]
pub struct HttpArchiveFetcher {
    client: Client,
    url: String,
}

impl HttpArchiveFetcher {
    /// Create a fetcher for `url`.
    ///
    /// `connect_timeout` bounds connection setup only; the body of a large
    /// archive may legitimately take much longer to arrive.
    pub fn new(url: impl Into<String>, user_agent: &str, connect_timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(user_agent)
            .connect_timeout(connect_timeout)
            .build()?;

        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl ArchiveFetcher for HttpArchiveFetcher {
    fn location(&self) -> &str {
        &self.url
    }

    async fn fetch_to(&self, dest: &Path) -> Result<u64> {
        tracing::info!("Fetching archive from {}", self.url);

        let mut response = self.client.get(&self.url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(PipelineError::Fetch(format!(
                "{} returned HTTP {}",
                self.url, status
            )));
        }

        let mut file = tokio::fs::File::create(dest).await?;
        let mut total = 0u64;
        while let Some(chunk) = response.chunk().await? {
            file.write_all(&chunk).await?;
            total += chunk.len() as u64;
        }
        file.flush().await?;

        tracing::info!("Fetched {} bytes into {}", total, dest.display());
        Ok(total)
    }
}
