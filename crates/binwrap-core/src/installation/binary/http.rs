//! HTTP retrieval of release archives
//!
//! The body is streamed so progress is reported per chunk, but it is
//! buffered in memory in full before extraction starts.

use crate::errors::{BinWrapError, BinWrapResult};
use crate::installation::binary::extract::{self, ArchiveKind};
use crate::installation::traits::{ArchiveFetcher, ExtractRequest, TransferObserver};
use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::header::CONTENT_LENGTH;
use reqwest::Client;

const USER_AGENT: &str = concat!("binwrap/", env!("CARGO_PKG_VERSION"));

/// Streams a resource over HTTP and extracts it into the destination
#[derive(Debug, Clone)]
pub struct HttpArchiveFetcher {
    client: Client,
}

impl Default for HttpArchiveFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpArchiveFetcher {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }

    /// Use a preconfigured client (proxies, timeouts, TLS roots)
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    async fn download(&self, url: &str, observer: &mut dyn TransferObserver) -> BinWrapResult<Vec<u8>> {
        let response = self
            .client
            .get(url)
            .header("User-Agent", USER_AGENT)
            .send()
            .await
            .map_err(|e| BinWrapError::network(url, e))?;

        if !response.status().is_success() {
            return Err(BinWrapError::network(
                url,
                format!("Server responded with status {}", response.status()),
            ));
        }

        let total_bytes = parse_content_length(response.headers());
        observer.on_response(total_bytes);

        let mut data = Vec::with_capacity(total_bytes.unwrap_or(0).min(64 * 1024 * 1024) as usize);
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| BinWrapError::network(url, e))?;
            data.extend_from_slice(&chunk);
            observer.on_chunk(chunk.len());
        }

        Ok(data)
    }
}

/// Content-Length as a byte count, `None` when absent or unparseable
pub(crate) fn parse_content_length(headers: &reqwest::header::HeaderMap) -> Option<u64> {
    headers
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<u64>().ok())
}

#[async_trait]
impl ArchiveFetcher for HttpArchiveFetcher {
    async fn fetch(
        &self,
        url: &str,
        request: &ExtractRequest,
        observer: &mut dyn TransferObserver,
    ) -> BinWrapResult<()> {
        let data = self.download(url, observer).await?;
        let kind = ArchiveKind::detect(url, &data);
        log::debug!("Extracting {} ({:?}, {} bytes)", url, kind, data.len());

        let url = url.to_string();
        let destination = request.destination.clone();
        let strip = request.strip_components;
        tokio::task::spawn_blocking(move || extract::extract(kind, &url, &data, &destination, strip))
            .await
            .map_err(|e| BinWrapError::filesystem(&request.destination, format!("Extraction task failed: {}", e)))?
    }
}
