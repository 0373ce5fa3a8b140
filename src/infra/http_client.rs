use crate::app::ports::{HttpClientPort, HttpDownloadResult};
use crate::error::Result;
use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;
use tokio::io::AsyncWriteExt;

pub struct ReqwestHttp {
    client: reqwest::Client,
}

impl ReqwestHttp {
    /// Build a client that writes bodies as served (no transparent decompression).
    pub fn new(timeout: Option<Duration>) -> Result<Self> {
        let mut builder = reqwest::Client::builder().no_gzip().no_deflate();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self { client: builder.build()? })
    }
}

#[async_trait]
impl HttpClientPort for ReqwestHttp {
    async fn download(&self, url: &str, dest: &Path) -> Result<HttpDownloadResult> {
        let mut resp = self.client.get(url).send().await?;
        let status = resp.status().as_u16();
        if status != 200 {
            return Ok(HttpDownloadResult { status, bytes_written: 0 });
        }

        let mut file = tokio::fs::File::create(dest).await?;
        let mut bytes_written: u64 = 0;
        while let Some(chunk) = resp.chunk().await? {
            file.write_all(&chunk).await?;
            bytes_written += chunk.len() as u64;
        }
        file.flush().await?;
        Ok(HttpDownloadResult { status, bytes_written })
    }
}
