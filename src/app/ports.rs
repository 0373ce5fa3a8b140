use async_trait::async_trait;
use std::path::Path;

use crate::error::Result;

// Fetch-side port
#[async_trait]
pub trait HttpClientPort: Send + Sync {
    /// Issue a GET for `url`. Only a 200 response has its body streamed
    /// verbatim into `dest`; any other status leaves `dest` untouched.
    async fn download(&self, url: &str, dest: &Path) -> Result<HttpDownloadResult>;
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HttpDownloadResult {
    pub status: u16,
    pub bytes_written: u64,
}

impl HttpDownloadResult {
    pub fn is_ok(&self) -> bool {
        self.status == 200
    }
}
