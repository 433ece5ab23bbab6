//! # IPFS Kubo RPC API
//!
//! `POST {base}/api/v0/add` にステージング済みファイルを
//! multipart（フィールド名 `file`）でストリーミング送信する。

use std::time::Duration;

use bulb_types::StorageReceipt;
use reqwest::multipart::{Form, Part};
use tokio_util::io::ReaderStream;

use super::StorageBackend;
use crate::backend_url::join_api_url;
use crate::error::StorageError;
use crate::staging::StagedUpload;

/// Kuboのファイル追加APIパス
pub const ADD_PATH: &str = "/api/v0/add";

/// `file` パートのContent-Type
const FILE_CONTENT_TYPE: &str = "application/octet-stream";

/// IPFS Kuboによるストレージ実装。
pub struct KuboStorage {
    http_client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl KuboStorage {
    pub fn new(http_client: reqwest::Client, base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            http_client,
            base_url: base_url.into(),
            timeout,
        }
    }
}

#[async_trait::async_trait]
impl StorageBackend for KuboStorage {
    async fn pin(&self, staged: &StagedUpload) -> Result<String, StorageError> {
        let url = join_api_url(&self.base_url, ADD_PATH).map_err(StorageError::InvalidUrl)?;

        let file = tokio::fs::File::open(staged.path())
            .await
            .map_err(StorageError::FileAccess)?;
        let length = file
            .metadata()
            .await
            .map_err(StorageError::FileAccess)?
            .len();
        let body = reqwest::Body::wrap_stream(ReaderStream::new(file));
        let part = Part::stream_with_length(body, length)
            .file_name(staged.generated_name().to_string())
            .mime_str(FILE_CONTENT_TYPE)
            .map_err(|e| StorageError::Request(e.to_string()))?;
        let form = Form::new().part("file", part);

        let response = self
            .http_client
            .post(url)
            .multipart(form)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    StorageError::Timeout
                } else {
                    StorageError::Unreachable(e.to_string())
                }
            })?;

        let status = response.status().as_u16();
        let response_body = response.bytes().await.map_err(|e| {
            if e.is_timeout() {
                StorageError::Timeout
            } else {
                StorageError::InvalidResponse {
                    status,
                    reason: format!("レスポンス読み取り失敗: {e}"),
                }
            }
        })?;

        let receipt: StorageReceipt =
            serde_json::from_slice(&response_body).map_err(|e| StorageError::InvalidResponse {
                status,
                reason: e.to_string(),
            })?;

        tracing::info!(
            name = %staged.generated_name(),
            cid = %receipt.hash,
            size = %receipt.size,
            "IPFSに追加しました"
        );
        Ok(receipt.hash)
    }
}
