//! # OrbitDBサービス
//!
//! `POST {base}/orbitdb/add` に投稿をJSONで送信する。
//! 成功条件は HTTP 200 かつ空でない `hash`。

use std::time::Duration;

use bulb_types::{DatabaseReceipt, Post};
use reqwest::StatusCode;

use super::PostDatabase;
use crate::backend_url::join_api_url;
use crate::error::DatabaseError;

/// OrbitDBサービスのドキュメント追加APIパス
pub const ADD_PATH: &str = "/orbitdb/add";

/// OrbitDBサービスによるデータベース実装。
pub struct OrbitDbDatabase {
    http_client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl OrbitDbDatabase {
    pub fn new(http_client: reqwest::Client, base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            http_client,
            base_url: base_url.into(),
            timeout,
        }
    }
}

fn classify(e: reqwest::Error) -> DatabaseError {
    if e.is_timeout() {
        DatabaseError::Timeout
    } else {
        DatabaseError::Unreachable(e.to_string())
    }
}

#[async_trait::async_trait]
impl PostDatabase for OrbitDbDatabase {
    async fn store(&self, post: &Post) -> Result<DatabaseReceipt, DatabaseError> {
        let url = join_api_url(&self.base_url, ADD_PATH).map_err(DatabaseError::InvalidUrl)?;

        // .json() は Content-Type: application/json を付与する
        let response = self
            .http_client
            .post(url)
            .json(post)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(classify)?;

        let status = response.status();
        let response_body = response.text().await.map_err(classify)?;

        if status != StatusCode::OK {
            return Err(DatabaseError::UnexpectedStatus {
                status: status.as_u16(),
                body: response_body,
            });
        }

        let receipt: DatabaseReceipt = serde_json::from_str(&response_body)
            .map_err(|e| DatabaseError::InvalidResponse(e.to_string()))?;

        if receipt.hash.is_empty() {
            return Err(DatabaseError::MissingHash);
        }

        tracing::info!(
            hash = %receipt.hash,
            db_address = %receipt.db_address,
            "OrbitDBに保存しました"
        );
        Ok(receipt)
    }
}
