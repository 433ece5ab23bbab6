//! # bulb.social Gateway 共有型定義
//!
//! Gatewayの外部インターフェース（クライアント向けHTTP API、
//! IPFS Kubo RPC API、OrbitDBサービスAPI）で使用するデータ構造。
//!
//! ## エンコーディング規則
//! - 日時: RFC 3339（`chrono::DateTime<Utc>`）
//! - IPFS Kubo のレスポンスはPascalCase、それ以外はsnake_case

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// 投稿 (POST /api/v0/create-post)
// ---------------------------------------------------------------------------

/// クライアントが送信する投稿内容。
///
/// 全フィールド省略可能。`created_at` を含めても受理されるが無視される
/// （作成日時はGatewayが付与する）。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CreatePostRequest {
    /// 添付画像のCID（画像なしの場合は空文字列）
    pub cid: String,
    /// 本文
    pub description: String,
    /// クライアントが指定する位置・識別子（不透明な文字列）
    pub address: String,
    /// タグ（順序保持、重複除去なし）
    pub tags: Vec<String>,
    /// 非公開フラグ
    pub private: bool,
}

/// OrbitDBに保存される投稿レコード。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub cid: String,
    pub description: String,
    pub address: String,
    /// Gatewayがリクエスト受信時に付与する作成日時
    pub created_at: DateTime<Utc>,
    pub tags: Vec<String>,
    pub private: bool,
}

impl Post {
    /// クライアントの投稿内容にサーバー側の作成日時を付与する。
    pub fn stamp(request: CreatePostRequest, created_at: DateTime<Utc>) -> Self {
        Self {
            cid: request.cid,
            description: request.description,
            address: request.address,
            created_at,
            tags: request.tags,
            private: request.private,
        }
    }
}

// ---------------------------------------------------------------------------
// バックエンドのレスポンス
// ---------------------------------------------------------------------------

/// IPFS Kubo `POST /api/v0/add` のレスポンス。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageReceipt {
    #[serde(rename = "Name", default)]
    pub name: String,
    /// コンテンツ識別子（CID）
    #[serde(rename = "Hash")]
    pub hash: String,
    /// Kuboはサイズを文字列で返す
    #[serde(rename = "Size", default)]
    pub size: String,
}

/// OrbitDBサービス `POST /orbitdb/add` のレスポンス。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseReceipt {
    /// OrbitDBが割り当てたエントリハッシュ
    pub hash: String,
    /// ドキュメントDBのアドレス（例: `/orbitdb/zdpu...`）
    pub db_address: String,
}

// ---------------------------------------------------------------------------
// Gateway API レスポンス
// ---------------------------------------------------------------------------

/// `POST /api/v0/upload-pic` の成功レスポンス。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadPicResponse {
    pub message: String,
    pub cid: String,
}

/// `POST /api/v0/create-post` の成功レスポンス。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreatePostResponse {
    pub message: String,
    pub orbit_hash: String,
    pub db_address: String,
}

/// 全エンドポイント共通のエラーレスポンス。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    /// クライアントが送ったcreated_atは読み捨てられ、サーバー時刻で上書きされることを確認
    #[test]
    fn test_client_created_at_is_ignored() {
        let body = serde_json::json!({
            "description": "hi",
            "tags": ["a", "b", "a"],
            "private": true,
            "created_at": "2000-01-01T00:00:00Z"
        });
        let request: CreatePostRequest = serde_json::from_value(body).unwrap();
        assert_eq!(request.cid, "");
        assert_eq!(request.tags, vec!["a", "b", "a"]);

        let now = Utc::now();
        let post = Post::stamp(request, now);
        assert_eq!(post.created_at, now);
        assert!(post.private);

        let value = serde_json::to_value(&post).unwrap();
        assert_eq!(value["created_at"], serde_json::to_value(now).unwrap());
        assert_eq!(value["tags"], serde_json::json!(["a", "b", "a"]));
    }

    /// KuboのPascalCaseレスポンスを受理し、Name/Sizeの欠落を許容することを確認
    #[test]
    fn test_storage_receipt_pascal_case() {
        let receipt: StorageReceipt = serde_json::from_str(
            r#"{"Name":"a.png","Hash":"QmABC","Size":"1234"}"#,
        )
        .unwrap();
        assert_eq!(receipt.hash, "QmABC");
        assert_eq!(receipt.size, "1234");

        let receipt: StorageReceipt = serde_json::from_str(r#"{"Hash":""}"#).unwrap();
        assert_eq!(receipt.hash, "");
        assert!(serde_json::from_str::<StorageReceipt>(r#"{"Name":"a.png"}"#).is_err());
    }

    /// OrbitDBレスポンスのフィールド欠落が空文字列になることを確認
    #[test]
    fn test_database_receipt_defaults() {
        let receipt: DatabaseReceipt =
            serde_json::from_str(r#"{"db_address":"/orbitdb/xyz"}"#).unwrap();
        assert_eq!(receipt.hash, "");
        assert_eq!(receipt.db_address, "/orbitdb/xyz");
    }
}
