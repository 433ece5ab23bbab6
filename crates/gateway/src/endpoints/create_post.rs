//! # POST /api/v0/create-post
//!
//! JSON受信 → 作成日時の付与 → OrbitDB中継 → hash/DBアドレス返却。

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use bulb_types::{CreatePostRequest, CreatePostResponse, Post};
use chrono::Utc;

use crate::config::GatewayState;
use crate::error::GatewayError;

/// POST /api/v0/create-post — 投稿をOrbitDBへ保存。
///
/// `created_at` は常にサーバーの受信時刻で上書きする。
pub async fn handle_create_post(
    State(state): State<Arc<GatewayState>>,
    body: Result<Json<CreatePostRequest>, JsonRejection>,
) -> Result<Json<CreatePostResponse>, GatewayError> {
    let received_at = Utc::now();

    let Json(request) = body.map_err(|e| {
        tracing::warn!(error = %e, "投稿JSONのパースに失敗");
        GatewayError::BadRequest("Invalid JSON form")
    })?;

    let post = Post::stamp(request, received_at);

    let receipt = state.database.store(&post).await.map_err(|e| {
        tracing::error!(cid = %post.cid, error = %e, "OrbitDBへの保存に失敗");
        GatewayError::Store(e)
    })?;

    Ok(Json(CreatePostResponse {
        message: "Post stored in OrbitDB".to_string(),
        orbit_hash: receipt.hash,
        db_address: receipt.db_address,
    }))
}
