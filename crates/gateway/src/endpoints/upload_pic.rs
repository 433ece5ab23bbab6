//! # POST /api/v0/upload-pic
//!
//! multipart受信 → ファイル名検証 → ステージング → IPFS中継 → CID返却。
//! ステージングファイルは成功・失敗を問わずハンドラ終了時に削除される。

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::multipart::{MultipartError, MultipartRejection};
use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::Json;
use bulb_types::UploadPicResponse;

use crate::config::GatewayState;
use crate::error::GatewayError;

const INVALID_FILE: &str = "Invalid file upload";
const NO_FILE: &str = "No file uploaded";

/// POST /api/v0/upload-pic — 画像アップロードとIPFSへのピン留め。
pub async fn handle_upload_pic(
    State(state): State<Arc<GatewayState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadPicResponse>, GatewayError> {
    let mut multipart = multipart.map_err(|e| {
        tracing::warn!(error = %e, "multipartリクエストではありません");
        GatewayError::BadRequest(INVALID_FILE)
    })?;

    let (filename, content) = read_file_field(&mut multipart).await?;

    let staged = state
        .staging
        .stage(&filename, &content)
        .await
        .map_err(|e| {
            tracing::error!(filename = %filename, error = %e, "ステージングに失敗");
            GatewayError::Staging(e)
        })?;
    tracing::info!(
        filename = %filename,
        path = %staged.path().display(),
        size = content.len(),
        "ファイルをステージングしました"
    );

    let cid = state.storage.pin(&staged).await.map_err(|e| {
        tracing::error!(name = %staged.generated_name(), error = %e, "IPFSへのピン留めに失敗");
        GatewayError::Pin(e)
    })?;

    Ok(Json(UploadPicResponse {
        message: "File uploaded and stored on IPFS".to_string(),
        cid,
    }))
}

/// `file` フィールドのファイル名と内容を取り出す。
///
/// ファイル名を持たない `file` フィールドは無視する。
/// ファイル名が空の場合は内容を読まずに拒否する。
async fn read_file_field(multipart: &mut Multipart) -> Result<(String, Bytes), GatewayError> {
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some("file") {
            continue;
        }
        let Some(filename) = field.file_name().map(str::to_string) else {
            continue;
        };
        validate_filename(&filename)?;

        let content = field.bytes().await.map_err(multipart_error)?;
        return Ok((filename, content));
    }
    Err(GatewayError::BadRequest(INVALID_FILE))
}

pub(crate) fn validate_filename(filename: &str) -> Result<(), GatewayError> {
    if filename.is_empty() {
        return Err(GatewayError::BadRequest(NO_FILE));
    }
    Ok(())
}

fn multipart_error(e: MultipartError) -> GatewayError {
    tracing::warn!(error = %e, "multipartの読み取りに失敗");
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        GatewayError::PayloadTooLarge
    } else {
        GatewayError::BadRequest(INVALID_FILE)
    }
}
