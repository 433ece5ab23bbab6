//! # bulb.social Gateway
//!
//! クライアントからの画像と投稿を、IPFS（Kubo RPC API）とOrbitDBサービスへ
//! 中継するHTTPゲートウェイ。
//!
//! ## 役割
//! - アップロード画像の一時保存（ステージング）
//! - IPFSへの中継とCIDの返却
//! - 投稿への作成日時付与とOrbitDBへの中継
//! - SIGINT/SIGTERMでのグレースフルシャットダウンと一時領域の削除
//!
//! ## API エンドポイント
//! - `POST /api/v0/upload-pic` — multipart（`file`）→ `{message, cid}`
//! - `POST /api/v0/create-post` — 投稿JSON → `{message, orbit_hash, db_address}`
//!
//! ## 環境変数
//! `PORT`, `IPFS_API_URL`, `ORBITDB_API_URL`, `BACKEND_TIMEOUT_SECS`,
//! `REQUEST_TIMEOUT_SECS`, `SHUTDOWN_GRACE_SECS`, `MAX_HEADER_BYTES`,
//! `MAX_UPLOAD_BYTES`, `RUST_LOG`

mod backend_url;
mod config;
mod database;
mod endpoints;
mod error;
mod middleware;
mod server;
mod staging;
mod storage;

#[cfg(test)]
mod test_helpers;

use tracing_subscriber::EnvFilter;

use crate::config::GatewayConfig;
use crate::server::{shutdown_signal, Gateway};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = GatewayConfig::from_env()?;
    config.warn_missing_backends();

    let gateway = Gateway::bind(config).await?;
    gateway.run(shutdown_signal()).await?;

    Ok(())
}
