//! # Gateway設定・共有状態
//!
//! 環境変数からの設定読み込みとGatewayの共有状態の定義。
//! 設定は起動時に一度だけ読み込まれ、以降は読み取り専用。

use std::time::Duration;

use anyhow::Context;

use crate::database::PostDatabase;
use crate::staging::StagingStore;
use crate::storage::StorageBackend;

/// デフォルトの待受ポート
pub const DEFAULT_PORT: u16 = 8080;
/// ステージングディレクトリ名のプレフィックス
pub const STAGING_PREFIX: &str = "bulb.social-tmp";

/// Gatewayの起動設定。
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayConfig {
    /// 待受ポート（全インターフェースでbind）
    pub port: u16,
    /// IPFS Kubo RPC APIのベースURL（例: `http://kubo:5001`）
    pub ipfs_api_url: String,
    /// OrbitDBサービスのベースURL（例: `http://orbitdb:3000`）
    pub orbitdb_api_url: String,
    /// バックエンド呼び出し1回あたりの期限
    pub backend_timeout: Duration,
    /// リクエスト1件あたりの期限
    pub request_timeout: Duration,
    /// グレースフルシャットダウンの待機上限
    pub shutdown_grace: Duration,
    /// リクエストヘッダの合計サイズ上限（バイト）
    pub max_header_bytes: usize,
    /// リクエストボディの上限（バイト）
    pub max_upload_bytes: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            ipfs_api_url: String::new(),
            orbitdb_api_url: String::new(),
            backend_timeout: Duration::from_secs(8),
            request_timeout: Duration::from_secs(10),
            shutdown_grace: Duration::from_secs(10),
            max_header_bytes: 1 << 20,
            max_upload_bytes: 32 << 20,
        }
    }
}

impl GatewayConfig {
    /// 環境変数から構築する。
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// 任意のキー検索関数から構築する。未設定のキーはデフォルト値を使用する。
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let parse_secs = |key: &str, default: Duration| -> anyhow::Result<Duration> {
            match lookup(key) {
                Some(v) => {
                    let secs: u64 = v
                        .trim()
                        .parse()
                        .with_context(|| format!("{key}は秒数（整数）である必要があります: {v}"))?;
                    Ok(Duration::from_secs(secs))
                }
                None => Ok(default),
            }
        };
        let parse_bytes = |key: &str, default: usize| -> anyhow::Result<usize> {
            match lookup(key) {
                Some(v) => v
                    .trim()
                    .parse()
                    .with_context(|| format!("{key}はバイト数（整数）である必要があります: {v}")),
                None => Ok(default),
            }
        };

        let port = match lookup("PORT") {
            Some(v) => v
                .trim()
                .parse()
                .with_context(|| format!("PORTは0〜65535の整数である必要があります: {v}"))?,
            None => defaults.port,
        };

        Ok(Self {
            port,
            ipfs_api_url: lookup("IPFS_API_URL").unwrap_or_default(),
            orbitdb_api_url: lookup("ORBITDB_API_URL").unwrap_or_default(),
            backend_timeout: parse_secs("BACKEND_TIMEOUT_SECS", defaults.backend_timeout)?,
            request_timeout: parse_secs("REQUEST_TIMEOUT_SECS", defaults.request_timeout)?,
            shutdown_grace: parse_secs("SHUTDOWN_GRACE_SECS", defaults.shutdown_grace)?,
            max_header_bytes: parse_bytes("MAX_HEADER_BYTES", defaults.max_header_bytes)?,
            max_upload_bytes: parse_bytes("MAX_UPLOAD_BYTES", defaults.max_upload_bytes)?,
        })
    }

    /// 未設定のバックエンドURLを警告する。
    /// 起動は継続し、各中継呼び出しがURL構築エラーで失敗する。
    pub fn warn_missing_backends(&self) {
        if self.ipfs_api_url.is_empty() {
            tracing::warn!("IPFS_API_URLが未設定です。/api/v0/upload-picは全て失敗します");
        }
        if self.orbitdb_api_url.is_empty() {
            tracing::warn!("ORBITDB_API_URLが未設定です。/api/v0/create-postは全て失敗します");
        }
    }
}

/// Gatewayの共有状態。
/// 起動時に構築され、全リクエストから読み取り専用で共有される。
pub struct GatewayState {
    /// ステージング領域（リクエストごとに個別のファイルを書き込む）
    pub staging: StagingStore,
    /// コンテンツアドレス型ストレージ（IPFS Kubo等、トレイトで抽象化）
    pub storage: Box<dyn StorageBackend>,
    /// 追記型データベース（OrbitDB等、トレイトで抽象化）
    pub database: Box<dyn PostDatabase>,
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    /// 環境変数が空の場合にデフォルト値で起動できることを確認
    #[test]
    fn test_defaults_when_unset() {
        let config = GatewayConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config, GatewayConfig::default());
        assert_eq!(config.port, 8080);
        assert_eq!(config.ipfs_api_url, "");
        assert_eq!(config.max_header_bytes, 1024 * 1024);
        assert_eq!(config.request_timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_overrides() {
        let config = GatewayConfig::from_lookup(lookup_from(&[
            ("PORT", "80"),
            ("IPFS_API_URL", "http://kubo:5001"),
            ("ORBITDB_API_URL", "http://orbitdb:3000"),
            ("BACKEND_TIMEOUT_SECS", "3"),
            ("SHUTDOWN_GRACE_SECS", " 5 "),
            ("MAX_UPLOAD_BYTES", "1024"),
        ]))
        .unwrap();
        assert_eq!(config.port, 80);
        assert_eq!(config.ipfs_api_url, "http://kubo:5001");
        assert_eq!(config.orbitdb_api_url, "http://orbitdb:3000");
        assert_eq!(config.backend_timeout, Duration::from_secs(3));
        assert_eq!(config.shutdown_grace, Duration::from_secs(5));
        assert_eq!(config.max_upload_bytes, 1024);
    }

    /// 数値として解釈できない値は起動エラーになることを確認
    #[test]
    fn test_malformed_numbers_rejected() {
        assert!(GatewayConfig::from_lookup(lookup_from(&[("PORT", "http")])).is_err());
        assert!(GatewayConfig::from_lookup(lookup_from(&[("PORT", "70000")])).is_err());
        assert!(
            GatewayConfig::from_lookup(lookup_from(&[("BACKEND_TIMEOUT_SECS", "-1")])).is_err()
        );
    }
}
