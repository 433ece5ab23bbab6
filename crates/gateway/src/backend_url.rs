//! # バックエンドURL構築
//!
//! ベースURLと固定APIパスを `/` 1つで連結し、絶対URLとして解釈する。
//! ベースURLが空の場合は相対URLとなり失敗する。

use reqwest::Url;

/// `base` と `path` を連結したAPI URLを返す。
pub fn join_api_url(base: &str, path: &str) -> Result<Url, String> {
    let joined = format!(
        "{}/{}",
        base.trim().trim_end_matches('/'),
        path.trim_start_matches('/')
    );
    let url = Url::parse(&joined).map_err(|e| format!("{joined}: {e}"))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(format!("{joined}: 未対応のスキーム {other}")),
    }
}
