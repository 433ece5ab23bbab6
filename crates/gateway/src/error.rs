//! # Gateway エラー型
//!
//! 中継先ごとのエラー型と、クライアントに返すエラー型。
//! 詳細な原因はサーバー側でログに残し、クライアントには汎用メッセージのみ返す。

use axum::http::StatusCode;
use axum::Json;
use bulb_types::ErrorResponse;

/// ステージング領域の操作エラー。
#[derive(Debug, thiserror::Error)]
pub enum StagingError {
    /// ファイル名が空
    #[error("ファイル名が空です")]
    EmptyFilename,
    /// ステージングファイルの書き込みに失敗
    #[error("ステージングファイルの書き込みに失敗 ({path}): {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// コンテンツアドレス型ストレージ（IPFS）への中継エラー。
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// ベースURLからAPI URLを構築できない（設定不備）
    #[error("IPFS API URLの構築に失敗: {0}")]
    InvalidUrl(String),
    /// ステージングファイルの読み込みに失敗
    #[error("ステージングファイルの読み込みに失敗: {0}")]
    FileAccess(#[source] std::io::Error),
    /// リクエストを組み立てられない
    #[error("IPFSリクエストの構築に失敗: {0}")]
    Request(String),
    /// IPFSに到達できない
    #[error("IPFSへの接続に失敗: {0}")]
    Unreachable(String),
    /// 呼び出し期限切れ
    #[error("IPFSの応答がタイムアウトしました")]
    Timeout,
    /// レスポンスを解釈できない
    #[error("IPFSレスポンスのパースに失敗 (HTTP {status}): {reason}")]
    InvalidResponse { status: u16, reason: String },
}

/// 追記型データベース（OrbitDB）への中継エラー。
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    /// ベースURLからAPI URLを構築できない（設定不備）
    #[error("OrbitDB API URLの構築に失敗: {0}")]
    InvalidUrl(String),
    /// OrbitDBに到達できない
    #[error("OrbitDBへの接続に失敗: {0}")]
    Unreachable(String),
    /// 呼び出し期限切れ
    #[error("OrbitDBの応答がタイムアウトしました")]
    Timeout,
    /// 200以外のステータス（バックエンドが拒否またはエラー）
    #[error("OrbitDBがエラーを返しました: HTTP {status} - {body}")]
    UnexpectedStatus { status: u16, body: String },
    /// レスポンスを解釈できない
    #[error("OrbitDBレスポンスのパースに失敗: {0}")]
    InvalidResponse(String),
    /// 200だがhashを含まない（バックエンドの契約違反）
    #[error("OrbitDBレスポンスにhashが含まれていません")]
    MissingHash,
}

/// プロセスのライフサイクル（起動・停止）のエラー。いずれも終了コード1となる。
#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    /// ステージングディレクトリを作成できない
    #[error("ステージングディレクトリの作成に失敗: {0}")]
    StagingInit(#[source] std::io::Error),
    /// リスナーのbindに失敗
    #[error("{addr} のbindに失敗: {source}")]
    Bind {
        addr: std::net::SocketAddr,
        #[source]
        source: std::io::Error,
    },
    /// リスナーがシャットダウン要求前に停止
    #[error("リスナーが停止しました: {0}")]
    Listener(String),
    /// 猶予時間内に処理中のリクエストが完了しなかった
    #[error("グレースフルシャットダウンが {0:?} 以内に完了しませんでした")]
    DrainTimeout(std::time::Duration),
    /// ステージングディレクトリの削除に失敗
    #[error("ステージングディレクトリの削除に失敗: {0}")]
    Teardown(#[source] std::io::Error),
}

/// クライアントに返すGatewayエラー型。
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// 不正なリクエスト
    #[error("{0}")]
    BadRequest(&'static str),
    /// リクエストボディが上限を超過
    #[error("Request body too large")]
    PayloadTooLarge,
    /// リクエストヘッダが上限を超過
    #[error("Request headers too large")]
    HeadersTooLarge,
    /// リクエスト全体の処理期限を超過
    #[error("Request timeout")]
    RequestTimeout,
    /// ミドルウェアで発生した想定外のエラー
    #[error("Internal server error")]
    Internal,
    /// ステージングに失敗
    #[error("Unable to save the file")]
    Staging(#[source] StagingError),
    /// IPFSへのピン留めに失敗
    #[error("Failed to pin file to IPFS")]
    Pin(#[source] StorageError),
    /// OrbitDBへの保存に失敗
    #[error("Failed to store in OrbitDB")]
    Store(#[source] DatabaseError),
}

impl GatewayError {
    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::BadRequest(_) => StatusCode::BAD_REQUEST,
            GatewayError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            GatewayError::HeadersTooLarge => StatusCode::REQUEST_HEADER_FIELDS_TOO_LARGE,
            GatewayError::RequestTimeout => StatusCode::REQUEST_TIMEOUT,
            GatewayError::Internal
            | GatewayError::Staging(_) | GatewayError::Pin(_) | GatewayError::Store(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl axum::response::IntoResponse for GatewayError {
    fn into_response(self) -> axum::response::Response {
        // Displayは汎用メッセージのみ。原因はsourceに保持し、検出箇所でログ済み
        let body = ErrorResponse {
            error: self.to_string(),
        };
        (self.status(), Json(body)).into_response()
    }
}
