//! # ライフサイクル管理
//!
//! `Starting → Serving → Draining → Stopped`
//!
//! 1. Starting: ステージングディレクトリ作成、中継クライアント構築、リスナーbind
//! 2. Serving: シャットダウン要求かリスナー停止のいずれか先に完了するまで受付
//! 3. Draining: 新規受付を停止し、処理中リクエストの完了を猶予時間まで待つ
//! 4. Stopped: リスナー停止後にステージングディレクトリを削除
//!
//! Draining/Stoppedのいずれかで失敗した場合は `LifecycleError` を返し、終了コード1となる。

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::error_handling::HandleErrorLayer;
use axum::extract::DefaultBodyLimit;
use axum::routing::post;
use axum::{BoxError, Router};
use hyper::server::conn::http1;
use hyper_util::rt::{TokioIo, TokioTimer};
use hyper_util::server::graceful::GracefulShutdown;
use hyper_util::service::TowerToHyperService;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tower::timeout::error::Elapsed;
use tower::timeout::TimeoutLayer;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::config::{GatewayConfig, GatewayState, STAGING_PREFIX};
use crate::database::OrbitDbDatabase;
use crate::endpoints::{handle_create_post, handle_upload_pic};
use crate::error::{GatewayError, LifecycleError};
use crate::middleware::limit_header_size;
use crate::staging::StagingDir;
use crate::storage::KuboStorage;

/// ヘッダ上限に加えて読み込みバッファに確保する余裕。
/// 上限をわずかに超えるヘッダはミドルウェアまで届き、JSONの431になる
const HEADER_BUFFER_SLACK: usize = 64 * 1024;

/// hyperが受け付ける読み込みバッファの最小値
const MIN_READ_BUFFER: usize = 8 * 1024;

/// ルーターを構築する。
pub fn build_router(state: Arc<GatewayState>, config: &GatewayConfig) -> Router {
    Router::new()
        .route("/api/v0/upload-pic", post(handle_upload_pic))
        .route("/api/v0/create-post", post(handle_create_post))
        .layer(DefaultBodyLimit::max(config.max_upload_bytes))
        .layer(
            ServiceBuilder::new()
                .layer(HandleErrorLayer::new(handle_middleware_error))
                .layer(TimeoutLayer::new(config.request_timeout)),
        )
        .layer(axum::middleware::from_fn_with_state(
            config.max_header_bytes,
            limit_header_size,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn handle_middleware_error(err: BoxError) -> GatewayError {
    if err.is::<Elapsed>() {
        tracing::warn!("リクエストが処理期限を超過しました");
        GatewayError::RequestTimeout
    } else {
        tracing::error!(error = %err, "ミドルウェアでエラーが発生");
        GatewayError::Internal
    }
}

/// ヘッダ上限から接続の読み込みバッファ上限を決める。
fn read_buffer_size(max_header_bytes: usize) -> usize {
    max_header_bytes
        .saturating_add(HEADER_BUFFER_SLACK)
        .max(MIN_READ_BUFFER)
}

/// 接続単位のHTTP/1.1設定。
fn connection_builder(config: &GatewayConfig) -> http1::Builder {
    let mut builder = http1::Builder::new();
    builder
        .timer(TokioTimer::new())
        .header_read_timeout(config.request_timeout)
        .max_buf_size(read_buffer_size(config.max_header_bytes));
    builder
}

/// 個別の接続で発生し、受付を継続できるエラー
fn is_connection_error(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::ConnectionRefused
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionReset
    )
}

/// 受付ループ。`drain` を受けると新規受付を止め、処理中の接続の完了を待つ。
/// 受付自体が失敗した場合はエラーを返す。
async fn serve_connections(
    listener: TcpListener,
    app: Router,
    builder: http1::Builder,
    mut drain: oneshot::Receiver<()>,
) -> io::Result<()> {
    let graceful = GracefulShutdown::new();

    loop {
        let (stream, remote) = tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok(accepted) => accepted,
                Err(e) if is_connection_error(&e) => {
                    tracing::debug!(error = %e, "接続の受付に失敗");
                    continue;
                }
                Err(e) => return Err(e),
            },
            _ = &mut drain => break,
        };

        let service = TowerToHyperService::new(app.clone());
        let connection = graceful.watch(builder.serve_connection(TokioIo::new(stream), service));
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::debug!(%remote, error = %e, "接続を終了");
            }
        });
    }

    drop(listener);
    graceful.shutdown().await;
    Ok(())
}

/// 起動済み（bind済み）のGateway。
pub struct Gateway {
    config: GatewayConfig,
    staging: StagingDir,
    listener: TcpListener,
    app: Router,
}

impl Gateway {
    /// システムの一時ディレクトリにステージング領域を作成して起動する。
    pub async fn bind(config: GatewayConfig) -> Result<Self, LifecycleError> {
        let staging = StagingDir::init(STAGING_PREFIX).map_err(LifecycleError::StagingInit)?;
        Self::bind_with_staging(config, staging).await
    }

    /// 作成済みのステージング領域で起動する。
    /// bindに失敗した場合はステージング領域を削除してからエラーを返す。
    pub async fn bind_with_staging(
        config: GatewayConfig,
        staging: StagingDir,
    ) -> Result<Self, LifecycleError> {
        tracing::info!(path = %staging.path().display(), "ステージングディレクトリを作成しました");

        let http_client = reqwest::Client::new();
        let state = Arc::new(GatewayState {
            staging: staging.store(),
            storage: Box::new(KuboStorage::new(
                http_client.clone(),
                config.ipfs_api_url.clone(),
                config.backend_timeout,
            )),
            database: Box::new(OrbitDbDatabase::new(
                http_client,
                config.orbitdb_api_url.clone(),
                config.backend_timeout,
            )),
        });
        let app = build_router(state, &config);

        let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
        let listener = match TcpListener::bind(addr).await {
            Ok(listener) => listener,
            Err(source) => {
                if let Err(e) = staging.teardown() {
                    tracing::error!(error = %e, "ステージングディレクトリの削除に失敗");
                }
                return Err(LifecycleError::Bind { addr, source });
            }
        };

        Ok(Self {
            config,
            staging,
            listener,
            app,
        })
    }

    #[cfg(test)]
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    #[cfg(test)]
    pub fn staging_path(&self) -> &std::path::Path {
        self.staging.path()
    }

    /// `shutdown` が完了するかリスナーが停止するまで受付を続け、
    /// グレースフルシャットダウンとステージング領域の削除を行う。
    pub async fn run<F>(self, shutdown: F) -> Result<(), LifecycleError>
    where
        F: Future<Output = ()>,
    {
        let Gateway {
            config,
            staging,
            listener,
            app,
        } = self;

        if let Ok(addr) = listener.local_addr() {
            tracing::info!(%addr, "Gatewayを起動しました");
        }

        let (drain_tx, drain_rx) = oneshot::channel::<()>();
        let server = tokio::spawn(serve_connections(
            listener,
            app,
            connection_builder(&config),
            drain_rx,
        ));

        supervise(server, drain_tx, shutdown, config.shutdown_grace, staging).await
    }
}

/// 受付タスクとシャットダウン要求の先着を待ち、停止処理とステージング領域の削除を行う。
async fn supervise<F>(
    mut server: JoinHandle<io::Result<()>>,
    drain: oneshot::Sender<()>,
    shutdown: F,
    grace: Duration,
    staging: StagingDir,
) -> Result<(), LifecycleError>
where
    F: Future<Output = ()>,
{
    // 後着側は破棄する
    let stopped_early = tokio::select! {
        _ = shutdown => None,
        result = &mut server => Some(result),
    };

    let outcome = match stopped_early {
        Some(result) => {
            let reason = match result {
                Ok(Ok(())) => "予期せず終了".to_string(),
                Ok(Err(e)) => e.to_string(),
                Err(e) => e.to_string(),
            };
            Err(LifecycleError::Listener(reason))
        }
        None => {
            tracing::info!(?grace, "シャットダウンを開始します");
            let _ = drain.send(());
            match tokio::time::timeout(grace, &mut server).await {
                Ok(Ok(Ok(()))) => {
                    tracing::info!("Gatewayを停止しました");
                    Ok(())
                }
                Ok(Ok(Err(e))) => Err(LifecycleError::Listener(e.to_string())),
                Ok(Err(e)) => Err(LifecycleError::Listener(e.to_string())),
                Err(_) => {
                    server.abort();
                    Err(LifecycleError::DrainTimeout(grace))
                }
            }
        }
    };
    if let Err(e) = &outcome {
        tracing::error!(error = %e, "Gatewayの停止処理に失敗");
    }

    // リスナー停止後にのみ削除する
    let staging_path = staging.path().to_path_buf();
    let teardown = staging.teardown().map_err(|e| {
        tracing::error!(path = %staging_path.display(), error = %e, "ステージングディレクトリの削除に失敗");
        LifecycleError::Teardown(e)
    });
    if teardown.is_ok() {
        tracing::info!(path = %staging_path.display(), "ステージングディレクトリを削除しました");
    }

    outcome.and(teardown)
}

/// SIGINT（Ctrl+C）またはSIGTERMで完了する。
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Ctrl+Cハンドラの登録に失敗");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "SIGTERMハンドラの登録に失敗");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("SIGINTを受信しました"),
        _ = terminate => tracing::info!("SIGTERMを受信しました"),
    }
}
