//! # テスト用共通ヘルパー
//!
//! IPFS Kubo / OrbitDBサービスを模したスタブサーバー群。
//! 呼び出し回数と受信内容を記録する。

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::Multipart;
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;

/// 起動済みスタブサーバー。
#[derive(Clone, Default)]
pub struct StubBackend {
    pub port: u16,
    /// 受信したリクエスト数
    pub calls: Arc<AtomicUsize>,
    /// 受信したリクエストボディ（生バイト列）
    pub bodies: Arc<Mutex<Vec<Vec<u8>>>>,
    /// 受信したContent-Type
    pub content_types: Arc<Mutex<Vec<String>>>,
    /// multipartの `file` フィールド（ファイル名, 内容）
    pub received: Arc<Mutex<Vec<(String, Vec<u8>)>>>,
    /// multipartの `file` フィールドのContent-Type
    pub part_content_types: Arc<Mutex<Vec<String>>>,
}

impl StubBackend {
    pub fn base_url(&self) -> String {
        format!("http://127.0.0.1:{}", self.port)
    }

    /// 受信したボディをJSONとして返す。
    pub fn json_bodies(&self) -> Vec<serde_json::Value> {
        self.bodies
            .lock()
            .unwrap()
            .iter()
            .map(|b| serde_json::from_slice(b).unwrap())
            .collect()
    }
}

async fn serve_stub(app: axum::Router, mut stub: StubBackend) -> StubBackend {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    stub.port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    tokio::time::sleep(Duration::from_millis(50)).await;
    stub
}

/// 指定パスへのPOSTに、`delay` 待ってから指定ステータスとJSONを返すスタブを起動する。
pub async fn start_stub_server(
    path: &str,
    delay: Duration,
    status: u16,
    reply: serde_json::Value,
) -> StubBackend {
    let stub = StubBackend::default();
    let recorder = stub.clone();

    let app = axum::Router::new().route(
        path,
        axum::routing::post(move |headers: HeaderMap, body: Bytes| {
            let recorder = recorder.clone();
            let reply = reply.clone();
            async move {
                recorder.calls.fetch_add(1, Ordering::SeqCst);
                recorder.bodies.lock().unwrap().push(body.to_vec());
                if let Some(ct) = headers.get(axum::http::header::CONTENT_TYPE) {
                    recorder
                        .content_types
                        .lock()
                        .unwrap()
                        .push(ct.to_str().unwrap_or_default().to_string());
                }
                tokio::time::sleep(delay).await;
                let status = StatusCode::from_u16(status).unwrap();
                (status, axum::Json(reply))
            }
        }),
    );

    serve_stub(app, stub).await
}

/// Kuboスタブの応答内容。
#[derive(Clone, Copy)]
pub enum KuboReply {
    /// 200 + 指定Hash
    Hash(&'static str),
    /// 指定時間待ってから 200 + 指定Hash
    Delayed(Duration, &'static str),
    /// 指定ステータス + 任意のテキスト
    Raw(u16, &'static str),
}

/// multipartの `file` フィールドを受け取るKubo `/api/v0/add` スタブを起動する。
pub async fn start_stub_kubo(reply: KuboReply) -> StubBackend {
    let stub = StubBackend::default();
    let recorder = stub.clone();

    let app = axum::Router::new().route(
        "/api/v0/add",
        axum::routing::post(move |mut multipart: Multipart| {
            let recorder = recorder.clone();
            async move {
                recorder.calls.fetch_add(1, Ordering::SeqCst);
                let mut name = String::new();
                let mut size = 0;
                while let Some(field) = multipart.next_field().await.unwrap() {
                    if field.name() != Some("file") {
                        continue;
                    }
                    name = field.file_name().unwrap_or_default().to_string();
                    recorder
                        .part_content_types
                        .lock()
                        .unwrap()
                        .push(field.content_type().unwrap_or_default().to_string());
                    let data = field.bytes().await.unwrap().to_vec();
                    size = data.len();
                    recorder.received.lock().unwrap().push((name.clone(), data));
                }

                let hash = match reply {
                    KuboReply::Hash(hash) => hash,
                    KuboReply::Delayed(delay, hash) => {
                        tokio::time::sleep(delay).await;
                        hash
                    }
                    KuboReply::Raw(status, text) => {
                        let status = StatusCode::from_u16(status).unwrap();
                        return (status, text).into_response();
                    }
                };
                axum::Json(serde_json::json!({
                    "Name": name,
                    "Hash": hash,
                    "Size": size.to_string(),
                }))
                .into_response()
            }
        }),
    );

    serve_stub(app, stub).await
}

/// テスト用に起動したGateway。
pub struct TestGateway {
    pub base_url: String,
    pub staging_path: std::path::PathBuf,
    /// 送信するとシャットダウンを開始する
    pub shutdown: tokio::sync::oneshot::Sender<()>,
    pub handle: tokio::task::JoinHandle<Result<(), crate::error::LifecycleError>>,
}

/// 指定設定でGatewayをbindし、バックグラウンドで受付を開始する。
pub async fn start_gateway(config: crate::config::GatewayConfig) -> TestGateway {
    let gateway = crate::server::Gateway::bind(config).await.unwrap();
    let port = gateway.local_addr().unwrap().port();
    let staging_path = gateway.staging_path().to_path_buf();

    let (shutdown, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
    let handle = tokio::spawn(gateway.run(async move {
        let _ = shutdown_rx.await;
    }));
    tokio::time::sleep(Duration::from_millis(50)).await;

    TestGateway {
        base_url: format!("http://127.0.0.1:{port}"),
        staging_path,
        shutdown,
        handle,
    }
}
