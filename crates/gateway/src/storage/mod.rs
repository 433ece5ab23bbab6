//! # コンテンツアドレス型ストレージ
//!
//! ステージング済みファイルをストレージバックエンドへ中継し、CIDを得るための
//! 抽象インターフェース。IPFS Kubo RPC API実装は `kubo` サブモジュールを参照。

pub mod kubo;

pub use kubo::KuboStorage;

use crate::error::StorageError;
use crate::staging::StagedUpload;

/// コンテンツアドレス型ストレージの抽象インターフェース。
///
/// 呼び出しは1回のみ試行し、再試行しない。
#[async_trait::async_trait]
pub trait StorageBackend: Send + Sync {
    /// ステージング済みファイルをアップロードし、CIDを返す。
    async fn pin(&self, staged: &StagedUpload) -> Result<String, StorageError>;
}
