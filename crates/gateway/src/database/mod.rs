//! # 追記型データベース
//!
//! 投稿レコードをデータベースバックエンドへ中継するための抽象インターフェース。
//! OrbitDBサービス実装は `orbitdb` サブモジュールを参照。

pub mod orbitdb;

pub use orbitdb::OrbitDbDatabase;

use bulb_types::{DatabaseReceipt, Post};

use crate::error::DatabaseError;

/// 追記型データベースの抽象インターフェース。
///
/// 呼び出しは1回のみ試行し、再試行しない。重複排除キーを持たないため、
/// 同一内容を2回保存すると別々のレコードになる。
#[async_trait::async_trait]
pub trait PostDatabase: Send + Sync {
    /// 投稿を保存し、バックエンドが割り当てたhashとDBアドレスを返す。
    async fn store(&self, post: &Post) -> Result<DatabaseReceipt, DatabaseError>;
}
