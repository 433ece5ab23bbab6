//! # ステージング領域
//!
//! アップロードされたファイルをIPFSへ中継するまで一時保存する。
//!
//! - プロセスごとに一意な一時ディレクトリを1つ作成する
//! - ファイル名は UUID v4 + 元ファイルの拡張子（リクエスト間で衝突しない）
//! - `StagedUpload` はファイルを所有し、dropで削除する
//! - ディレクトリはリスナー停止後に `StagingDir::teardown` で一度だけ削除する

use std::path::{Path, PathBuf};

use tempfile::{TempDir, TempPath};
use tokio::io::AsyncWriteExt;

use crate::error::StagingError;

/// プロセススコープの一時ディレクトリ。
/// 所有権を持つのはライフサイクル管理側のみで、リクエスト処理には
/// `StagingStore` を渡す。
#[derive(Debug)]
pub struct StagingDir {
    dir: TempDir,
}

impl StagingDir {
    /// システムの一時ディレクトリ配下に一意なディレクトリを作成する。
    pub fn init(prefix: &str) -> std::io::Result<Self> {
        let dir = tempfile::Builder::new().prefix(prefix).tempdir()?;
        Ok(Self { dir })
    }

    /// 指定ディレクトリ配下に作成する。
    #[cfg(test)]
    pub fn init_in(parent: &Path, prefix: &str) -> std::io::Result<Self> {
        let dir = tempfile::Builder::new().prefix(prefix).tempdir_in(parent)?;
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// リクエスト処理用のハンドルを返す。
    pub fn store(&self) -> StagingStore {
        StagingStore {
            root: self.dir.path().to_path_buf(),
        }
    }

    /// ディレクトリと中身を再帰的に削除する。
    /// リスナーが新規リクエストの受付を停止した後にのみ呼ぶこと。
    pub fn teardown(self) -> std::io::Result<()> {
        self.dir.close()
    }
}

/// ステージング領域への書き込みハンドル。
#[derive(Debug, Clone)]
pub struct StagingStore {
    root: PathBuf,
}

impl StagingStore {
    /// アップロード内容を新しいファイル名で書き込む。
    ///
    /// 書き込み途中で失敗した場合も、作成済みのファイルは削除される。
    pub async fn stage(
        &self,
        original_filename: &str,
        content: &[u8],
    ) -> Result<StagedUpload, StagingError> {
        if original_filename.is_empty() {
            return Err(StagingError::EmptyFilename);
        }

        let generated_name = format!(
            "{}{}",
            uuid::Uuid::new_v4(),
            file_extension(original_filename)
        );
        let path = self.root.join(&generated_name);
        tracing::debug!(path = %path.display(), "ステージングファイルを保存");

        let write_err = |source| StagingError::Write {
            path: path.display().to_string(),
            source,
        };

        let mut file = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
            .map_err(write_err)?;
        let staged = StagedUpload {
            generated_name,
            path: TempPath::from_path(&path),
        };

        file.write_all(content).await.map_err(write_err)?;
        file.flush().await.map_err(write_err)?;

        Ok(staged)
    }
}

/// ステージング済みのアップロード。dropでファイルを削除する。
#[derive(Debug)]
pub struct StagedUpload {
    generated_name: String,
    path: TempPath,
}

impl StagedUpload {
    /// UUID + 拡張子のファイル名
    pub fn generated_name(&self) -> &str {
        &self.generated_name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// ファイル名の最後の要素から、最後の `.` 以降を拡張子として返す（`.` を含む）。
/// 拡張子がなければ空文字列。
pub fn file_extension(filename: &str) -> &str {
    let base_start = filename.rfind(['/', '\\']).map_or(0, |i| i + 1);
    let base = &filename[base_start..];
    match base.rfind('.') {
        Some(i) => &base[i..],
        None => "",
    }
}
