//! エラー型定義
//!
//! 履歴APIクライアントとリストコントローラで共有するエラー分類。
//! コントローラが状態として保持するため `Clone + PartialEq` を実装する。

use thiserror::Error;

/// 共通エラー型
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// ログインユーザーが解決できない
    #[error("Not signed in: sign in to view your scan history")]
    Unauthenticated,

    /// 通信失敗・タイムアウト
    #[error("Network error: {0}")]
    Network(String),

    /// ユーザーID / APIキーが拒否された
    #[error("Authorization rejected: {0}")]
    Auth(String),

    #[error("Server error ({status}): {message}")]
    Server { status: u16, message: String },

    #[error("Not found: {0}")]
    NotFound(String),

    /// 一括削除で要求件数より少ない件数しか削除されなかった
    #[error("Partial failure: deleted {deleted} of {requested} scans")]
    PartialFailure { requested: usize, deleted: usize },

    #[error("Validation error: {0}")]
    Validation(String),

    /// レスポンスボディが解釈できない
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl Error {
    /// ユーザー操作による再試行で回復しうるか
    ///
    /// `Unauthenticated` は再ログイン後の `initialize()` まで回復しない。
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Network(_) | Error::Server { .. } | Error::InvalidResponse(_))
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::InvalidResponse(e.to_string())
    }
}

/// Result型エイリアス
pub type Result<T> = std::result::Result<T, Error>;
