use thiserror::Error;

#[derive(Error, Debug)]
pub enum ArtguardError {
    #[error("設定エラー: {0}")]
    Config(String),

    #[error("ユーザーIDが設定されていません。`artguard config --set-user-id YOUR_ID` で設定してください")]
    MissingUserId,

    #[error("スキャンが見つかりません: {0}")]
    ScanNotFound(String),

    #[error("JSON解析エラー: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("IOエラー: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTPクライアント初期化エラー: {0}")]
    HttpClient(String),

    #[error("入力エラー: {0}")]
    Prompt(String),

    #[error(transparent)]
    History(#[from] artguard_common::Error),
}

pub type Result<T> = std::result::Result<T, ArtguardError>;
