//! 現在のユーザーの解決
//!
//! ログインやセッション管理そのものは外部の認証基盤の役割で、
//! ここでは「いま誰として操作しているか」だけを問い合わせる。

use crate::config::Config;
use artguard_common::Result;
use async_trait::async_trait;

/// 操作ユーザー
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: String,
}

impl Identity {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self { user_id: user_id.into() }
    }
}

/// 現在のユーザーを解決する
///
/// 未ログインは `Ok(None)`、セッション取得自体の失敗は `Err`。
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    async fn current_identity(&self) -> Result<Option<Identity>>;
}

/// 設定ファイル / 環境変数のユーザーIDを使う
#[derive(Debug, Clone, Default)]
pub struct ConfiguredIdentity {
    user_id: Option<String>,
}

impl ConfiguredIdentity {
    pub fn new(user_id: Option<String>) -> Self {
        Self { user_id }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.user_id.clone())
    }
}

#[async_trait]
impl IdentityResolver for ConfiguredIdentity {
    async fn current_identity(&self) -> Result<Option<Identity>> {
        Ok(self
            .user_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(Identity::new))
    }
}
