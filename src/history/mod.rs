//! スキャン履歴APIクライアント
//!
//! 状態を持たないリクエスト関数の集まり。コントローラからは
//! `HistoryClient` トレイト越しに使うので、テストでは偽実装に差し替えられる。

pub mod classifier;
pub mod http;

pub use classifier::{Classifier, HttpClassifier};
pub use http::HttpHistoryClient;

use artguard_common::{
    DeleteAck, Error, HistoryPage, RecordPatch, ResultRecord, Result, ScanAnalytics,
};
use async_trait::async_trait;

/// 履歴APIの各エンドポイント
///
/// どの呼び出しもクライアント側の状態を変えず、呼び出し側が個別に再試行できる。
#[async_trait]
pub trait HistoryClient: Send + Sync {
    /// 新しい順に1ページ取得
    async fn list_page(&self, owner_id: &str, limit: usize, offset: usize) -> Result<HistoryPage>;

    /// 説明・ファイル名・ラベルをサーバー側でキーワード検索
    async fn search_page(
        &self,
        owner_id: &str,
        query: &str,
        limit: usize,
        offset: usize,
    ) -> Result<HistoryPage>;

    async fn fetch_one(&self, id: &str, owner_id: &str) -> Result<ResultRecord>;

    /// 削除済みIDは `Error::NotFound`
    async fn delete_one(&self, id: &str, owner_id: &str) -> Result<DeleteAck>;

    /// 全件削除できたときだけ成功。一部だけなら `Error::PartialFailure`
    async fn delete_batch(&self, ids: &[String], owner_id: &str) -> Result<usize>;

    async fn update_one(
        &self,
        id: &str,
        patch: &RecordPatch,
        owner_id: &str,
    ) -> Result<ResultRecord>;

    async fn analytics(&self, owner_id: &str, window_days: u32) -> Result<ScanAnalytics>;
}

/// 短いページが返るまで一覧を辿って全件取得
pub async fn collect_all(
    client: &dyn HistoryClient,
    owner_id: &str,
    batch_size: usize,
) -> Result<Vec<ResultRecord>> {
    if batch_size == 0 {
        return Err(Error::Validation("batch size must be at least 1".into()));
    }

    let mut records = Vec::new();
    loop {
        let page = client.list_page(owner_id, batch_size, records.len()).await?;
        let fetched = page.records.len();
        records.extend(page.records);

        if fetched < batch_size {
            break;
        }
    }

    Ok(records)
}
