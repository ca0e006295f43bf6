//! スキャン履歴のリストコントローラ
//!
//! ページング・検索・追記読み込みを行う画面1つにつき1インスタンス。
//! 履歴クライアント・ユーザー解決・分類器は外から注入する。
//!
//! 操作はすべて `&self` の非同期メソッドで、状態は `Mutex` の中に置く。
//! ロックは `.await` をまたいで保持しないので、同じコントローラに対して
//! 複数の操作が同時に進行してよい（古い応答の扱いは `state` を参照）。

mod state;

pub use state::{FetchOutcome, ListState, LoadKind, Mode, Phase};

use crate::history::{Classifier, HistoryClient};
use crate::identity::{Identity, IdentityResolver};
use artguard_common::{
    filter_by_status, normalize_query, Classification, DeleteAck, Error, HistoryPage, RecordPatch,
    ResultRecord, Result, ScanAnalytics, StatusFilter,
};
use state::RequestTag;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

struct Inner {
    state: ListState,
    identity: Option<Identity>,
}

pub struct ListController {
    client: Arc<dyn HistoryClient>,
    resolver: Arc<dyn IdentityResolver>,
    classifier: Arc<dyn Classifier>,
    inner: Mutex<Inner>,
}

impl ListController {
    pub fn new(
        client: Arc<dyn HistoryClient>,
        resolver: Arc<dyn IdentityResolver>,
        classifier: Arc<dyn Classifier>,
        page_size: usize,
    ) -> Self {
        Self {
            client,
            resolver,
            classifier,
            inner: Mutex::new(Inner {
                state: ListState::new(page_size),
                identity: None,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// 現在の状態のコピー
    pub fn snapshot(&self) -> ListState {
        self.lock().state.clone()
    }

    pub fn items(&self) -> Vec<ResultRecord> {
        self.lock().state.items().to_vec()
    }

    /// ステータスで絞り込んだ表示用の items（状態には保存しない）
    pub fn visible_items(&self, filter: &StatusFilter) -> Vec<ResultRecord> {
        filter_by_status(self.lock().state.items(), filter)
            .into_iter()
            .cloned()
            .collect()
    }

    pub fn is_loading(&self) -> bool {
        self.lock().state.is_loading()
    }

    pub fn error(&self) -> Option<Error> {
        self.lock().state.error().cloned()
    }

    pub fn has_more(&self) -> bool {
        self.lock().state.has_more()
    }

    pub fn mode(&self) -> Mode {
        self.lock().state.mode().clone()
    }

    pub fn identity(&self) -> Option<Identity> {
        self.lock().identity.clone()
    }

    fn page_size(&self) -> usize {
        self.lock().state.page_size()
    }

    /// ユーザーを解決して一覧の先頭ページを読み込む
    ///
    /// 未ログインなら `Unauthenticated` で失敗し、items は空のまま。
    /// 再ログイン後に呼び直すまで他の操作は何もしない。
    pub async fn initialize(&self) -> FetchOutcome {
        let epoch = {
            let mut inner = self.lock();
            inner.identity = None;
            inner.state.begin_initialize()
        };

        let resolved = self.resolver.current_identity().await;

        let (owner_id, tag) = {
            let mut inner = self.lock();
            if inner.state.epoch() != epoch {
                debug!("initialize superseded while resolving identity");
                return FetchOutcome::Stale;
            }

            let identity = match resolved {
                Ok(Some(identity)) => identity,
                Ok(None) => {
                    info!("no signed-in user");
                    return inner.state.fail(Error::Unauthenticated);
                }
                Err(e) => {
                    warn!(error = %e, "failed to resolve identity");
                    return inner.state.fail(e);
                }
            };

            let owner_id = identity.user_id.clone();
            inner.identity = Some(identity);
            let tag = RequestTag {
                epoch,
                offset: 0,
                mode: Mode::List,
            };
            (owner_id, tag)
        };

        self.run(&owner_id, tag).await
    }

    /// 現在のモードのまま先頭から取り直す（items は置き換え）
    pub async fn refresh(&self) -> FetchOutcome {
        let (owner_id, tag) = {
            let mut inner = self.lock();
            let Some(owner_id) = inner.identity.as_ref().map(|i| i.user_id.clone()) else {
                debug!("refresh skipped: no identity");
                return FetchOutcome::Skipped;
            };

            let kind = if inner.state.error().is_some() {
                LoadKind::Retry
            } else {
                LoadKind::Refresh
            };
            let mode = inner.state.mode().clone();
            (owner_id, inner.state.begin_reset(mode, kind))
        };

        self.run(&owner_id, tag).await
    }

    /// 検索モードに切り替えて先頭ページを取得
    ///
    /// 空文字（空白のみを含む）は `clear_search()` と同じ。
    pub async fn search(&self, query: &str) -> FetchOutcome {
        let query = match normalize_query(query) {
            Ok(Some(query)) => query,
            Ok(None) => return self.clear_search().await,
            Err(e) => {
                let mut inner = self.lock();
                if inner.identity.is_none() {
                    return FetchOutcome::Skipped;
                }
                warn!(error = %e, "rejected search query");
                // 取得中のリクエストがあれば読み込み状態はそのまま
                if inner.state.is_loading() {
                    return FetchOutcome::Failed(e);
                }
                return inner.state.fail(e);
            }
        };

        let (owner_id, tag) = {
            let mut inner = self.lock();
            let Some(owner_id) = inner.identity.as_ref().map(|i| i.user_id.clone()) else {
                debug!("search skipped: no identity");
                return FetchOutcome::Skipped;
            };

            let tag = inner
                .state
                .begin_reset(Mode::Search { query }, LoadKind::Search);
            (owner_id, tag)
        };

        self.run(&owner_id, tag).await
    }

    /// 一覧モードに戻して先頭ページを取得
    pub async fn clear_search(&self) -> FetchOutcome {
        let (owner_id, tag) = {
            let mut inner = self.lock();
            let Some(owner_id) = inner.identity.as_ref().map(|i| i.user_id.clone()) else {
                debug!("clear_search skipped: no identity");
                return FetchOutcome::Skipped;
            };
            (owner_id, inner.state.begin_reset(Mode::List, LoadKind::Refresh))
        };

        self.run(&owner_id, tag).await
    }

    /// 現在のモードで続きのページを追記
    ///
    /// 読み込み中・続きなし・未ログインのときは何もしない。
    pub async fn load_more(&self) -> FetchOutcome {
        let (owner_id, tag) = {
            let mut inner = self.lock();
            let Some(owner_id) = inner.identity.as_ref().map(|i| i.user_id.clone()) else {
                return FetchOutcome::Skipped;
            };
            match inner.state.begin_load_more() {
                Some(tag) => (owner_id, tag),
                None => {
                    debug!("load_more skipped: loading or no more pages");
                    return FetchOutcome::Skipped;
                }
            }
        };

        self.run(&owner_id, tag).await
    }

    async fn fetch(&self, owner_id: &str, tag: &RequestTag) -> Result<HistoryPage> {
        let limit = self.page_size();
        match &tag.mode {
            Mode::List => self.client.list_page(owner_id, limit, tag.offset).await,
            Mode::Search { query } => {
                self.client
                    .search_page(owner_id, query, limit, tag.offset)
                    .await
            }
        }
    }

    /// タグ付きで取得し、まだ最新なら反映する
    async fn run(&self, owner_id: &str, tag: RequestTag) -> FetchOutcome {
        let result = self.fetch(owner_id, &tag).await;

        let mut inner = self.lock();
        let outcome = match result {
            Ok(page) => inner.state.apply_page(&tag, page),
            Err(e) => inner.state.apply_error(&tag, e),
        };

        match &outcome {
            FetchOutcome::Stale => {
                debug!(epoch = tag.epoch, offset = tag.offset, "dropped stale response")
            }
            FetchOutcome::Failed(e) => warn!(error = %e, offset = tag.offset, "page fetch failed"),
            FetchOutcome::Applied { fetched } => {
                debug!(
                    fetched,
                    cursor = inner.state.cursor(),
                    has_more = inner.state.has_more(),
                    "page applied"
                )
            }
            FetchOutcome::Skipped => {}
        }
        outcome
    }

    /// 再解析して、該当 item の判定結果だけを置き換える
    ///
    /// 失敗はリスト全体のエラーにはせず、呼び出し元に返す。
    pub async fn reanalyze(&self, record: &ResultRecord) -> Result<Classification> {
        let image_url = record
            .image
            .resolve()
            .ok_or_else(|| {
                Error::Validation(format!("scan {} has no image to analyze", record.id))
            })?
            .to_string();

        let classification = self.classifier.classify(&image_url).await?;

        let mut inner = self.lock();
        match inner.state.items_mut().iter_mut().find(|r| r.id == record.id) {
            Some(item) => item.classification = Some(classification.clone()),
            None => debug!(scan_id = %record.id, "reanalyzed scan is no longer listed"),
        }

        Ok(classification)
    }

    /// 一覧を読まずにユーザーだけ解決する（単体操作用）
    pub async fn resolve_identity(&self) -> Result<Identity> {
        let identity = self
            .resolver
            .current_identity()
            .await?
            .ok_or(Error::Unauthenticated)?;
        self.lock().identity = Some(identity.clone());
        Ok(identity)
    }

    fn owner_id(&self) -> Result<String> {
        self.lock()
            .identity
            .as_ref()
            .map(|i| i.user_id.clone())
            .ok_or(Error::Unauthenticated)
    }

    /// 1件取得（リストの状態は変えない）
    pub async fn fetch_one(&self, id: &str) -> Result<ResultRecord> {
        let owner_id = self.owner_id()?;
        self.client.fetch_one(id, &owner_id).await
    }

    /// 1件削除（リストの状態は変えない。再読み込みは呼び出し側が決める）
    pub async fn delete_one(&self, id: &str) -> Result<DeleteAck> {
        let owner_id = self.owner_id()?;
        self.client.delete_one(id, &owner_id).await
    }

    /// 一括削除（一部だけ削除された場合は `PartialFailure`）
    pub async fn delete_batch(&self, ids: &[String]) -> Result<usize> {
        let owner_id = self.owner_id()?;
        self.client.delete_batch(ids, &owner_id).await
    }

    pub async fn update_one(&self, id: &str, patch: &RecordPatch) -> Result<ResultRecord> {
        let owner_id = self.owner_id()?;
        self.client.update_one(id, patch, &owner_id).await
    }

    pub async fn analytics(&self, window_days: u32) -> Result<ScanAnalytics> {
        let owner_id = self.owner_id()?;
        self.client.analytics(&owner_id, window_days).await
    }
}
