//! リストコントローラの結合テスト
//!
//! 履歴クライアント・ユーザー解決・分類器を台本どおりに応答する偽実装に差し替え、
//! ページング・検索・古い応答の破棄を検証する

use artguard::controller::{FetchOutcome, ListController, Mode};
use artguard::history::{Classifier, HistoryClient};
use artguard::identity::{Identity, IdentityResolver};
use artguard_common::{
    Classification, DeleteAck, Error, HistoryPage, RecordPatch, ResultRecord, Result,
    ScanAnalytics, ScanStatus, StatusFilter,
};
use async_trait::async_trait;
use serde_json::json;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

#[derive(Debug, Clone, PartialEq)]
enum Call {
    List { offset: usize, limit: usize },
    Search { query: String, offset: usize },
}

struct Scripted {
    result: Result<HistoryPage>,
    gate: Option<Arc<Notify>>,
}

#[derive(Default)]
struct FakeHistory {
    calls: Mutex<Vec<Call>>,
    pages: Mutex<VecDeque<Scripted>>,
    batch_result: Mutex<Option<Result<usize>>>,
}

impl FakeHistory {
    fn push(&self, result: Result<HistoryPage>) {
        self.pages.lock().unwrap().push_back(Scripted { result, gate: None });
    }

    /// `gate` が通知されるまで応答を返さない
    fn push_gated(&self, result: Result<HistoryPage>, gate: Arc<Notify>) {
        self.pages.lock().unwrap().push_back(Scripted {
            result,
            gate: Some(gate),
        });
    }

    fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    async fn respond(&self, call: Call) -> Result<HistoryPage> {
        self.calls.lock().unwrap().push(call.clone());
        let scripted = self
            .pages
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| panic!("台本にない呼び出し: {:?}", call));
        if let Some(gate) = scripted.gate {
            gate.notified().await;
        }
        scripted.result
    }
}

#[async_trait]
impl HistoryClient for FakeHistory {
    async fn list_page(&self, _owner_id: &str, limit: usize, offset: usize) -> Result<HistoryPage> {
        self.respond(Call::List { offset, limit }).await
    }

    async fn search_page(
        &self,
        _owner_id: &str,
        query: &str,
        _limit: usize,
        offset: usize,
    ) -> Result<HistoryPage> {
        self.respond(Call::Search {
            query: query.to_string(),
            offset,
        })
        .await
    }

    async fn fetch_one(&self, id: &str, owner_id: &str) -> Result<ResultRecord> {
        Ok(record(id, owner_id))
    }

    async fn delete_one(&self, id: &str, _owner_id: &str) -> Result<DeleteAck> {
        Ok(DeleteAck {
            deleted_id: id.to_string(),
            message: "deleted".to_string(),
        })
    }

    async fn delete_batch(&self, ids: &[String], _owner_id: &str) -> Result<usize> {
        self.batch_result
            .lock()
            .unwrap()
            .take()
            .unwrap_or(Ok(ids.len()))
    }

    async fn update_one(
        &self,
        id: &str,
        _patch: &RecordPatch,
        owner_id: &str,
    ) -> Result<ResultRecord> {
        Ok(record(id, owner_id))
    }

    async fn analytics(&self, _owner_id: &str, window_days: u32) -> Result<ScanAnalytics> {
        Ok(ScanAnalytics {
            period_days: window_days,
            ..Default::default()
        })
    }
}

struct FakeIdentity(Result<Option<Identity>>);

#[async_trait]
impl IdentityResolver for FakeIdentity {
    async fn current_identity(&self) -> Result<Option<Identity>> {
        self.0.clone()
    }
}

struct FakeClassifier(Result<Classification>);

#[async_trait]
impl Classifier for FakeClassifier {
    async fn classify(&self, _image_url: &str) -> Result<Classification> {
        self.0.clone()
    }
}

fn record(id: &str, owner_id: &str) -> ResultRecord {
    serde_json::from_value(json!({
        "id": id,
        "user_id": owner_id,
        "artwork_url": format!("https://cdn.example.com/{}.jpg", id),
        "result": {"label": "Handmade", "confidence": 0.9},
        "status": "completed",
    }))
    .unwrap()
}

fn page(prefix: &str, n: usize) -> Result<HistoryPage> {
    Ok(HistoryPage {
        records: (0..n).map(|i| record(&format!("{}-{}", prefix, i), "u1")).collect(),
        total_count: None,
    })
}

fn signed_in() -> FakeIdentity {
    FakeIdentity(Ok(Some(Identity::new("u1"))))
}

fn controller_with(
    history: Arc<FakeHistory>,
    identity: FakeIdentity,
    classifier: FakeClassifier,
    page_size: usize,
) -> ListController {
    ListController::new(history, Arc::new(identity), Arc::new(classifier), page_size)
}

fn controller(history: Arc<FakeHistory>, page_size: usize) -> ListController {
    controller_with(
        history,
        signed_in(),
        FakeClassifier(Err(Error::Network("classifier unused".into()))),
        page_size,
    )
}

fn ids(controller: &ListController) -> Vec<String> {
    controller.items().into_iter().map(|r| r.id).collect()
}

/// 50件 + 30件で末尾に到達
#[tokio::test]
async fn test_initialize_then_load_more_reaches_end() {
    let history = Arc::new(FakeHistory::default());
    history.push(page("a", 50));
    history.push(page("b", 30));
    let controller = controller(history.clone(), 50);

    assert_eq!(controller.initialize().await, FetchOutcome::Applied { fetched: 50 });
    assert!(controller.has_more());

    assert_eq!(controller.load_more().await, FetchOutcome::Applied { fetched: 30 });

    let state = controller.snapshot();
    assert_eq!(state.items().len(), 80);
    assert_eq!(state.cursor(), 80);
    assert!(!state.has_more());
    assert!(!state.is_loading());
    assert_eq!(state.items()[0].id, "a-0");
    assert_eq!(state.items()[79].id, "b-29");

    assert_eq!(
        history.calls(),
        vec![
            Call::List { offset: 0, limit: 50 },
            Call::List { offset: 50, limit: 50 },
        ]
    );

    // 末尾に到達したら何もしない
    assert_eq!(controller.load_more().await, FetchOutcome::Skipped);
    assert_eq!(history.calls().len(), 2);
}

/// 検索で items を置き換え、解除で一覧に戻る
#[tokio::test]
async fn test_search_then_clear() {
    let history = Arc::new(FakeHistory::default());
    history.push(page("list", 5));
    history.push(page("sunset", 3));
    history.push(page("list", 5));
    let controller = controller(history.clone(), 5);

    controller.initialize().await;
    assert_eq!(controller.search("sunset").await, FetchOutcome::Applied { fetched: 3 });
    assert_eq!(controller.mode(), Mode::Search { query: "sunset".into() });
    assert_eq!(ids(&controller), vec!["sunset-0", "sunset-1", "sunset-2"]);
    assert!(!controller.has_more());

    assert_eq!(controller.clear_search().await, FetchOutcome::Applied { fetched: 5 });
    assert_eq!(controller.mode(), Mode::List);
    assert_eq!(controller.items().len(), 5);

    assert_eq!(
        history.calls()[1..],
        [
            Call::Search { query: "sunset".into(), offset: 0 },
            Call::List { offset: 0, limit: 5 },
        ]
    );
}

/// 空白だけの検索は検索解除と同じ
#[tokio::test]
async fn test_blank_search_clears_search() {
    let history = Arc::new(FakeHistory::default());
    history.push(page("list", 2));
    history.push(page("q", 1));
    history.push(page("list", 2));
    let controller = controller(history.clone(), 5);

    controller.initialize().await;
    controller.search("q").await;
    controller.search("   ").await;

    assert_eq!(controller.mode(), Mode::List);
    assert_eq!(history.calls().last(), Some(&Call::List { offset: 0, limit: 5 }));
    assert_eq!(controller.items().len(), 2);
}

/// 検索語は前後の空白を除いて送る
#[tokio::test]
async fn test_search_query_is_trimmed() {
    let history = Arc::new(FakeHistory::default());
    history.push(page("list", 1));
    history.push(page("q", 1));
    let controller = controller(history.clone(), 5);

    controller.initialize().await;
    controller.search("  sunset  ").await;

    assert_eq!(
        history.calls().last(),
        Some(&Call::Search { query: "sunset".into(), offset: 0 })
    );
}

/// 検索モードの続き読み込みは同じ検索語で行う
#[tokio::test]
async fn test_load_more_in_search_mode() {
    let history = Arc::new(FakeHistory::default());
    history.push(page("list", 2));
    history.push(page("s", 2));
    history.push(page("t", 1));
    let controller = controller(history.clone(), 2);

    controller.initialize().await;
    controller.search("sunset").await;
    assert_eq!(controller.load_more().await, FetchOutcome::Applied { fetched: 1 });

    assert_eq!(
        history.calls().last(),
        Some(&Call::Search { query: "sunset".into(), offset: 2 })
    );
    assert_eq!(ids(&controller), vec!["s-0", "s-1", "t-0"]);
}

/// 不正な検索語はリクエストを出さずにエラー
#[tokio::test]
async fn test_malformed_query_fails_without_request() {
    let history = Arc::new(FakeHistory::default());
    history.push(page("list", 2));
    let controller = controller(history.clone(), 5);

    controller.initialize().await;
    let outcome = controller.search(&"x".repeat(1000)).await;

    assert!(matches!(outcome, FetchOutcome::Failed(Error::Validation(_))));
    assert!(matches!(controller.error(), Some(Error::Validation(_))));
    assert_eq!(history.calls().len(), 1);
}

/// ちょうど page_size 件のときだけ続きあり
#[tokio::test]
async fn test_has_more_follows_page_length() {
    for (n, expected) in [(0, false), (1, false), (3, false), (4, true)] {
        let history = Arc::new(FakeHistory::default());
        history.push(page("a", n));
        let controller = controller(history, 4);

        controller.initialize().await;
        assert_eq!(controller.has_more(), expected, "{}件", n);
    }
}

/// 読み込み中の load_more は重複して発行しない
#[tokio::test]
async fn test_concurrent_load_more_issues_single_request() {
    let history = Arc::new(FakeHistory::default());
    let gate = Arc::new(Notify::new());
    history.push(page("a", 2));
    history.push_gated(page("b", 2), gate.clone());
    let controller = controller(history.clone(), 2);

    controller.initialize().await;

    let (first, second) = tokio::join!(controller.load_more(), async {
        let outcome = controller.load_more().await;
        assert!(controller.is_loading());
        gate.notify_one();
        outcome
    });

    assert_eq!(first, FetchOutcome::Applied { fetched: 2 });
    assert_eq!(second, FetchOutcome::Skipped);
    assert_eq!(history.calls().len(), 2);
    assert_eq!(controller.items().len(), 4);
}

/// 続きの読み込み中に不正な検索語を渡しても、読み込み中のまま重複取得しない
#[tokio::test]
async fn test_rejected_query_during_load_more_keeps_guard() {
    let history = Arc::new(FakeHistory::default());
    let gate = Arc::new(Notify::new());
    history.push(page("a", 2));
    history.push_gated(page("b", 2), gate.clone());
    let controller = controller(history.clone(), 2);

    controller.initialize().await;

    let (first, (rejected, second)) = tokio::join!(controller.load_more(), async {
        let rejected = controller.search("sun\u{0}set").await;
        assert!(controller.is_loading());
        let second = controller.load_more().await;
        gate.notify_one();
        (rejected, second)
    });

    assert!(matches!(rejected, FetchOutcome::Failed(Error::Validation(_))));
    assert_eq!(second, FetchOutcome::Skipped);
    assert_eq!(first, FetchOutcome::Applied { fetched: 2 });
    assert_eq!(
        history.calls(),
        vec![
            Call::List { offset: 0, limit: 2 },
            Call::List { offset: 2, limit: 2 },
        ]
    );
    assert_eq!(controller.items().len(), 4);
    assert_eq!(controller.mode(), Mode::List);
}

/// 後から出した検索の結果が残り、先の検索の遅い応答は捨てる
#[tokio::test]
async fn test_stale_search_response_is_dropped() {
    let history = Arc::new(FakeHistory::default());
    let gate = Arc::new(Notify::new());
    history.push(page("list", 2));
    history.push_gated(page("q1", 3), gate.clone());
    history.push(page("q2", 1));
    let controller = controller(history.clone(), 5);

    controller.initialize().await;

    let (first, second) = tokio::join!(controller.search("q1"), async {
        let outcome = controller.search("q2").await;
        gate.notify_one();
        outcome
    });

    assert_eq!(first, FetchOutcome::Stale);
    assert_eq!(second, FetchOutcome::Applied { fetched: 1 });
    assert_eq!(controller.mode(), Mode::Search { query: "q2".into() });
    assert_eq!(ids(&controller), vec!["q2-0"]);
    assert!(!controller.is_loading());
}

/// 検索中に遅れて届いた一覧の続きは混ぜない
#[tokio::test]
async fn test_stale_load_more_after_mode_switch() {
    let history = Arc::new(FakeHistory::default());
    let gate = Arc::new(Notify::new());
    history.push(page("list", 2));
    history.push_gated(page("more", 2), gate.clone());
    history.push(page("s", 1));
    let controller = controller(history.clone(), 2);

    controller.initialize().await;

    let (more, search) = tokio::join!(controller.load_more(), async {
        let outcome = controller.search("sunset").await;
        gate.notify_one();
        outcome
    });

    assert_eq!(more, FetchOutcome::Stale);
    assert_eq!(search, FetchOutcome::Applied { fetched: 1 });
    assert_eq!(ids(&controller), vec!["s-0"]);
}

/// 再読み込みの失敗では items を残し、次の成功でエラーが消える
#[tokio::test]
async fn test_failed_refresh_keeps_items() {
    let history = Arc::new(FakeHistory::default());
    history.push(page("a", 2));
    history.push(Err(Error::Network("connection reset".into())));
    history.push(page("b", 1));
    let controller = controller(history.clone(), 2);

    controller.initialize().await;
    let outcome = controller.refresh().await;

    assert_eq!(outcome, FetchOutcome::Failed(Error::Network("connection reset".into())));
    assert_eq!(ids(&controller), vec!["a-0", "a-1"]);
    assert_eq!(controller.error(), Some(Error::Network("connection reset".into())));
    assert!(!controller.is_loading());

    assert_eq!(controller.refresh().await, FetchOutcome::Applied { fetched: 1 });
    assert_eq!(controller.error(), None);
    assert_eq!(ids(&controller), vec!["b-0"]);
}

/// 続きの読み込み失敗でも既存の items とカーソルは変わらない
#[tokio::test]
async fn test_failed_load_more_keeps_cursor() {
    let history = Arc::new(FakeHistory::default());
    history.push(page("a", 2));
    history.push(Err(Error::Server { status: 500, message: "boom".into() }));
    history.push(page("b", 1));
    let controller = controller(history.clone(), 2);

    controller.initialize().await;
    assert!(matches!(controller.load_more().await, FetchOutcome::Failed(_)));
    assert_eq!(controller.snapshot().cursor(), 2);
    assert!(controller.has_more());

    // 同じオフセットで再試行できる
    assert_eq!(controller.load_more().await, FetchOutcome::Applied { fetched: 1 });
    assert_eq!(history.calls().last(), Some(&Call::List { offset: 2, limit: 2 }));
    assert_eq!(controller.items().len(), 3);
}

/// 未ログインでは何も取得しない
#[tokio::test]
async fn test_unauthenticated_is_noop() {
    let history = Arc::new(FakeHistory::default());
    let controller = controller_with(
        history.clone(),
        FakeIdentity(Ok(None)),
        FakeClassifier(Err(Error::Network("unused".into()))),
        5,
    );

    assert_eq!(controller.initialize().await, FetchOutcome::Failed(Error::Unauthenticated));
    assert_eq!(controller.error(), Some(Error::Unauthenticated));
    assert!(controller.items().is_empty());

    assert_eq!(controller.load_more().await, FetchOutcome::Skipped);
    assert_eq!(controller.refresh().await, FetchOutcome::Skipped);
    assert_eq!(controller.search("sunset").await, FetchOutcome::Skipped);
    assert_eq!(controller.clear_search().await, FetchOutcome::Skipped);
    assert!(matches!(controller.delete_one("x").await, Err(Error::Unauthenticated)));
    assert!(history.calls().is_empty());
}

/// ユーザー解決の失敗はリストのエラーになる
#[tokio::test]
async fn test_identity_failure_is_recorded() {
    let history = Arc::new(FakeHistory::default());
    let controller = controller_with(
        history.clone(),
        FakeIdentity(Err(Error::Network("session store down".into()))),
        FakeClassifier(Err(Error::Network("unused".into()))),
        5,
    );

    let outcome = controller.initialize().await;
    assert_eq!(outcome, FetchOutcome::Failed(Error::Network("session store down".into())));
    assert!(controller.identity().is_none());
    assert!(history.calls().is_empty());
}

/// 再初期化で前の状態を捨てる
#[tokio::test]
async fn test_initialize_resets_search_mode() {
    let history = Arc::new(FakeHistory::default());
    history.push(page("list", 2));
    history.push(page("s", 2));
    history.push(page("again", 1));
    let controller = controller(history.clone(), 2);

    controller.initialize().await;
    controller.search("sunset").await;
    controller.initialize().await;

    assert_eq!(controller.mode(), Mode::List);
    assert_eq!(ids(&controller), vec!["again-0"]);
    assert_eq!(history.calls().last(), Some(&Call::List { offset: 0, limit: 2 }));
}

/// 一部だけ削除された場合はそのまま呼び出し元に返す
#[tokio::test]
async fn test_batch_delete_partial_failure() {
    let history = Arc::new(FakeHistory::default());
    history.push(page("a", 2));
    *history.batch_result.lock().unwrap() = Some(Err(Error::PartialFailure {
        requested: 2,
        deleted: 1,
    }));
    let controller = controller(history.clone(), 5);

    controller.initialize().await;
    let result = controller
        .delete_batch(&["a-0".to_string(), "a-1".to_string()])
        .await;

    assert_eq!(result, Err(Error::PartialFailure { requested: 2, deleted: 1 }));
    // リストは取り直すまで変えない
    assert_eq!(ids(&controller), vec!["a-0", "a-1"]);
    assert_eq!(controller.error(), None);
}

/// 再解析は該当 item の判定結果だけを置き換える
#[tokio::test]
async fn test_reanalyze_replaces_classification_only() {
    let history = Arc::new(FakeHistory::default());
    history.push(page("a", 2));
    let verdict = Classification::new("AI-generated", 0.81).unwrap();
    let controller = controller_with(
        history.clone(),
        signed_in(),
        FakeClassifier(Ok(verdict.clone())),
        5,
    );

    controller.initialize().await;
    let before = controller.items();

    let result = controller.reanalyze(&before[1]).await;
    assert_eq!(result, Ok(verdict.clone()));

    let after = controller.items();
    assert_eq!(after[0], before[0]);
    assert_eq!(after[1].classification, Some(verdict));
    assert_eq!(after[1].status, before[1].status);
    assert_eq!(after[1].image, before[1].image);
    assert_eq!(after[1].created_at, before[1].created_at);
    assert_eq!(history.calls().len(), 1);
}

/// 再解析の失敗はリストのエラーにしない
#[tokio::test]
async fn test_reanalyze_failure_leaves_list_untouched() {
    let history = Arc::new(FakeHistory::default());
    history.push(page("a", 1));
    let controller = controller_with(
        history.clone(),
        signed_in(),
        FakeClassifier(Err(Error::Server { status: 503, message: "model loading".into() })),
        5,
    );

    controller.initialize().await;
    let before = controller.items();

    let result = controller.reanalyze(&before[0]).await;
    assert!(matches!(result, Err(Error::Server { status: 503, .. })));
    assert_eq!(controller.items(), before);
    assert_eq!(controller.error(), None);
}

/// 画像URLのないスキャンは再解析できない
#[tokio::test]
async fn test_reanalyze_without_image() {
    let history = Arc::new(FakeHistory::default());
    let controller = controller(history, 5);
    let record: ResultRecord = serde_json::from_value(json!({"id": "x", "user_id": "u1"})).unwrap();

    assert!(matches!(controller.reanalyze(&record).await, Err(Error::Validation(_))));
}

/// 表示用の絞り込みは状態を変えない
#[tokio::test]
async fn test_visible_items_filters_without_mutating() {
    let history = Arc::new(FakeHistory::default());
    let mut records = page("a", 2).unwrap().records;
    records[1].status = ScanStatus::Failed;
    history.push(Ok(HistoryPage { records, total_count: Some(2) }));
    let controller = controller(history, 5);

    controller.initialize().await;
    let failed = controller.visible_items(&StatusFilter::Only(ScanStatus::Failed));

    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].id, "a-1");
    assert_eq!(controller.items().len(), 2);
    assert_eq!(controller.snapshot().total_count(), Some(2));
}

/// 単体操作は一覧を読まなくてもユーザーを解決すれば使える
#[tokio::test]
async fn test_item_operations_after_resolve_identity() {
    let history = Arc::new(FakeHistory::default());
    let controller = controller(history.clone(), 5);

    let identity = controller.resolve_identity().await.unwrap();
    assert_eq!(identity, Identity::new("u1"));

    let ack = controller.delete_one("scan-9").await.unwrap();
    assert_eq!(ack.deleted_id, "scan-9");

    let analytics = controller.analytics(7).await.unwrap();
    assert_eq!(analytics.period_days, 7);

    let fetched = controller.fetch_one("scan-3").await.unwrap();
    assert_eq!(fetched.owner_id, "u1");
    assert!(history.calls().is_empty());
}
