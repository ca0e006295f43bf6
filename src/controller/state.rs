//! リスト状態と状態遷移
//!
//! 一覧/検索の切り替えは `Mode`、読み込み中/エラーは `Phase` で表す。
//! どちらもタグ付き列挙型なので「検索中かつ一覧」「エラーかつ読み込み中」
//! といった組み合わせは作れない。
//!
//! 発行したリクエストには `RequestTag`（エポック・オフセット・モード）を付け、
//! 応答時点の状態と一致しないものは古い応答として捨てる。
//! エポックはリセット系の操作（初期化・再読み込み・検索・検索解除）ごとに進む。

use artguard_common::{Error, HistoryPage, ResultRecord};

/// 一覧モード / 検索モード
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Mode {
    #[default]
    List,
    Search { query: String },
}

impl Mode {
    pub fn query(&self) -> Option<&str> {
        match self {
            Mode::List => None,
            Mode::Search { query } => Some(query),
        }
    }

    pub fn is_search(&self) -> bool {
        matches!(self, Mode::Search { .. })
    }
}

/// 読み込みの種類
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadKind {
    Initial,
    Refresh,
    Search,
    More,
    /// エラー状態からの再読み込み
    Retry,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub enum Phase {
    #[default]
    Idle,
    Loading(LoadKind),
    Ready,
    Failed(Error),
}

impl Phase {
    pub fn is_loading(&self) -> bool {
        matches!(self, Phase::Loading(_))
    }

    pub fn error(&self) -> Option<&Error> {
        match self {
            Phase::Failed(e) => Some(e),
            _ => None,
        }
    }
}

/// 操作の結果（どの経路を通ったか）
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    /// ページを反映した
    Applied { fetched: usize },
    /// 読み込み中・続きなし・未ログインのため何もしなかった
    Skipped,
    /// 応答が届いた時点で状態が変わっていたので捨てた
    Stale,
    /// 失敗（リストのエラーとして記録済み）
    Failed(Error),
}

/// 発行したリクエストの文脈
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RequestTag {
    pub epoch: u64,
    pub offset: usize,
    pub mode: Mode,
}

/// リストコントローラが持つ状態
#[derive(Debug, Clone, PartialEq)]
pub struct ListState {
    items: Vec<ResultRecord>,
    cursor: usize,
    page_size: usize,
    has_more: bool,
    total_count: Option<u64>,
    mode: Mode,
    phase: Phase,
    epoch: u64,
}

impl ListState {
    pub fn new(page_size: usize) -> Self {
        Self {
            items: Vec::new(),
            cursor: 0,
            page_size: page_size.max(1),
            has_more: false,
            total_count: None,
            mode: Mode::List,
            phase: Phase::Idle,
            epoch: 0,
        }
    }

    pub fn items(&self) -> &[ResultRecord] {
        &self.items
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn has_more(&self) -> bool {
        self.has_more
    }

    /// サーバーが返した総件数（参考値）
    pub fn total_count(&self) -> Option<u64> {
        self.total_count
    }

    pub fn mode(&self) -> &Mode {
        &self.mode
    }

    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    pub fn is_loading(&self) -> bool {
        self.phase.is_loading()
    }

    pub fn error(&self) -> Option<&Error> {
        self.phase.error()
    }

    pub(crate) fn epoch(&self) -> u64 {
        self.epoch
    }

    pub(crate) fn items_mut(&mut self) -> &mut Vec<ResultRecord> {
        &mut self.items
    }

    /// 初期化開始: 前のユーザーの状態をすべて捨てる
    pub(crate) fn begin_initialize(&mut self) -> u64 {
        self.epoch += 1;
        self.items.clear();
        self.cursor = 0;
        self.has_more = false;
        self.total_count = None;
        self.mode = Mode::List;
        self.phase = Phase::Loading(LoadKind::Initial);
        self.epoch
    }

    /// 先頭からの取り直しを開始
    ///
    /// モードが変わる場合は、別モードのページが混ざらないよう
    /// 取得前に items を空にする。同じモードの再読み込みでは
    /// 失敗に備えて既存の items を残す。
    pub(crate) fn begin_reset(&mut self, mode: Mode, kind: LoadKind) -> RequestTag {
        self.epoch += 1;
        if self.mode != mode {
            self.items.clear();
            self.has_more = false;
            self.total_count = None;
            self.mode = mode;
        }
        self.cursor = 0;
        self.phase = Phase::Loading(kind);

        RequestTag {
            epoch: self.epoch,
            offset: 0,
            mode: self.mode.clone(),
        }
    }

    /// 続きの読み込みを開始（読み込み中・続きなしなら None）
    pub(crate) fn begin_load_more(&mut self) -> Option<RequestTag> {
        if self.is_loading() || !self.has_more {
            return None;
        }
        self.phase = Phase::Loading(LoadKind::More);

        Some(RequestTag {
            epoch: self.epoch,
            offset: self.cursor,
            mode: self.mode.clone(),
        })
    }

    pub(crate) fn is_current(&self, tag: &RequestTag) -> bool {
        tag.epoch == self.epoch && tag.offset == self.cursor && tag.mode == self.mode
    }

    /// 取得したページを反映（先頭ページは置き換え、それ以外は追記）
    pub(crate) fn apply_page(&mut self, tag: &RequestTag, page: HistoryPage) -> FetchOutcome {
        if !self.is_current(tag) {
            return FetchOutcome::Stale;
        }

        let fetched = page.records.len();
        if tag.offset == 0 {
            self.items = page.records;
        } else {
            self.items.extend(page.records);
        }
        self.cursor = tag.offset + fetched;
        self.has_more = fetched == self.page_size;
        self.total_count = page.total_count;
        self.phase = Phase::Ready;

        FetchOutcome::Applied { fetched }
    }

    /// 失敗を反映（items は残す）
    pub(crate) fn apply_error(&mut self, tag: &RequestTag, error: Error) -> FetchOutcome {
        if !self.is_current(tag) {
            return FetchOutcome::Stale;
        }
        self.phase = Phase::Failed(error.clone());
        FetchOutcome::Failed(error)
    }

    /// リクエストを出さずに失敗させる（未ログイン・入力エラー）
    pub(crate) fn fail(&mut self, error: Error) -> FetchOutcome {
        self.phase = Phase::Failed(error.clone());
        FetchOutcome::Failed(error)
    }
}
