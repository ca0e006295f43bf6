//! 取得済みレコードに対するクライアント側の絞り込み
//!
//! 表示時にだけ適用する射影で、リストの状態には保存しない。
//! 検索は常にサーバー側で行う。

use crate::error::{Error, Result};
use crate::types::{ResultRecord, ScanStatus};
use chrono::{DateTime, FixedOffset};

/// 検索クエリの最大長
pub const MAX_QUERY_LEN: usize = 256;

/// ステータス絞り込み
#[derive(Debug, Clone, Default, PartialEq)]
pub enum StatusFilter {
    #[default]
    All,
    Only(ScanStatus),
}

impl StatusFilter {
    pub fn matches(&self, record: &ResultRecord) -> bool {
        match self {
            StatusFilter::All => true,
            StatusFilter::Only(status) => &record.status == status,
        }
    }
}

impl std::str::FromStr for StatusFilter {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("all") {
            Ok(StatusFilter::All)
        } else {
            Ok(StatusFilter::Only(ScanStatus::from(s)))
        }
    }
}

/// ステータスで絞り込む（並び順は維持）
pub fn filter_by_status<'a>(
    records: &'a [ResultRecord],
    filter: &StatusFilter,
) -> Vec<&'a ResultRecord> {
    records.iter().filter(|r| filter.matches(r)).collect()
}

/// 作成日時が [start, end] に入るレコードだけ返す（作成日時なしは除外）
pub fn filter_by_date_range<'a>(
    records: &'a [ResultRecord],
    start: &DateTime<FixedOffset>,
    end: &DateTime<FixedOffset>,
) -> Vec<&'a ResultRecord> {
    records
        .iter()
        .filter(|r| match &r.created_at {
            Some(created) => created >= start && created <= end,
            None => false,
        })
        .collect()
}

/// 検索クエリを正規化
///
/// - 空白のみ・空文字 → `Ok(None)`（一覧モード）
/// - 長すぎる、制御文字を含む → `Error::Validation`
pub fn normalize_query(query: &str) -> Result<Option<String>> {
    let trimmed = query.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    if trimmed.chars().count() > MAX_QUERY_LEN {
        return Err(Error::Validation(format!(
            "search query is longer than {} characters",
            MAX_QUERY_LEN
        )));
    }
    if trimmed.chars().any(char::is_control) {
        return Err(Error::Validation(
            "search query contains control characters".into(),
        ));
    }
    Ok(Some(trimmed.to_string()))
}
