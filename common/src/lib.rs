//! Artguard Common Library
//!
//! 履歴クライアント・リストコントローラ・CLIで共有される型とユーティリティ

pub mod types;
pub mod error;
pub mod format;
pub mod filter;

pub use types::{
    Classification, DeleteAck, HealthStatus, HistoryPage, ImageRef, RecordPatch, ResultRecord,
    ScanAnalytics, ScanStatus,
};
pub use error::{Error, Result};
pub use format::{format_file_size, format_timestamp, status_color};
pub use filter::{filter_by_date_range, filter_by_status, normalize_query, StatusFilter};
