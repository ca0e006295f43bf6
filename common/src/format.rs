//! 表示用フォーマット

use crate::types::ScanStatus;
use chrono::{DateTime, FixedOffset};

const SIZE_UNITS: &[&str] = &["Bytes", "KB", "MB", "GB"];

/// バイト数を人間向けに整形（例: 1536 → "1.5 KB"）
///
/// 小数は2桁で丸め、末尾の0は落とす。
pub fn format_file_size(bytes: u64) -> String {
    if bytes == 0 {
        return "0 Bytes".to_string();
    }

    let mut exp = 0;
    let mut scaled = bytes as f64;
    while scaled >= 1024.0 && exp < SIZE_UNITS.len() - 1 {
        scaled /= 1024.0;
        exp += 1;
    }

    let mut number = format!("{:.2}", scaled);
    if number.contains('.') {
        number = number.trim_end_matches('0').trim_end_matches('.').to_string();
    }

    format!("{} {}", number, SIZE_UNITS[exp])
}

/// タイムスタンプを一覧表示用に整形（例: "Jul 20, 2025, 10:00 AM"）
pub fn format_timestamp(ts: &DateTime<FixedOffset>) -> String {
    ts.format("%b %-d, %Y, %I:%M %p").to_string()
}

/// ステータスバッジの色
pub fn status_color(status: &ScanStatus) -> &'static str {
    match status {
        ScanStatus::Uploaded => "blue",
        ScanStatus::Processing => "yellow",
        ScanStatus::Completed => "green",
        ScanStatus::Failed => "red",
        ScanStatus::Other(_) => "gray",
    }
}
