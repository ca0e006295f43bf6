//! スキャン履歴の型定義
//!
//! CLIとライブラリで共有される型:
//! - ResultRecord: スキャン1件（画像・判定結果・メタデータ）
//! - RecordPatch: 更新APIに送る差分
//! - HistoryPage / ScanAnalytics: 一覧・集計APIの結果
//!
//! バックエンドのJSONは版によってフィールドの置き場所が揺れる
//! （`label` が `result` 内にあったりトップレベルにあったり）ため、
//! ワイヤ形式 `ScanRecordWire` で寛容に受けてから正規化する。

use chrono::{DateTime, FixedOffset, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// 分類器の判定結果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    /// "Handmade" / "AI-Generated" / "Digital"
    pub label: String,
    /// 0.0〜1.0
    pub confidence: f64,
}

impl Classification {
    /// 判定結果を作成（信頼度は [0,1] に丸める。NaN/無限大は None）
    pub fn new(label: impl Into<String>, confidence: f64) -> Option<Self> {
        if !confidence.is_finite() {
            return None;
        }
        Some(Self {
            label: label.into(),
            confidence: confidence.clamp(0.0, 1.0),
        })
    }

    /// 信頼度をパーセント表記で返す（例: "87.3%"）
    pub fn confidence_percent(&self) -> String {
        format!("{:.1}%", self.confidence * 100.0)
    }
}

/// スキャンの処理状態
///
/// 未知の文字列はそのまま `Other` に保持する（表示側で落とさない）。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ScanStatus {
    Uploaded,
    Processing,
    Completed,
    Failed,
    Other(String),
}

impl ScanStatus {
    pub fn as_str(&self) -> &str {
        match self {
            ScanStatus::Uploaded => "uploaded",
            ScanStatus::Processing => "processing",
            ScanStatus::Completed => "completed",
            ScanStatus::Failed => "failed",
            ScanStatus::Other(s) => s,
        }
    }
}

impl From<&str> for ScanStatus {
    fn from(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "uploaded" => ScanStatus::Uploaded,
            "processing" => ScanStatus::Processing,
            "completed" => ScanStatus::Completed,
            "failed" => ScanStatus::Failed,
            _ => ScanStatus::Other(s.to_string()),
        }
    }
}

impl From<String> for ScanStatus {
    fn from(s: String) -> Self {
        ScanStatus::from(s.as_str())
    }
}

impl From<ScanStatus> for String {
    fn from(status: ScanStatus) -> Self {
        status.as_str().to_string()
    }
}

impl std::str::FromStr for ScanStatus {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(ScanStatus::from(s))
    }
}

impl std::fmt::Display for ScanStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

/// アップロード画像の参照先（主URL + 予備URL）
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImageRef {
    pub primary: Option<String>,
    pub fallback: Option<String>,
}

impl ImageRef {
    /// 表示・再解析に使えるURLを返す
    pub fn resolve(&self) -> Option<&str> {
        [&self.primary, &self.fallback]
            .into_iter()
            .flatten()
            .map(|s| s.trim())
            .find(|s| !s.is_empty())
    }
}

/// スキャン1件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "ScanRecordWire", into = "ScanRecordWire")]
pub struct ResultRecord {
    pub id: String,
    pub owner_id: String,
    pub image: ImageRef,
    /// 処理中は None
    pub classification: Option<Classification>,
    pub status: ScanStatus,
    pub size_bytes: u64,
    pub content_type: String,
    pub file_name: Option<String>,
    pub public_id: Option<String>,
    pub description: Option<String>,
    pub created_at: Option<DateTime<FixedOffset>>,
    pub updated_at: Option<DateTime<FixedOffset>>,
    pub scan_timestamp: Option<DateTime<FixedOffset>>,
}

impl ResultRecord {
    /// 表示用のタイムスタンプ（scan_timestamp → created_at → updated_at）
    pub fn display_timestamp(&self) -> Option<&DateTime<FixedOffset>> {
        self.scan_timestamp
            .as_ref()
            .or(self.created_at.as_ref())
            .or(self.updated_at.as_ref())
    }
}

/// バックエンドのスキャンレコード（ワイヤ形式）
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
struct ScanRecordWire {
    id: String,
    user_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    artwork_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    upload_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    confidence: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    file_size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    content_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    public_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    scan_timestamp: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    created_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    updated_at: Option<String>,
}

/// `result` オブジェクトから文字列フィールドを取り出す
fn result_str(result: Option<&Map<String, Value>>, key: &str) -> Option<String> {
    result
        .and_then(|r| r.get(key))
        .and_then(Value::as_str)
        .map(str::to_string)
}

/// 空文字を None に寄せる
fn non_empty(s: Option<String>) -> Option<String> {
    s.filter(|v| !v.trim().is_empty())
}

/// ISO 8601 タイムスタンプをパース（タイムゾーン無しはUTC扱い、失敗時は None）
pub fn parse_timestamp(s: &str) -> Option<DateTime<FixedOffset>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt);
    }
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc().fixed_offset())
}

impl From<ScanRecordWire> for ResultRecord {
    fn from(wire: ScanRecordWire) -> Self {
        let result = wire.result.as_ref().and_then(Value::as_object);

        let label = non_empty(result_str(result, "label")).or(non_empty(wire.label));
        let confidence = result
            .and_then(|r| r.get("confidence"))
            .and_then(Value::as_f64)
            .or(wire.confidence);
        let classification = match (label, confidence) {
            (Some(label), Some(confidence)) => Classification::new(label, confidence),
            _ => None,
        };

        let status = non_empty(wire.status)
            .or(non_empty(result_str(result, "status")))
            .map(ScanStatus::from)
            .unwrap_or_else(|| ScanStatus::Other("unknown".to_string()));

        let size_bytes = wire
            .file_size
            .or_else(|| result.and_then(|r| r.get("file_size")).and_then(Value::as_u64))
            .unwrap_or(0);

        let image = ImageRef {
            primary: non_empty(wire.upload_url).or(non_empty(result_str(result, "upload_url"))),
            fallback: non_empty(wire.artwork_url),
        };

        Self {
            id: wire.id,
            owner_id: wire.user_id,
            image,
            classification,
            status,
            size_bytes,
            content_type: non_empty(wire.content_type)
                .or(non_empty(result_str(result, "content_type")))
                .unwrap_or_default(),
            file_name: non_empty(result_str(result, "filename")),
            public_id: non_empty(wire.public_id).or(non_empty(result_str(result, "public_id"))),
            description: non_empty(wire.description)
                .or(non_empty(result_str(result, "description"))),
            created_at: wire.created_at.as_deref().and_then(parse_timestamp),
            updated_at: wire.updated_at.as_deref().and_then(parse_timestamp),
            scan_timestamp: wire.scan_timestamp.as_deref().and_then(parse_timestamp),
        }
    }
}

impl From<ResultRecord> for ScanRecordWire {
    fn from(record: ResultRecord) -> Self {
        let mut result = Map::new();
        if let Some(c) = &record.classification {
            result.insert("label".into(), json!(c.label));
            result.insert("confidence".into(), json!(c.confidence));
        }
        if let Some(name) = &record.file_name {
            result.insert("filename".into(), json!(name));
        }

        Self {
            id: record.id,
            user_id: record.owner_id,
            artwork_url: record.image.fallback,
            upload_url: record.image.primary,
            result: (!result.is_empty()).then_some(Value::Object(result)),
            label: None,
            confidence: None,
            file_size: Some(record.size_bytes),
            content_type: Some(record.content_type),
            public_id: record.public_id,
            description: record.description,
            status: Some(record.status.into()),
            scan_timestamp: record.scan_timestamp.map(|t| t.to_rfc3339()),
            created_at: record.created_at.map(|t| t.to_rfc3339()),
            updated_at: record.updated_at.map(|t| t.to_rfc3339()),
        }
    }
}

/// 更新APIに送る差分（None のフィールドは送らない）
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RecordPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<ScanStatus>,
    #[serde(rename = "result", skip_serializing_if = "Option::is_none")]
    pub classification: Option<Classification>,
}

impl RecordPatch {
    pub fn is_empty(&self) -> bool {
        self.description.is_none() && self.status.is_none() && self.classification.is_none()
    }
}

/// 一覧・検索APIの1ページ
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HistoryPage {
    pub records: Vec<ResultRecord>,
    /// 参考値。hasMore の判定には使わない
    pub total_count: Option<u64>,
}

/// 集計APIの結果
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanAnalytics {
    pub total_scans: u64,
    #[serde(rename = "total_file_size")]
    pub total_bytes: u64,
    #[serde(rename = "average_file_size")]
    pub avg_bytes: f64,
    pub period_days: u32,
    pub scans_per_day: f64,
}

/// 単体削除APIの応答
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct DeleteAck {
    pub deleted_id: String,
    pub message: String,
}

/// ヘルスチェックAPIの応答
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct HealthStatus {
    pub status: String,
    pub message: String,
    pub version: String,
}
