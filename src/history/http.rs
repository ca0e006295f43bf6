//! reqwest による履歴APIクライアント
//!
//! レスポンスは `{success, data, ...}` 形式のエンベロープで返る。
//! HTTPステータスとボディの `error` / `message` からエラー分類を決める:
//! - 401/403 → `Auth`
//! - 404 → `NotFound`
//! - その他の非2xx、または `success: false` → `Server`
//! - 通信失敗・タイムアウト → `Network`

use super::classifier::HttpClassifier;
use super::HistoryClient;
use crate::config::Config;
use crate::error::ArtguardError;
use artguard_common::{
    DeleteAck, Error, HealthStatus, HistoryPage, RecordPatch, ResultRecord, Result, ScanAnalytics,
};
use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

pub(crate) const API_KEY_HEADER: &str = "x-api-key";

/// `{success, data, pagination}` 形式のレスポンス
#[derive(Debug, Deserialize)]
struct DataEnvelope<T> {
    #[serde(default = "default_success")]
    success: bool,
    data: Option<T>,
    #[serde(default)]
    pagination: Option<Pagination>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Pagination {
    #[serde(default)]
    total_count: Option<u64>,
}

/// 削除系APIのレスポンス
#[derive(Debug, Deserialize)]
struct AckEnvelope {
    #[serde(default = "default_success")]
    success: bool,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    deleted_id: Option<String>,
    #[serde(default)]
    deleted_count: Option<usize>,
}

fn default_success() -> bool {
    true
}

#[derive(Serialize)]
struct BatchDeleteRequest<'a> {
    scan_ids: &'a [String],
    user_id: &'a str,
}

#[derive(Serialize)]
struct UpdateRequest<'a> {
    scan_id: &'a str,
    updates: &'a RecordPatch,
    user_id: &'a str,
}

/// エンベロープの `success: false` をエラーにする
fn ensure_success(
    success: bool,
    error: Option<String>,
    message: Option<String>,
) -> Result<()> {
    if success {
        return Ok(());
    }
    Err(Error::Server {
        status: StatusCode::OK.as_u16(),
        message: error
            .or(message)
            .unwrap_or_else(|| "request was not successful".into()),
    })
}

/// 通信エラーを分類
pub(crate) fn transport_error(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::Network(format!("request timed out: {}", e))
    } else {
        Error::Network(e.to_string())
    }
}

/// 非2xxレスポンスを分類（メッセージはボディから取る）
pub(crate) fn status_error(status: StatusCode, body: &str) -> Error {
    let message = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")
                .or_else(|| v.get("message"))
                .or_else(|| v.get("detail"))
                .and_then(|m| m.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| format!("HTTP error! status: {}", status.as_u16()));

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Error::Auth(message),
        StatusCode::NOT_FOUND => Error::NotFound(message),
        _ => Error::Server {
            status: status.as_u16(),
            message,
        },
    }
}

/// リクエストを送り、2xxならボディをJSONとして読む
pub(crate) async fn send_json<T: DeserializeOwned>(request: RequestBuilder) -> Result<T> {
    let response = request.send().await.map_err(transport_error)?;
    let status = response.status();
    let body = response.text().await.map_err(transport_error)?;

    if !status.is_success() {
        let err = status_error(status, &body);
        warn!(status = status.as_u16(), error = %err, "request failed");
        return Err(err);
    }

    debug!(status = status.as_u16(), bytes = body.len(), "response received");
    serde_json::from_str(&body).map_err(|e| Error::InvalidResponse(e.to_string()))
}

/// パスに埋め込むIDを検証
fn path_id(id: &str) -> Result<&str> {
    let id = id.trim();
    if id.is_empty() || id.contains('/') || id.contains('?') || id.contains('#') {
        return Err(Error::Validation(format!("invalid scan id: {:?}", id)));
    }
    Ok(id)
}

/// 履歴APIクライアント
#[derive(Debug, Clone)]
pub struct HttpHistoryClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpHistoryClient {
    pub fn new(
        http: reqwest::Client,
        base_url: impl Into<String>,
        api_key: Option<String>,
    ) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            http,
            base_url,
            api_key,
        }
    }

    /// 設定からクライアントを作成（タイムアウトは設定値）
    pub fn from_config(config: &Config) -> crate::error::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| ArtguardError::HttpClient(e.to_string()))?;
        Ok(Self::new(http, config.api_base_url.clone(), config.api_key.clone()))
    }

    /// 同じ接続設定で分類器クライアントを作る
    pub fn classifier(&self) -> HttpClassifier {
        HttpClassifier::new(self.http.clone(), self.base_url.clone(), self.api_key.clone())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        let request = self.http.request(method, url);
        match &self.api_key {
            Some(key) => request.header(API_KEY_HEADER, key),
            None => request,
        }
    }

    async fn fetch_page(&self, request: RequestBuilder) -> Result<HistoryPage> {
        let envelope: DataEnvelope<Vec<ResultRecord>> = send_json(request).await?;
        ensure_success(envelope.success, envelope.error, envelope.message)?;

        Ok(HistoryPage {
            records: envelope.data.unwrap_or_default(),
            total_count: envelope.pagination.and_then(|p| p.total_count),
        })
    }

    async fn fetch_data<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let envelope: DataEnvelope<T> = send_json(request).await?;
        ensure_success(envelope.success, envelope.error, envelope.message)?;
        envelope
            .data
            .ok_or_else(|| Error::InvalidResponse("response has no data".into()))
    }

    #[tracing::instrument(name = "history.health", skip(self))]
    pub async fn health(&self) -> Result<HealthStatus> {
        send_json(self.request(Method::GET, "/health")).await
    }
}

#[async_trait]
impl HistoryClient for HttpHistoryClient {
    #[tracing::instrument(name = "history.list_page", skip(self), err)]
    async fn list_page(&self, owner_id: &str, limit: usize, offset: usize) -> Result<HistoryPage> {
        let request = self.request(Method::GET, "/scan-history").query(&[
            ("user_id", owner_id.to_string()),
            ("limit", limit.to_string()),
            ("offset", offset.to_string()),
        ]);
        self.fetch_page(request).await
    }

    #[tracing::instrument(name = "history.search_page", skip(self), err)]
    async fn search_page(
        &self,
        owner_id: &str,
        query: &str,
        limit: usize,
        offset: usize,
    ) -> Result<HistoryPage> {
        let query = artguard_common::normalize_query(query)?
            .ok_or_else(|| Error::Validation("search query is empty".into()))?;

        let request = self.request(Method::GET, "/search-scans").query(&[
            ("user_id", owner_id.to_string()),
            ("query", query),
            ("limit", limit.to_string()),
            ("offset", offset.to_string()),
        ]);
        self.fetch_page(request).await
    }

    #[tracing::instrument(name = "history.fetch_one", skip(self), err)]
    async fn fetch_one(&self, id: &str, owner_id: &str) -> Result<ResultRecord> {
        let path = format!("/scan/{}", path_id(id)?);
        let request = self
            .request(Method::GET, &path)
            .query(&[("user_id", owner_id)]);
        self.fetch_data(request).await
    }

    #[tracing::instrument(name = "history.delete_one", skip(self), err)]
    async fn delete_one(&self, id: &str, owner_id: &str) -> Result<DeleteAck> {
        let request = self
            .request(Method::DELETE, "/delete-scan")
            .query(&[("scan_id", path_id(id)?), ("user_id", owner_id)]);

        let ack: AckEnvelope = send_json(request).await?;
        ensure_success(ack.success, ack.error, ack.message.clone())?;

        Ok(DeleteAck {
            deleted_id: ack.deleted_id.unwrap_or_else(|| id.to_string()),
            message: ack.message.unwrap_or_default(),
        })
    }

    #[tracing::instrument(
        name = "history.delete_batch",
        skip(self, ids),
        fields(requested = ids.len()),
        err
    )]
    async fn delete_batch(&self, ids: &[String], owner_id: &str) -> Result<usize> {
        if ids.is_empty() {
            return Err(Error::Validation("no scan ids given".into()));
        }

        let request = self
            .request(Method::DELETE, "/batch-delete")
            .json(&BatchDeleteRequest {
                scan_ids: ids,
                user_id: owner_id,
            });

        let ack: AckEnvelope = send_json(request).await?;
        ensure_success(ack.success, ack.error, ack.message)?;

        let requested = ids.len();
        let deleted = ack
            .deleted_count
            .ok_or_else(|| Error::InvalidResponse("response has no deleted_count".into()))?;

        if deleted < requested {
            warn!(requested, deleted, "batch delete removed fewer scans than requested");
            return Err(Error::PartialFailure { requested, deleted });
        }
        Ok(deleted)
    }

    #[tracing::instrument(name = "history.update_one", skip(self), err)]
    async fn update_one(
        &self,
        id: &str,
        patch: &RecordPatch,
        owner_id: &str,
    ) -> Result<ResultRecord> {
        let id = path_id(id)?;
        if patch.is_empty() {
            return Err(Error::Validation("update has no fields".into()));
        }

        let path = format!("/scan/{}/update", id);
        let request = self.request(Method::PUT, &path).json(&UpdateRequest {
            scan_id: id,
            updates: patch,
            user_id: owner_id,
        });
        self.fetch_data(request).await
    }

    #[tracing::instrument(name = "history.analytics", skip(self), err)]
    async fn analytics(&self, owner_id: &str, window_days: u32) -> Result<ScanAnalytics> {
        let request = self.request(Method::GET, "/analytics").query(&[
            ("user_id", owner_id.to_string()),
            ("days", window_days.to_string()),
        ]);
        self.fetch_data(request).await
    }
}
