//! 分類器（`POST /predict`）クライアント
//!
//! 分類器自体はブラックボックスで、画像URLを渡すと
//! `{label, confidence}` が返る。

use super::http::{send_json, API_KEY_HEADER};
use artguard_common::{Classification, Error, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[async_trait]
pub trait Classifier: Send + Sync {
    async fn classify(&self, image_url: &str) -> Result<Classification>;
}

#[derive(Serialize)]
struct PredictRequest<'a> {
    image_url: &'a str,
}

#[derive(Deserialize)]
struct PredictResponse {
    label: String,
    confidence: f64,
}

#[derive(Debug, Clone)]
pub struct HttpClassifier {
    http: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

impl HttpClassifier {
    pub fn new(
        http: reqwest::Client,
        base_url: impl Into<String>,
        api_key: Option<String>,
    ) -> Self {
        let base_url = base_url.into();
        Self {
            http,
            endpoint: format!("{}/predict", base_url.trim_end_matches('/')),
            api_key,
        }
    }
}

#[async_trait]
impl Classifier for HttpClassifier {
    #[tracing::instrument(name = "classifier.classify", skip(self), err)]
    async fn classify(&self, image_url: &str) -> Result<Classification> {
        if image_url.trim().is_empty() {
            return Err(Error::Validation("image url is empty".into()));
        }

        let mut request = self
            .http
            .post(&self.endpoint)
            .json(&PredictRequest { image_url });
        if let Some(key) = &self.api_key {
            request = request.header(API_KEY_HEADER, key);
        }

        let response: PredictResponse = send_json(request).await?;
        Classification::new(response.label, response.confidence)
            .ok_or_else(|| Error::InvalidResponse("confidence is not a finite number".into()))
    }
}
