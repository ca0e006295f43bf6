use crate::error::{ArtguardError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8000/api";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_base_url: String,
    pub api_key: Option<String>,
    pub user_id: Option<String>,
    pub page_size: usize,
    pub analytics_days: u32,
    pub timeout_seconds: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.into(),
            api_key: None,
            user_id: None,
            page_size: 50,
            analytics_days: 30,
            timeout_seconds: 30,
        }
    }
}

impl Config {
    /// 設定ファイルを読み込み、環境変数で上書きする
    pub fn load() -> Result<Self> {
        let config = Self::load_from(&Self::config_path()?)?;
        Ok(config.with_env_overrides())
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let config = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            serde_json::from_str(&content)?
        } else {
            Self::default()
        };
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        let home = dirs::home_dir()
            .ok_or_else(|| ArtguardError::Config("ホームディレクトリが見つかりません".into()))?;
        Ok(home.join(".config").join("artguard").join("config.json"))
    }

    fn with_env_overrides(mut self) -> Self {
        // 環境変数を優先
        if let Ok(url) = std::env::var("ARTGUARD_API_URL") {
            if !url.trim().is_empty() {
                self.api_base_url = url;
            }
        }
        if let Ok(key) = std::env::var("ARTGUARD_API_KEY") {
            if !key.trim().is_empty() {
                self.api_key = Some(key);
            }
        }
        if let Ok(user) = std::env::var("ARTGUARD_USER_ID") {
            if !user.trim().is_empty() {
                self.user_id = Some(user);
            }
        }
        self
    }

    fn validate(&self) -> Result<()> {
        if self.page_size == 0 {
            return Err(ArtguardError::Config("page_size は1以上にしてください".into()));
        }
        if self.api_base_url.trim().is_empty() {
            return Err(ArtguardError::Config("api_base_url が空です".into()));
        }
        Ok(())
    }

    pub fn set_user_id(&mut self, user_id: String) -> Result<()> {
        self.user_id = Some(user_id);
        self.save()
    }

    pub fn set_api_key(&mut self, key: String) -> Result<()> {
        self.api_key = Some(key);
        self.save()
    }

    pub fn set_api_base_url(&mut self, url: String) -> Result<()> {
        self.api_base_url = url;
        self.validate()?;
        self.save()
    }
}
