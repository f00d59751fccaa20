//! 설정 관리.
//!
//! TOML 파일과 환경 변수(`QUANT__섹션__키`)에서 애플리케이션 설정을 로드합니다.

use crate::error::{CoreError, CoreResult};
use crate::types::TradeDay;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// 애플리케이션 설정.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    /// 로깅 설정
    #[serde(default)]
    pub logging: LoggingConfig,
    /// 거래일 달력 설정
    #[serde(default)]
    pub calendar: CalendarConfig,
    /// Tushare API 설정
    #[serde(default)]
    pub tushare: TushareConfig,
    /// 범위 캐시 설정
    #[serde(default)]
    pub cache: CacheConfig,
}

/// 로깅 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// 로그 레벨
    pub level: String,
    /// 로그 형식 (pretty, json, compact)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

/// 달력 소스 종류.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CalendarSourceKind {
    /// Tushare `trade_cal` API
    #[default]
    Tushare,
    /// 월~금을 거래일로 간주 (오프라인)
    Weekday,
}

/// 거래일 달력 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CalendarConfig {
    /// 스냅샷 파일 경로
    #[serde(default = "default_snapshot_path")]
    pub snapshot_path: PathBuf,
    /// 달력 이력 시작일 (YYYYMMDD)
    #[serde(default = "default_history_start")]
    pub history_start: u32,
    /// 시장 시간대 (IANA 이름)
    #[serde(default = "default_timezone")]
    pub timezone: String,
    /// 달력 소스
    #[serde(default)]
    pub source: CalendarSourceKind,
    /// 거래소 코드 (빈 문자열 = 기본 거래소)
    #[serde(default)]
    pub exchange: String,
}

fn default_snapshot_path() -> PathBuf {
    PathBuf::from("cache/trade_calendar/trade_days_v2.json")
}
fn default_history_start() -> u32 {
    19900101
}
fn default_timezone() -> String {
    "Asia/Shanghai".to_string()
}

impl Default for CalendarConfig {
    fn default() -> Self {
        Self {
            snapshot_path: default_snapshot_path(),
            history_start: default_history_start(),
            timezone: default_timezone(),
            source: CalendarSourceKind::default(),
            exchange: String::new(),
        }
    }
}

impl CalendarConfig {
    /// 이력 시작일을 검증하여 반환합니다.
    pub fn history_start(&self) -> CoreResult<TradeDay> {
        TradeDay::new(self.history_start)
    }

    /// 시장 시간대를 파싱합니다.
    pub fn timezone(&self) -> CoreResult<Tz> {
        self.timezone
            .parse::<Tz>()
            .map_err(|e| CoreError::Config(format!("잘못된 시간대 '{}': {}", self.timezone, e)))
    }
}

/// Tushare API 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TushareConfig {
    /// API 기본 URL
    #[serde(default = "default_tushare_url")]
    pub base_url: String,
    /// API 토큰 (비어 있으면 `TUSHARE_TOKEN` 환경변수 사용)
    #[serde(default)]
    pub token: String,
    /// 요청 타임아웃 (초)
    #[serde(default = "default_tushare_timeout")]
    pub timeout_secs: u64,
}

fn default_tushare_url() -> String {
    "http://api.tushare.pro".to_string()
}
fn default_tushare_timeout() -> u64 {
    30
}

impl Default for TushareConfig {
    fn default() -> Self {
        Self {
            base_url: default_tushare_url(),
            token: String::new(),
            timeout_secs: default_tushare_timeout(),
        }
    }
}

impl TushareConfig {
    /// 설정 또는 환경변수에서 토큰을 찾습니다.
    pub fn resolve_token(&self) -> Option<String> {
        if !self.token.is_empty() {
            return Some(self.token.clone());
        }
        std::env::var("TUSHARE_TOKEN").ok().filter(|t| !t.is_empty())
    }
}

/// 범위 캐시 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheConfig {
    /// 캐시 데이터베이스 URL (SQLite)
    #[serde(default = "default_database_url")]
    pub database_url: String,
    /// 최대 연결 수
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// 기본 갱신 주기 (일, 0 = 영구)
    #[serde(default = "default_update_frequency")]
    pub default_update_frequency_days: u32,
}

fn default_database_url() -> String {
    "sqlite://cache/range_cache.db".to_string()
}
fn default_max_connections() -> u32 {
    5
}
fn default_update_frequency() -> u32 {
    1
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            database_url: default_database_url(),
            max_connections: default_max_connections(),
            default_update_frequency_days: default_update_frequency(),
        }
    }
}

impl AppConfig {
    /// 파일과 환경 변수에서 설정을 로드합니다.
    ///
    /// 파일이 없으면 기본값과 환경 변수만 사용합니다.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, config::ConfigError> {
        let builder = config::Config::builder()
            .add_source(config::File::from(path.as_ref()).required(false))
            .add_source(
                config::Environment::with_prefix("QUANT")
                    .separator("__")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }

    /// 기본 경로에서 설정을 로드합니다.
    pub fn load_default() -> Result<Self, config::ConfigError> {
        Self::load("config/default.toml")
    }

    /// TOML 문자열에서 설정을 로드합니다.
    pub fn from_toml_str(content: &str) -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(config::File::from_str(content, config::FileFormat::Toml))
            .build()?
            .try_deserialize()
    }
}
