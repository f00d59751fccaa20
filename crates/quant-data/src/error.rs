//! 데이터 모듈 오류 타입.

use crate::storage::FetchGap;
use quant_core::{CoreError, TradeDay};
use thiserror::Error;

/// 데이터 관련 오류.
#[derive(Debug, Error)]
pub enum DataError {
    /// 스냅샷이 한 번도 만들어지지 않았고 달력 소스에 접근할 수 없음
    #[error("Trading calendar unavailable: {0}")]
    CalendarUnavailable(String),

    /// 스냅샷은 있으나 거래일이 하나도 없음
    #[error("Trading calendar is empty")]
    EmptyCalendar,

    /// 기준일 이전 거래일 부족
    #[error("Insufficient history before {day}: requested {requested}, available {available}")]
    InsufficientHistory {
        day: TradeDay,
        requested: usize,
        available: usize,
    },

    /// 레코드 역직렬화 실패 (캐시 미스로 취급)
    #[error("Corrupt cache record {domain}/{}/{date_key}: {reason}", .entity_id.as_deref().unwrap_or("-"))]
    CorruptRecord {
        domain: String,
        entity_id: Option<String>,
        date_key: TradeDay,
        reason: String,
    },

    /// 데이터 생산자 실패 (구간 단위)
    #[error("Fetch failed for {domain}/{} gap {gap}: {source}", .entity_id.as_deref().unwrap_or("-"))]
    FetchFailed {
        domain: String,
        entity_id: Option<String>,
        gap: FetchGap,
        #[source]
        source: anyhow::Error,
    },

    /// 데이터 생산자 계약 위반
    #[error("Producer contract violation for {domain} gap {gap}: {reason}")]
    ProducerContract {
        domain: String,
        gap: FetchGap,
        reason: String,
    },

    /// 잘못된 도메인 이름
    #[error("Invalid cache domain: {0}")]
    InvalidDomain(String),

    /// 잘못된 날짜
    #[error("Invalid date: {0}")]
    InvalidDate(String),

    /// 저장소 오류
    #[error("Storage error: {0}")]
    Storage(String),

    /// 달력 스냅샷 파일 오류
    #[error("Snapshot error: {0}")]
    Snapshot(String),

    /// 외부 달력 소스 오류
    #[error("Calendar source error: {0}")]
    Source(String),

    /// 직렬화/역직렬화 오류
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// 레지스트리가 초기화되지 않음
    #[error("Data layer not initialized")]
    NotInitialized,

    /// 설정 오류
    #[error("Configuration error: {0}")]
    Config(String),
}

impl DataError {
    /// 다음 호출에서 재시도하면 해결될 수 있는 오류인지 확인합니다.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            DataError::FetchFailed { .. } | DataError::Source(_) | DataError::CalendarUnavailable(_)
        )
    }
}

impl From<sqlx::Error> for DataError {
    fn from(err: sqlx::Error) -> Self {
        DataError::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for DataError {
    fn from(err: serde_json::Error) -> Self {
        DataError::Serialization(err.to_string())
    }
}

impl From<reqwest::Error> for DataError {
    fn from(err: reqwest::Error) -> Self {
        DataError::Source(err.to_string())
    }
}

impl From<CoreError> for DataError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::InvalidDate(s) => DataError::InvalidDate(s),
            CoreError::Config(s) => DataError::Config(s),
        }
    }
}

pub type Result<T> = std::result::Result<T, DataError>;
