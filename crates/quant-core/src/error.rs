//! 핵심 에러 타입.

use thiserror::Error;

/// 핵심 타입 파싱 및 설정 에러.
#[derive(Debug, Error)]
pub enum CoreError {
    /// 잘못된 날짜 형식 또는 존재하지 않는 날짜
    #[error("잘못된 날짜: {0}")]
    InvalidDate(String),

    /// 설정 에러
    #[error("설정 에러: {0}")]
    Config(String),
}

/// 핵심 작업을 위한 Result 타입.
pub type CoreResult<T> = Result<T, CoreError>;

impl From<config::ConfigError> for CoreError {
    fn from(err: config::ConfigError) -> Self {
        CoreError::Config(err.to_string())
    }
}
