//! # Quant Core
//!
//! 데이터 계층 전반에서 공유하는 핵심 타입을 제공합니다.
//!
//! 이 크레이트는 다음을 포함합니다:
//! - 거래일(`TradeDay`) 값 타입
//! - 시계 추상화 (테스트용 수동 시계 포함)
//! - 설정 관리
//! - 로깅 인프라

pub mod clock;
pub mod config;
pub mod error;
pub mod logging;
pub mod types;

pub use clock::{today, Clock, ManualClock, SystemClock};
pub use config::*;
pub use error::*;
pub use logging::*;
pub use types::*;
