//! 거래일 달력과 구간 캐시 CLI 도구.
//!
//! 이 crate는 다음 기능을 제공합니다:
//! - 거래일 달력 조회 및 갱신
//! - 캐시 도메인 통계, 레코드 조회, 삭제

pub mod commands;

pub use commands::OutputFormat;
