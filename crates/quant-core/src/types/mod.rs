//! 공유 값 타입.

pub mod trade_day;

pub use trade_day::TradeDay;
