//! 거래일 달력 명령.
//!
//! 각 함수는 출력할 문자열을 반환하고, 출력은 호출자가 담당합니다.

use super::OutputFormat;
use anyhow::Result;
use quant_core::TradeDay;
use quant_data::QuantData;
use std::fmt::Write;
use tracing::info;

/// 달력 갱신 후 스냅샷 요약.
pub async fn refresh(data: &QuantData, force: bool) -> Result<String> {
    data.refresh_calendar(force).await?;
    let snapshot = data.calendar().snapshot()?;

    info!(days = snapshot.len(), force, "거래일 달력 갱신 명령 완료");
    Ok(format!(
        "거래일 스냅샷: {}일 ({} ~ {}), 조회일 {}",
        snapshot.len(),
        fmt_day(snapshot.first()),
        fmt_day(snapshot.last()),
        snapshot.fetched_at()
    ))
}

/// 거래일 여부.
pub async fn check(data: &QuantData, date: &str) -> Result<String> {
    let day: TradeDay = date.parse()?;
    let open = data.is_trading_day(day).await?;
    Ok(format!("{}: {}", day, if open { "거래일" } else { "휴장일" }))
}

/// 이전 거래일.
pub async fn prev(data: &QuantData, date: &str) -> Result<String> {
    Ok(fmt_day(data.previous_trading_day(date).await?))
}

/// 다음 거래일.
pub async fn next(data: &QuantData, date: &str) -> Result<String> {
    Ok(fmt_day(data.next_trading_day(date).await?))
}

/// 구간 내 거래일 목록.
pub async fn range(data: &QuantData, from: &str, to: &str, format: OutputFormat) -> Result<String> {
    let days = data.trading_days_in_range(from, to).await?;
    render_days(&days, format)
}

/// 기준일 직전 거래일 `n`개.
pub async fn recent(data: &QuantData, date: &str, n: usize, format: OutputFormat) -> Result<String> {
    let days = data.recent_trading_days(date, n).await?;
    render_days(&days, format)
}

fn render_days(days: &[TradeDay], format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string(days)?),
        OutputFormat::Table => {
            let mut out = String::new();
            for day in days {
                writeln!(out, "{}", day)?;
            }
            write!(out, "총 {}일", days.len())?;
            Ok(out)
        }
    }
}

fn fmt_day(day: Option<TradeDay>) -> String {
    day.map_or_else(|| "-".to_string(), |d| d.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::quant_data;

    #[tokio::test]
    async fn test_check_prev_next() {
        let data = quant_data();
        assert_eq!(check(&data, "2025-01-04").await.unwrap(), "20250104: 휴장일");
        assert_eq!(check(&data, "20250106").await.unwrap(), "20250106: 거래일");
        assert_eq!(prev(&data, "20250104").await.unwrap(), "20250103");
        assert_eq!(next(&data, "20250104").await.unwrap(), "20250106");
        assert_eq!(prev(&data, "20250102").await.unwrap(), "-");
        assert!(check(&data, "2025-13-01").await.is_err());
    }

    #[tokio::test]
    async fn test_range_and_recent_formats() {
        let data = quant_data();
        assert_eq!(
            range(&data, "20250103", "20250106", OutputFormat::Json).await.unwrap(),
            "[20250103,20250106]"
        );
        assert_eq!(
            range(&data, "20250103", "20250106", OutputFormat::Table).await.unwrap(),
            "20250103\n20250106\n총 2일"
        );
        assert_eq!(
            recent(&data, "20250108", 2, OutputFormat::Json).await.unwrap(),
            "[20250106,20250107]"
        );
        assert!(recent(&data, "20250103", 5, OutputFormat::Json).await.is_err());
    }

    #[tokio::test]
    async fn test_refresh_summary() {
        let data = quant_data();
        let summary = refresh(&data, true).await.unwrap();
        assert_eq!(summary, "거래일 스냅샷: 5일 (20250102 ~ 20250108), 조회일 20250108");
    }
}
