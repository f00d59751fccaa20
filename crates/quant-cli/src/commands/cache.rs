//! 캐시 점검 명령.

use super::OutputFormat;
use anyhow::Result;
use quant_core::TradeDay;
use quant_data::QuantData;
use std::fmt::Write;
use tracing::info;

/// 도메인 통계.
pub async fn stats(data: &QuantData, domain: &str, format: OutputFormat) -> Result<String> {
    let stats = data.store().stats(domain).await?;

    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(&stats)?),
        OutputFormat::Table => {
            let fmt_day = |d: Option<TradeDay>| d.map_or_else(|| "-".to_string(), |d| d.to_string());
            let fmt_time = |t: Option<chrono::DateTime<chrono::Utc>>| {
                t.map_or_else(|| "-".to_string(), |t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            };
            let mut out = String::new();
            writeln!(out, "도메인:      {}", stats.domain)?;
            writeln!(out, "레코드 수:   {}", stats.records)?;
            writeln!(out, "엔티티 수:   {}", stats.entities)?;
            writeln!(out, "날짜 범위:   {} ~ {}", fmt_day(stats.first_date), fmt_day(stats.last_date))?;
            write!(
                out,
                "기록 시각:   {} ~ {}",
                fmt_time(stats.oldest_write),
                fmt_time(stats.newest_write)
            )?;
            Ok(out)
        }
    }
}

/// 구간 레코드 조회.
pub async fn show(
    data: &QuantData,
    domain: &str,
    entity: Option<&str>,
    from: &str,
    to: &str,
    format: OutputFormat,
) -> Result<String> {
    let (start, end): (TradeDay, TradeDay) = (from.parse()?, to.parse()?);
    let records = data.store().get_range(domain, entity, start, end).await?;

    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(&records)?),
        OutputFormat::Table => {
            let mut out = String::new();
            for record in &records {
                writeln!(
                    out,
                    "{}  {}  {}",
                    record.date_key,
                    record.written_at.format("%Y-%m-%d %H:%M:%S"),
                    record.payload
                )?;
            }
            write!(out, "총 {}건", records.len())?;
            Ok(out)
        }
    }
}

/// 레코드 삭제. 엔티티를 지정하지 않으면 도메인 전체를 삭제합니다.
pub async fn purge(data: &QuantData, domain: &str, entity: Option<&str>) -> Result<String> {
    let deleted = match entity {
        Some(entity) => data.store().purge_entity(domain, Some(entity)).await?,
        None => data.store().purge_domain(domain).await?,
    };

    info!(domain, entity, deleted, "캐시 삭제 명령 완료");
    Ok(format!("{}건 삭제", deleted))
}
