//! Tushare Pro `trade_cal` 달력 소스.
//!
//! Tushare Pro HTTP API에 `trade_cal`을 요청해 거래소 개장일을 조회합니다.
//!
//! # 사용 예제
//!
//! ```rust,ignore
//! use quant_data::calendar::TushareCalendarSource;
//!
//! let source = TushareCalendarSource::new("http://api.tushare.pro", token)?;
//! let rows = source.fetch_trading_days(start, end).await?;
//! ```

use super::source::{CalendarDay, CalendarSource};
use crate::error::{DataError, Result};
use async_trait::async_trait;
use quant_core::{TradeDay, TushareConfig};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument};

/// 요청 필드 목록.
const TRADE_CAL_FIELDS: &str = "exchange,cal_date,is_open,pretrade_date";

/// Tushare API 요청 본문.
#[derive(Debug, Serialize)]
struct TushareRequest<'a> {
    api_name: &'a str,
    token: &'a str,
    params: TradeCalParams<'a>,
    fields: &'a str,
}

#[derive(Debug, Serialize)]
struct TradeCalParams<'a> {
    exchange: &'a str,
    start_date: String,
    end_date: String,
}

/// Tushare API 응답.
///
/// 성공 시 `code == 0`이고 `data.items`의 각 행은 `data.fields` 순서를 따릅니다.
#[derive(Debug, Deserialize)]
struct TushareResponse {
    code: i64,
    #[serde(default)]
    msg: Option<String>,
    data: Option<TushareTable>,
}

#[derive(Debug, Deserialize)]
struct TushareTable {
    fields: Vec<String>,
    #[serde(default)]
    items: Vec<Vec<serde_json::Value>>,
}

/// Tushare `trade_cal` 소스.
#[derive(Clone)]
pub struct TushareCalendarSource {
    client: reqwest::Client,
    base_url: String,
    token: String,
    exchange: String,
}

impl TushareCalendarSource {
    /// 새 소스를 생성합니다.
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Result<Self> {
        Self::with_timeout(base_url, token, Duration::from_secs(30))
    }

    fn with_timeout(
        base_url: impl Into<String>,
        token: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DataError::Source(format!("HTTP client build failed: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into(),
            token: token.into(),
            exchange: String::new(),
        })
    }

    /// 설정에서 소스를 생성합니다. 토큰이 없으면 `Config` 오류.
    pub fn from_config(config: &TushareConfig) -> Result<Self> {
        let token = config
            .resolve_token()
            .ok_or_else(|| DataError::Config("Tushare token not set (tushare.token or TUSHARE_TOKEN)".into()))?;
        Self::with_timeout(
            config.base_url.clone(),
            token,
            Duration::from_secs(config.timeout_secs),
        )
    }

    /// 조회할 거래소 코드 (예: "SSE", "SZSE"). 빈 문자열이면 기본 거래소.
    pub fn with_exchange(mut self, exchange: impl Into<String>) -> Self {
        self.exchange = exchange.into();
        self
    }
}

#[async_trait]
impl CalendarSource for TushareCalendarSource {
    fn name(&self) -> &str {
        "tushare"
    }

    #[instrument(skip(self), fields(exchange = %self.exchange))]
    async fn fetch_trading_days(&self, start: TradeDay, end: TradeDay) -> Result<Vec<CalendarDay>> {
        let request = TushareRequest {
            api_name: "trade_cal",
            token: &self.token,
            params: TradeCalParams {
                exchange: &self.exchange,
                start_date: start.to_string(),
                end_date: end.to_string(),
            },
            fields: TRADE_CAL_FIELDS,
        };

        let response = self.client.post(&self.base_url).json(&request).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(DataError::Source(format!("trade_cal HTTP {}: {}", status, body)));
        }

        let body: TushareResponse = response.json().await?;
        let rows = parse_trade_cal(body)?;

        debug!(
            start = %start,
            end = %end,
            rows = rows.len(),
            open = rows.iter().filter(|r| r.is_open).count(),
            "Tushare 거래일 달력 조회 완료"
        );

        Ok(rows)
    }
}

fn parse_trade_cal(body: TushareResponse) -> Result<Vec<CalendarDay>> {
    if body.code != 0 {
        return Err(DataError::Source(format!(
            "trade_cal error code {}: {}",
            body.code,
            body.msg.unwrap_or_default()
        )));
    }

    let table = body
        .data
        .ok_or_else(|| DataError::Source("trade_cal response has no data".into()))?;

    let column = |name: &str| {
        table
            .fields
            .iter()
            .position(|f| f == name)
            .ok_or_else(|| DataError::Source(format!("trade_cal response missing field '{name}'")))
    };
    let date_idx = column("cal_date")?;
    let open_idx = column("is_open")?;

    table
        .items
        .iter()
        .map(|row| {
            let date = row
                .get(date_idx)
                .and_then(|v| v.as_str())
                .ok_or_else(|| DataError::Source(format!("malformed cal_date in row {:?}", row)))?
                .parse::<TradeDay>()?;
            let is_open = match row.get(open_idx) {
                Some(serde_json::Value::Number(n)) => n.as_i64() == Some(1),
                Some(serde_json::Value::String(s)) => s == "1",
                Some(serde_json::Value::Bool(b)) => *b,
                _ => {
                    return Err(DataError::Source(format!(
                        "malformed is_open in row {:?}",
                        row
                    )))
                }
            };
            Ok(CalendarDay { date, is_open })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn d(v: u32) -> TradeDay {
        TradeDay::new(v).unwrap()
    }

    const BODY: &str = r#"{
        "request_id": "abc",
        "code": 0,
        "msg": "",
        "data": {
            "fields": ["exchange", "cal_date", "is_open", "pretrade_date"],
            "items": [
                ["SSE", "20250106", 1, "20250103"],
                ["SSE", "20250105", 0, "20250103"],
                ["SSE", "20250104", 0, "20250103"],
                ["SSE", "20250103", 1, "20250102"]
            ],
            "has_more": false
        }
    }"#;

    #[tokio::test]
    async fn test_fetch_trade_cal() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/")
            .match_body(Matcher::PartialJson(serde_json::json!({
                "api_name": "trade_cal",
                "token": "t0ken",
                "params": {"exchange": "SSE", "start_date": "20250103", "end_date": "20250106"}
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(BODY)
            .create_async()
            .await;

        let source = TushareCalendarSource::new(server.url(), "t0ken")
            .unwrap()
            .with_exchange("SSE");
        let rows = source.fetch_trading_days(d(20250103), d(20250106)).await.unwrap();

        mock.assert_async().await;
        assert_eq!(rows.len(), 4);
        let open: Vec<TradeDay> = rows.iter().filter(|r| r.is_open).map(|r| r.date).collect();
        assert_eq!(open, vec![d(20250106), d(20250103)]);
    }

    #[tokio::test]
    async fn test_api_error_code() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/")
            .with_status(200)
            .with_body(r#"{"code": 40101, "msg": "token invalid", "data": null}"#)
            .create_async()
            .await;

        let source = TushareCalendarSource::new(server.url(), "bad").unwrap();
        let err = source
            .fetch_trading_days(d(20250103), d(20250106))
            .await
            .unwrap_err();
        assert!(matches!(err, DataError::Source(ref m) if m.contains("40101")));
    }

    #[tokio::test]
    async fn test_http_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/")
            .with_status(503)
            .create_async()
            .await;

        let source = TushareCalendarSource::new(server.url(), "t").unwrap();
        assert!(matches!(
            source.fetch_trading_days(d(20250103), d(20250106)).await,
            Err(DataError::Source(_))
        ));
    }

    #[test]
    fn test_string_is_open_and_missing_field() {
        let ok: TushareResponse = serde_json::from_str(
            r#"{"code":0,"data":{"fields":["cal_date","is_open"],"items":[["20250102","1"],["20250101","0"]]}}"#,
        )
        .unwrap();
        let rows = parse_trade_cal(ok).unwrap();
        assert_eq!(rows, vec![CalendarDay::open(d(20250102)), CalendarDay::closed(d(20250101))]);

        let missing: TushareResponse = serde_json::from_str(
            r#"{"code":0,"data":{"fields":["cal_date"],"items":[["20250102"]]}}"#,
        )
        .unwrap();
        assert!(parse_trade_cal(missing).is_err());
    }

    #[test]
    fn test_from_config_requires_token() {
        let config = TushareConfig {
            token: String::new(),
            ..Default::default()
        };
        if std::env::var("TUSHARE_TOKEN").is_err() {
            assert!(matches!(
                TushareCalendarSource::from_config(&config),
                Err(DataError::Config(_))
            ));
        }
    }
}
