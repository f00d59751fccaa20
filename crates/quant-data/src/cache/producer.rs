//! 데이터 생산자 계약.

use async_trait::async_trait;
use quant_core::TradeDay;
use serde_json::Value;
use std::collections::BTreeMap;

/// 생산자가 한 구간에 대해 반환하는 데이터.
///
/// - 여러 날짜 구간: `Daily` (날짜별 페이로드)
/// - 하루 구간: `Daily`(한 항목) 또는 `Single`
///
/// 여러 날짜 구간에 대한 `Single`은 계약 위반입니다.
#[derive(Debug, Clone, PartialEq)]
pub enum ProducerOutput {
    Daily(BTreeMap<TradeDay, Value>),
    Single(Value),
}

impl ProducerOutput {
    /// 날짜별 응답을 생성합니다.
    pub fn daily(rows: impl IntoIterator<Item = (TradeDay, Value)>) -> Self {
        ProducerOutput::Daily(rows.into_iter().collect())
    }
}

/// 날짜 구간 데이터 생산자.
///
/// `start..=end`는 요청한 거래일 구간의 양 끝입니다. 응답에 없는 날짜는 누락으로 남아
/// 다음 요청에서 다시 조회됩니다.
#[async_trait]
pub trait DataProducer: Send + Sync {
    async fn fetch(
        &self,
        entity_id: Option<&str>,
        start: TradeDay,
        end: TradeDay,
    ) -> anyhow::Result<ProducerOutput>;
}
