//! 구간 요청과 병합 결과.

use quant_core::TradeDay;
use serde_json::Value;
use std::collections::BTreeMap;

/// 캐시 구간 요청.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeRequest {
    pub domain: String,
    pub entity_id: Option<String>,
    pub start: TradeDay,
    pub end: TradeDay,
}

impl RangeRequest {
    pub fn new(domain: impl Into<String>, start: TradeDay, end: TradeDay) -> Self {
        Self {
            domain: domain.into(),
            entity_id: None,
            start,
            end,
        }
    }

    /// 하루짜리 요청.
    pub fn single_day(domain: impl Into<String>, day: TradeDay) -> Self {
        Self::new(domain, day, day)
    }

    pub fn with_entity(mut self, entity_id: impl Into<String>) -> Self {
        self.entity_id = Some(entity_id.into());
        self
    }

    pub fn entity(&self) -> Option<&str> {
        self.entity_id.as_deref()
    }
}

/// 병합된 조회 결과.
#[derive(Debug, Clone, PartialEq)]
pub enum RangeData {
    /// 요청 구간에 거래일이 없거나 하루짜리 요청이 채워지지 않음
    Empty,
    /// 하루짜리 요청의 페이로드
    Single(Value),
    /// 날짜별 페이로드 (거래일 순서)
    Daily(BTreeMap<TradeDay, Value>),
}

impl RangeData {
    pub fn is_empty(&self) -> bool {
        match self {
            RangeData::Empty => true,
            RangeData::Single(_) => false,
            RangeData::Daily(rows) => rows.is_empty(),
        }
    }

    /// 포함된 날짜 수.
    pub fn len(&self) -> usize {
        match self {
            RangeData::Empty => 0,
            RangeData::Single(_) => 1,
            RangeData::Daily(rows) => rows.len(),
        }
    }

    pub fn as_single(&self) -> Option<&Value> {
        match self {
            RangeData::Single(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_daily(&self) -> Option<&BTreeMap<TradeDay, Value>> {
        match self {
            RangeData::Daily(rows) => Some(rows),
            _ => None,
        }
    }

    /// JSON 값으로 변환합니다 (`Daily`는 `{"YYYYMMDD": payload}` 객체).
    pub fn to_json(&self) -> Value {
        match self {
            RangeData::Empty => Value::Null,
            RangeData::Single(value) => value.clone(),
            RangeData::Daily(rows) => Value::Object(
                rows.iter()
                    .map(|(day, value)| (day.to_string(), value.clone()))
                    .collect(),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn d(v: u32) -> TradeDay {
        TradeDay::new(v).unwrap()
    }

    #[test]
    fn test_request_builder() {
        let request = RangeRequest::new("daily", d(20250102), d(20250103)).with_entity("000001");
        assert_eq!(request.entity(), Some("000001"));

        let single = RangeRequest::single_day("index", d(20250102));
        assert_eq!(single.start, single.end);
        assert_eq!(single.entity(), None);
    }

    #[test]
    fn test_range_data_to_json() {
        let data = RangeData::Daily(BTreeMap::from([(d(20250103), json!(2)), (d(20250102), json!(1))]));
        assert_eq!(data.len(), 2);
        assert_eq!(data.to_json(), json!({"20250102": 1, "20250103": 2}));

        assert!(RangeData::Empty.is_empty());
        assert_eq!(RangeData::Single(json!("x")).as_single(), Some(&json!("x")));
    }
}
