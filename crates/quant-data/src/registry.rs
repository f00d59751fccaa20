//! 프로세스 전역 데이터 계층 레지스트리.
//!
//! 암묵적으로 생성되지 않습니다. 애플리케이션이 시작할 때 `init`으로 등록하고
//! 종료할 때 `teardown`으로 해제합니다.

use crate::error::{DataError, Result};
use crate::manager::QuantData;
use std::sync::{Arc, RwLock};
use tracing::{info, warn};

static REGISTRY: RwLock<Option<Arc<QuantData>>> = RwLock::new(None);

/// 전역 데이터 계층 등록. 기존 인스턴스가 있으면 교체합니다.
pub fn init(data: QuantData) -> Arc<QuantData> {
    let data = Arc::new(data);
    let mut slot = REGISTRY.write().unwrap_or_else(|e| e.into_inner());
    if slot.replace(data.clone()).is_some() {
        warn!("데이터 계층이 이미 등록되어 있어 교체함");
    } else {
        info!("데이터 계층 등록");
    }
    data
}

/// 등록된 데이터 계층. 등록 전이면 `NotInitialized`.
pub fn get() -> Result<Arc<QuantData>> {
    REGISTRY
        .read()
        .unwrap_or_else(|e| e.into_inner())
        .clone()
        .ok_or(DataError::NotInitialized)
}

/// 등록 해제. 이미 가져간 `Arc`는 계속 유효합니다.
pub fn teardown() -> Option<Arc<QuantData>> {
    let previous = REGISTRY.write().unwrap_or_else(|e| e.into_inner()).take();
    if previous.is_some() {
        info!("데이터 계층 등록 해제");
    }
    previous
}
