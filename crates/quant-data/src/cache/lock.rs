//! 키별 페칭 Lock 맵.
//!
//! 같은 `(domain, entity_id)`에 대한 구간 채우기는 한 번에 하나만 진행됩니다.
//! 서로 다른 키는 경합하지 않습니다.

use crate::storage::entity_key;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

/// Lock 키. 엔티티는 저장소와 같은 식별자(`entity_key`)를 사용합니다.
pub type FetchKey = (String, String);

/// 키별 Lock 맵.
#[derive(Default)]
pub struct FetchLockMap {
    locks: RwLock<HashMap<FetchKey, Arc<Mutex<()>>>>,
}

impl FetchLockMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// 키의 Lock을 획득합니다. 가드가 해제되면 Lock도 해제됩니다.
    pub async fn acquire(&self, domain: &str, entity_id: Option<&str>) -> OwnedMutexGuard<()> {
        let key = (domain.to_string(), entity_key(entity_id).to_string());
        self.get_or_create_lock(key).await.lock_owned().await
    }

    /// Lock 획득 또는 생성. 생성할 때 아무도 사용하지 않는 항목을 정리합니다.
    async fn get_or_create_lock(&self, key: FetchKey) -> Arc<Mutex<()>> {
        let locks = self.locks.read().await;
        if let Some(lock) = locks.get(&key) {
            return lock.clone();
        }
        drop(locks);

        let mut locks = self.locks.write().await;
        locks.retain(|k, lock| *k == key || Arc::strong_count(lock) > 1);
        locks
            .entry(key)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// 현재 맵에 남아 있는 키 수.
    pub async fn len(&self) -> usize {
        self.locks.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.locks.read().await.is_empty()
    }
}
