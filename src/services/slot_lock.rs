//! Locks por franja dentro del proceso
//!
//! Serializa la secuencia comprobar-y-escribir sobre (tier, slot_start).
//! La unicidad entre procesos la sigue garantizando el store.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

pub type SlotKey = (String, DateTime<Utc>);

#[derive(Default)]
pub struct SlotLocks {
    locks: Mutex<HashMap<SlotKey, Arc<Mutex<()>>>>,
}

/// Guards mantenidos mientras dura la sección crítica
pub struct SlotLockGuard {
    _guards: Vec<OwnedMutexGuard<()>>,
}

impl SlotLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self, vehicle_type_id: &str, slot_start: DateTime<Utc>) -> SlotLockGuard {
        self.lock_many(vec![(vehicle_type_id.to_string(), slot_start)]).await
    }

    /// Adquirir varias franjas en orden total para evitar deadlocks
    pub async fn lock_many(&self, mut keys: Vec<SlotKey>) -> SlotLockGuard {
        keys.sort();
        keys.dedup();

        let mutexes: Vec<Arc<Mutex<()>>> = {
            let mut locks = self.locks.lock().await;
            // Entradas sin nadie esperando ni reteniendo
            locks.retain(|_, m| Arc::strong_count(m) > 1);
            keys.into_iter()
                .map(|key| locks.entry(key).or_default().clone())
                .collect()
        };

        let mut guards = Vec::with_capacity(mutexes.len());
        for mutex in mutexes {
            guards.push(mutex.lock_owned().await);
        }
        SlotLockGuard { _guards: guards }
    }

    #[cfg(test)]
    async fn tracked(&self) -> usize {
        self.locks.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::time::Duration;

    fn slot(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 2, hour, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn test_same_slot_is_serialized() {
        let locks = Arc::new(SlotLocks::new());
        let guard = locks.lock("van", slot(14)).await;

        let contender = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _g = locks.lock("van", slot(14)).await;
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!contender.is_finished());

        drop(guard);
        contender.await.unwrap();
    }

    #[tokio::test]
    async fn test_distinct_slots_do_not_block() {
        let locks = SlotLocks::new();
        let _van = locks.lock("van", slot(14)).await;
        let _xl = locks.lock("xl", slot(14)).await;
        let _later = locks.lock("van", slot(15)).await;
    }

    #[tokio::test]
    async fn test_lock_many_dedups_and_cleans_up() {
        let locks = SlotLocks::new();
        {
            let _g = locks
                .lock_many(vec![
                    ("van".to_string(), slot(15)),
                    ("van".to_string(), slot(14)),
                    ("van".to_string(), slot(15)),
                ])
                .await;
            assert_eq!(locks.tracked().await, 2);
        }
        let _other = locks.lock("xl", slot(9)).await;
        assert_eq!(locks.tracked().await, 1);
    }
}
