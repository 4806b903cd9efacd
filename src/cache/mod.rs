//! Cache
//!
//! Este módulo contiene el cliente Redis y el almacenamiento de holds de franjas.

pub mod cache_config;
pub mod redis_client;
pub mod slot_hold_store;

pub use cache_config::CacheConfig;
pub use redis_client::RedisClient;
pub use slot_hold_store::{InMemorySlotHoldStore, RedisSlotHoldStore, SlotHoldStore};
