use redis::{aio::ConnectionManager, AsyncCommands, RedisResult, Script};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, error, info, warn};

use super::CacheConfig;
use crate::utils::errors::{AppError, AppResult};

/// Borra la clave solo si el JSON almacenado pertenece al dueño indicado
const RELEASE_IF_OWNER: &str = r#"
local value = redis.call('GET', KEYS[1])
if not value then
    return 0
end
local decoded = cjson.decode(value)
if decoded[ARGV[1]] == ARGV[2] then
    return redis.call('DEL', KEYS[1])
end
return 0
"#;

/// Cliente Redis con connection manager y primitivas de lease
#[derive(Clone)]
pub struct RedisClient {
    manager: ConnectionManager,
    config: CacheConfig,
}

impl RedisClient {
    /// Crear nuevo cliente Redis
    pub async fn new(config: CacheConfig) -> anyhow::Result<Self> {
        info!("🔗 Conectando a Redis: {}", config.redis_url);

        let client = redis::Client::open(config.redis_url.clone())?;
        let manager = ConnectionManager::new(client).await?;

        // Test de conexión usando un comando simple
        let mut conn = manager.clone();
        let _: () = redis::cmd("PING").query_async(&mut conn).await?;

        info!("✅ Redis conectado exitosamente");

        Ok(Self { manager, config })
    }

    /// Generar clave con prefijo
    pub fn make_key(&self, prefix: &str, identifier: &str) -> String {
        format!("{}:{}:{}", self.config.key_prefix, prefix, identifier)
    }

    /// SET NX EX: `true` si la clave se creó, `false` si ya existía
    pub async fn set_if_absent<T: Serialize + Sync>(&self, key: &str, value: &T, ttl_secs: u64) -> AppResult<bool> {
        let mut conn = self.manager.clone();
        let serialized = serde_json::to_string(value)
            .map_err(|e| AppError::Internal(format!("Cannot serialize cache value: {}", e)))?;

        let result: RedisResult<Option<String>> = redis::cmd("SET")
            .arg(key)
            .arg(serialized)
            .arg("NX")
            .arg("EX")
            .arg(ttl_secs)
            .query_async(&mut conn)
            .await;

        match result {
            Ok(reply) => {
                let created = reply.is_some();
                debug!("🔒 Redis SET NX {} (TTL: {}s) → {}", key, ttl_secs, created);
                Ok(created)
            }
            Err(e) => {
                error!("❌ Error en SET NX para clave {}: {}", key, e);
                Err(AppError::Cache(e.to_string()))
            }
        }
    }

    /// SET EX incondicional (refresco de un lease propio)
    pub async fn set<T: Serialize + Sync>(&self, key: &str, value: &T, ttl_secs: u64) -> AppResult<()> {
        let mut conn = self.manager.clone();
        let serialized = serde_json::to_string(value)
            .map_err(|e| AppError::Internal(format!("Cannot serialize cache value: {}", e)))?;

        redis::cmd("SET")
            .arg(key)
            .arg(serialized)
            .arg("EX")
            .arg(ttl_secs)
            .query_async::<_, ()>(&mut conn)
            .await
            .map_err(|e| {
                error!("❌ Error guardando clave {}: {}", key, e);
                AppError::Cache(e.to_string())
            })?;

        debug!("💾 Redis SET para clave: {} (TTL: {}s)", key, ttl_secs);
        Ok(())
    }

    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> AppResult<Option<T>> {
        let mut conn = self.manager.clone();

        let value: Option<String> = conn.get(key).await.map_err(|e| {
            error!("❌ Error leyendo clave {}: {}", key, e);
            AppError::Cache(e.to_string())
        })?;

        match value {
            Some(raw) => match serde_json::from_str(&raw) {
                Ok(parsed) => Ok(Some(parsed)),
                Err(e) => {
                    warn!("⚠️ Valor corrupto en clave {}: {}", key, e);
                    Ok(None)
                }
            },
            None => Ok(None),
        }
    }

    /// Borrar la clave si `field` del JSON almacenado es igual a `owner`
    pub async fn delete_if_owner(&self, key: &str, field: &str, owner: &str) -> AppResult<bool> {
        let mut conn = self.manager.clone();

        let deleted: i64 = Script::new(RELEASE_IF_OWNER)
            .key(key)
            .arg(field)
            .arg(owner)
            .invoke_async(&mut conn)
            .await
            .map_err(|e| {
                error!("❌ Error liberando clave {}: {}", key, e);
                AppError::Cache(e.to_string())
            })?;

        debug!("🗑️ Redis DELETE condicional {} (eliminados: {})", key, deleted);
        Ok(deleted > 0)
    }
}
