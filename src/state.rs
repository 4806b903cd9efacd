//! Shared application state
//!
//! Este módulo define el estado compartido de la aplicación que se pasa
//! a través del router de Axum, y el cableado de almacenamiento:
//! PostgreSQL/Redis cuando están configurados, memoria en su defecto.

use anyhow::{anyhow, Result};
use std::sync::Arc;
use tracing::{info, warn};

use crate::cache::{CacheConfig, InMemorySlotHoldStore, RedisClient, RedisSlotHoldStore, SlotHoldStore};
use crate::config::environment::EnvironmentConfig;
use crate::config::{BookingPolicy, SchedulingConfig};
use crate::database::DatabaseConnection;
use crate::repositories::{
    BookingRepository, BookingStore, EstimateRepository, EstimateStore, InMemoryBookingStore,
    InMemoryEstimateStore, InMemoryVehicleCatalog, VehicleCatalog, VehicleRepository,
};
use crate::services::{
    BookingService, EstimateService, LogNotificationDispatcher, NotificationDispatcher, PricingEngine,
    RouteOracle, TimeSlotService,
};

/// Backend de reservas y cotizaciones
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Postgres,
    InMemory,
}

impl StorageBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageBackend::Postgres => "postgres",
            StorageBackend::InMemory => "memory",
        }
    }
}

/// Backend de holds de franjas
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HoldBackend {
    Redis,
    InMemory,
}

impl HoldBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            HoldBackend::Redis => "redis",
            HoldBackend::InMemory => "memory",
        }
    }
}

/// Piezas intercambiables con las que se arma el estado
pub struct Stores {
    pub catalog: Arc<dyn VehicleCatalog>,
    pub estimates: Arc<dyn EstimateStore>,
    pub bookings: Arc<dyn BookingStore>,
    pub holds: Arc<dyn SlotHoldStore>,
}

impl Stores {
    /// Todo en memoria, con la flota por defecto
    pub fn in_memory() -> Self {
        Self {
            catalog: Arc::new(InMemoryVehicleCatalog::with_default_fleet()),
            estimates: Arc::new(InMemoryEstimateStore::new()),
            bookings: Arc::new(InMemoryBookingStore::new()),
            holds: Arc::new(InMemorySlotHoldStore::new()),
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub config: EnvironmentConfig,
    pub storage: StorageBackend,
    pub hold_backend: HoldBackend,
    pub estimate_service: Arc<EstimateService>,
    pub time_slot_service: Arc<TimeSlotService>,
    pub booking_service: Arc<BookingService>,
}

impl AppState {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: EnvironmentConfig,
        storage: StorageBackend,
        hold_backend: HoldBackend,
        stores: Stores,
        oracle: Arc<dyn RouteOracle>,
        pricing: PricingEngine,
        scheduling: SchedulingConfig,
        policy: BookingPolicy,
        notifier: Arc<dyn NotificationDispatcher>,
    ) -> Self {
        let estimate_service = Arc::new(EstimateService::new(
            stores.catalog,
            stores.estimates,
            oracle,
            pricing,
        ));
        let time_slot_service = Arc::new(TimeSlotService::new(stores.bookings.clone(), stores.holds, scheduling));
        let booking_service = Arc::new(BookingService::new(
            stores.bookings,
            estimate_service.clone(),
            time_slot_service.clone(),
            notifier,
            policy,
        ));

        Self {
            config,
            storage,
            hold_backend,
            estimate_service,
            time_slot_service,
            booking_service,
        }
    }

    /// Estado completamente en memoria (desarrollo y tests)
    pub fn in_memory(
        config: EnvironmentConfig,
        oracle: Arc<dyn RouteOracle>,
        pricing: PricingEngine,
        scheduling: SchedulingConfig,
        policy: BookingPolicy,
    ) -> Self {
        Self::new(
            config,
            StorageBackend::InMemory,
            HoldBackend::InMemory,
            Stores::in_memory(),
            oracle,
            pricing,
            scheduling,
            policy,
            Arc::new(LogNotificationDispatcher),
        )
    }

    /// Conectar PostgreSQL y Redis según la configuración; sin URL se usa memoria
    pub async fn connect(
        config: EnvironmentConfig,
        oracle: Arc<dyn RouteOracle>,
        pricing: PricingEngine,
        scheduling: SchedulingConfig,
        policy: BookingPolicy,
    ) -> Result<Self> {
        let mut stores = Stores::in_memory();

        let storage = match &config.database_url {
            Some(url) => {
                let db = DatabaseConnection::connect(url, &config.database_pool).await?;
                db.run_migrations().await?;
                let pool = db.pool().clone();
                stores.catalog = Arc::new(VehicleRepository::new(pool.clone()));
                stores.estimates = Arc::new(EstimateRepository::new(pool.clone()));
                stores.bookings = Arc::new(BookingRepository::new(pool));
                StorageBackend::Postgres
            }
            None if config.is_production() => {
                return Err(anyhow!("DATABASE_URL is required when ENVIRONMENT=production"));
            }
            None => {
                warn!("⚠️ DATABASE_URL no configurada: usando almacenamiento en memoria (solo desarrollo)");
                StorageBackend::InMemory
            }
        };

        let hold_backend = match &config.redis_url {
            Some(url) => {
                let redis = RedisClient::new(CacheConfig::new(url.clone())).await?;
                info!("✅ Redis conectado para holds de franjas");
                stores.holds = Arc::new(RedisSlotHoldStore::new(redis));
                HoldBackend::Redis
            }
            None => {
                warn!("⚠️ REDIS_URL no configurada: holds de franjas en memoria del proceso");
                HoldBackend::InMemory
            }
        };

        Ok(Self::new(
            config,
            storage,
            hold_backend,
            stores,
            oracle,
            pricing,
            scheduling,
            policy,
            Arc::new(LogNotificationDispatcher),
        ))
    }
}
