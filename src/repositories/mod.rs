//! Repositorios
//!
//! Acceso a datos detrás de traits: implementación Postgres (sqlx) y
//! variantes en memoria para desarrollo y tests.

pub mod booking_repository;
pub mod estimate_repository;
pub mod vehicle_repository;

pub use booking_repository::{BookingRepository, BookingStore, InMemoryBookingStore};
pub use estimate_repository::{EstimateRepository, EstimateStore, InMemoryEstimateStore};
pub use vehicle_repository::{InMemoryVehicleCatalog, VehicleCatalog, VehicleRepository};
