//! Configuración del proyecto
//!
//! Este módulo contiene la configuración de base de datos, variables de entorno,
//! ventana operativa de franjas y política de reservas.

pub mod database;
pub mod environment;
pub mod scheduling;

pub use environment::*;
pub use scheduling::{BookingPolicy, EffectiveWindow, SchedulingConfig, ServiceAreaOverride};
