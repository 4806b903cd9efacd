//! Services module
//!
//! Este módulo contiene la lógica de negocio: precios, rutas, cotizaciones,
//! disponibilidad de franjas y ciclo de vida de reservas.

pub mod booking_service;
pub mod estimate_service;
pub mod notification_service;
pub mod pricing_service;
pub mod route_oracle;
pub mod slot_lock;
pub mod time_slot_service;

pub use booking_service::{BookingChanges, BookingService, BookingStatusSummary, CreateBooking};
pub use estimate_service::{EstimateQuote, EstimateService, DEFAULT_ESTIMATED_DURATION_MINUTES};
pub use notification_service::{BookingNotification, LogNotificationDispatcher, NotificationDispatcher};
pub use pricing_service::{PriceBreakdown, PricingEngine, PricingStrategy};
pub use route_oracle::{HereRouteOracle, RouteOracle};
pub use time_slot_service::TimeSlotService;
