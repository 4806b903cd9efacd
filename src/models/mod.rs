//! Modelos del sistema
//!
//! Este módulo contiene los modelos de datos que mapean al schema
//! PostgreSQL y los tipos calculados de franjas horarias.

pub mod booking;
pub mod estimate;
pub mod route;
pub mod time_slot;
pub mod vehicle;

pub use booking::{Booking, BookingStatus, NewBooking};
pub use estimate::{Estimate, EstimateStatus, NewEstimate};
pub use route::{Coordinates, Location, RouteResult};
pub use time_slot::{AvailabilityResponse, BusyHour, BusyTimesResponse, DemandLevel, SlotHold, TimeSlot};
pub use vehicle::VehicleTier;
