//! Controllers
//!
//! Validan los DTOs, llaman al servicio y arman la respuesta.

pub mod booking_controller;
pub mod estimate_controller;

pub use booking_controller::BookingController;
pub use estimate_controller::EstimateController;
