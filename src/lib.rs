//! Room booking with recurring-booking conflict detection.
//!
//! [`services::conflict`] decides whether two bookings can collide,
//! [`services::admission`] turns that decision into an atomic create,
//! update or delete against a store, and [`services::materializer`]
//! expands bookings into dated occurrences for calendar views.

pub mod config;
pub mod db;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod services;
pub mod state;
