//! Business logic services.
//!
//! Services contain core business logic independent of any storage backend.
//! They own unit-of-work boundaries, validation, and locking order.

pub mod ledger_service;
