//! Promotion cycle simulator for a ranked organisation.
//!
//! A roster of personnel is stepped through twice-yearly cycle dates. On each date
//! three passes run in order: promotion, absorption of overflow occupants into
//! regular vacancies, and retirement.

pub mod absorption;
pub mod analysis;
pub mod calendar;
pub mod config;
pub mod error;
pub mod export;
pub mod history;
pub mod promotion;
pub mod retirement;
pub mod roster;
pub mod simulation;
pub mod types;
