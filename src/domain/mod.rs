//! Domain types and the ports the application layer depends on.

pub mod account;
pub mod capability;
pub mod catalog;
pub mod engine;
pub mod fusion;
pub mod generation;
pub mod ledger;
pub mod payment;
pub mod ports;
pub mod quote;
pub mod rate;
