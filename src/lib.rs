//! Dwolla Gateway - Dwolla ACH transfers for the Kill Bill billing platform
//!
//! This crate keeps per-tenant Dwolla credentials fresh, turns purchases and
//! refunds into Dwolla transfers, records every processor reply, and settles
//! pending billing transactions when Dwolla webhooks arrive.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
