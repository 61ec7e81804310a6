//! Invoice lifecycle, totals and access rules for a garage management system.
//!
//! [`service::InvoiceService`] is the entry point: it validates drafts,
//! computes totals with [`calculator`], enforces the [`lifecycle`] and
//! [`access`] rules and persists through [`store`] on a sled database.

pub mod access;
pub mod calculator;
pub mod config;
pub mod error;
pub mod hooks;
pub mod inventory;
pub mod invoice;
pub mod lifecycle;
pub mod listing;
pub mod numbering;
pub mod service;
pub mod store;
pub mod types;
pub mod utils;

pub use error::InvoiceError;
