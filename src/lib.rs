//! echoserv: a layered HTTP echo service.
//!
//! The business value here is structural, not functional:
//! - Strict layering enforced by module visibility. The transport layer
//!   (`router`), business layer (`logic`), and data-access layer (`store`)
//!   are private modules; only the lifecycle manager (`service`) names their
//!   concrete types. Dependencies point one way:
//!   `service → router → logic → store`.
//! - A lifecycle that hosts the same service in two mutually exclusive
//!   modes, standalone (bind and block) and embedded (start inside the
//!   caller's process for test harnesses), with byte-identical behavior.
//!
//! The public surface is deliberately narrow: the configuration types, the
//! `service::start` entry point with its handle, the error taxonomy, and,
//! solely for test assembly, the [`Store`] capability trait and the
//! [`DomainError`] shape the router's documented responses derive from.

pub mod config;
pub mod error;
pub mod service;

mod logic;
mod router;
mod store;

pub use error::{Error, Result};
pub use logic::DomainError;
pub use store::{Store, StoreError};
