//! # Promptly Core
//!
//! Domain layer of the Promptly prompt marketplace: catalogs of prompts
//! owned by authors, user accounts with credits and social links, and the
//! use cases that read and mutate them through the [`ports::DocumentStore`]
//! port. No infrastructure lives here.

pub mod domain;
pub mod error;
pub mod ports;
pub mod services;

pub use error::DomainError;
