//! Kharnak Core - shared types and the cart model.
//!
//! This crate provides the types used across all Kharnak components:
//! - `storefront` - REST backend for the shop, booking site, and back-office
//! - `cli` - Command-line tools for migrations, seeding, and user management
//!
//! # Architecture
//!
//! The core crate contains only types and pure logic - no I/O, no database
//! access, no HTTP clients. The storefront decides where a [`Cart`] lives
//! (session or database); this crate decides what a cart mutation means.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for type-safe IDs, prices, emails, and statuses
//! - [`cart`] - Cart lines keyed by product and size, with stock checks and totals

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cart;
pub mod types;

pub use cart::{Cart, CartError, CartLine, Catalog, CatalogEntry, STANDARD_SIZE};
pub use types::*;
