//! Business logic services for the storefront.
//!
//! # Services
//!
//! - `auth` - Registration and password login
//! - `token` - Signed bearer tokens carrying the user id and role
//! - `catalog` - Cached product snapshot and product writes
//! - `cart` - Guest (session) and account (versioned row) carts
//! - `checkout` - Order placement, payment reconciliation, order status
//! - `booking` - Tour seat and homestay room reservations
//! - `razorpay` - Payment gateway client and signature checks

pub mod auth;
pub mod booking;
pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod razorpay;
pub mod signing;
pub mod token;
