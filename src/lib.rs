/*
 * Swapdesk - Quote, Approve and Swap Checkout Service
 * Core library exports and module declarations
 */

pub mod api;
pub mod config;
pub mod dex;
pub mod metrics;
pub mod models;
pub mod pricing;
pub mod rpc;
pub mod service;
pub mod utils;

pub use config::Config;
pub use models::*;
pub use service::CheckoutService;
