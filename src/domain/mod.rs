//! Pure storefront rules, free of storage concerns.
//!
//! Everything here operates on loaded rows and returns either computed
//! values or taxonomy errors; the service modules translate the results
//! into SQL effects.

pub mod pricing;
pub mod stock;
