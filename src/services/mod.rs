//! Business logic services

pub mod eld;
pub mod geo;
pub mod geocoding;
pub mod hos;
pub mod mapbox;
pub mod routing;
