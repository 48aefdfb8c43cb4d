use crate::core::climate::ClimateZone;
use thiserror::Error;

/// Errors raised while constructing a calculator from a request.
///
/// These are the only failures the engine surfaces: once a calculator has
/// been built, the seasonal aggregation itself cannot fail.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("no climate profile is registered for the {0} zone")]
    UnknownClimate(ClimateZone),
    #[error("at least one test point must be provided")]
    NoTestPoints,
    #[error("a design heating load must be provided when no bivalent temperature is set")]
    MissingBivalentTemperature,
    #[error("cannot infer the design heating load: the part load ratio at the bivalent temperature ({0}C) is zero")]
    ZeroPartLoadAtBivalent(f64),
    #[error("cannot infer the design heating load: no test point declares capacity at the bivalent temperature ({0}C)")]
    NoTestPointAtBivalent(f64),
}
