pub mod batch;
pub mod core;
pub mod errors;
pub mod input;
pub mod output;

#[macro_use]
extern crate is_close;

pub use crate::core::climate::{Bin, ClimateProfile, ClimateRegistry, ClimateZone};
pub use crate::core::scop::{
    BinResult, BinTable, BinTotals, CopBinDetail, ScopCalculator, SeasonalMetrics,
};
pub use crate::errors::ConfigError;
pub use crate::input::{request_from_json, CalculationRequest, TestPoint, UnitType};

/// Run one calculation against the standard EN 14825:2018 climate registry.
///
/// Callers needing synthetic climates construct a `ScopCalculator` against
/// their own `ClimateRegistry` instead.
pub fn run_calculation(
    request: CalculationRequest,
) -> Result<(SeasonalMetrics, BinTable), ConfigError> {
    let calculator = ScopCalculator::new(request, &ClimateRegistry::default())?;
    Ok(calculator.calculate_seasonal_performance())
}
