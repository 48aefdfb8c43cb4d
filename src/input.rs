use crate::core::climate::ClimateZone;
use anyhow::Context;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::io::Read;

/// Input types crossing the engine boundary. Collaborators (ingestion
/// pipelines, batch drivers, the demo binary) deserialize these from JSON or
/// assemble them programmatically; the engine itself never sees raw
/// measurement dictionaries.

/// One declared measurement from an EN 14825 test report.
///
/// The serde aliases accept the symbols used on published data sheets
/// (Tj/Pdh/COPd/Cd).
#[derive(Copy, Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct TestPoint {
    /// Outdoor dry-bulb temperature of the test condition, in Celsius.
    #[serde(alias = "Tj")]
    pub temperature: f64,
    /// Declared heating capacity Pdh, in kW.
    #[serde(alias = "Pdh")]
    pub capacity: f64,
    /// Declared coefficient of performance COPd.
    #[serde(alias = "COPd")]
    pub cop: f64,
    /// Degradation coefficient for this point; the engine-wide default
    /// applies when absent.
    #[serde(alias = "Cd", default)]
    pub degradation_coeff: Option<f64>,
}

/// Whether the unit's heat transfer medium on the indoor side is air or
/// water/brine; decides the F(2) pump correction in the efficiency formula.
#[derive(Copy, Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitType {
    #[default]
    Air,
    WaterBrine,
}

/// A complete calculation request, the engine's construction input.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct CalculationRequest {
    pub climate: ClimateZone,
    /// Design heating load Pdesignh, in kW. When absent it is inferred from
    /// the test point at the bivalent temperature.
    #[serde(default)]
    pub design_heating_load: Option<f64>,
    /// Test points keyed by label (conventionally A-F plus optional extras).
    /// Insertion order is observable: where several points share a
    /// temperature, the first one supplies the displayed declared values.
    pub test_points: IndexMap<String, TestPoint>,
    /// Bivalent temperature Tbiv, in Celsius.
    #[serde(default)]
    pub bivalent_temp: Option<f64>,
    /// Operating limit temperature TOL, in Celsius.
    #[serde(default)]
    pub operating_limit_temp: Option<f64>,
    /// Default degradation coefficient Cd for points without their own.
    #[serde(default = "default_degradation_coeff")]
    pub degradation_coeff: f64,
    /// Power in off mode POFF, in kW.
    #[serde(default)]
    pub power_off: f64,
    /// Power in thermostat-off mode PTO, in kW.
    #[serde(default)]
    pub power_thermostat_off: f64,
    /// Power in standby mode PSB, in kW.
    #[serde(default)]
    pub power_standby: f64,
    /// Power in crankcase heater mode PCK, in kW.
    #[serde(default)]
    pub power_crankcase: f64,
    #[serde(default)]
    pub unit_type: UnitType,
}

fn default_degradation_coeff() -> f64 {
    0.9
}

/// Read a calculation request from JSON.
pub fn request_from_json(json: impl Read) -> anyhow::Result<CalculationRequest> {
    serde_json::from_reader(json).context("Could not parse calculation request JSON")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::*;

    #[rstest]
    fn should_apply_request_defaults() {
        let request = request_from_json(
            r#"{
                "climate": "Average",
                "test_points": {
                    "A": {"temperature": -7, "capacity": 9.55, "cop": 3.26}
                },
                "design_heating_load": 11.46
            }"#
            .as_bytes(),
        )
        .unwrap();

        assert_eq!(request.degradation_coeff, 0.9);
        assert_eq!(request.power_off, 0.);
        assert_eq!(request.power_crankcase, 0.);
        assert_eq!(request.unit_type, UnitType::Air);
        assert_eq!(request.bivalent_temp, None);
        assert_eq!(request.test_points["A"].degradation_coeff, None);
    }

    #[rstest]
    fn should_accept_data_sheet_symbols() {
        let request = request_from_json(
            r#"{
                "climate": "Colder",
                "design_heating_load": 7.2,
                "unit_type": "water_brine",
                "test_points": {
                    "E": {"Tj": -15, "Pdh": 5.9, "COPd": 2.2, "Cd": 0.93}
                }
            }"#
            .as_bytes(),
        )
        .unwrap();

        let point = &request.test_points["E"];
        assert_eq!(
            point,
            &TestPoint {
                temperature: -15.,
                capacity: 5.9,
                cop: 2.2,
                degradation_coeff: Some(0.93),
            }
        );
        assert_eq!(request.unit_type, UnitType::WaterBrine);
    }

    #[rstest]
    fn should_report_malformed_json() {
        assert!(request_from_json("{\"climate\": \"Average\"".as_bytes()).is_err());
    }
}
