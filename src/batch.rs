use crate::core::climate::{ClimateRegistry, ClimateZone};
use crate::core::scop::{ScopCalculator, SeasonalMetrics};
use crate::input::{CalculationRequest, TestPoint, UnitType};
use indexmap::IndexMap;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use strum_macros::Display;
use thiserror::Error;
use tracing::{debug, warn};

/// Collaborator boundary for certification-database corpora: maps EN-coded
/// measurement dictionaries onto typed engine requests and fans a batch of
/// variant/dimension combinations out across the calculator. The engine
/// itself is agnostic to EN-code naming; the fixed code-to-field lookup
/// lives here.

/// Measurement identifiers from the EN 14825 section of certification data
/// sheets.
pub mod en_codes {
    pub const REPORTED_EFFICIENCY: &str = "EN14825_001";
    pub const RATED_CAPACITY: &str = "EN14825_002";
    pub const REPORTED_SCOP: &str = "EN14825_003";
    pub const BIVALENT_TEMP: &str = "EN14825_004";
    pub const OPERATING_LIMIT_TEMP: &str = "EN14825_005";
    pub const CAPACITY_MINUS_7: &str = "EN14825_008";
    pub const COP_MINUS_7: &str = "EN14825_009";
    pub const CAPACITY_PLUS_2: &str = "EN14825_010";
    pub const COP_PLUS_2: &str = "EN14825_011";
    pub const CAPACITY_PLUS_7: &str = "EN14825_012";
    pub const COP_PLUS_7: &str = "EN14825_013";
    pub const CAPACITY_PLUS_12: &str = "EN14825_014";
    pub const COP_PLUS_12: &str = "EN14825_015";
    pub const CAPACITY_BIVALENT: &str = "EN14825_016";
    pub const COP_BIVALENT: &str = "EN14825_017";
    pub const CAPACITY_OPERATING_LIMIT: &str = "EN14825_018";
    pub const COP_OPERATING_LIMIT: &str = "EN14825_019";
    pub const DEGRADATION_OPERATING_LIMIT: &str = "EN14825_021";
    pub const POWER_OFF: &str = "EN14825_023";
    pub const POWER_THERMOSTAT_OFF: &str = "EN14825_024";
    pub const POWER_STANDBY: &str = "EN14825_025";
    pub const POWER_CRANKCASE: &str = "EN14825_026";
    pub const REPORTED_ACTIVE_ENERGY: &str = "EN14825_029";
    pub const CAPACITY_MINUS_15: &str = "EN14825_044";
    pub const COP_MINUS_15: &str = "EN14825_045";
    pub const DEGRADATION_MINUS_7: &str = "EN14825_047";
    pub const DEGRADATION_PLUS_2: &str = "EN14825_048";
    pub const DEGRADATION_PLUS_7: &str = "EN14825_049";
    pub const DEGRADATION_PLUS_12: &str = "EN14825_050";
    pub const DEGRADATION_MINUS_15: &str = "EN14825_051";
}

const BASE_REQUIRED_CODES: [&str; 19] = [
    en_codes::RATED_CAPACITY,
    en_codes::REPORTED_SCOP,
    en_codes::BIVALENT_TEMP,
    en_codes::OPERATING_LIMIT_TEMP,
    en_codes::CAPACITY_MINUS_7,
    en_codes::COP_MINUS_7,
    en_codes::CAPACITY_PLUS_2,
    en_codes::COP_PLUS_2,
    en_codes::CAPACITY_PLUS_7,
    en_codes::COP_PLUS_7,
    en_codes::CAPACITY_PLUS_12,
    en_codes::COP_PLUS_12,
    en_codes::CAPACITY_BIVALENT,
    en_codes::COP_BIVALENT,
    en_codes::CAPACITY_OPERATING_LIMIT,
    en_codes::COP_OPERATING_LIMIT,
    en_codes::POWER_OFF,
    en_codes::POWER_THERMOSTAT_OFF,
    en_codes::POWER_STANDBY,
];

const EXTRA_REQUIRED_CODES: [&str; 2] =
    [en_codes::POWER_CRANKCASE, en_codes::REPORTED_ACTIVE_ENERGY];

const OPTIONAL_CODES: [&str; 8] = [
    en_codes::REPORTED_EFFICIENCY,
    en_codes::DEGRADATION_OPERATING_LIMIT,
    en_codes::DEGRADATION_MINUS_7,
    en_codes::DEGRADATION_PLUS_2,
    en_codes::DEGRADATION_PLUS_7,
    en_codes::DEGRADATION_PLUS_12,
    en_codes::DEGRADATION_MINUS_15,
    en_codes::CAPACITY_MINUS_15,
];

/// When no EN code carries a point's degradation coefficient the data sheet
/// convention of 0.9 applies.
const FALLBACK_DEGRADATION_COEFF: f64 = 0.9;

/// Temperature application encoded by the first dimension token.
#[derive(Copy, Clone, Debug, Display, Eq, PartialEq, Serialize)]
pub enum Application {
    /// 35C flow temperature.
    LowTemp,
    /// 55C flow temperature.
    MediumTemp,
    /// 65C flow temperature.
    HighTemp,
}

#[derive(Clone, Debug, Error, PartialEq)]
pub enum DimensionError {
    #[error("dimension string {0:?} is not four underscore separated integer tokens")]
    Malformed(String),
    #[error("unsupported application digit {0} in dimension string")]
    UnknownApplication(u32),
    #[error("unsupported climate digit {0} in dimension string")]
    UnknownClimate(u32),
}

/// A parsed `"{application}_{climate}_{indoor}_{hptype}"` dimension string.
///
/// The raw string is parsed once at the boundary; nothing downstream ever
/// re-tokenizes it.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
pub struct DimensionKey {
    pub application: Application,
    pub climate: ClimateZone,
    pub indoor_unit: u32,
    pub heat_pump_type: u32,
}

impl FromStr for DimensionKey {
    type Err = DimensionError;

    fn from_str(dimension: &str) -> Result<Self, Self::Err> {
        let tokens: Vec<u32> = dimension
            .split('_')
            .map(|token| token.parse::<u32>())
            .collect::<Result<_, _>>()
            .map_err(|_| DimensionError::Malformed(dimension.to_string()))?;
        let [application, climate, indoor_unit, heat_pump_type] = tokens[..] else {
            return Err(DimensionError::Malformed(dimension.to_string()));
        };

        let application = match application {
            4 => Application::LowTemp,
            5 => Application::MediumTemp,
            6 => Application::HighTemp,
            digit => return Err(DimensionError::UnknownApplication(digit)),
        };
        let climate = match climate {
            1 => ClimateZone::Warmer,
            2 => ClimateZone::Colder,
            3 => ClimateZone::Average,
            digit => return Err(DimensionError::UnknownClimate(digit)),
        };

        Ok(Self {
            application,
            climate,
            indoor_unit,
            heat_pump_type,
        })
    }
}

/// One variant/dimension combination from the measurement corpus.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct VariantRecord {
    pub manufacturer: String,
    pub model: String,
    pub variant: String,
    pub dimension: String,
    /// EN-code keyed measurement values for this combination.
    pub measurements: IndexMap<String, f64>,
}

#[derive(Copy, Clone, Debug, Display, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum BatchStatus {
    Ok,
    MissingData,
    Error,
}

/// Outcome of one combination. Failures are recorded here; they never abort
/// the batch.
#[derive(Clone, Debug, Serialize)]
pub struct BatchRow {
    pub manufacturer: String,
    pub model: String,
    pub variant: String,
    pub dimension: String,
    pub application: Option<Application>,
    pub climate: Option<ClimateZone>,
    pub status: BatchStatus,
    pub status_message: String,
    pub missing_required_codes: Vec<String>,
    pub missing_optional_codes: Vec<String>,
    pub design_heating_load: Option<f64>,
    pub bivalent_temp: Option<f64>,
    pub operating_limit_temp: Option<f64>,
    pub reported_scop: Option<f64>,
    pub calculated_scop: Option<f64>,
    pub scop_delta_percent: Option<f64>,
    pub reported_efficiency: Option<f64>,
    pub calculated_efficiency: Option<f64>,
    pub efficiency_delta_percent: Option<f64>,
    pub reported_active_energy: Option<f64>,
    pub calculated_active_energy: Option<f64>,
    pub active_energy_delta_percent: Option<f64>,
    pub metrics: Option<SeasonalMetrics>,
}

impl BatchRow {
    fn pending(record: &VariantRecord) -> Self {
        Self {
            manufacturer: record.manufacturer.clone(),
            model: record.model.clone(),
            variant: record.variant.clone(),
            dimension: record.dimension.clone(),
            application: None,
            climate: None,
            status: BatchStatus::Ok,
            status_message: String::new(),
            missing_required_codes: Default::default(),
            missing_optional_codes: Default::default(),
            design_heating_load: None,
            bivalent_temp: None,
            operating_limit_temp: None,
            reported_scop: None,
            calculated_scop: None,
            scop_delta_percent: None,
            reported_efficiency: None,
            calculated_efficiency: None,
            efficiency_delta_percent: None,
            reported_active_energy: None,
            calculated_active_energy: None,
            active_energy_delta_percent: None,
            metrics: None,
        }
    }

    fn failed(mut self, status: BatchStatus, message: String) -> Self {
        self.status = status;
        self.status_message = message;
        self
    }
}

/// EN codes a combination must carry before the engine is invoked. The
/// Warmer climate waives the -7C pair; its bins never reach that
/// temperature.
pub fn required_codes(climate: ClimateZone) -> Vec<&'static str> {
    BASE_REQUIRED_CODES
        .into_iter()
        .filter(|code| {
            climate != ClimateZone::Warmer
                || (*code != en_codes::CAPACITY_MINUS_7 && *code != en_codes::COP_MINUS_7)
        })
        .chain(EXTRA_REQUIRED_CODES)
        .collect()
}

/// Assemble an engine request from an EN-code keyed measurement dictionary.
///
/// The design heating load is always left to inference from the bivalent
/// point; the rated capacity code reflects rounding applied by the
/// certifier.
pub fn assemble_request(
    measurements: &IndexMap<String, f64>,
    climate: ClimateZone,
    unit_type: UnitType,
) -> CalculationRequest {
    let bivalent_temp = measurements.get(en_codes::BIVALENT_TEMP).copied();
    let operating_limit_temp = measurements.get(en_codes::OPERATING_LIMIT_TEMP).copied();

    let mut test_points: IndexMap<String, TestPoint> = Default::default();
    let mut insert_point =
        |label: &str, temperature: Option<f64>, capacity: &str, cop: &str, cd: Option<&str>| {
            let (Some(temperature), Some(capacity), Some(cop)) = (
                temperature,
                measurements.get(capacity).copied(),
                measurements.get(cop).copied(),
            ) else {
                return;
            };
            test_points.insert(
                label.to_string(),
                TestPoint {
                    temperature,
                    capacity,
                    cop,
                    degradation_coeff: cd.map(|code| {
                        measurements
                            .get(code)
                            .copied()
                            .unwrap_or(FALLBACK_DEGRADATION_COEFF)
                    }),
                },
            );
        };

    if climate != ClimateZone::Warmer {
        insert_point(
            "A",
            Some(-7.),
            en_codes::CAPACITY_MINUS_7,
            en_codes::COP_MINUS_7,
            Some(en_codes::DEGRADATION_MINUS_7),
        );
    }
    insert_point(
        "B",
        Some(2.),
        en_codes::CAPACITY_PLUS_2,
        en_codes::COP_PLUS_2,
        Some(en_codes::DEGRADATION_PLUS_2),
    );
    insert_point(
        "C",
        Some(7.),
        en_codes::CAPACITY_PLUS_7,
        en_codes::COP_PLUS_7,
        Some(en_codes::DEGRADATION_PLUS_7),
    );
    insert_point(
        "D",
        Some(12.),
        en_codes::CAPACITY_PLUS_12,
        en_codes::COP_PLUS_12,
        Some(en_codes::DEGRADATION_PLUS_12),
    );
    insert_point(
        "E",
        operating_limit_temp,
        en_codes::CAPACITY_OPERATING_LIMIT,
        en_codes::COP_OPERATING_LIMIT,
        Some(en_codes::DEGRADATION_OPERATING_LIMIT),
    );
    // No EN code declares a Cd for the bivalent point; it is left to the
    // engine's interpolation.
    insert_point(
        "F",
        bivalent_temp,
        en_codes::CAPACITY_BIVALENT,
        en_codes::COP_BIVALENT,
        None,
    );
    // Optional -15C point, mainly declared for the Colder climate.
    insert_point(
        "G",
        Some(-15.),
        en_codes::CAPACITY_MINUS_15,
        en_codes::COP_MINUS_15,
        Some(en_codes::DEGRADATION_MINUS_15),
    );

    let standby_power = |code: &str| {
        // aux powers are reported in W
        measurements.get(code).copied().unwrap_or(0.) / 1000.
    };

    CalculationRequest {
        climate,
        design_heating_load: None,
        test_points,
        bivalent_temp,
        operating_limit_temp,
        degradation_coeff: FALLBACK_DEGRADATION_COEFF,
        power_off: standby_power(en_codes::POWER_OFF),
        power_thermostat_off: standby_power(en_codes::POWER_THERMOSTAT_OFF),
        power_standby: standby_power(en_codes::POWER_STANDBY),
        power_crankcase: standby_power(en_codes::POWER_CRANKCASE),
        unit_type,
    }
}

/// Run the calculator over every combination, in parallel, one row per
/// record in input order.
pub fn run_batch(
    records: &[VariantRecord],
    registry: &ClimateRegistry,
    unit_type: UnitType,
) -> Vec<BatchRow> {
    records
        .par_iter()
        .map(|record| process_record(record, registry, unit_type))
        .collect()
}

fn process_record(
    record: &VariantRecord,
    registry: &ClimateRegistry,
    unit_type: UnitType,
) -> BatchRow {
    let mut row = BatchRow::pending(record);

    let key = match record.dimension.parse::<DimensionKey>() {
        Ok(key) => key,
        Err(error) => {
            warn!(
                "skipping {}/{}/{}: {error}",
                record.manufacturer, record.model, record.variant
            );
            return row.failed(BatchStatus::Error, error.to_string());
        }
    };
    row.application = Some(key.application);
    row.climate = Some(key.climate);

    row.missing_required_codes = required_codes(key.climate)
        .into_iter()
        .filter(|code| !record.measurements.contains_key(*code))
        .map(str::to_string)
        .collect();
    row.missing_optional_codes = OPTIONAL_CODES
        .into_iter()
        .filter(|code| !record.measurements.contains_key(*code))
        .map(str::to_string)
        .collect();
    if !row.missing_required_codes.is_empty() {
        let message = format!(
            "missing required EN codes: {}",
            row.missing_required_codes.join(";")
        );
        return row.failed(BatchStatus::MissingData, message);
    }

    row.reported_scop = record.measurements.get(en_codes::REPORTED_SCOP).copied();
    row.reported_efficiency = record
        .measurements
        .get(en_codes::REPORTED_EFFICIENCY)
        .copied();
    row.reported_active_energy = record
        .measurements
        .get(en_codes::REPORTED_ACTIVE_ENERGY)
        .copied();

    let request = assemble_request(&record.measurements, key.climate, unit_type);
    let calculator = match ScopCalculator::new(request, registry) {
        Ok(calculator) => calculator,
        Err(error) => return row.failed(BatchStatus::Error, error.to_string()),
    };
    let (metrics, _) = calculator.calculate_seasonal_performance();
    debug!(
        "{}/{}/{} [{}]: SCOP {:.3}",
        record.manufacturer, record.model, record.variant, record.dimension, metrics.scop
    );

    row.design_heating_load = Some(calculator.design_heating_load());
    row.bivalent_temp = calculator.bivalent_temp();
    row.operating_limit_temp = calculator.operating_limit_temp();
    row.calculated_scop = Some(metrics.scop);
    row.scop_delta_percent = percent_delta(metrics.scop, row.reported_scop);
    row.calculated_efficiency = Some(metrics.seasonal_efficiency);
    row.efficiency_delta_percent =
        percent_delta(metrics.seasonal_efficiency, row.reported_efficiency);
    row.calculated_active_energy = Some(metrics.active_energy);
    row.active_energy_delta_percent =
        percent_delta(metrics.active_energy, row.reported_active_energy);
    row.metrics = Some(metrics);
    row
}

fn percent_delta(calculated: f64, reported: Option<f64>) -> Option<f64> {
    match reported {
        Some(reported) if reported != 0. => Some((calculated - reported) / reported * 100.),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use pretty_assertions::assert_eq;
    use rstest::*;

    fn measurements(values: &[(&str, f64)]) -> IndexMap<String, f64> {
        values
            .iter()
            .map(|(code, value)| (code.to_string(), *value))
            .collect()
    }

    /// Annex H declarations re-keyed by EN code, Average climate dimension.
    fn annex_h_record() -> VariantRecord {
        VariantRecord {
            manufacturer: "ACME".to_string(),
            model: "AW 11".to_string(),
            variant: "AW 11-6".to_string(),
            dimension: "4_3_0_0".to_string(),
            measurements: measurements(&[
                (en_codes::RATED_CAPACITY, 11.46),
                (en_codes::REPORTED_SCOP, 3.6),
                (en_codes::BIVALENT_TEMP, -6.),
                (en_codes::OPERATING_LIMIT_TEMP, -10.),
                (en_codes::CAPACITY_MINUS_7, 9.55),
                (en_codes::COP_MINUS_7, 3.26),
                (en_codes::CAPACITY_PLUS_2, 11.17),
                (en_codes::COP_PLUS_2, 4.0),
                (en_codes::CAPACITY_PLUS_7, 12.66),
                (en_codes::COP_PLUS_7, 4.91),
                (en_codes::CAPACITY_PLUS_12, 14.3),
                (en_codes::COP_PLUS_12, 5.5),
                (en_codes::CAPACITY_BIVALENT, 9.7),
                (en_codes::COP_BIVALENT, 3.3),
                (en_codes::CAPACITY_OPERATING_LIMIT, 7.8),
                (en_codes::COP_OPERATING_LIMIT, 2.6),
                (en_codes::POWER_OFF, 0.),
                (en_codes::POWER_THERMOSTAT_OFF, 0.),
                (en_codes::POWER_STANDBY, 0.),
                (en_codes::POWER_CRANKCASE, 0.),
                (en_codes::REPORTED_ACTIVE_ENERGY, 6000.),
            ]),
        }
    }

    #[rstest]
    fn should_parse_dimension_strings() {
        assert_eq!(
            "5_2_0_0".parse::<DimensionKey>().unwrap(),
            DimensionKey {
                application: Application::MediumTemp,
                climate: ClimateZone::Colder,
                indoor_unit: 0,
                heat_pump_type: 0,
            }
        );
        assert_eq!(
            "4_9_0_0".parse::<DimensionKey>().unwrap_err(),
            DimensionError::UnknownClimate(9)
        );
        assert_eq!(
            "9_1_0_0".parse::<DimensionKey>().unwrap_err(),
            DimensionError::UnknownApplication(9)
        );
        assert_eq!(
            "4_1_0".parse::<DimensionKey>().unwrap_err(),
            DimensionError::Malformed("4_1_0".to_string())
        );
        assert!("low_1_0_0".parse::<DimensionKey>().is_err());
    }

    #[rstest]
    fn should_waive_the_minus_7_pair_for_the_warmer_climate() {
        let codes = required_codes(ClimateZone::Warmer);
        assert!(!codes.contains(&en_codes::CAPACITY_MINUS_7));
        assert!(!codes.contains(&en_codes::COP_MINUS_7));
        assert!(required_codes(ClimateZone::Average).contains(&en_codes::CAPACITY_MINUS_7));
    }

    #[rstest]
    fn should_assemble_test_points_from_en_codes() {
        let record = annex_h_record();
        let request =
            assemble_request(&record.measurements, ClimateZone::Average, UnitType::Air);

        assert_eq!(request.test_points.len(), 6);
        assert_eq!(request.test_points["A"].temperature, -7.);
        assert_eq!(request.test_points["A"].capacity, 9.55);
        // points with a Cd code fall back to the data sheet convention
        assert_eq!(request.test_points["A"].degradation_coeff, Some(0.9));
        // the bivalent point is left to interpolation
        assert_eq!(request.test_points["F"].degradation_coeff, None);
        assert_eq!(request.test_points["E"].temperature, -10.);
        assert_eq!(request.bivalent_temp, Some(-6.));
        assert_eq!(request.design_heating_load, None);
    }

    #[rstest]
    fn should_calculate_a_complete_record() {
        let rows = run_batch(
            &[annex_h_record()],
            &ClimateRegistry::default(),
            UnitType::Air,
        );

        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(row.status, BatchStatus::Ok);
        assert_eq!(row.climate, Some(ClimateZone::Average));
        assert_relative_eq!(row.calculated_scop.unwrap(), 3.598, max_relative = 5e-3);
        assert_relative_eq!(
            row.design_heating_load.unwrap(),
            11.46,
            max_relative = 1e-3
        );
        assert!(row.scop_delta_percent.is_some());
        assert!(row.missing_required_codes.is_empty());
    }

    #[rstest]
    fn should_record_missing_codes_and_continue() {
        let mut incomplete = annex_h_record();
        incomplete
            .measurements
            .shift_remove(en_codes::CAPACITY_PLUS_2);
        let rows = run_batch(
            &[incomplete, annex_h_record()],
            &ClimateRegistry::default(),
            UnitType::Air,
        );

        assert_eq!(rows[0].status, BatchStatus::MissingData);
        assert!(rows[0]
            .missing_required_codes
            .contains(&en_codes::CAPACITY_PLUS_2.to_string()));
        assert!(rows[0].calculated_scop.is_none());
        // one failure never aborts the batch
        assert_eq!(rows[1].status, BatchStatus::Ok);
    }

    #[rstest]
    fn should_record_an_unknown_dimension_and_continue() {
        let mut record = annex_h_record();
        record.dimension = "4_7_0_0".to_string();
        let rows = run_batch(&[record], &ClimateRegistry::default(), UnitType::Air);

        assert_eq!(rows[0].status, BatchStatus::Error);
        assert!(rows[0].status_message.contains("climate digit"));
        assert_eq!(rows[0].climate, None);
    }
}
