use crate::core::climate::{ClimateProfile, ClimateRegistry};
use crate::core::interpolation::{TemperatureSeries, TEMP_MATCH_TOLERANCE};
use crate::errors::ConfigError;
use crate::input::{CalculationRequest, TestPoint, UnitType};
use indexmap::IndexMap;
use serde::Serialize;
use tracing::debug;

/// The seasonal performance calculation of EN 14825:2018, Section 8 and
/// Annex B: reconstructs a heat pump's annual heating energy balance from a
/// handful of declared test points and a climate bin table, and derives the
/// standardized seasonal metrics (SCOPnet, SCOPon, SCOP and the seasonal
/// space heating efficiency of Formula 14).

/// Conversion coefficient for electricity, CC in Formula (14).
const PRIMARY_ENERGY_FACTOR: f64 = 2.5;
/// Correction for temperature controls, F(1).
const CONTROL_CORRECTION: f64 = 0.03;
/// Pump consumption correction for water/brine units, F(2).
const PUMP_CORRECTION_WATER_BRINE: f64 = 0.05;
/// Capacity ratios within this distance of zero short-circuit the cycling
/// correction.
const CAPACITY_RATIO_TOLERANCE: f64 = 1e-8;

/// Cycling-corrected COP at one declared test point, together with the
/// capacity ratio CR and cycling correction CC used to derive it.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct CopBinDetail {
    pub cop_bin: f64,
    pub capacity_ratio: Option<f64>,
    pub cycling_correction: Option<f64>,
}

/// One row of the bin-by-bin calculation table.
///
/// The declared fields are populated only when the bin temperature coincides
/// with an actual test point; for every other bin they are `None` and only
/// the interpolated COPbin carries performance information.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BinResult {
    pub bin_index: usize,
    pub temperature: f64,
    pub hours: u32,
    pub part_load_ratio: f64,
    /// Heating load Ph(Tj), in kW.
    pub heating_load: f64,
    pub declared_capacity: Option<f64>,
    pub declared_cop: Option<f64>,
    pub degradation_coeff: Option<f64>,
    pub capacity_ratio: Option<f64>,
    pub cycling_correction: Option<f64>,
    pub cop_bin: f64,
    /// Electric supplementary heater capacity elbu(Tj), in kW.
    pub supplementary_capacity: f64,
    /// Annual heating demand of the bin QH, in kWh.
    pub heating_demand: f64,
    /// Annual supplementary heater energy of the bin Qelbu, in kWh.
    pub supplementary_energy: f64,
    /// Annual electrical energy of the bin Eelec, in kWh.
    pub electrical_energy: f64,
}

/// Sums across all bins, rendered by the formatter as the TOTAL row.
#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize)]
pub struct BinTotals {
    pub hours: u32,
    pub heating_demand: f64,
    pub supplementary_energy: f64,
    pub electrical_energy: f64,
}

/// The per-bin calculation table: one row per climate bin, in ascending
/// temperature order, plus the totals.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BinTable {
    pub rows: Vec<BinResult>,
    pub totals: BinTotals,
}

/// The standardized seasonal performance metrics, with the underlying energy
/// totals and the applied hour counts and standby powers echoed for
/// traceability.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SeasonalMetrics {
    /// Heat-pump-only SCOP, excluding supplementary heater energy.
    pub scop_net: f64,
    /// Active mode SCOP, Formula (19).
    pub scop_on: f64,
    /// Overall SCOP including off-mode consumption, Formula (18).
    pub scop: f64,
    /// SCOP re-derived from the SCOPnet energy split; agrees with `scop` to
    /// within floating point tolerance.
    pub scop_from_scop_net: f64,
    /// Seasonal space heating efficiency of Formula (14), in percent.
    pub seasonal_efficiency: f64,
    /// Total annual heating demand QH, in kWh.
    pub heating_demand: f64,
    /// Heat pump electrical energy, excluding the supplementary heater.
    pub heat_pump_energy: f64,
    /// Total active mode electrical energy (heat pump plus supplementary).
    pub active_energy: f64,
    pub supplementary_energy: f64,
    pub off_mode_energy: f64,
    /// Active mode plus off-mode energy.
    pub total_energy: f64,
    /// F(1), the temperature controls correction.
    pub control_correction: f64,
    /// F(2), the pump consumption correction.
    pub pump_correction: f64,
    pub hours_off: u32,
    pub hours_thermostat_off: u32,
    pub hours_standby: u32,
    pub hours_crankcase: u32,
    pub power_off: f64,
    pub power_thermostat_off: f64,
    pub power_standby: f64,
    pub power_crankcase: f64,
}

/// The bin method calculator.
///
/// A calculator is a pure value: construction validates the request and
/// resolves the design heating load, after which
/// `calculate_seasonal_performance` is a deterministic function with no
/// shared mutable state, safe to call from any number of threads.
#[derive(Clone, Debug)]
pub struct ScopCalculator {
    profile: ClimateProfile,
    test_points: IndexMap<String, TestPoint>,
    design_heating_load: f64,
    bivalent_temp: Option<f64>,
    operating_limit_temp: Option<f64>,
    degradation_coeff: f64,
    power_off: f64,
    power_thermostat_off: f64,
    power_standby: f64,
    power_crankcase: f64,
    unit_type: UnitType,
    cop_bin_series: TemperatureSeries,
    capacity_series: TemperatureSeries,
    declared_cop_series: TemperatureSeries,
    degradation_series: Option<TemperatureSeries>,
}

impl ScopCalculator {
    pub fn new(
        request: CalculationRequest,
        registry: &ClimateRegistry,
    ) -> Result<Self, ConfigError> {
        let CalculationRequest {
            climate,
            design_heating_load,
            test_points,
            bivalent_temp,
            operating_limit_temp,
            degradation_coeff,
            power_off,
            power_thermostat_off,
            power_standby,
            power_crankcase,
            unit_type,
        } = request;

        let profile = registry
            .get(climate)
            .ok_or(ConfigError::UnknownClimate(climate))?
            .clone();
        if test_points.is_empty() {
            return Err(ConfigError::NoTestPoints);
        }

        let design_heating_load = match design_heating_load {
            Some(load) => load,
            None => {
                let inferred =
                    infer_design_heating_load(&profile, &test_points, bivalent_temp)?;
                debug!(
                    "inferred a design heating load of {inferred} kW from the bivalent test point"
                );
                inferred
            }
        };

        // COPbin is precomputed at the declared test points only, each with
        // that point's own degradation coefficient, and interpolated from
        // there; the cycling correction is load dependent, so recomputing it
        // per bin would diverge from the certification convention.
        let cop_bin_series = TemperatureSeries::with_collapsed_duplicates(
            test_points
                .values()
                .map(|point| {
                    let heating_load =
                        heating_load_at(design_heating_load, profile.design_temp, point.temperature);
                    let detail = cop_bin(
                        point.cop,
                        point.capacity,
                        heating_load,
                        point.degradation_coeff.unwrap_or(degradation_coeff),
                    );
                    (point.temperature, detail.cop_bin)
                })
                .collect(),
        )
        .ok_or(ConfigError::NoTestPoints)?;
        let capacity_series = TemperatureSeries::new(
            test_points
                .values()
                .map(|point| (point.temperature, point.capacity))
                .collect(),
        )
        .ok_or(ConfigError::NoTestPoints)?;
        let declared_cop_series = TemperatureSeries::new(
            test_points
                .values()
                .map(|point| (point.temperature, point.cop))
                .collect(),
        )
        .ok_or(ConfigError::NoTestPoints)?;
        let degradation_series = TemperatureSeries::new(
            test_points
                .values()
                .filter_map(|point| point.degradation_coeff.map(|cd| (point.temperature, cd)))
                .collect(),
        );

        Ok(Self {
            profile,
            test_points,
            design_heating_load,
            bivalent_temp,
            operating_limit_temp,
            degradation_coeff,
            power_off,
            power_thermostat_off,
            power_standby,
            power_crankcase,
            unit_type,
            cop_bin_series,
            capacity_series,
            declared_cop_series,
            degradation_series,
        })
    }

    /// The design heating load Pdesignh in kW, as supplied or inferred.
    pub fn design_heating_load(&self) -> f64 {
        self.design_heating_load
    }

    pub fn bivalent_temp(&self) -> Option<f64> {
        self.bivalent_temp
    }

    pub fn operating_limit_temp(&self) -> Option<f64> {
        self.operating_limit_temp
    }

    /// Part load ratio pl(Tj) = (Tj - 16) / (Tdesignh - 16), Formula (23).
    ///
    /// Below the design temperature the ratio exceeds 1 and above 16C it
    /// turns negative; both are expected and flow through unclamped.
    pub fn part_load_ratio(&self, temperature: f64) -> f64 {
        part_load_ratio_at(self.profile.design_temp, temperature)
    }

    /// Heating load Ph(Tj) = Pdesignh x pl(Tj), in kW.
    pub fn heating_load(&self, temperature: f64) -> f64 {
        heating_load_at(self.design_heating_load, self.profile.design_temp, temperature)
    }

    /// Cycling-corrected COP at a declared test point, with the CR and CC
    /// values used.
    pub fn cop_bin_at_test_point(&self, point: &TestPoint) -> CopBinDetail {
        cop_bin(
            point.cop,
            point.capacity,
            self.heating_load(point.temperature),
            point.degradation_coeff.unwrap_or(self.degradation_coeff),
        )
    }

    /// Interpolated COPbin at any bin temperature, with tangent-line
    /// extrapolation outside the declared test range.
    pub fn cop_bin_at(&self, temperature: f64) -> f64 {
        self.cop_bin_series.extrapolate(temperature)
    }

    /// Interpolated declared COP; auxiliary display only, never part of the
    /// energy balance.
    pub fn declared_cop_at(&self, temperature: f64) -> f64 {
        self.declared_cop_series.interpolate(temperature)
    }

    /// Interpolated declared capacity, used for the supplementary heater
    /// split below the bivalent temperature.
    pub fn declared_capacity_at(&self, temperature: f64) -> f64 {
        self.capacity_series.interpolate(temperature)
    }

    /// Interpolated degradation coefficient; the engine-wide default when no
    /// test point carries an explicit value.
    pub fn degradation_coeff_at(&self, temperature: f64) -> f64 {
        self.degradation_series
            .as_ref()
            .map_or(self.degradation_coeff, |series| {
                series.interpolate(temperature)
            })
    }

    /// Run the bin method over every climate bin and derive the seasonal
    /// metrics. Infallible: degenerate numeric conditions contribute zero
    /// energy instead of failing.
    pub fn calculate_seasonal_performance(&self) -> (SeasonalMetrics, BinTable) {
        let mut rows: Vec<BinResult> = Vec::with_capacity(self.profile.bins.len());
        let mut totals = BinTotals::default();

        for bin in &self.profile.bins {
            let temperature = bin.temperature;
            let hours = f64::from(bin.hours);
            let part_load_ratio = self.part_load_ratio(temperature);
            let heating_load = self.heating_load(temperature);

            let mut cop_bin_value = self.cop_bin_series.extrapolate(temperature);
            let mut declared_capacity = None;
            let mut declared_cop = None;
            let mut degradation_coeff = None;
            let mut capacity_ratio = None;
            let mut cycling_correction = None;
            if let Some(point) = self.test_point_at(temperature) {
                // The bin sits on a declared point: surface its raw values
                // for the table and recompute COPbin from that point's own
                // degradation coefficient so CR and CC stay consistent.
                let detail = self.cop_bin_at_test_point(point);
                cop_bin_value = detail.cop_bin;
                declared_capacity = Some(point.capacity);
                declared_cop = Some(point.cop);
                degradation_coeff = point.degradation_coeff;
                capacity_ratio = detail.capacity_ratio;
                cycling_correction = detail.cycling_correction;
            }

            // No supplementary heat at or above the bivalent temperature;
            // that is the contractual definition of Tbiv.
            let supplementary_capacity = if self
                .bivalent_temp
                .is_some_and(|bivalent_temp| temperature >= bivalent_temp)
            {
                0.
            } else {
                (heating_load - self.capacity_series.interpolate(temperature)).max(0.)
            };

            let heating_demand = hours * heating_load;
            let supplementary_energy = hours * supplementary_capacity;
            // The supplementary portion is consumed at unit efficiency; the
            // heat pump portion is driven at the bin COP.
            let electrical_energy = if supplementary_capacity > 0. {
                let heat_pump_share = if cop_bin_value > 0. {
                    hours * (heating_load - supplementary_capacity) / cop_bin_value
                } else {
                    0.
                };
                heat_pump_share + hours * supplementary_capacity
            } else if cop_bin_value > 0. {
                hours * heating_load / cop_bin_value
            } else {
                0.
            };

            totals.hours += bin.hours;
            totals.heating_demand += heating_demand;
            totals.supplementary_energy += supplementary_energy;
            totals.electrical_energy += electrical_energy;

            rows.push(BinResult {
                bin_index: bin.index,
                temperature,
                hours: bin.hours,
                part_load_ratio,
                heating_load,
                declared_capacity,
                declared_cop,
                degradation_coeff,
                capacity_ratio,
                cycling_correction,
                cop_bin: cop_bin_value,
                supplementary_capacity,
                heating_demand,
                supplementary_energy,
                electrical_energy,
            });
        }

        let heating_demand = totals.heating_demand;
        let heat_pump_energy = totals.electrical_energy - totals.supplementary_energy;
        let off_mode_energy = f64::from(self.profile.hours_off) * self.power_off
            + f64::from(self.profile.hours_thermostat_off) * self.power_thermostat_off
            + f64::from(self.profile.hours_standby) * self.power_standby
            + f64::from(self.profile.hours_crankcase) * self.power_crankcase;
        let total_energy = totals.electrical_energy + off_mode_energy;
        let net_total_energy = heat_pump_energy + totals.supplementary_energy + off_mode_energy;

        let scop_net = safe_ratio(heating_demand, heat_pump_energy);
        let scop_on = safe_ratio(heating_demand, totals.electrical_energy);
        let scop = safe_ratio(heating_demand, total_energy);
        let scop_from_scop_net = safe_ratio(heating_demand, net_total_energy);

        let pump_correction = match self.unit_type {
            UnitType::WaterBrine => PUMP_CORRECTION_WATER_BRINE,
            UnitType::Air => 0.,
        };
        let seasonal_efficiency =
            (scop / PRIMARY_ENERGY_FACTOR - (CONTROL_CORRECTION + pump_correction)) * 100.;

        let metrics = SeasonalMetrics {
            scop_net,
            scop_on,
            scop,
            scop_from_scop_net,
            seasonal_efficiency,
            heating_demand,
            heat_pump_energy,
            active_energy: totals.electrical_energy,
            supplementary_energy: totals.supplementary_energy,
            off_mode_energy,
            total_energy,
            control_correction: CONTROL_CORRECTION,
            pump_correction,
            hours_off: self.profile.hours_off,
            hours_thermostat_off: self.profile.hours_thermostat_off,
            hours_standby: self.profile.hours_standby,
            hours_crankcase: self.profile.hours_crankcase,
            power_off: self.power_off,
            power_thermostat_off: self.power_thermostat_off,
            power_standby: self.power_standby,
            power_crankcase: self.power_crankcase,
        };

        (metrics, BinTable { rows, totals })
    }

    /// The first test point, in insertion order, declared at the given
    /// temperature.
    fn test_point_at(&self, temperature: f64) -> Option<&TestPoint> {
        self.test_points.values().find(|point| {
            is_close!(
                temperature,
                point.temperature,
                abs_tol = TEMP_MATCH_TOLERANCE
            )
        })
    }
}

fn part_load_ratio_at(design_temp: f64, temperature: f64) -> f64 {
    (temperature - 16.) / (design_temp - 16.)
}

fn heating_load_at(design_heating_load: f64, design_temp: f64, temperature: f64) -> f64 {
    design_heating_load * part_load_ratio_at(design_temp, temperature)
}

/// The COPbin model: a declared steady-state COP corrected for cycling
/// losses at part load.
///
/// No correction applies when the unit modulates fully (Cd = 1), cannot meet
/// the load (runs continuously), or sits at a vanishing capacity ratio.
/// Otherwise CC = (CR x Cd + (1 - Cd)) / CR and COPbin = COPd / CC.
fn cop_bin(
    declared_cop: f64,
    declared_capacity: f64,
    heating_load: f64,
    degradation_coeff: f64,
) -> CopBinDetail {
    // A declared capacity of exactly zero is not covered by the standard;
    // such a point contributes no usable output.
    if declared_capacity == 0. {
        return CopBinDetail {
            cop_bin: 0.,
            capacity_ratio: None,
            cycling_correction: None,
        };
    }

    let capacity_ratio = heating_load / declared_capacity;
    if is_close!(degradation_coeff, 1.)
        || declared_capacity < heating_load
        || is_close!(capacity_ratio, 0., abs_tol = CAPACITY_RATIO_TOLERANCE)
    {
        return CopBinDetail {
            cop_bin: declared_cop,
            capacity_ratio: Some(capacity_ratio),
            cycling_correction: Some(1.),
        };
    }

    let cycling_correction =
        (capacity_ratio * degradation_coeff + (1. - degradation_coeff)) / capacity_ratio;
    CopBinDetail {
        cop_bin: declared_cop / cycling_correction,
        capacity_ratio: Some(capacity_ratio),
        cycling_correction: Some(cycling_correction),
    }
}

fn infer_design_heating_load(
    profile: &ClimateProfile,
    test_points: &IndexMap<String, TestPoint>,
    bivalent_temp: Option<f64>,
) -> Result<f64, ConfigError> {
    let bivalent_temp = bivalent_temp.ok_or(ConfigError::MissingBivalentTemperature)?;
    let part_load_ratio = part_load_ratio_at(profile.design_temp, bivalent_temp);
    if is_close!(part_load_ratio, 0., abs_tol = 1e-08) {
        return Err(ConfigError::ZeroPartLoadAtBivalent(bivalent_temp));
    }
    test_points
        .values()
        .find(|point| {
            is_close!(
                point.temperature,
                bivalent_temp,
                abs_tol = TEMP_MATCH_TOLERANCE
            )
        })
        .map(|point| point.capacity / part_load_ratio)
        .ok_or(ConfigError::NoTestPointAtBivalent(bivalent_temp))
}

fn safe_ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator > 0. {
        numerator / denominator
    } else {
        0.
    }
}
