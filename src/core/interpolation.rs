use interp::{interp, InterpMode};
use itertools::Itertools;
use ordered_float::OrderedFloat;

/// Absolute tolerance, in Celsius, within which two temperatures are treated
/// as the same point.
pub(crate) const TEMP_MATCH_TOLERANCE: f64 = 1e-6;

/// A piecewise-linear series of values over outdoor temperature, built from
/// sparse, irregularly spaced test points.
///
/// Two query policies are provided. `interpolate` holds the boundary values
/// beyond the span of known temperatures (the behaviour of a plain linear
/// interpolation lookup). `extrapolate` instead extends the tangent line
/// through the two nearest boundary points, which is the convention the bin
/// method uses for COPbin outside the declared test range.
#[derive(Clone, Debug)]
pub(crate) struct TemperatureSeries {
    temperatures: Vec<f64>,
    values: Vec<f64>,
}

impl TemperatureSeries {
    /// Build a series from (temperature, value) pairs, sorted ascending by
    /// temperature. Returns `None` when no pairs are supplied.
    pub(crate) fn new(points: Vec<(f64, f64)>) -> Option<Self> {
        if points.is_empty() {
            return None;
        }
        let (temperatures, values) = points
            .into_iter()
            .sorted_by_key(|(temperature, _)| OrderedFloat(*temperature))
            .unzip();
        Some(Self {
            temperatures,
            values,
        })
    }

    /// Build a series in which points sharing a temperature (within
    /// `TEMP_MATCH_TOLERANCE`) are collapsed by averaging their values.
    ///
    /// Coincident temperatures occur in real declarations, e.g. when the
    /// bivalent temperature equals the operating limit; they must be
    /// collapsed because the boundary slope calculation requires strictly
    /// distinct temperatures.
    pub(crate) fn with_collapsed_duplicates(points: Vec<(f64, f64)>) -> Option<Self> {
        let series = Self::new(points)?;

        let mut temperatures: Vec<f64> = Default::default();
        let mut values: Vec<f64> = Default::default();
        let mut group_temp: Option<f64> = None;
        let mut group_total = 0.;
        let mut group_count = 0usize;
        for (temperature, value) in series.temperatures.iter().zip(series.values.iter()) {
            match group_temp {
                Some(last) if is_close!(*temperature, last, abs_tol = TEMP_MATCH_TOLERANCE) => {
                    group_total += value;
                    group_count += 1;
                }
                _ => {
                    if let Some(last) = group_temp {
                        temperatures.push(last);
                        values.push(group_total / group_count as f64);
                    }
                    group_temp = Some(*temperature);
                    group_total = *value;
                    group_count = 1;
                }
            }
        }
        if let Some(last) = group_temp {
            temperatures.push(last);
            values.push(group_total / group_count as f64);
        }

        Some(Self {
            temperatures,
            values,
        })
    }

    /// Linear interpolation within the span of known temperatures, holding
    /// the boundary values outside it.
    pub(crate) fn interpolate(&self, temperature: f64) -> f64 {
        if self.temperatures.len() == 1 {
            return self.values[0];
        }
        interp(&self.temperatures, &self.values, temperature, &InterpMode::FirstLast)
    }

    /// Linear interpolation within the span, tangent-line extrapolation from
    /// the two nearest boundary points outside it.
    ///
    /// A query at a known temperature (within `TEMP_MATCH_TOLERANCE`) returns
    /// that temperature's value exactly, with no interpolation noise. A
    /// series collapsed to a single point returns its value unconditionally.
    pub(crate) fn extrapolate(&self, temperature: f64) -> f64 {
        if self.temperatures.len() == 1 {
            return self.values[0];
        }

        for (known, value) in self.temperatures.iter().zip(self.values.iter()) {
            if is_close!(temperature, *known, abs_tol = TEMP_MATCH_TOLERANCE) {
                return *value;
            }
        }

        let last = self.temperatures.len() - 1;
        if temperature > self.temperatures[last] {
            let slope = (self.values[last] - self.values[last - 1])
                / (self.temperatures[last] - self.temperatures[last - 1]);
            self.values[last] + slope * (temperature - self.temperatures[last])
        } else if temperature < self.temperatures[0] {
            let slope =
                (self.values[1] - self.values[0]) / (self.temperatures[1] - self.temperatures[0]);
            self.values[0] + slope * (temperature - self.temperatures[0])
        } else {
            interp(&self.temperatures, &self.values, temperature, &InterpMode::Extrapolate)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use pretty_assertions::assert_eq;
    use rstest::*;

    #[fixture]
    fn series() -> TemperatureSeries {
        TemperatureSeries::new(vec![(7., 4.91), (-7., 3.26), (2., 4.0), (12., 5.5)]).unwrap()
    }

    #[rstest]
    fn should_return_exact_values_at_known_temperatures(series: TemperatureSeries) {
        assert_eq!(series.extrapolate(-7.), 3.26);
        assert_eq!(series.extrapolate(12.), 5.5);
        // within the matching tolerance counts as exact
        assert_eq!(series.extrapolate(2. + 1e-9), 4.0);
    }

    #[rstest]
    fn should_interpolate_between_neighbouring_points(series: TemperatureSeries) {
        assert_relative_eq!(series.interpolate(4.5), 4.455, max_relative = 1e-12);
        assert_relative_eq!(series.extrapolate(4.5), 4.455, max_relative = 1e-12);
    }

    #[rstest]
    fn should_hold_boundary_values_when_interpolating_outside_the_span(series: TemperatureSeries) {
        assert_eq!(series.interpolate(-20.), 3.26);
        assert_eq!(series.interpolate(15.), 5.5);
    }

    #[rstest]
    fn should_extrapolate_along_the_boundary_tangent(series: TemperatureSeries) {
        // slope above the span is (5.5 - 4.91) / (12 - 7)
        assert_relative_eq!(
            series.extrapolate(15.),
            5.5 + (5.5 - 4.91) / 5. * 3.,
            max_relative = 1e-12
        );
        // slope below the span is (4.0 - 3.26) / (2 - -7)
        assert_relative_eq!(
            series.extrapolate(-10.),
            3.26 + (4.0 - 3.26) / 9. * -3.,
            max_relative = 1e-12
        );
    }

    #[rstest]
    fn should_collapse_coincident_temperatures_by_averaging() {
        let series = TemperatureSeries::with_collapsed_duplicates(vec![
            (-10., 2.6),
            (-10., 3.0),
            (2., 4.0),
        ])
        .unwrap();
        assert_relative_eq!(series.extrapolate(-10.), 2.8, max_relative = 1e-12);
        assert_eq!(series.extrapolate(2.), 4.0);
    }

    #[rstest]
    fn should_answer_every_query_with_the_single_surviving_value() {
        let series =
            TemperatureSeries::with_collapsed_duplicates(vec![(2., 4.0), (2., 4.2)]).unwrap();
        assert_relative_eq!(series.extrapolate(-15.), 4.1, max_relative = 1e-12);
        assert_relative_eq!(series.extrapolate(15.), 4.1, max_relative = 1e-12);
        assert_relative_eq!(series.interpolate(8.), 4.1, max_relative = 1e-12);
    }

    #[rstest]
    fn should_reject_an_empty_series() {
        assert!(TemperatureSeries::new(vec![]).is_none());
        assert!(TemperatureSeries::with_collapsed_duplicates(vec![]).is_none());
    }
}
