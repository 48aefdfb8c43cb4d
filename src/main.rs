extern crate en14825;

use clap::Parser;
use en14825::input::request_from_json;
use en14825::output::{format_bin_table, write_bin_table_csv, BIN_TABLE_COLUMNS};
use en14825::{CalculationRequest, ClimateRegistry, ClimateZone, ScopCalculator, TestPoint, UnitType};
use indexmap::IndexMap;
use std::fs::File;
use std::io::{BufReader, BufWriter};

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct ScopArgs {
    /// JSON calculation request file; the EN 14825:2018 Annex H example
    /// runs when omitted.
    #[arg(long, short)]
    input_file: Option<String>,
    /// Write the formatted bin table to this CSV file instead of stdout.
    #[arg(long, short)]
    output_file: Option<String>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    let args = ScopArgs::parse();

    let request = match args.input_file {
        Some(path) => request_from_json(BufReader::new(File::open(path)?))?,
        None => annex_h_request(),
    };

    let registry = ClimateRegistry::default();
    let calculator = ScopCalculator::new(request, &registry)?;
    let (metrics, table) = calculator.calculate_seasonal_performance();

    println!("Seasonal performance (EN 14825:2018 bin method)");
    println!("  Pdesignh: {:.2} kW", calculator.design_heating_load());
    println!("  SCOPnet:  {:.4}", metrics.scop_net);
    println!("  SCOPon:   {:.4}  (Formula 19, active mode)", metrics.scop_on);
    println!("  SCOP:     {:.4}  (Formula 18, incl. off-mode)", metrics.scop);
    println!("  ns,h:     {:.2} %  (Formula 14)", metrics.seasonal_efficiency);
    println!();
    println!("  Heating demand QH:        {:>10.2} kWh", metrics.heating_demand);
    println!("  Heat pump energy:         {:>10.2} kWh", metrics.heat_pump_energy);
    println!("  Supplementary energy:     {:>10.2} kWh", metrics.supplementary_energy);
    println!("  Off-mode energy:          {:>10.2} kWh", metrics.off_mode_energy);
    println!("  Total energy:             {:>10.2} kWh", metrics.total_energy);
    println!();

    match args.output_file {
        Some(path) => {
            write_bin_table_csv(&table, BufWriter::new(File::create(&path)?))?;
            println!("Bin table written to {path}");
        }
        None => {
            print_row(&BIN_TABLE_COLUMNS.map(str::to_string));
            for row in format_bin_table(&table) {
                print_row(&row);
            }
        }
    }

    Ok(())
}

fn print_row(cells: &[String]) {
    let line = cells
        .iter()
        .map(|cell| format!("{cell:>10}"))
        .collect::<Vec<_>>()
        .join(" ");
    println!("{line}");
}

/// The worked example of EN 14825:2018 Annex H: a fixed capacity
/// air-to-water heat pump, low temperature application, Average climate.
fn annex_h_request() -> CalculationRequest {
    let test_point = |temperature: f64, capacity: f64, cop: f64| TestPoint {
        temperature,
        capacity,
        cop,
        degradation_coeff: None,
    };
    CalculationRequest {
        climate: ClimateZone::Average,
        design_heating_load: Some(11.46),
        test_points: IndexMap::from([
            ("A".to_string(), test_point(-7., 9.55, 3.26)),
            ("B".to_string(), test_point(2., 11.17, 4.0)),
            ("C".to_string(), test_point(7., 12.66, 4.91)),
            ("D".to_string(), test_point(12., 14.3, 5.5)),
            ("E".to_string(), test_point(-10., 7.8, 2.6)),
            ("F".to_string(), test_point(-6., 9.7, 3.3)),
        ]),
        bivalent_temp: Some(-6.),
        operating_limit_temp: Some(-10.),
        degradation_coeff: 0.9,
        power_off: 0.,
        power_thermostat_off: 0.,
        power_standby: 0.,
        power_crankcase: 0.,
        unit_type: UnitType::Air,
    }
}
