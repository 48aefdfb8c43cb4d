use crate::core::scop::{BinResult, BinTable, BinTotals};
use csv::WriterBuilder;
use std::io::Write;

/// Presentation-only formatting of the bin-by-bin table, matching the column
/// layout and decimal places of the published Annex H tables. Formatting is
/// applied to a fresh copy of the values; the numeric table is never
/// touched.

pub const BIN_TABLE_COLUMNS: [&str; 15] = [
    "j",
    "Tj",
    "hj",
    "pl(Tj)",
    "Ph(Tj)",
    "Pdh(Tj)",
    "COPd(Tj)",
    "Cdh",
    "CR",
    "CC",
    "COPbin(Tj)",
    "elbu(Tj)",
    "Qelbu",
    "QH",
    "Eelec",
];

/// Render every bin row plus the TOTAL row as display strings.
pub fn format_bin_table(table: &BinTable) -> Vec<Vec<String>> {
    let mut rows: Vec<Vec<String>> = table.rows.iter().map(format_row).collect();
    rows.push(format_totals(&table.totals));
    rows
}

/// Write the formatted table, with its header, as CSV.
pub fn write_bin_table_csv(table: &BinTable, writer: impl Write) -> anyhow::Result<()> {
    let mut csv_writer = WriterBuilder::new().from_writer(writer);
    csv_writer.write_record(BIN_TABLE_COLUMNS)?;
    for row in format_bin_table(table) {
        csv_writer.write_record(&row)?;
    }
    csv_writer.flush()?;
    Ok(())
}

fn format_row(row: &BinResult) -> Vec<String> {
    vec![
        row.bin_index.to_string(),
        format!("{:.0}", row.temperature),
        row.hours.to_string(),
        format!("{:.3}", row.part_load_ratio),
        format!("{:.2}", row.heating_load),
        format_optional(row.declared_capacity, 2),
        format_optional(row.declared_cop, 2),
        format_optional(row.degradation_coeff, 3),
        format_optional(row.capacity_ratio, 2),
        format_optional(row.cycling_correction, 2),
        format!("{:.2}", row.cop_bin),
        format!("{:.2}", row.supplementary_capacity),
        format_energy(row.supplementary_energy),
        format_energy(row.heating_demand),
        format_energy(row.electrical_energy),
    ]
}

fn format_totals(totals: &BinTotals) -> Vec<String> {
    let mut row = vec!["TOTAL".to_string(), String::new(), totals.hours.to_string()];
    row.extend(std::iter::repeat_with(String::new).take(9));
    row.push(format_energy(totals.supplementary_energy));
    row.push(format_energy(totals.heating_demand));
    row.push(format_energy(totals.electrical_energy));
    row
}

fn format_optional(value: Option<f64>, decimals: usize) -> String {
    value.map_or_else(String::new, |value| format!("{value:.decimals$}"))
}

/// Energies are tabulated as whole kWh, truncated as in the published
/// tables.
fn format_energy(value: f64) -> String {
    format!("{}", value as i64)
}
