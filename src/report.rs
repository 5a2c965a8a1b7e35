//! Console report of the consolidated holdings table.

use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table as DisplayTable};
use owo_colors::OwoColorize;
use rust_decimal::Decimal;

use crate::aggregate::cumulative_head;
use crate::table::{SchemaError, Table, Value};

/// Cumulative share of total value shown before the tail is cut off.
pub const REPORT_TAIL: Decimal = Decimal::from_parts(98, 0, 0, false, 2);

/// Print the largest consolidated exposures, cutting the long tail of tiny
/// holdings once the shown rows cover `tail` of total value.
pub fn print_aggregate(aggregated: &Table, tail: Decimal) -> Result<(), SchemaError> {
    let total: Decimal = aggregated
        .values("amount")?
        .filter_map(Value::as_number)
        .sum();
    let head_size = cumulative_head(aggregated, tail)?;
    let shown = aggregated.head(head_size);

    println!("\n{}", "📊 CONSOLIDATED HOLDINGS".bright_white().bold());
    println!("{}", "─".repeat(60).bright_black());

    let mut display = DisplayTable::new();
    display
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["Security", "Class", "Amount", "Weight"]);

    for row in shown.rows() {
        let amount = row.number("amount").unwrap_or_default();
        let weight = if total.is_zero() {
            "-".to_string()
        } else {
            format!("{:.2}%", amount / total * Decimal::ONE_HUNDRED)
        };
        display.add_row(vec![
            row.text("name").unwrap_or_default().to_string(),
            row.text("asstype").unwrap_or_default().to_string(),
            format!("{:.2}", amount),
            weight,
        ]);
    }
    println!("{display}");

    let hidden = aggregated.len() - shown.len();
    if hidden > 0 {
        println!(
            "{}",
            format!("... and {} smaller holdings", hidden).bright_black()
        );
    }
    println!(
        "💰 Total: {}",
        format!("{:.2}", total).bright_green().bold()
    );
    Ok(())
}
