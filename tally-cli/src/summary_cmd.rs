//! `tally summary`: the viewer's numbers, printed once.

use anyhow::{anyhow, Result};
use std::collections::BTreeSet;
use std::path::Path;

use tally_core::{
    apply_filter, category_breakdown, detail_rows, format_currency, read_classified, Category,
    FilterOptions, Metrics, PeriodKey, StoreError,
};

use crate::dashboard::{halt_message, EMPTY_BREAKDOWN};

pub fn run_summary(
    path: &Path,
    month: Option<&str>,
    categories: &[String],
    currency: &str,
) -> Result<()> {
    let rows = match read_classified(path) {
        Ok(rows) => rows,
        Err(StoreError::Missing(p)) => {
            println!("{}", halt_message(&p));
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    let options = FilterOptions::derive(&rows);
    let period = match month {
        Some(m) => m.parse::<PeriodKey>().map_err(|e| anyhow!(e))?,
        None => match options.latest_period() {
            Some(p) => p,
            None => {
                println!("Nenhuma transação em {}.", path.display());
                return Ok(());
            }
        },
    };
    let selected = parse_categories(categories, &options)?;

    let filtered = apply_filter(&rows, period, &selected);
    let m = Metrics::compute(&filtered);

    println!("Período: {period}");
    println!("  Receitas:     {}", format_currency(m.inflow, currency));
    println!("  Despesas:     {}", format_currency(m.outflow, currency));
    println!("  Saldo do Mês: {}", format_currency(m.net, currency));

    println!("\nDistribuição de Gastos");
    let slices = category_breakdown(&filtered);
    if slices.is_empty() {
        println!("  {EMPTY_BREAKDOWN}");
    }
    for s in &slices {
        println!(
            "  {:<30} {:>5.1}%  {}",
            s.category.label(),
            s.share * 100.0,
            format_currency(s.total, currency)
        );
    }

    println!("\nExtrato Detalhado");
    for r in detail_rows(&filtered) {
        println!(
            "  {}  {:>14}  {:<40}  {}",
            r.date().format("%Y-%m-%d"),
            format_currency(r.amount(), currency),
            r.description(),
            r.category
        );
    }

    Ok(())
}

/// No names means every category present in the data.
fn parse_categories(names: &[String], options: &FilterOptions) -> Result<BTreeSet<Category>> {
    if names.is_empty() {
        return Ok(options.all_categories());
    }
    names
        .iter()
        .map(|n| Category::from_label(n).ok_or_else(|| anyhow!("unknown category {n:?}")))
        .collect()
}
