//! Derived views over the classified table: period keys, filters, metrics,
//! per-category spending breakdown and the detail listing.
//!
//! Everything here is a pure function of its inputs; the viewer recomputes
//! the whole chain whenever a selection changes.

use chrono::{Datelike, NaiveDate};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::str::FromStr;

use crate::category::Category;
use crate::transaction::ClassifiedTransaction;

/// Calendar year + month bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PeriodKey {
    pub year: i32,
    pub month: u32,
}

impl PeriodKey {
    pub fn of(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }
}

impl fmt::Display for PeriodKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for PeriodKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (y, m) = s
            .trim()
            .split_once('-')
            .ok_or_else(|| format!("expected YYYY-MM, got {s:?}"))?;
        let year: i32 = y.parse().map_err(|_| format!("bad year in {s:?}"))?;
        let month: u32 = m.parse().map_err(|_| format!("bad month in {s:?}"))?;
        if !(1..=12).contains(&month) {
            return Err(format!("month out of range in {s:?}"));
        }
        Ok(Self { year, month })
    }
}

/// Choices offered by the period and category selectors
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FilterOptions {
    /// Distinct periods, most recent first
    pub periods: Vec<PeriodKey>,
    /// Distinct categories in first-appearance order
    pub categories: Vec<Category>,
}

impl FilterOptions {
    pub fn derive(rows: &[ClassifiedTransaction]) -> Self {
        let periods: BTreeSet<PeriodKey> = rows.iter().map(|r| PeriodKey::of(r.date())).collect();

        let mut categories = Vec::new();
        for r in rows {
            if !categories.contains(&r.category) {
                categories.push(r.category);
            }
        }

        Self {
            periods: periods.into_iter().rev().collect(),
            categories,
        }
    }

    pub fn latest_period(&self) -> Option<PeriodKey> {
        self.periods.first().copied()
    }

    pub fn all_categories(&self) -> BTreeSet<Category> {
        self.categories.iter().copied().collect()
    }
}

/// Rows in `period` whose category is in `categories`.
pub fn apply_filter<'a>(
    rows: &'a [ClassifiedTransaction],
    period: PeriodKey,
    categories: &BTreeSet<Category>,
) -> Vec<&'a ClassifiedTransaction> {
    rows.iter()
        .filter(|r| PeriodKey::of(r.date()) == period && categories.contains(&r.category))
        .collect()
}

/// Inflow, outflow and net over a filtered subset
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Metrics {
    pub inflow: f64,
    /// Sum of negative amounts; never positive
    pub outflow: f64,
    pub net: f64,
}

impl Metrics {
    pub fn compute(rows: &[&ClassifiedTransaction]) -> Self {
        let inflow: f64 = rows
            .iter()
            .filter(|r| r.transaction.is_inflow())
            .map(|r| r.amount())
            .sum();
        let outflow: f64 = rows
            .iter()
            .filter(|r| r.transaction.is_outflow())
            .map(|r| r.amount())
            .sum();
        Self {
            inflow,
            outflow,
            net: inflow + outflow,
        }
    }
}

/// One slice of the spending breakdown
#[derive(Debug, Clone, PartialEq)]
pub struct BreakdownSlice {
    pub category: Category,
    /// Absolute spend, always >= 0
    pub total: f64,
    /// Fraction of all spending in the subset, 0.0..=1.0
    pub share: f64,
}

/// Spending (negative amounts, as magnitudes) per category, largest first.
pub fn category_breakdown(rows: &[&ClassifiedTransaction]) -> Vec<BreakdownSlice> {
    let mut totals: HashMap<Category, f64> = HashMap::new();
    for r in rows.iter().filter(|r| r.transaction.is_outflow()) {
        *totals.entry(r.category).or_insert(0.0) += r.amount().abs();
    }

    let grand: f64 = totals.values().sum();
    let mut slices: Vec<BreakdownSlice> = totals
        .into_iter()
        .map(|(category, total)| BreakdownSlice {
            category,
            total,
            share: if grand > 0.0 { total / grand } else { 0.0 },
        })
        .collect();

    slices.sort_by(|a, b| {
        b.total
            .total_cmp(&a.total)
            .then_with(|| a.category.label().cmp(b.category.label()))
    });
    slices
}

/// Filtered rows sorted by date ascending (stable within a day).
pub fn detail_rows<'a>(rows: &[&'a ClassifiedTransaction]) -> Vec<&'a ClassifiedTransaction> {
    let mut out = rows.to_vec();
    out.sort_by_key(|r| r.date());
    out
}

/// `R$ 1,234.50` style: thousands separators, two decimals.
pub fn format_currency(value: f64, symbol: &str) -> String {
    let fixed = format!("{:.2}", value.abs());
    let (int_part, frac) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));

    let mut grouped = String::new();
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let sign = if value < 0.0 && fixed != "0.00" { "-" } else { "" };
    format!("{symbol} {sign}{grouped}.{frac}")
}
