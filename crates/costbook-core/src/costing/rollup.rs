//! # Cost Roll-up Engine
//!
//! Turns a [`CostSheet`] into a full [`CostBreakdown`].
//!
//! ## Calculation Order
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  materials  = round(Σ qty × unit cost)                                  │
//! │  + waste    = round(materials × (1 + waste%/100))                       │
//! │  labor      = round(Σ hours × rate)                                     │
//! │  base       = materials with waste + labor                              │
//! │  overhead   = Σ flat + Σ round(base × pct/100)   (each % on same base)  │
//! │  batch      = base + overhead                                           │
//! │  ──────────────────────────────────────────────────────────────────    │
//! │  per unit   = round(batch / batch size)           (none if size = 0)    │
//! │  price      = round(per unit × (1 + markup%/100))                       │
//! │  profit     = price − per unit                                          │
//! │  margin %   = round(profit / price × 1000) / 10   (none if price = 0)   │
//! │  with tax   = price + round(price × tax%/100)                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Negative quantities, hours, rates and amounts count as zero.
//! Percentages are clamped to their documented ranges before use.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::{clamp, non_negative, Money};
use crate::types::{CostSheet, OverheadItem};
use crate::{MARKUP_PCT_MAX, OVERHEAD_PCT_MAX, TAX_PCT_MAX, WASTE_PCT_MAX};

/// Every intermediate and final figure of a cost roll-up.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct CostBreakdown {
    pub materials_subtotal_cents: i64,
    /// Waste percentage after clamping.
    pub waste_pct: f64,
    pub materials_with_waste_cents: i64,
    pub labor_subtotal_cents: i64,
    pub base_cents: i64,
    pub overhead_flat_cents: i64,
    pub overhead_percent_cents: i64,
    pub overhead_total_cents: i64,
    pub batch_total_cents: i64,
    pub batch_size: f64,
    pub cost_per_unit_cents: Option<i64>,
    /// Markup percentage after clamping.
    pub markup_pct: f64,
    pub price_per_unit_cents: Option<i64>,
    pub profit_per_unit_cents: Option<i64>,
    /// Profit as a share of price, one decimal place.
    pub margin_pct: Option<f64>,
    /// Tax percentage after clamping.
    pub tax_pct: f64,
    pub price_with_tax_cents: Option<i64>,
}

/// Computes the cost breakdown of one sheet.
///
/// ## Example
/// ```rust
/// use costbook_core::costing::rollup::compute_totals;
/// use costbook_core::types::{AppSettings, CostSheet, MaterialItem};
///
/// let mut sheet = CostSheet::with_defaults("Soap", &AppSettings::default());
/// sheet.batch_size = 10.0;
/// sheet.markup_pct = 50.0;
/// sheet.materials.push(MaterialItem {
///     id: "m1".into(),
///     name: "Oil".into(),
///     quantity: 2.0,
///     unit: "l".into(),
///     unit_cost_cents: 630,
/// });
///
/// let totals = compute_totals(&sheet);
/// assert_eq!(totals.batch_total_cents, 1260);
/// assert_eq!(totals.cost_per_unit_cents, Some(126));
/// assert_eq!(totals.price_per_unit_cents, Some(189));
/// ```
pub fn compute_totals(sheet: &CostSheet) -> CostBreakdown {
    let materials_subtotal = Money::from_fractional_cents(
        sheet
            .materials
            .iter()
            .map(|m| non_negative(m.quantity) * m.unit_cost_cents.max(0) as f64)
            .sum(),
    );

    let waste_pct = clamp(sheet.waste_pct, 0.0, WASTE_PCT_MAX);
    let materials_with_waste = materials_subtotal.times(1.0 + waste_pct / 100.0);

    let labor_subtotal = Money::from_fractional_cents(
        sheet
            .labor
            .iter()
            .map(|l| non_negative(l.hours) * l.rate_cents.max(0) as f64)
            .sum(),
    );

    // sums saturate rather than wrap
    let base = materials_with_waste + labor_subtotal;

    let overhead_flat: Money = sheet
        .overhead
        .iter()
        .filter_map(|item| match item {
            OverheadItem::Flat { amount_cents, .. } => Some(Money::from_cents(*amount_cents).non_negative()),
            OverheadItem::Percent { .. } => None,
        })
        .sum();

    let overhead_percent: Money = sheet
        .overhead
        .iter()
        .filter_map(|item| match item {
            OverheadItem::Percent { percent, .. } => {
                Some(base.percent(clamp(*percent, 0.0, OVERHEAD_PCT_MAX)))
            }
            OverheadItem::Flat { .. } => None,
        })
        .sum();

    let overhead_total = overhead_flat + overhead_percent;
    let batch_total = base + overhead_total;

    let batch_size = non_negative(sheet.batch_size);
    let cost_per_unit = (batch_size > 0.0)
        .then(|| Money::from_fractional_cents(batch_total.cents() as f64 / batch_size));

    let markup_pct = clamp(sheet.markup_pct, 0.0, MARKUP_PCT_MAX);
    let price_per_unit = cost_per_unit.map(|cost| cost.times(1.0 + markup_pct / 100.0));

    let profit_per_unit = price_per_unit
        .zip(cost_per_unit)
        .map(|(price, cost)| price - cost);

    let margin_pct = match (price_per_unit, profit_per_unit) {
        (Some(price), Some(profit)) if !price.is_zero() => {
            Some((profit.cents() as f64 / price.cents() as f64 * 1000.0).round() / 10.0)
        }
        _ => None,
    };

    let tax_pct = clamp(sheet.tax_pct, 0.0, TAX_PCT_MAX);
    let price_with_tax = price_per_unit.map(|price| price + price.percent(tax_pct));

    let cents = |m: Option<Money>| m.map(|m| m.cents());

    CostBreakdown {
        materials_subtotal_cents: materials_subtotal.cents(),
        waste_pct,
        materials_with_waste_cents: materials_with_waste.cents(),
        labor_subtotal_cents: labor_subtotal.cents(),
        base_cents: base.cents(),
        overhead_flat_cents: overhead_flat.cents(),
        overhead_percent_cents: overhead_percent.cents(),
        overhead_total_cents: overhead_total.cents(),
        batch_total_cents: batch_total.cents(),
        batch_size,
        cost_per_unit_cents: cents(cost_per_unit),
        markup_pct,
        price_per_unit_cents: cents(price_per_unit),
        profit_per_unit_cents: cents(profit_per_unit),
        margin_pct,
        tax_pct,
        price_with_tax_cents: cents(price_with_tax),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AppSettings, LaborItem, MaterialItem};

    fn sheet() -> CostSheet {
        let mut sheet = CostSheet::with_defaults("Test", &AppSettings::default());
        sheet.markup_pct = 0.0;
        sheet
    }

    fn material(quantity: f64, unit_cost_cents: i64) -> MaterialItem {
        MaterialItem {
            id: "m".into(),
            name: "Material".into(),
            quantity,
            unit: "g".into(),
            unit_cost_cents,
        }
    }

    fn labor(hours: f64, rate_cents: i64) -> LaborItem {
        LaborItem {
            id: "l".into(),
            role: "Maker".into(),
            hours,
            rate_cents,
        }
    }

    fn flat(amount_cents: i64) -> OverheadItem {
        OverheadItem::Flat {
            id: "f".into(),
            name: "Packaging".into(),
            amount_cents,
        }
    }

    fn pct(percent: f64) -> OverheadItem {
        OverheadItem::Percent {
            id: "p".into(),
            name: "Utilities".into(),
            percent,
        }
    }

    #[test]
    fn test_empty_sheet() {
        let totals = compute_totals(&sheet());
        assert_eq!(totals.batch_total_cents, 0);
        assert_eq!(totals.cost_per_unit_cents, Some(0));
        assert_eq!(totals.price_per_unit_cents, Some(0));
        assert_eq!(totals.margin_pct, None);
    }

    #[test]
    fn test_waste_and_overhead_breakdown() {
        let mut s = sheet();
        s.materials.push(material(4.0, 250));
        s.waste_pct = 10.0;
        s.overhead = vec![flat(50), pct(10.0)];

        let totals = compute_totals(&s);
        assert_eq!(totals.materials_subtotal_cents, 1000);
        assert_eq!(totals.materials_with_waste_cents, 1100);
        assert_eq!(totals.base_cents, 1100);
        assert_eq!(totals.overhead_flat_cents, 50);
        assert_eq!(totals.overhead_percent_cents, 110);
        assert_eq!(totals.overhead_total_cents, 160);
        assert_eq!(totals.batch_total_cents, 1260);
    }

    #[test]
    fn test_per_unit_price_and_margin() {
        let mut s = sheet();
        s.materials.push(material(1.0, 1260));
        s.batch_size = 10.0;
        s.markup_pct = 50.0;

        let totals = compute_totals(&s);
        assert_eq!(totals.cost_per_unit_cents, Some(126));
        assert_eq!(totals.price_per_unit_cents, Some(189));
        assert_eq!(totals.profit_per_unit_cents, Some(63));
        assert_eq!(totals.margin_pct, Some(33.3));
    }

    #[test]
    fn test_zero_batch_size_has_no_unit_figures() {
        let mut s = sheet();
        s.materials.push(material(1.0, 500));
        s.batch_size = 0.0;
        s.markup_pct = 50.0;
        s.tax_pct = 10.0;

        let totals = compute_totals(&s);
        assert_eq!(totals.batch_total_cents, 500);
        assert_eq!(totals.cost_per_unit_cents, None);
        assert_eq!(totals.price_per_unit_cents, None);
        assert_eq!(totals.profit_per_unit_cents, None);
        assert_eq!(totals.margin_pct, None);
        assert_eq!(totals.price_with_tax_cents, None);
    }

    #[test]
    fn test_percent_overheads_do_not_compound() {
        let mut s = sheet();
        s.labor.push(labor(1.0, 1000));
        s.overhead = vec![pct(10.0), pct(10.0)];

        let totals = compute_totals(&s);
        assert_eq!(totals.overhead_percent_cents, 200);
        assert_eq!(totals.batch_total_cents, 1200);
    }

    #[test]
    fn test_negatives_count_as_zero() {
        let mut s = sheet();
        s.materials = vec![material(-3.0, 100), material(2.0, -100), material(1.0, 10)];
        s.labor = vec![labor(-1.0, 1000)];
        s.overhead = vec![flat(-500)];
        s.waste_pct = -20.0;

        let totals = compute_totals(&s);
        assert_eq!(totals.materials_subtotal_cents, 10);
        assert_eq!(totals.waste_pct, 0.0);
        assert_eq!(totals.labor_subtotal_cents, 0);
        assert_eq!(totals.overhead_flat_cents, 0);
        assert!(totals.batch_total_cents >= 0);
    }

    #[test]
    fn test_percentages_are_clamped() {
        let mut s = sheet();
        s.materials.push(material(1.0, 100));
        s.waste_pct = 5000.0;
        s.markup_pct = f64::NAN;
        s.overhead = vec![pct(99999.0)];

        let totals = compute_totals(&s);
        assert_eq!(totals.waste_pct, 1000.0);
        assert_eq!(totals.materials_with_waste_cents, 1100);
        assert_eq!(totals.overhead_percent_cents, 11000);
        assert_eq!(totals.markup_pct, 0.0);
    }

    #[test]
    fn test_fractional_quantities_round_once() {
        let mut s = sheet();
        s.materials = vec![material(0.333, 100), material(0.333, 100), material(0.334, 100)];
        let totals = compute_totals(&s);
        assert_eq!(totals.materials_subtotal_cents, 100);
    }

    #[test]
    fn test_tax_inclusive_price() {
        let mut s = sheet();
        s.materials.push(material(1.0, 1000));
        s.markup_pct = 100.0;
        s.tax_pct = 8.25;

        let totals = compute_totals(&s);
        assert_eq!(totals.price_per_unit_cents, Some(2000));
        assert_eq!(totals.price_with_tax_cents, Some(2165));
    }

    #[test]
    fn test_rounding_half_away_from_zero() {
        let mut s = sheet();
        s.materials.push(material(1.0, 5));
        s.batch_size = 2.0;
        // 5 / 2 = 2.5 → 3
        assert_eq!(compute_totals(&s).cost_per_unit_cents, Some(3));
    }

    #[test]
    fn test_huge_quantities_saturate_instead_of_overflowing() {
        let mut s = sheet();
        s.materials.push(material(1e18, 100));
        s.labor.push(labor(1.0, 100));
        s.overhead = vec![flat(i64::MAX), pct(1000.0)];
        s.batch_size = 1.0;
        s.markup_pct = 10000.0;
        s.tax_pct = 1000.0;

        let totals = compute_totals(&s);
        assert_eq!(totals.materials_subtotal_cents, i64::MAX);
        assert_eq!(totals.base_cents, i64::MAX);
        assert_eq!(totals.batch_total_cents, i64::MAX);
        assert_eq!(totals.price_with_tax_cents, Some(i64::MAX));
        assert!(totals.profit_per_unit_cents.unwrap() >= 0);
    }
}
