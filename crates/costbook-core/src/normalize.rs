//! # Record Normalizers
//!
//! Parse-don't-validate constructors that turn loosely-typed input (JSON
//! reloaded from a local store, rows from an older schema, hand-edited
//! files) into fully-typed records.
//!
//! ## Fallback Rules
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Field kind        Missing / wrong type / non-finite → fallback        │
//! │  ────────────────  ─────────────────────────────────────────────────   │
//! │  id                freshly generated UUID v4                            │
//! │  string            ""                                                   │
//! │  quantity / hours  0 (negative clamps to 0)                             │
//! │  cents             0 (fractional rounds, negative clamps to 0)          │
//! │  percentages       0, clamped to the field's documented maximum         │
//! │  batch size        1                                                    │
//! │  BOM output qty    1                                                    │
//! │  active flag       true                                                 │
//! │  timestamps        now                                                  │
//! │  dates             none                                                 │
//! │  arrays            [] (non-object entries skipped)                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Numbers may arrive as JSON numbers or numeric strings. Keys are read in
//! camelCase first, then snake_case.
//!
//! ## Usage
//! ```rust
//! use costbook_core::normalize::normalize_material_item;
//! use serde_json::json;
//!
//! let item = normalize_material_item(&json!({"name": "Wax", "quantity": "2.5", "unitCostCents": -3}));
//! assert_eq!(item.quantity, 2.5);
//! assert_eq!(item.unit_cost_cents, 0);
//! assert!(!item.id.is_empty());
//! ```

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::costing::bom::{check_acyclic, normalize_sort_order};
use crate::error::CoreResult;
use crate::money::{clamp, non_negative, round_cents, RoundingMode};
use crate::validation::{
    validate_bom_record, validate_cost_sheet, validate_material_record, validate_purchase_record,
};
use crate::types::{
    generate_id, purchase_total_cents, AppSettings, BomComponent, BomKind, BomLine, BomRecord,
    CostSheet, LaborItem, MaterialItem, MaterialRecord, OverheadItem, PurchaseRecord, UnitSystem,
};
use crate::{MARKUP_PCT_MAX, OVERHEAD_PCT_MAX, TAX_PCT_MAX, WASTE_PCT_MAX};

// =============================================================================
// Record Trait
// =============================================================================

/// A top-level record that a store can hold by id.
///
/// `from_value` is the only way stored data re-enters the typed world, so
/// every store shares the same fallback rules.
pub trait Record: Serialize + Clone + Send + Sync + 'static {
    /// Collection name used by key-value stores.
    const COLLECTION: &'static str;

    fn id(&self) -> &str;

    /// Builds the record from arbitrary JSON using the normalizers.
    fn from_value(value: &Value) -> Self;

    /// Refreshes the update timestamp.
    fn touch(&mut self, now: DateTime<Utc>);

    /// Checks the record before a store writes it and returns the form to
    /// store. `stored` is the collection as it stands.
    fn prepare_write(&self, _stored: &HashMap<String, Self>) -> CoreResult<Self> {
        Ok(self.clone())
    }

    /// This record's name when it lists `id` as a component.
    fn uses(&self, _id: &str) -> Option<&str> {
        None
    }
}

impl Record for MaterialRecord {
    const COLLECTION: &'static str = "materials";

    fn id(&self) -> &str {
        &self.id
    }

    fn from_value(value: &Value) -> Self {
        normalize_material_record(value)
    }

    fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
    }

    fn prepare_write(&self, _stored: &HashMap<String, Self>) -> CoreResult<Self> {
        validate_material_record(self)?;
        Ok(self.clone())
    }
}

impl Record for PurchaseRecord {
    const COLLECTION: &'static str = "purchases";

    fn id(&self) -> &str {
        &self.id
    }

    fn from_value(value: &Value) -> Self {
        normalize_purchase_record(value)
    }

    fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
    }

    fn prepare_write(&self, _stored: &HashMap<String, Self>) -> CoreResult<Self> {
        let mut purchase = self.clone();
        purchase.recompute_total();
        validate_purchase_record(&purchase)?;
        Ok(purchase)
    }
}

impl Record for BomRecord {
    const COLLECTION: &'static str = "boms";

    fn id(&self) -> &str {
        &self.id
    }

    fn from_value(value: &Value) -> Self {
        normalize_bom_record(value)
    }

    fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
    }

    /// Renumbers lines, validates, and rejects cycles through `stored`.
    fn prepare_write(&self, stored: &HashMap<String, Self>) -> CoreResult<Self> {
        let mut bom = self.clone();
        normalize_sort_order(&mut bom.lines);
        validate_bom_record(&bom)?;
        check_acyclic(&bom.id, &bom.lines, stored)?;
        Ok(bom)
    }

    fn uses(&self, id: &str) -> Option<&str> {
        self.lines
            .iter()
            .any(|line| line.component_bom_id() == Some(id))
            .then_some(self.name.as_str())
    }
}

impl Record for CostSheet {
    const COLLECTION: &'static str = "cost_sheets";

    fn id(&self) -> &str {
        &self.id
    }

    fn from_value(value: &Value) -> Self {
        normalize_cost_sheet(value)
    }

    fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
    }

    fn prepare_write(&self, _stored: &HashMap<String, Self>) -> CoreResult<Self> {
        validate_cost_sheet(self)?;
        Ok(self.clone())
    }
}

// =============================================================================
// Field Readers
// =============================================================================

fn snake_case(key: &str) -> String {
    let mut out = String::with_capacity(key.len() + 4);
    for c in key.chars() {
        if c.is_ascii_uppercase() {
            out.push('_');
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

fn field<'a>(value: &'a Value, key: &str) -> Option<&'a Value> {
    let obj = value.as_object()?;
    obj.get(key)
        .or_else(|| obj.get(&snake_case(key)))
        .filter(|v| !v.is_null())
}

/// Reads a finite number (JSON number or numeric string).
pub fn read_number(value: &Value, key: &str) -> Option<f64> {
    let n = match field(value, key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    n.is_finite().then_some(n)
}

/// Reads a non-negative quantity, defaulting to `default`.
pub fn read_quantity(value: &Value, key: &str, default: f64) -> f64 {
    read_number(value, key).map(non_negative).unwrap_or(default)
}

/// Reads a non-negative cent amount, defaulting to 0.
pub fn read_cents(value: &Value, key: &str) -> i64 {
    read_number(value, key)
        .map(|n| round_cents(n).max(0))
        .unwrap_or(0)
}

/// Reads a percentage clamped to `[0, max]`, defaulting to 0.
pub fn read_percent(value: &Value, key: &str, max: f64) -> f64 {
    read_number(value, key)
        .map(|n| clamp(n, 0.0, max))
        .unwrap_or(0.0)
}

/// Reads a string; numbers and booleans are stringified, anything else is "".
pub fn read_string(value: &Value, key: &str) -> String {
    match field(value, key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => String::new(),
    }
}

fn read_optional_string(value: &Value, key: &str) -> Option<String> {
    match field(value, key) {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.clone()),
        _ => None,
    }
}

/// Reads an id; absent, empty or non-string ids are regenerated.
pub fn read_id(value: &Value) -> String {
    read_optional_string(value, "id").unwrap_or_else(generate_id)
}

fn read_bool(value: &Value, key: &str, default: bool) -> bool {
    match field(value, key) {
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().map(|f| f != 0.0).unwrap_or(default),
        Some(Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "1" => true,
            "false" | "no" | "0" => false,
            _ => default,
        },
        _ => default,
    }
}

fn read_timestamp(value: &Value, key: &str, now: DateTime<Utc>) -> DateTime<Utc> {
    read_optional_string(value, key)
        .and_then(|s| DateTime::parse_from_rfc3339(s.trim()).ok())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or(now)
}

fn read_date(value: &Value, key: &str) -> Option<NaiveDate> {
    let raw = read_optional_string(value, key)?;
    let raw = raw.trim();
    // Accept a full timestamp by keeping only its date part
    let date_part = raw.split('T').next().unwrap_or(raw);
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(date_part, "%Y/%m/%d"))
        .ok()
}

fn read_array<'a>(value: &'a Value, key: &str) -> impl Iterator<Item = &'a Value> {
    field(value, key)
        .and_then(Value::as_array)
        .map(|items| items.as_slice())
        .unwrap_or(&[])
        .iter()
        .filter(|item| item.is_object())
}

// =============================================================================
// Cost Sheet Normalizers
// =============================================================================

pub fn normalize_material_item(value: &Value) -> MaterialItem {
    MaterialItem {
        id: read_id(value),
        name: read_string(value, "name"),
        quantity: read_quantity(value, "quantity", 0.0),
        unit: read_string(value, "unit"),
        unit_cost_cents: read_cents(value, "unitCostCents"),
    }
}

pub fn normalize_labor_item(value: &Value) -> LaborItem {
    LaborItem {
        id: read_id(value),
        role: read_string(value, "role"),
        hours: read_quantity(value, "hours", 0.0),
        rate_cents: read_cents(value, "rateCents"),
    }
}

/// Normalizes an overhead entry.
///
/// `kind: "percent"` selects the percentage variant; anything else is flat.
/// An entry with no `kind` but a `percent` field is treated as percent.
pub fn normalize_overhead_item(value: &Value) -> OverheadItem {
    let id = read_id(value);
    let name = read_string(value, "name");

    let is_percent = match read_optional_string(value, "kind") {
        Some(kind) => kind.trim().eq_ignore_ascii_case("percent"),
        None => field(value, "percent").is_some() && field(value, "amountCents").is_none(),
    };

    if is_percent {
        OverheadItem::Percent {
            id,
            name,
            percent: read_percent(value, "percent", OVERHEAD_PCT_MAX),
        }
    } else {
        OverheadItem::Flat {
            id,
            name,
            amount_cents: read_cents(value, "amountCents"),
        }
    }
}

pub fn normalize_cost_sheet(value: &Value) -> CostSheet {
    let now = Utc::now();
    let currency = read_string(value, "currency").trim().to_ascii_uppercase();

    CostSheet {
        id: read_id(value),
        name: read_string(value, "name"),
        sku: read_string(value, "sku"),
        currency: if currency.is_empty() {
            "USD".to_string()
        } else {
            currency
        },
        unit_name: read_string(value, "unitName"),
        batch_size: read_quantity(value, "batchSize", 1.0),
        waste_pct: read_percent(value, "wastePct", WASTE_PCT_MAX),
        markup_pct: read_percent(value, "markupPct", MARKUP_PCT_MAX),
        tax_pct: read_percent(value, "taxPct", TAX_PCT_MAX),
        materials: read_array(value, "materials")
            .map(normalize_material_item)
            .collect(),
        labor: read_array(value, "labor").map(normalize_labor_item).collect(),
        overhead: read_array(value, "overhead")
            .map(normalize_overhead_item)
            .collect(),
        notes: read_string(value, "notes"),
        created_at: read_timestamp(value, "createdAt", now),
        updated_at: read_timestamp(value, "updatedAt", now),
    }
}

// =============================================================================
// Catalog & Purchase Normalizers
// =============================================================================

pub fn normalize_material_record(value: &Value) -> MaterialRecord {
    let now = Utc::now();

    MaterialRecord {
        id: read_id(value),
        name: read_string(value, "name"),
        code: read_string(value, "code"),
        category: read_string(value, "category"),
        unit: read_string(value, "unit"),
        unit_cost_cents: read_cents(value, "unitCostCents"),
        supplier: read_string(value, "supplier"),
        last_purchase_cost_cents: read_number(value, "lastPurchaseCostCents")
            .map(|n| round_cents(n).max(0)),
        last_purchase_date: read_date(value, "lastPurchaseDate"),
        is_active: read_bool(value, "isActive", true),
        created_at: read_timestamp(value, "createdAt", now),
        updated_at: read_timestamp(value, "updatedAt", now),
    }
}

/// Normalizes a purchase; the stored total is ignored and re-derived.
pub fn normalize_purchase_record(value: &Value) -> PurchaseRecord {
    let now = Utc::now();
    let quantity = read_quantity(value, "quantity", 0.0);
    let unit_cost_cents = read_cents(value, "unitCostCents");

    PurchaseRecord {
        id: read_id(value),
        material_id: read_optional_string(value, "materialId"),
        quantity,
        unit_cost_cents,
        total_cost_cents: purchase_total_cents(quantity, unit_cost_cents),
        supplier: read_string(value, "supplier"),
        reference_number: read_string(value, "referenceNumber"),
        notes: read_string(value, "notes"),
        purchase_date: read_date(value, "purchaseDate"),
        created_at: read_timestamp(value, "createdAt", now),
        updated_at: read_timestamp(value, "updatedAt", now),
    }
}

// =============================================================================
// BOM Normalizers
// =============================================================================

/// Normalizes a BOM line.
///
/// `componentType: "bom_item"` with a string `componentBomId` becomes a
/// sub-assembly line; everything else is a material line (possibly with an
/// empty, and therefore dangling, material id).
pub fn normalize_bom_line(value: &Value) -> BomLine {
    let is_bom_item = read_optional_string(value, "componentType")
        .map(|t| t.trim().eq_ignore_ascii_case("bom_item"))
        .unwrap_or(false);

    let component = match (is_bom_item, read_optional_string(value, "componentBomId")) {
        (true, Some(component_bom_id)) => BomComponent::BomItem { component_bom_id },
        _ => BomComponent::Material {
            material_id: read_string(value, "materialId"),
        },
    };

    let unit_cost_cents = match component {
        BomComponent::Material { .. } => {
            read_number(value, "unitCostCents").map(|n| round_cents(n).max(0))
        }
        BomComponent::BomItem { .. } => None,
    };

    BomLine {
        id: read_id(value),
        component,
        quantity: read_quantity(value, "quantity", 0.0),
        unit: read_string(value, "unit"),
        unit_cost_cents,
        sort_order: read_number(value, "sortOrder")
            .map(|n| n as i64)
            .unwrap_or(i64::MAX),
    }
}

/// Normalizes a BOM; lines are re-sorted and renumbered densely from 0.
pub fn normalize_bom_record(value: &Value) -> BomRecord {
    let now = Utc::now();

    let kind = match read_string(value, "kind").trim().to_ascii_lowercase().as_str() {
        "product" => BomKind::Product,
        _ => BomKind::Part,
    };

    let output_qty = read_number(value, "outputQty")
        .filter(|q| *q > 0.0)
        .unwrap_or(1.0);

    let mut lines: Vec<BomLine> = read_array(value, "lines").map(normalize_bom_line).collect();
    normalize_sort_order(&mut lines);

    BomRecord {
        id: read_id(value),
        name: read_string(value, "name"),
        kind,
        output_qty,
        output_unit: read_string(value, "outputUnit"),
        lines,
        notes: read_string(value, "notes"),
        created_at: read_timestamp(value, "createdAt", now),
        updated_at: read_timestamp(value, "updatedAt", now),
    }
}

// =============================================================================
// Settings Normalizer
// =============================================================================

/// Normalizes stored settings on top of [`AppSettings::default`].
pub fn normalize_settings(value: &Value) -> AppSettings {
    let defaults = AppSettings::default();
    let currency = read_string(value, "baseCurrency").trim().to_ascii_uppercase();

    let rounding_mode = match read_string(value, "roundingMode").trim().to_ascii_lowercase().as_str() {
        "up" => RoundingMode::Up,
        "down" => RoundingMode::Down,
        _ => RoundingMode::Nearest,
    };

    let unit_system = match read_string(value, "unitSystem").trim().to_ascii_lowercase().as_str() {
        "imperial" => UnitSystem::Imperial,
        _ => UnitSystem::Metric,
    };

    let non_empty = |s: String, fallback: String| if s.trim().is_empty() { fallback } else { s };

    AppSettings {
        base_currency: if currency.is_empty() {
            defaults.base_currency
        } else {
            currency
        },
        rounding_increment_cents: read_number(value, "roundingIncrementCents")
            .map(|n| round_cents(n).max(1))
            .unwrap_or(defaults.rounding_increment_cents),
        rounding_mode,
        date_format: non_empty(read_string(value, "dateFormat"), defaults.date_format),
        timezone: non_empty(read_string(value, "timezone"), defaults.timezone),
        unit_system,
        quantity_precision: read_number(value, "quantityPrecision")
            .map(|n| clamp(n, 0.0, 6.0) as u8)
            .unwrap_or(defaults.quantity_precision),
        percent_precision: read_number(value, "percentPrecision")
            .map(|n| clamp(n, 0.0, 6.0) as u8)
            .unwrap_or(defaults.percent_precision),
        default_waste_pct: read_number(value, "defaultWastePct")
            .map(|n| clamp(n, 0.0, WASTE_PCT_MAX))
            .unwrap_or(defaults.default_waste_pct),
        default_markup_pct: read_number(value, "defaultMarkupPct")
            .map(|n| clamp(n, 0.0, MARKUP_PCT_MAX))
            .unwrap_or(defaults.default_markup_pct),
        default_tax_pct: read_number(value, "defaultTaxPct")
            .map(|n| clamp(n, 0.0, TAX_PCT_MAX))
            .unwrap_or(defaults.default_tax_pct),
        updated_at: read_timestamp(value, "updatedAt", defaults.updated_at),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
