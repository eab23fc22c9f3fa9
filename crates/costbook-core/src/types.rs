//! # Domain Types
//!
//! Core domain types used throughout Costbook.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌──────────────────┐   ┌──────────────────┐   ┌──────────────────┐    │
//! │  │    CostSheet     │   │  MaterialRecord  │   │    BomRecord     │    │
//! │  │  ──────────────  │   │  ──────────────  │   │  ──────────────  │    │
//! │  │  batch_size      │   │  unit_cost_cents │◄──│  lines[]         │    │
//! │  │  waste/markup/tax│   │  (catalog truth) │   │   ├ material     │    │
//! │  │  materials[]     │   └────────▲─────────┘   │   └ bom_item ──┐ │    │
//! │  │  labor[]         │            │             └────────▲───────┼─┘    │
//! │  │  overhead[]      │   ┌────────┴─────────┐            └───────┘      │
//! │  └──────────────────┘   │  PurchaseRecord  │      (nested assemblies)  │
//! │                         │  total = q × unit│                           │
//! │                         └──────────────────┘                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Persisted Shape
//! Records serialize with camelCase keys. Tagged variants keep the tag next
//! to their payload: `{"kind": "flat", "amountCents": 50}` and
//! `{"componentType": "bom_item", "componentBomId": "..."}`.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

use crate::money::{round_cents, Money, RoundingMode};

/// Generates a fresh record identifier (UUID v4).
pub fn generate_id() -> String {
    Uuid::new_v4().to_string()
}

// =============================================================================
// Cost Sheet Line Items
// =============================================================================

/// A material consumed by one batch on a cost sheet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct MaterialItem {
    pub id: String,
    pub name: String,
    /// Quantity per batch (non-negative).
    pub quantity: f64,
    /// Free-text unit of measure ("g", "sheet", "m").
    pub unit: String,
    pub unit_cost_cents: i64,
}

/// Labor spent on one batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct LaborItem {
    pub id: String,
    pub role: String,
    pub hours: f64,
    /// Hourly rate in cents.
    pub rate_cents: i64,
}

/// An indirect cost: either a fixed amount or a percentage of base cost.
///
/// The variant is the only place the amount lives, so a single item can
/// never carry both a flat amount and a percentage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OverheadItem {
    #[serde(rename_all = "camelCase")]
    Flat {
        id: String,
        name: String,
        amount_cents: i64,
    },
    #[serde(rename_all = "camelCase")]
    Percent {
        id: String,
        name: String,
        /// Percentage of the base cost, clamped to 0-1000 when applied.
        percent: f64,
    },
}

impl OverheadItem {
    pub fn id(&self) -> &str {
        match self {
            OverheadItem::Flat { id, .. } | OverheadItem::Percent { id, .. } => id,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            OverheadItem::Flat { name, .. } | OverheadItem::Percent { name, .. } => name,
        }
    }
}

// =============================================================================
// Cost Sheet
// =============================================================================

/// Aggregate root for one product's batch costing.
///
/// ## Invariants
/// - `batch_size >= 0`; a zero batch yields no per-unit figures
/// - percentages are stored as entered and clamped when computed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct CostSheet {
    pub id: String,
    pub name: String,
    pub sku: String,
    /// ISO 4217 code, e.g. "USD".
    pub currency: String,
    /// What one unit of output is called ("bar", "candle").
    pub unit_name: String,
    pub batch_size: f64,
    pub waste_pct: f64,
    pub markup_pct: f64,
    pub tax_pct: f64,
    pub materials: Vec<MaterialItem>,
    pub labor: Vec<LaborItem>,
    pub overhead: Vec<OverheadItem>,
    pub notes: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl CostSheet {
    /// Creates an empty sheet seeded from the user's default percentages.
    pub fn with_defaults(name: impl Into<String>, settings: &AppSettings) -> Self {
        let now = Utc::now();
        CostSheet {
            id: generate_id(),
            name: name.into(),
            sku: String::new(),
            currency: settings.base_currency.clone(),
            unit_name: "unit".to_string(),
            batch_size: 1.0,
            waste_pct: settings.default_waste_pct,
            markup_pct: settings.default_markup_pct,
            tax_pct: settings.default_tax_pct,
            materials: Vec::new(),
            labor: Vec::new(),
            overhead: Vec::new(),
            notes: String::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

// =============================================================================
// Material Catalog
// =============================================================================

/// A catalog material: the source of truth for current unit cost.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct MaterialRecord {
    pub id: String,
    pub name: String,
    pub code: String,
    pub category: String,
    pub unit: String,
    pub unit_cost_cents: i64,
    pub supplier: String,
    pub last_purchase_cost_cents: Option<i64>,
    #[ts(as = "Option<String>")]
    pub last_purchase_date: Option<NaiveDate>,
    pub is_active: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl MaterialRecord {
    /// Creates an active material with fresh id and timestamps.
    pub fn new(name: impl Into<String>, unit: impl Into<String>, unit_cost_cents: i64) -> Self {
        let now = Utc::now();
        MaterialRecord {
            id: generate_id(),
            name: name.into(),
            code: String::new(),
            category: String::new(),
            unit: unit.into(),
            unit_cost_cents: unit_cost_cents.max(0),
            supplier: String::new(),
            last_purchase_cost_cents: None,
            last_purchase_date: None,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[inline]
    pub fn unit_cost(&self) -> Money {
        Money::from_cents(self.unit_cost_cents)
    }
}

// =============================================================================
// Purchases
// =============================================================================

/// One purchase transaction, optionally tied to a catalog material.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseRecord {
    pub id: String,
    pub material_id: Option<String>,
    pub quantity: f64,
    pub unit_cost_cents: i64,
    /// Always `purchase_total_cents(quantity, unit_cost_cents)`.
    pub total_cost_cents: i64,
    pub supplier: String,
    pub reference_number: String,
    pub notes: String,
    #[ts(as = "Option<String>")]
    pub purchase_date: Option<NaiveDate>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl PurchaseRecord {
    pub fn new(material_id: Option<String>, quantity: f64, unit_cost_cents: i64) -> Self {
        let now = Utc::now();
        let mut purchase = PurchaseRecord {
            id: generate_id(),
            material_id,
            quantity,
            unit_cost_cents,
            total_cost_cents: 0,
            supplier: String::new(),
            reference_number: String::new(),
            notes: String::new(),
            purchase_date: None,
            created_at: now,
            updated_at: now,
        };
        purchase.recompute_total();
        purchase
    }

    /// Re-derives `total_cost_cents` from quantity and unit cost.
    pub fn recompute_total(&mut self) {
        self.total_cost_cents = purchase_total_cents(self.quantity, self.unit_cost_cents);
    }
}

/// `round(quantity × unit_cost)`, never negative.
pub fn purchase_total_cents(quantity: f64, unit_cost_cents: i64) -> i64 {
    round_cents(quantity * unit_cost_cents as f64).max(0)
}

// =============================================================================
// Bills of Materials
// =============================================================================

/// Whether a BOM describes an intermediate part or a sellable product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum BomKind {
    #[default]
    Part,
    Product,
}

impl BomKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BomKind::Part => "part",
            BomKind::Product => "product",
        }
    }
}

/// What a BOM line consumes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "componentType", rename_all = "snake_case")]
pub enum BomComponent {
    /// A raw material from the catalog.
    #[serde(rename_all = "camelCase")]
    Material { material_id: String },
    /// Another BOM, consumed as a sub-assembly.
    #[serde(rename_all = "camelCase")]
    BomItem { component_bom_id: String },
}

impl BomComponent {
    /// Column value stored in `bom_lines.component_type`.
    pub fn type_str(&self) -> &'static str {
        match self {
            BomComponent::Material { .. } => "material",
            BomComponent::BomItem { .. } => "bom_item",
        }
    }
}

/// One ordered line of a BOM.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BomLine {
    pub id: String,
    #[serde(flatten)]
    pub component: BomComponent,
    pub quantity: f64,
    pub unit: String,
    /// Catalog unit cost captured when the line was written (material lines).
    pub unit_cost_cents: Option<i64>,
    /// Dense 0-based position within the BOM.
    pub sort_order: i64,
}

impl BomLine {
    pub fn material(material_id: impl Into<String>, quantity: f64, unit: impl Into<String>) -> Self {
        BomLine {
            id: generate_id(),
            component: BomComponent::Material {
                material_id: material_id.into(),
            },
            quantity,
            unit: unit.into(),
            unit_cost_cents: None,
            sort_order: 0,
        }
    }

    pub fn sub_assembly(bom_id: impl Into<String>, quantity: f64, unit: impl Into<String>) -> Self {
        BomLine {
            id: generate_id(),
            component: BomComponent::BomItem {
                component_bom_id: bom_id.into(),
            },
            quantity,
            unit: unit.into(),
            unit_cost_cents: None,
            sort_order: 0,
        }
    }

    /// The referenced sub-assembly id, if this is a `bom_item` line.
    pub fn component_bom_id(&self) -> Option<&str> {
        match &self.component {
            BomComponent::BomItem { component_bom_id } => Some(component_bom_id),
            BomComponent::Material { .. } => None,
        }
    }
}

/// A bill of materials producing `output_qty` units of `output_unit`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BomRecord {
    pub id: String,
    pub name: String,
    pub kind: BomKind,
    pub output_qty: f64,
    pub output_unit: String,
    pub lines: Vec<BomLine>,
    pub notes: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl BomRecord {
    pub fn new(name: impl Into<String>, kind: BomKind, output_qty: f64, output_unit: impl Into<String>) -> Self {
        let now = Utc::now();
        BomRecord {
            id: generate_id(),
            name: name.into(),
            kind,
            output_qty,
            output_unit: output_unit.into(),
            lines: Vec::new(),
            notes: String::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

// =============================================================================
// Application Settings
// =============================================================================

/// Measurement system used for unit pickers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum UnitSystem {
    #[default]
    Metric,
    Imperial,
}

/// Per-user application settings.
///
/// Created with defaults on first use and changed only by an explicit save.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct AppSettings {
    pub base_currency: String,
    /// Price rounding increment in cents (1 = no rounding).
    pub rounding_increment_cents: i64,
    pub rounding_mode: RoundingMode,
    /// Display pattern, e.g. "YYYY-MM-DD".
    pub date_format: String,
    /// IANA zone name.
    pub timezone: String,
    pub unit_system: UnitSystem,
    /// Decimal places shown for quantities.
    pub quantity_precision: u8,
    /// Decimal places shown for percentages.
    pub percent_precision: u8,
    pub default_waste_pct: f64,
    pub default_markup_pct: f64,
    pub default_tax_pct: f64,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Default for AppSettings {
    fn default() -> Self {
        AppSettings {
            base_currency: "USD".to_string(),
            rounding_increment_cents: 1,
            rounding_mode: RoundingMode::Nearest,
            date_format: "YYYY-MM-DD".to_string(),
            timezone: "UTC".to_string(),
            unit_system: UnitSystem::Metric,
            quantity_precision: 2,
            percent_precision: 1,
            default_waste_pct: 0.0,
            default_markup_pct: 50.0,
            default_tax_pct: 0.0,
            updated_at: Utc::now(),
        }
    }
}

impl AppSettings {
    /// Applies the configured rounding increment and mode to a price.
    pub fn round_price(&self, price: Money) -> Money {
        price.round_to_increment(self.rounding_increment_cents, self.rounding_mode)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_overhead_persisted_shape() {
        let flat = OverheadItem::Flat {
            id: "o1".into(),
            name: "Rent".into(),
            amount_cents: 50,
        };
        let value = serde_json::to_value(&flat).unwrap();
        assert_eq!(
            value,
            json!({"kind": "flat", "id": "o1", "name": "Rent", "amountCents": 50})
        );

        let pct: OverheadItem =
            serde_json::from_value(json!({"kind": "percent", "id": "o2", "name": "Utilities", "percent": 10.0}))
                .unwrap();
        assert_eq!(pct.name(), "Utilities");
        assert!(matches!(pct, OverheadItem::Percent { percent, .. } if percent == 10.0));
    }

    #[test]
    fn test_bom_line_persisted_shape() {
        let mut line = BomLine::sub_assembly("bom-2", 3.0, "pcs");
        line.id = "l1".into();
        let value = serde_json::to_value(&line).unwrap();
        assert_eq!(value["componentType"], "bom_item");
        assert_eq!(value["componentBomId"], "bom-2");
        assert_eq!(value["sortOrder"], 0);

        let back: BomLine = serde_json::from_value(value).unwrap();
        assert_eq!(back.component_bom_id(), Some("bom-2"));
    }

    #[test]
    fn test_purchase_total_is_derived() {
        let purchase = PurchaseRecord::new(None, 2.5, 333);
        assert_eq!(purchase.total_cost_cents, 833);
        assert_eq!(purchase_total_cents(-4.0, 100), 0);
    }

    #[test]
    fn test_cost_sheet_uses_settings_defaults() {
        let settings = AppSettings {
            base_currency: "EUR".into(),
            default_waste_pct: 5.0,
            default_markup_pct: 120.0,
            ..AppSettings::default()
        };
        let sheet = CostSheet::with_defaults("Soap", &settings);
        assert_eq!(sheet.currency, "EUR");
        assert_eq!(sheet.waste_pct, 5.0);
        assert_eq!(sheet.markup_pct, 120.0);
        assert_eq!(sheet.batch_size, 1.0);
    }

    #[test]
    fn test_settings_round_price() {
        let settings = AppSettings {
            rounding_increment_cents: 25,
            rounding_mode: RoundingMode::Up,
            ..AppSettings::default()
        };
        assert_eq!(settings.round_price(Money::from_cents(189)).cents(), 200);
        assert_eq!(
            AppSettings::default().round_price(Money::from_cents(189)).cents(),
            189
        );
    }

    #[test]
    fn test_bom_kind_default() {
        assert_eq!(BomKind::default(), BomKind::Part);
        assert_eq!(BomKind::Product.as_str(), "product");
    }
}
