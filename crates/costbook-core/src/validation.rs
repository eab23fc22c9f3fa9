//! # Validation Module
//!
//! Field validation for records before they are written to a store.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: normalize (parse, don't validate)                            │
//! │  ├── Loosely-typed input → fully-typed record                          │
//! │  └── Bad numbers fall back to safe defaults                            │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE (reject what a default cannot fix)               │
//! │  ├── Names present and bounded                                         │
//! │  └── Currency codes, ids, percentage ranges                            │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── NOT NULL / CHECK constraints                                      │
//! │  └── Foreign key constraints                                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use crate::error::ValidationError;
use crate::types::{BomRecord, CostSheet, MaterialRecord, OverheadItem, PurchaseRecord};
use crate::{MARKUP_PCT_MAX, OVERHEAD_PCT_MAX, TAX_PCT_MAX, WASTE_PCT_MAX};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Longest accepted display name.
const MAX_NAME_LEN: usize = 200;

/// Longest accepted SKU or material code.
const MAX_CODE_LEN: usize = 50;

// =============================================================================
// String Validators
// =============================================================================

/// Validates a required display name.
///
/// ## Example
/// ```rust
/// use costbook_core::validation::validate_name;
///
/// assert!(validate_name("name", "Lavender Soap").is_ok());
/// assert!(validate_name("name", "   ").is_err());
/// ```
pub fn validate_name(field: &str, name: &str) -> ValidationResult<()> {
    let name = name.trim();

    if name.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if name.chars().count() > MAX_NAME_LEN {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: MAX_NAME_LEN,
        });
    }

    Ok(())
}

/// Validates an optional SKU / material code.
///
/// ## Rules
/// - Empty is allowed (codes are optional)
/// - At most 50 characters
/// - Letters, digits, hyphens, underscores and dots only
pub fn validate_code(field: &str, code: &str) -> ValidationResult<()> {
    let code = code.trim();

    if code.is_empty() {
        return Ok(());
    }

    if code.len() > MAX_CODE_LEN {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: MAX_CODE_LEN,
        });
    }

    if !code
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_' || c == '.')
    {
        return Err(ValidationError::InvalidFormat {
            field: field.to_string(),
            reason: "must contain only letters, numbers, hyphens, underscores, and dots"
                .to_string(),
        });
    }

    Ok(())
}

/// Validates an ISO 4217 currency code (three uppercase ASCII letters).
///
/// ## Example
/// ```rust
/// use costbook_core::validation::validate_currency_code;
///
/// assert!(validate_currency_code("USD").is_ok());
/// assert!(validate_currency_code("usd").is_err());
/// assert!(validate_currency_code("US").is_err());
/// ```
pub fn validate_currency_code(code: &str) -> ValidationResult<()> {
    if code.len() == 3 && code.chars().all(|c| c.is_ascii_uppercase()) {
        return Ok(());
    }

    Err(ValidationError::InvalidFormat {
        field: "currency".to_string(),
        reason: "must be a three-letter ISO 4217 code such as USD".to_string(),
    })
}


// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a finite, non-negative quantity.
pub fn validate_non_negative(field: &str, value: f64) -> ValidationResult<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0.0,
            max: f64::MAX,
        });
    }

    Ok(())
}

/// Validates a percentage in `[0, max]`.
pub fn validate_percent(field: &str, value: f64, max: f64) -> ValidationResult<()> {
    if !value.is_finite() || value < 0.0 || value > max {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0.0,
            max,
        });
    }

    Ok(())
}

/// Validates a money amount in cents.
pub fn validate_cents(field: &str, cents: i64) -> ValidationResult<()> {
    if cents < 0 {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0.0,
            max: i64::MAX as f64,
        });
    }

    Ok(())
}

// =============================================================================
// Record Validators
// =============================================================================

/// Validates a catalog material before it is written.
pub fn validate_material_record(material: &MaterialRecord) -> ValidationResult<()> {
    validate_name("name", &material.name)?;
    validate_code("code", &material.code)?;
    validate_cents("unit cost", material.unit_cost_cents)?;
    if let Some(cost) = material.last_purchase_cost_cents {
        validate_cents("last purchase cost", cost)?;
    }
    Ok(())
}

/// Validates a purchase before it is written.
pub fn validate_purchase_record(purchase: &PurchaseRecord) -> ValidationResult<()> {
    validate_non_negative("quantity", purchase.quantity)?;
    validate_cents("unit cost", purchase.unit_cost_cents)?;
    validate_cents("total cost", purchase.total_cost_cents)?;
    Ok(())
}

/// Validates a BOM header and its lines.
pub fn validate_bom_record(bom: &BomRecord) -> ValidationResult<()> {
    validate_name("name", &bom.name)?;

    if !bom.output_qty.is_finite() || bom.output_qty <= 0.0 {
        return Err(ValidationError::OutOfRange {
            field: "output quantity".to_string(),
            min: f64::MIN_POSITIVE,
            max: f64::MAX,
        });
    }

    for line in &bom.lines {
        validate_non_negative("line quantity", line.quantity)?;
    }

    Ok(())
}

/// Validates a cost sheet and every line item on it.
pub fn validate_cost_sheet(sheet: &CostSheet) -> ValidationResult<()> {
    validate_name("name", &sheet.name)?;
    validate_code("sku", &sheet.sku)?;
    validate_currency_code(&sheet.currency)?;
    validate_non_negative("batch size", sheet.batch_size)?;
    validate_percent("waste", sheet.waste_pct, WASTE_PCT_MAX)?;
    validate_percent("markup", sheet.markup_pct, MARKUP_PCT_MAX)?;
    validate_percent("tax", sheet.tax_pct, TAX_PCT_MAX)?;

    for item in &sheet.materials {
        validate_non_negative("material quantity", item.quantity)?;
        validate_cents("material unit cost", item.unit_cost_cents)?;
    }

    for item in &sheet.labor {
        validate_non_negative("labor hours", item.hours)?;
        validate_cents("labor rate", item.rate_cents)?;
    }

    for item in &sheet.overhead {
        match item {
            OverheadItem::Flat { amount_cents, .. } => {
                validate_cents("overhead amount", *amount_cents)?
            }
            OverheadItem::Percent { percent, .. } => {
                validate_percent("overhead percent", *percent, OVERHEAD_PCT_MAX)?
            }
        }
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
