//! # BOM Cost Resolver
//!
//! Resolves nested bills of materials into costs.
//!
//! ## Model
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  BOMs live in an arena keyed by id; lines refer to other BOMs by id.   │
//! │                                                                         │
//! │   Gift set (product, out 1)                                             │
//! │   ├── material: ribbon        2 × 40¢             =  80                 │
//! │   └── bom_item: Candle        3 × (400 / 2)       = 600                 │
//! │         Candle (part, out 2)                                            │
//! │         ├── material: wax     1 × 350¢            = 350                 │
//! │         └── material: wick    2 × 25¢             =  50                 │
//! │                                                   ─────                 │
//! │                                         total       680                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Traversal is depth-first with an explicit stack of BOM ids currently
//! being resolved; meeting an id already on the stack is a cycle.
//! Missing materials and sub-assemblies cost zero and are reported as
//! [`IntegrityWarning`]s.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::error::BomError;
use crate::money::{non_negative, Money};
use crate::types::{BomComponent, BomLine, BomRecord, MaterialRecord};

/// A dangling reference found while resolving.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IntegrityWarning {
    #[serde(rename_all = "camelCase")]
    MissingMaterial { bom_id: String, material_id: String },
    #[serde(rename_all = "camelCase")]
    MissingBom {
        bom_id: String,
        component_bom_id: String,
    },
}

impl std::fmt::Display for IntegrityWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IntegrityWarning::MissingMaterial { bom_id, material_id } => {
                write!(f, "BOM {bom_id} references missing material {material_id}")
            }
            IntegrityWarning::MissingBom {
                bom_id,
                component_bom_id,
            } => write!(f, "BOM {bom_id} references missing BOM {component_bom_id}"),
        }
    }
}

/// Resolved cost of one BOM.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BomCost {
    pub bom_id: String,
    /// Cost of one full run producing `output_qty` units.
    pub total_cents: i64,
    pub output_qty: f64,
    /// `round(total / output_qty)`.
    pub unit_cost_cents: i64,
    pub warnings: Vec<IntegrityWarning>,
}

/// Resolver over a snapshot of BOMs and catalog materials.
///
/// ## Example
/// ```rust
/// use std::collections::HashMap;
/// use costbook_core::costing::bom::BomCostResolver;
/// use costbook_core::types::{BomKind, BomLine, BomRecord, MaterialRecord};
///
/// let wax = MaterialRecord::new("Wax", "kg", 400);
/// let mut candle = BomRecord::new("Candle", BomKind::Part, 2.0, "pcs");
/// candle.lines.push(BomLine::material(wax.id.clone(), 1.0, "kg"));
///
/// let boms = HashMap::from([(candle.id.clone(), candle.clone())]);
/// let materials = HashMap::from([(wax.id.clone(), wax)]);
///
/// let cost = BomCostResolver::new(&boms, &materials).resolve(&candle.id).unwrap();
/// assert_eq!(cost.total_cents, 400);
/// assert_eq!(cost.unit_cost_cents, 200);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct BomCostResolver<'a> {
    boms: &'a HashMap<String, BomRecord>,
    materials: &'a HashMap<String, MaterialRecord>,
}

impl<'a> BomCostResolver<'a> {
    pub fn new(
        boms: &'a HashMap<String, BomRecord>,
        materials: &'a HashMap<String, MaterialRecord>,
    ) -> Self {
        BomCostResolver { boms, materials }
    }

    /// Resolves the total and per-unit cost of `bom_id`.
    ///
    /// ## Errors
    /// - [`BomError::NotFound`] if `bom_id` itself is unknown
    /// - [`BomError::CycleDetected`] if `bom_id` reaches itself
    pub fn resolve(&self, bom_id: &str) -> Result<BomCost, BomError> {
        let bom = self
            .boms
            .get(bom_id)
            .ok_or_else(|| BomError::NotFound(bom_id.to_string()))?;

        let mut walk = Walk::default();
        let total = walk.total(self, bom)?;
        let output_qty = effective_output_qty(bom);

        Ok(BomCost {
            bom_id: bom.id.clone(),
            total_cents: total.cents(),
            output_qty,
            unit_cost_cents: Money::from_fractional_cents(total.cents() as f64 / output_qty).cents(),
            warnings: walk.warnings,
        })
    }
}

/// Per-call traversal state.
#[derive(Default)]
struct Walk {
    visiting: Vec<String>,
    resolved: HashMap<String, Money>,
    warnings: Vec<IntegrityWarning>,
}

impl Walk {
    fn total(&mut self, resolver: &BomCostResolver<'_>, bom: &BomRecord) -> Result<Money, BomError> {
        if let Some(total) = self.resolved.get(&bom.id) {
            return Ok(*total);
        }

        if let Some(start) = self.visiting.iter().position(|id| *id == bom.id) {
            let mut path = self.visiting[start..].to_vec();
            path.push(bom.id.clone());
            return Err(BomError::CycleDetected { path });
        }

        self.visiting.push(bom.id.clone());

        // saturating, so huge quantities cannot wrap negative
        let mut total = Money::zero();
        for line in &bom.lines {
            let quantity = non_negative(line.quantity);
            total += match &line.component {
                BomComponent::Material { material_id } => match resolver.materials.get(material_id) {
                    Some(material) => material.unit_cost().non_negative().times(quantity),
                    None => {
                        self.warn(IntegrityWarning::MissingMaterial {
                            bom_id: bom.id.clone(),
                            material_id: material_id.clone(),
                        });
                        Money::zero()
                    }
                },
                BomComponent::BomItem { component_bom_id } => match resolver.boms.get(component_bom_id) {
                    Some(child) => {
                        let child_total = self.total(resolver, child)?;
                        Money::from_fractional_cents(
                            quantity * child_total.cents() as f64 / effective_output_qty(child),
                        )
                    }
                    None => {
                        self.warn(IntegrityWarning::MissingBom {
                            bom_id: bom.id.clone(),
                            component_bom_id: component_bom_id.clone(),
                        });
                        Money::zero()
                    }
                },
            };
        }

        self.visiting.pop();
        self.resolved.insert(bom.id.clone(), total);
        Ok(total)
    }

    fn warn(&mut self, warning: IntegrityWarning) {
        if !self.warnings.contains(&warning) {
            self.warnings.push(warning);
        }
    }
}

/// Output quantity used for scaling; zero or non-finite counts as 1.
fn effective_output_qty(bom: &BomRecord) -> f64 {
    if bom.output_qty.is_finite() && bom.output_qty > 0.0 {
        bom.output_qty
    } else {
        1.0
    }
}

// =============================================================================
// Integrity Helpers
// =============================================================================

/// Stable-sorts lines by `sort_order` and renumbers them `0..n`.
pub fn normalize_sort_order(lines: &mut [BomLine]) {
    lines.sort_by_key(|line| line.sort_order);
    for (idx, line) in lines.iter_mut().enumerate() {
        line.sort_order = idx as i64;
    }
}

/// Checks that giving `bom_id` the lines `lines` would not let it reach
/// itself through `boms`.
///
/// The stored lines of `bom_id` (if any) are ignored in favour of `lines`.
pub fn check_acyclic(
    bom_id: &str,
    lines: &[BomLine],
    boms: &HashMap<String, BomRecord>,
) -> Result<(), BomError> {
    let mut explored: HashSet<&str> = HashSet::new();
    let mut path = vec![bom_id.to_string()];

    for child in lines.iter().filter_map(BomLine::component_bom_id) {
        reaches(bom_id, child, boms, &mut explored, &mut path)?;
    }

    Ok(())
}

fn reaches<'a>(
    target: &str,
    current: &'a str,
    boms: &'a HashMap<String, BomRecord>,
    explored: &mut HashSet<&'a str>,
    path: &mut Vec<String>,
) -> Result<(), BomError> {
    path.push(current.to_string());

    if current == target {
        return Err(BomError::CycleDetected { path: path.clone() });
    }

    if explored.insert(current) {
        if let Some(bom) = boms.get(current) {
            for child in bom.lines.iter().filter_map(BomLine::component_bom_id) {
                reaches(target, child, boms, explored, path)?;
            }
        }
    }

    path.pop();
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
