//! Catalogue products and their integer-scaled solver form.
//!
//! The scale factors below are the single source of truth for every integer
//! conversion in the workspace. With prices in öre, contents in tenths of a
//! percent and targets in grams, all MILP coefficients and right-hand sides
//! are integers:
//!
//! ```text
//! dose_kg × n10 = dose_kg × N% × 10 = grams of N per hectare
//! target_kg × KG_SCALE = grams of target per hectare
//! ```

use crate::error::{GroError, GroResult};
use crate::nutrient::{Nutrient, NutrientAmounts};
use serde::{Deserialize, Serialize};

/// Öre per SEK: prices are scaled `SEK/kg → öre/kg`.
pub const PRICE_SCALE: i64 = 100;

/// Tenths of a percent: contents are scaled `% → ‰·10`.
pub const PCT_SCALE: i64 = 10;

/// Grams per kilogram: targets are scaled `kg → g`.
pub const KG_SCALE: i64 = 1000;

/// A commercial fertilizer product as supplied by the catalogue.
///
/// `nutrients` holds percentages in `[0, 100]`, read as grams of nutrient
/// per 100 g of product. A product with no positive nutrient content, an
/// inactive or non-optimizable flag, or a non-positive price is ignored by
/// the optimizer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    /// Stable opaque identifier; the article number is parsed from it.
    pub id: String,
    pub name: String,
    /// SEK per kg, strictly positive for optimizable products.
    pub price_per_kg: f64,
    /// Percentages by weight, `[0, 100]` each.
    pub nutrients: NutrientAmounts,
    pub active: bool,
    pub is_optimizable: bool,
}

impl Product {
    /// Integer article number parsed from the id (0 when the id is not
    /// numeric, which keeps legacy free-form ids displayable).
    pub fn artikelnr(&self) -> i64 {
        self.id.trim().parse().unwrap_or(0)
    }

    /// Whether this product may enter the optimization at all.
    pub fn is_candidate(&self) -> bool {
        self.active
            && self.is_optimizable
            && self.price_per_kg > 0.0
            && Nutrient::ALL.iter().any(|&x| self.nutrients.get(x) > 0.0)
    }
}

/// A product in integer-scaled solver form.
///
/// Derived immutably from [`Product`]; scaling preserves feasibility at
/// integer doses to within ±0.05% per product contribution and ±0.01 SEK/ha
/// in cost.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScaledProduct {
    pub id: String,
    pub artikelnr: i64,
    pub name: String,
    /// Öre per kg.
    pub price_ore: i64,
    /// Tenths of a percent per nutrient.
    pub n10: i64,
    pub p10: i64,
    pub k10: i64,
    pub s10: i64,
}

impl ScaledProduct {
    /// Scale a catalogue product. Fails on out-of-range percentages or a
    /// non-positive price; callers are expected to have filtered with
    /// [`Product::is_candidate`] first.
    pub fn from_product(product: &Product) -> GroResult<ScaledProduct> {
        if product.price_per_kg <= 0.0 {
            return Err(GroError::Validation(format!(
                "product {} has non-positive price {}",
                product.id, product.price_per_kg
            )));
        }
        for nutrient in Nutrient::ALL {
            let pct = product.nutrients.get(nutrient);
            if !(0.0..=100.0).contains(&pct) {
                return Err(GroError::Validation(format!(
                    "product {} has {} content {}% outside [0, 100]",
                    product.id, nutrient, pct
                )));
            }
        }
        Ok(ScaledProduct {
            id: product.id.clone(),
            artikelnr: product.artikelnr(),
            name: product.name.clone(),
            price_ore: (product.price_per_kg * PRICE_SCALE as f64).round() as i64,
            n10: (product.nutrients.n * PCT_SCALE as f64).round() as i64,
            p10: (product.nutrients.p * PCT_SCALE as f64).round() as i64,
            k10: (product.nutrients.k * PCT_SCALE as f64).round() as i64,
            s10: (product.nutrients.s * PCT_SCALE as f64).round() as i64,
        })
    }

    /// Content in tenths of a percent for one nutrient.
    pub fn content10(&self, nutrient: Nutrient) -> i64 {
        match nutrient {
            Nutrient::N => self.n10,
            Nutrient::P => self.p10,
            Nutrient::K => self.k10,
            Nutrient::S => self.s10,
        }
    }

    /// Kilograms of nutrient delivered by an integer dose (kg/ha).
    pub fn delivered_kg(&self, nutrient: Nutrient, dose_kg: i64) -> f64 {
        (dose_kg * self.content10(nutrient)) as f64 / KG_SCALE as f64
    }

    /// Cost of an integer dose, in öre/ha.
    pub fn dose_cost_ore(&self, dose_kg: i64) -> i64 {
        dose_kg * self.price_ore
    }
}
