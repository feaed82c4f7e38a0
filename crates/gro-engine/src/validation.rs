//! Input validation and product preparation.
//!
//! Any rejection here becomes an `infeasible` result with a human-readable
//! message; no solver is ever consulted for invalid input. Unresolvable
//! forced products are a soft degradation: logged and dropped, because the
//! remaining catalogue may still serve the caller.

use crate::types::OptimizeInput;
use gro_core::{Nutrient, Product, ScaledProduct};
use tracing::warn;

/// Validated, solver-ready view of one request.
#[derive(Debug, Clone)]
pub struct ValidatedInput {
    /// Prepared catalogue: active, optimizable, priced, nutrient-bearing.
    /// The complete list — trimming it could exclude the optimum.
    pub products: Vec<ScaledProduct>,
    /// Indices (into `products`) that must appear in every strategy.
    pub required_indices: Vec<usize>,
    /// Active nutrients in canonical order (non-empty).
    pub active: Vec<Nutrient>,
}

/// Run the §validation checks and prepare the catalogue.
pub fn validate(products: &[Product], input: &OptimizeInput) -> Result<ValidatedInput, String> {
    let active = input.flags.active_nutrients(&input.targets);
    if active.is_empty() {
        return Err(
            "no active nutrients: at least one nutrient needs a must-flag and a target of \
             at least 1 kg/ha"
                .to_string(),
        );
    }

    if input.min_dose <= 0 || input.min_dose > input.max_dose {
        return Err(format!(
            "invalid dose range: need 0 < min_dose <= max_dose, got {}..{} kg/ha",
            input.min_dose, input.max_dose
        ));
    }

    if input.max_products < 1 {
        return Err("max_products must be at least 1".to_string());
    }

    let mut prepared = Vec::new();
    for product in products.iter().filter(|p| p.is_candidate()) {
        match ScaledProduct::from_product(product) {
            Ok(scaled) => prepared.push(scaled),
            Err(err) => {
                // Catalogue data problems disqualify the product, not the call.
                warn!(product_id = %product.id, "skipping product: {}", err);
            }
        }
    }
    if prepared.is_empty() {
        return Err("no optimizable products in the catalogue".to_string());
    }

    let mut required_indices = Vec::new();
    for id in &input.required_product_ids {
        match prepared.iter().position(|p| &p.id == id) {
            Some(index) => {
                if !required_indices.contains(&index) {
                    required_indices.push(index);
                }
            }
            None => {
                warn!(product_id = %id, "required product not found or not optimizable; ignoring");
            }
        }
    }
    if required_indices.len() as u32 > input.max_products {
        return Err(format!(
            "{} required products exceed the limit of {} products per strategy",
            required_indices.len(),
            input.max_products
        ));
    }

    Ok(ValidatedInput {
        products: prepared,
        required_indices,
        active,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use gro_core::{ActivationFlags, AlgorithmConfig, NutrientAmounts};

    fn product(id: &str, price: f64, n: f64) -> Product {
        Product {
            id: id.to_string(),
            name: format!("Product {id}"),
            price_per_kg: price,
            nutrients: NutrientAmounts {
                n,
                ..Default::default()
            },
            active: true,
            is_optimizable: true,
        }
    }

    fn input() -> OptimizeInput {
        OptimizeInput {
            targets: NutrientAmounts {
                n: 150.0,
                ..Default::default()
            },
            flags: ActivationFlags {
                must_n: true,
                ..Default::default()
            },
            max_products: 3,
            min_dose: 100,
            max_dose: 600,
            config: AlgorithmConfig::default(),
            required_product_ids: Vec::new(),
        }
    }

    #[test]
    fn test_accepts_valid_input() {
        let validated = validate(&[product("1", 3.50, 27.0)], &input()).unwrap();
        assert_eq!(validated.products.len(), 1);
        assert_eq!(validated.active, vec![Nutrient::N]);
        assert!(validated.required_indices.is_empty());
    }

    #[test]
    fn test_rejects_no_active_nutrient() {
        let mut request = input();
        request.flags = ActivationFlags::default();
        assert!(validate(&[product("1", 3.50, 27.0)], &request).is_err());

        // a flag without a target of at least 1 kg/ha does not activate
        let mut request = input();
        request.targets.n = 0.4;
        assert!(validate(&[product("1", 3.50, 27.0)], &request).is_err());
    }

    #[test]
    fn test_rejects_bad_dose_range() {
        let mut request = input();
        request.min_dose = 0;
        assert!(validate(&[product("1", 3.50, 27.0)], &request).is_err());
        request.min_dose = 700;
        assert!(validate(&[product("1", 3.50, 27.0)], &request).is_err());
    }

    #[test]
    fn test_rejects_empty_catalogue() {
        assert!(validate(&[], &input()).is_err());
        // inactive and nutrient-free products do not count
        let mut inactive = product("1", 3.50, 27.0);
        inactive.active = false;
        let empty = product("2", 3.50, 0.0);
        assert!(validate(&[inactive, empty], &input()).is_err());
    }

    #[test]
    fn test_unresolved_forced_product_is_dropped() {
        let mut request = input();
        request.required_product_ids = vec!["1".to_string(), "missing".to_string()];
        let validated = validate(&[product("1", 3.50, 27.0)], &request).unwrap();
        assert_eq!(validated.required_indices, vec![0]);
    }

    #[test]
    fn test_too_many_forced_products() {
        let mut request = input();
        request.max_products = 1;
        request.required_product_ids = vec!["1".to_string(), "2".to_string()];
        let catalogue = vec![product("1", 3.50, 27.0), product("2", 4.00, 21.0)];
        let err = validate(&catalogue, &request).unwrap_err();
        assert!(err.contains("exceed the limit"));
    }
}
