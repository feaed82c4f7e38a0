//! # gro-core: Fertilizer Recommendation Domain Model
//!
//! Provides the fundamental data structures for fertilizer strategy
//! optimization: the product catalogue, nutrient vectors, activation rules,
//! and the algorithm configuration snapshot.
//!
//! ## Design Philosophy
//!
//! The optimizer works on **integer-scaled** quantities end to end:
//!
//! - prices in öre per kg (`SEK × 100`)
//! - nutrient contents in tenths of a percent (`% × 10`)
//! - nutrient targets in grams per hectare (`kg × 1000`)
//!
//! With those factors, `dose_kg × n10` is directly comparable against
//! `target_kg × 1000`, so every coefficient and right-hand side handed to a
//! MILP solver is an integer. This eliminates tolerance drift from binary
//! floating-point cancellation and makes results reproducible across
//! platforms. The scale factors are defined once, in [`product`], and every
//! conversion in the workspace derives from them.
//!
//! ## Quick Start
//!
//! ```rust
//! use gro_core::{Product, ScaledProduct, NutrientAmounts, Nutrient};
//!
//! let product = Product {
//!     id: "11117".to_string(),
//!     name: "NPK 21-4-7".to_string(),
//!     price_per_kg: 4.50,
//!     nutrients: NutrientAmounts { n: 21.0, p: 4.0, k: 7.0, s: 3.0 },
//!     active: true,
//!     is_optimizable: true,
//! };
//!
//! let scaled = ScaledProduct::from_product(&product).unwrap();
//! assert_eq!(scaled.price_ore, 450);
//! assert_eq!(scaled.content10(Nutrient::N), 210);
//! ```

pub mod config;
pub mod error;
pub mod nutrient;
pub mod product;

pub use config::{AlgorithmConfig, ConfigOverrides};
pub use error::{GroError, GroResult};
pub use nutrient::{ActivationFlags, Nutrient, NutrientAmounts};
pub use product::{Product, ScaledProduct, KG_SCALE, PCT_SCALE, PRICE_SCALE};
