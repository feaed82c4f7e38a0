//! Nutrient identities, amount vectors, and activation rules.
//!
//! The engine handles exactly four macronutrients: nitrogen, phosphorus,
//! potassium and sulphur. A nutrient participates in the optimization
//! ("is active") only when its must-flag is set AND its target is at least
//! one kilogram per hectare — sub-kilogram targets are agronomic noise and
//! would produce degenerate tolerance bands.

use serde::{Deserialize, Serialize};

/// One of the four macronutrients the engine optimizes for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Nutrient {
    N,
    P,
    K,
    S,
}

impl Nutrient {
    /// All nutrients, in the canonical N-P-K-S order used everywhere
    /// (constraint emission, warnings, output records).
    pub const ALL: [Nutrient; 4] = [Nutrient::N, Nutrient::P, Nutrient::K, Nutrient::S];

    /// Chemical symbol, as used in catalogue data and API payloads.
    pub fn symbol(&self) -> &'static str {
        match self {
            Nutrient::N => "N",
            Nutrient::P => "P",
            Nutrient::K => "K",
            Nutrient::S => "S",
        }
    }

    /// Full display name.
    pub fn display_name(&self) -> &'static str {
        match self {
            Nutrient::N => "nitrogen",
            Nutrient::P => "phosphorus",
            Nutrient::K => "potassium",
            Nutrient::S => "sulphur",
        }
    }
}

impl std::fmt::Display for Nutrient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

impl std::str::FromStr for Nutrient {
    type Err = crate::GroError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "N" => Ok(Nutrient::N),
            "P" => Ok(Nutrient::P),
            "K" => Ok(Nutrient::K),
            "S" => Ok(Nutrient::S),
            _ => Err(crate::GroError::Parse(format!("unknown nutrient: {}", s))),
        }
    }
}

/// A per-nutrient quantity vector.
///
/// Used for targets and achieved amounts (kg/ha) as well as product contents
/// (percent by weight). Absent nutrients are zero; the engine treats a zero
/// target as "no target".
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct NutrientAmounts {
    #[serde(rename = "N", default)]
    pub n: f64,
    #[serde(rename = "P", default)]
    pub p: f64,
    #[serde(rename = "K", default)]
    pub k: f64,
    #[serde(rename = "S", default)]
    pub s: f64,
}

impl NutrientAmounts {
    pub fn get(&self, nutrient: Nutrient) -> f64 {
        match nutrient {
            Nutrient::N => self.n,
            Nutrient::P => self.p,
            Nutrient::K => self.k,
            Nutrient::S => self.s,
        }
    }

    pub fn set(&mut self, nutrient: Nutrient, value: f64) {
        match nutrient {
            Nutrient::N => self.n = value,
            Nutrient::P => self.p = value,
            Nutrient::K => self.k = value,
            Nutrient::S => self.s = value,
        }
    }

    /// True when every component is zero (or effectively zero).
    pub fn is_empty(&self) -> bool {
        Nutrient::ALL.iter().all(|&x| self.get(x) <= 0.0)
    }
}

/// Which nutrients the caller demands the strategy to satisfy.
///
/// A set flag alone is not enough: the nutrient must also carry a target of
/// at least 1 kg/ha to become active (see [`ActivationFlags::is_active`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ActivationFlags {
    #[serde(rename = "mustN", default)]
    pub must_n: bool,
    #[serde(rename = "mustP", default)]
    pub must_p: bool,
    #[serde(rename = "mustK", default)]
    pub must_k: bool,
    #[serde(rename = "mustS", default)]
    pub must_s: bool,
}

/// Minimum target (kg/ha) for a flagged nutrient to count as active.
pub const ACTIVATION_MIN_TARGET_KG: f64 = 1.0;

impl ActivationFlags {
    pub fn get(&self, nutrient: Nutrient) -> bool {
        match nutrient {
            Nutrient::N => self.must_n,
            Nutrient::P => self.must_p,
            Nutrient::K => self.must_k,
            Nutrient::S => self.must_s,
        }
    }

    pub fn set(&mut self, nutrient: Nutrient, value: bool) {
        match nutrient {
            Nutrient::N => self.must_n = value,
            Nutrient::P => self.must_p = value,
            Nutrient::K => self.must_k = value,
            Nutrient::S => self.must_s = value,
        }
    }

    /// A nutrient is active iff its flag is set and the target reaches the
    /// activation minimum.
    pub fn is_active(&self, nutrient: Nutrient, targets: &NutrientAmounts) -> bool {
        self.get(nutrient) && targets.get(nutrient) >= ACTIVATION_MIN_TARGET_KG
    }

    /// Active nutrients in canonical order.
    pub fn active_nutrients(&self, targets: &NutrientAmounts) -> Vec<Nutrient> {
        Nutrient::ALL
            .iter()
            .copied()
            .filter(|&x| self.is_active(x, targets))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nutrient_symbols() {
        assert_eq!(Nutrient::N.symbol(), "N");
        assert_eq!(Nutrient::S.symbol(), "S");
        assert_eq!("k".parse::<Nutrient>().unwrap(), Nutrient::K);
        assert!("Mg".parse::<Nutrient>().is_err());
    }

    #[test]
    fn test_amounts_get_set() {
        let mut amounts = NutrientAmounts::default();
        assert!(amounts.is_empty());
        amounts.set(Nutrient::P, 20.0);
        assert_eq!(amounts.get(Nutrient::P), 20.0);
        assert!(!amounts.is_empty());
    }

    #[test]
    fn test_activation_requires_flag_and_target() {
        let flags = ActivationFlags {
            must_n: true,
            must_p: true,
            ..Default::default()
        };
        let targets = NutrientAmounts {
            n: 150.0,
            p: 0.5, // below the 1 kg/ha activation minimum
            k: 30.0,
            s: 0.0,
        };
        assert!(flags.is_active(Nutrient::N, &targets));
        assert!(!flags.is_active(Nutrient::P, &targets));
        assert!(!flags.is_active(Nutrient::K, &targets)); // no flag
        assert_eq!(flags.active_nutrients(&targets), vec![Nutrient::N]);
    }

    #[test]
    fn test_flags_serde_field_names() {
        let json = serde_json::to_string(&ActivationFlags {
            must_n: true,
            ..Default::default()
        })
        .unwrap();
        assert!(json.contains("\"mustN\":true"));
        assert!(json.contains("\"mustS\":false"));
    }
}
