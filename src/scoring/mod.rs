//! K-Type scoring strategies.
//!
//! The trained model and the rule-based fallback sit behind one trait so
//! serving code can swap them without changing call sites. The heuristic
//! rules and the carbon estimate come from the original advisory service.

use crate::error::Result;
use crate::serve::{FarmInput, ModelHandle};
use tracing::warn;

/// Fallback archetypes produced by the rule-based classifier.
pub const KTYPE_DAIRY_EXTENSIVE: &str = "Laitier Herbager Extensif";
pub const KTYPE_DAIRY_MAIZE: &str = "Laitier Intensif Plaine (Maïs)";
pub const KTYPE_DAIRY_MIXED: &str = "Laitier Polyculture";
pub const KTYPE_CEREAL: &str = "Céréalier Intensif";
pub const KTYPE_MIXED_DEFAULT: &str = "Polyculture-Élevage Standard";

/// A way of assigning a K-Type to a farm.
pub trait ScoringStrategy {
    /// Returns the K-Type label for the farm.
    ///
    /// # Errors
    ///
    /// Returns an error if the strategy cannot produce a label.
    fn classify(&self, farm: &FarmInput) -> Result<String>;
}

/// Scores with the trained model artifact.
#[derive(Debug, Clone)]
pub struct ModelStrategy {
    handle: ModelHandle,
}

impl ModelStrategy {
    /// Wraps a loaded model handle.
    #[must_use]
    pub fn new(handle: ModelHandle) -> Self {
        Self { handle }
    }
}

impl ScoringStrategy for ModelStrategy {
    fn classify(&self, farm: &FarmInput) -> Result<String> {
        self.handle.predict(farm)
    }
}

/// Rule-based classifier used when no model is available.
///
/// Dairy farms split on stocking rate and maize share; cereal farms are
/// recognized by filière; everything else falls back to mixed farming.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicStrategy;

impl HeuristicStrategy {
    /// UGB per hectare of forage area, if the farm has any.
    fn stocking_rate(farm: &FarmInput) -> Option<f32> {
        (farm.surface_sfp > 0.0).then(|| farm.ugb / farm.surface_sfp)
    }

    /// Share of the forage area that is not grass, as a percentage.
    fn maize_share(farm: &FarmInput) -> f32 {
        if farm.surface_sfp <= 0.0 {
            return 0.0;
        }
        let grass = farm.surface_herbe_pp + farm.surface_herbe_pt;
        let non_grass = (farm.surface_sfp - grass).max(0.0);
        100.0 * non_grass / farm.surface_sfp
    }
}

impl ScoringStrategy for HeuristicStrategy {
    fn classify(&self, farm: &FarmInput) -> Result<String> {
        let label = if farm.filiere.contains("Lait") {
            match Self::stocking_rate(farm) {
                Some(rate) if rate < 1.4 => KTYPE_DAIRY_EXTENSIVE,
                _ if Self::maize_share(farm) > 30.0 => KTYPE_DAIRY_MAIZE,
                _ => KTYPE_DAIRY_MIXED,
            }
        } else if farm.filiere.contains("Céréales") || farm.filiere.contains("Grandes Cultures") {
            KTYPE_CEREAL
        } else {
            KTYPE_MIXED_DEFAULT
        };
        Ok(label.to_string())
    }
}

/// Classifies with the model when present, falling back to the heuristic
/// on absence or failure. Never propagates a model error.
pub fn classify_with_fallback(model: Option<&ModelStrategy>, farm: &FarmInput) -> String {
    if let Some(strategy) = model {
        match strategy.classify(farm) {
            Ok(label) => return label,
            Err(err) => {
                warn!(error = %err, "Model scoring failed, using heuristic fallback");
            }
        }
    }
    match HeuristicStrategy.classify(farm) {
        Ok(label) => label,
        // HeuristicStrategy is infallible; keep the default label anyway.
        Err(_) => KTYPE_MIXED_DEFAULT.to_string(),
    }
}

/// Estimated annual carbon footprint, tCO2e.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CarbonEstimate {
    /// Current estimated emissions.
    pub current: f32,
    /// Target after the standard 15% reduction.
    pub target: f32,
}

/// Per-K-Type emission factor times utilized area, with a 15% reduction
/// target.
#[must_use]
pub fn estimate_carbon(ktype: &str, sau: f32) -> CarbonEstimate {
    let mut factor = 8.0;
    if ktype.contains("Herbager") {
        factor = 5.5;
    }
    if ktype.contains("Céréalier") {
        factor = 3.0;
    }
    let current = sau * factor;
    CarbonEstimate {
        current,
        target: current * 0.85,
    }
}

/// Names the transition target for a K-Type: intensive systems aim for
/// their durable variant, others for an optimized version of themselves.
#[must_use]
pub fn target_ktype(current: &str) -> String {
    if current.contains("Intensif") {
        current.replace("Intensif", "Durable")
    } else {
        format!("{current} (Optimisé)")
    }
}
