//! Reweighter front end: configured dial settings applied to persisted
//! event records.

use std::collections::BTreeMap;

use ng_core::{Error, Result};
use ng_event::{GenEvent, GeneratorTruth, NeutrinoEvent};
use ng_translate::reconstruct;
use tracing::{debug, info};

use crate::engine::ResponseEngine;
use crate::knobs::{to_sigma, InputMode, Knob};

/// Configured reweighter: a set of knob settings plus the response
/// engine they are loaded into.
#[derive(Debug, Clone)]
pub struct Reweighter {
    engine: ResponseEngine,
    settings: BTreeMap<Knob, f64>,
    mode: InputMode,
    use_last_point: bool,
}

impl Reweighter {
    /// Build a reweighter from `label=value` settings.
    ///
    /// Values are sigmas by default; in [`InputMode::Value`] they are
    /// intended parameter values converted through the nominal table.
    pub fn new(settings: &[(String, f64)], mode: InputMode) -> Result<Self> {
        let mut engine = ResponseEngine::new();
        let mut parsed = BTreeMap::new();
        for (label, value) in settings {
            let knob = Knob::parse(label)?;
            if parsed.insert(knob, *value).is_some() {
                return Err(Error::Config(format!("duplicate reweight knob '{label}'")));
            }
            let sigma = to_sigma(knob, *value, mode)?;
            engine.set_sigma(knob, sigma);
            debug!(knob = label.as_str(), value, sigma, "reweight knob set");
        }
        info!(n_knobs = parsed.len(), ?mode, "reweighter configured");
        Ok(Self { engine, settings: parsed, mode, use_last_point: false })
    }

    /// Use the last trajectory point instead of the first when the
    /// persisted generation vertex is missing.
    pub fn with_last_trajectory_point(mut self, yes: bool) -> Self {
        self.use_last_point = yes;
        self
    }

    /// Input interpretation of the configured values.
    pub fn mode(&self) -> InputMode {
        self.mode
    }

    /// The configured raw settings.
    pub fn settings(&self) -> &BTreeMap<Knob, f64> {
        &self.settings
    }

    /// Weight of an already-reconstructed generator record.
    pub fn weight(&self, gen: &GenEvent) -> f64 {
        self.engine.weight(gen)
    }

    /// Weight of a persisted record pair. The generator record is
    /// rebuilt from the framework-native pair first, then weighted.
    pub fn calc_weight(&self, event: &NeutrinoEvent, truth: &GeneratorTruth) -> Result<f64> {
        let gen = reconstruct(event, truth, self.use_last_point)?;
        Ok(self.engine.weight(&gen))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_settings_give_unit_weights() {
        let rw = Reweighter::new(&[], InputMode::Sigma).unwrap();
        assert_eq!(rw.weight(&GenEvent::default()), 1.0);
    }

    #[test]
    fn test_unknown_label_rejected() {
        let rw = Reweighter::new(&[("NotAKnob".into(), 1.0)], InputMode::Sigma);
        assert!(rw.is_err());
    }

    #[test]
    fn test_duplicate_label_rejected() {
        let rw = Reweighter::new(
            &[("MaCCQE".into(), 1.0), ("MaCCQE".into(), -1.0)],
            InputMode::Sigma,
        );
        assert!(rw.is_err());
    }
}
