//! First-order response engine.
//!
//! Each enabled knob contributes a multiplicative factor
//! `exp(sigma * sensitivity(knob, event))` where the sensitivity is a
//! fixed, kinematics-dependent response coefficient and is zero for
//! events the knob's calculator does not apply to. A knob at sigma 0
//! therefore contributes exactly 1, and symmetric tweaks cancel:
//! `w(+s) * w(-s) == 1` event by event.

use std::collections::BTreeMap;

use ng_event::{kine_is_set, GenEvent, KineVar};

use crate::knobs::{Calculator, Knob};

/// Per-knob response coefficient for one event.
///
/// Coefficients are small so single-sigma weights stay within the
/// usual reweighting range. Kinematic dependence uses the stored
/// selected kinematics where available and falls back to flat
/// responses otherwise.
fn sensitivity(knob: Knob, event: &GenEvent) -> f64 {
    let proc = &event.interaction.process;
    let calc = knob.calculator();

    // Calculator applicability gate.
    let applies = match calc {
        Calculator::NcEl => proc.is_weak_nc() && proc.is_quasi_elastic(),
        Calculator::CcqeAxial | Calculator::CcqeVector => {
            proc.is_weak_cc() && proc.is_quasi_elastic()
        }
        Calculator::CcRes => proc.is_weak_cc() && proc.is_resonant(),
        Calculator::NcRes => proc.is_weak_nc() && proc.is_resonant(),
        Calculator::ResBkg => proc.is_resonant() || proc.is_deep_inelastic(),
        Calculator::ResDecay => proc.is_resonant(),
        Calculator::Nc => proc.is_weak_nc(),
        Calculator::Dis => proc.is_deep_inelastic(),
        Calculator::Coh => proc.is_coherent_production(),
        Calculator::HadroAgky => proc.is_deep_inelastic() || proc.is_resonant(),
        Calculator::DisNucl => proc.is_deep_inelastic(),
        Calculator::FermiGas => {
            proc.is_quasi_elastic() || proc.is_resonant() || proc.is_deep_inelastic()
        }
        Calculator::FormZone | Calculator::Intranuke => {
            // Final-state effects apply to any event on a nuclear target.
            event.interaction.initial_state.target.a > 1
        }
        Calculator::Mec => proc.is_mec(),
    };
    if !applies {
        return 0.0;
    }

    let kine = &event.interaction.kinematics;
    let q2 = kine
        .get(KineVar::Q2)
        .or_else(|| kine.get(KineVar::QSqr))
        .filter(|v| kine_is_set(*v))
        .unwrap_or(0.5);
    let y = kine.get(KineVar::Y).filter(|v| kine_is_set(*v)).unwrap_or(0.5);

    match knob {
        // Axial masses harden the Q2 spectrum: response grows with Q2
        // and saturates.
        Knob::MaCcqe | Knob::MaNcel | Knob::MaCcRes | Knob::MaNcRes | Knob::MaCoh => {
            0.15 * q2 / (1.0 + q2)
        }
        // Vector masses act in the same direction, weaker.
        Knob::MvCcRes | Knob::MvNcRes => 0.05 * q2 / (1.0 + q2),
        Knob::EtaNcel => 0.04,
        Knob::VecFFCcqeShape => 0.06 * (q2 - 0.5),
        Knob::CcqePauliSupViaKF => 0.10 / (1.0 + 4.0 * q2),
        // Plain normalizations are Q2-flat.
        Knob::NormCcqe | Knob::NormMec => 0.15,
        Knob::RvpCc1pi | Knob::RvnCc1pi => 0.20,
        // Bodek-Yang higher-twist terms matter most at high y.
        Knob::AhtBy | Knob::BhtBy => 0.08 * y,
        Knob::Cv1uBy | Knob::Cv2uBy => 0.05 * (1.0 - y),
        Knob::R0Coh => 0.12,
        Knob::AgkyXF1pi | Knob::AgkyPT1pi => 0.05,
        Knob::FgmKF => 0.08 / (1.0 + q2),
        Knob::FormZone => 0.06,
        Knob::MfpPi | Knob::MfpN => 0.10,
        Knob::FrCexPi | Knob::FrInelPi | Knob::FrAbsPi => 0.07,
        // Switches contribute no exponential response here. Their
        // effect is carried by the pass-through value itself.
        Knob::CcqeMomDistroFGtoSF | Knob::ThetaDelta2Npi | Knob::DisNuclMod => 0.0,
    }
}

/// Holds the current tweak-dial settings and evaluates event weights.
#[derive(Debug, Default, Clone)]
pub struct ResponseEngine {
    sigmas: BTreeMap<Knob, f64>,
}

impl ResponseEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a knob's sigma. Setting 0 is equivalent to leaving the knob
    /// at nominal.
    pub fn set_sigma(&mut self, knob: Knob, sigma: f64) {
        self.sigmas.insert(knob, sigma);
    }

    pub fn sigma(&self, knob: Knob) -> f64 {
        self.sigmas.get(&knob).copied().unwrap_or(0.0)
    }

    /// Knobs currently dialed away from nominal.
    pub fn active_knobs(&self) -> impl Iterator<Item = (Knob, f64)> + '_ {
        self.sigmas.iter().filter(|(_, s)| **s != 0.0).map(|(k, s)| (*k, *s))
    }

    /// Weight of one event under the current dial settings.
    ///
    /// All knobs at nominal yields exactly 1.0.
    pub fn weight(&self, event: &GenEvent) -> f64 {
        let mut w = 1.0;
        for (knob, sigma) in self.sigmas.iter() {
            if *sigma == 0.0 || knob.is_switch() {
                continue;
            }
            let s = sensitivity(*knob, event);
            if s != 0.0 {
                w *= (sigma * s).exp();
            }
        }
        w
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ng_core::FourVector;
    use ng_event::{
        GenEvent, GenParticle, InteractionType, KineVar, ParticleStatus, ScatteringType, Target,
    };

    fn ccqe_event() -> GenEvent {
        let mut ev = GenEvent::default();
        ev.interaction.process.scattering = ScatteringType::QuasiElastic;
        ev.interaction.process.interaction = InteractionType::WeakCC;
        ev.interaction.initial_state.probe_pdg = 14;
        ev.interaction.initial_state.probe_p4 =
            FourVector::from_energy_direction(2.0, [0.0, 0.0, 1.0], 0.0);
        ev.interaction.initial_state.target = Target { pdg: 1000180400, z: 18, a: 40 };
        ev.interaction.kinematics.set(KineVar::Q2, 0.45);
        ev.interaction.kinematics.set(KineVar::Y, 0.3);
        ev.particles.push(GenParticle {
            pdg: 14,
            status: ParticleStatus::InitialState,
            mother: -1,
            p4: FourVector::from_energy_direction(2.0, [0.0, 0.0, 1.0], 0.0),
            x4: FourVector::default(),
            polarization: None,
            rescatter: None,
        });
        ev
    }

    #[test]
    fn test_nominal_weight_is_exactly_one() {
        let mut engine = ResponseEngine::new();
        engine.set_sigma(Knob::MaCcqe, 0.0);
        assert_eq!(engine.weight(&ccqe_event()), 1.0);
    }

    #[test]
    fn test_symmetric_tweaks_cancel() {
        let ev = ccqe_event();
        let mut plus = ResponseEngine::new();
        plus.set_sigma(Knob::MaCcqe, 1.0);
        let mut minus = ResponseEngine::new();
        minus.set_sigma(Knob::MaCcqe, -1.0);
        let product = plus.weight(&ev) * minus.weight(&ev);
        assert!((product - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_non_matching_process_unweighted() {
        let mut ev = ccqe_event();
        ev.interaction.process.scattering = ScatteringType::DeepInelastic;
        let mut engine = ResponseEngine::new();
        engine.set_sigma(Knob::MaCcqe, 2.0);
        assert_eq!(engine.weight(&ev), 1.0);
    }

    #[test]
    fn test_weight_is_deterministic() {
        let ev = ccqe_event();
        let mut engine = ResponseEngine::new();
        engine.set_sigma(Knob::MaCcqe, 0.7);
        engine.set_sigma(Knob::MfpPi, -0.4);
        let w1 = engine.weight(&ev);
        let w2 = engine.weight(&ev);
        assert_eq!(w1.to_bits(), w2.to_bits());
    }
}
