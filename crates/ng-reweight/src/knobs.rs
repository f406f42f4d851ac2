//! Reweight knobs: parameter labels, calculator families, and the
//! value↔sigma conversion.

use ng_core::{Error, Result};
use serde::{Deserialize, Serialize};

/// Weight calculators of the underlying reweight engine. Enabling any
/// knob of a family turns the whole calculator on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Calculator {
    /// NC elastic.
    NcEl,
    /// CCQE axial form factor.
    CcqeAxial,
    /// CCQE vector form factor.
    CcqeVector,
    /// CC resonance production.
    CcRes,
    /// NC resonance production.
    NcRes,
    /// Non-resonant single-pion background.
    ResBkg,
    /// Resonance decay.
    ResDecay,
    /// Neutral current (generic).
    Nc,
    /// Deep inelastic scattering.
    Dis,
    /// Coherent pion production.
    Coh,
    /// AGKY hadronization model.
    HadroAgky,
    /// DIS nuclear model.
    DisNucl,
    /// Fermi-gas model.
    FermiGas,
    /// Formation zone.
    FormZone,
    /// Intranuclear transport.
    Intranuke,
    /// Meson-exchange current.
    Mec,
}

/// Tweakable parameter labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Knob {
    /// NC-elastic axial mass.
    MaNcel,
    /// NC-elastic strange axial form factor η.
    EtaNcel,
    /// CCQE axial mass.
    MaCcqe,
    /// CCQE normalization.
    NormCcqe,
    /// CCQE Pauli-suppression scale via kF.
    CcqePauliSupViaKF,
    /// CCQE momentum-distribution switch, Fermi gas → spectral function.
    /// Continuous-switch knob: the value passes through verbatim.
    CcqeMomDistroFGtoSF,
    /// CCQE vector form-factor shape.
    VecFFCcqeShape,
    /// CC-resonance axial mass.
    MaCcRes,
    /// CC-resonance vector mass.
    MvCcRes,
    /// NC-resonance axial mass.
    MaNcRes,
    /// NC-resonance vector mass.
    MvNcRes,
    /// Non-resonant background, νp CC 1π.
    RvpCc1pi,
    /// Non-resonant background, νn CC 1π.
    RvnCc1pi,
    /// Δ→Nπ angular distribution switch. Passes through verbatim.
    ThetaDelta2Npi,
    /// Bodek–Yang A_HT.
    AhtBy,
    /// Bodek–Yang B_HT.
    BhtBy,
    /// Bodek–Yang CV1u.
    Cv1uBy,
    /// Bodek–Yang CV2u.
    Cv2uBy,
    /// Coherent axial mass.
    MaCoh,
    /// Coherent nuclear size parameter R0.
    R0Coh,
    /// AGKY xF distribution, 1π.
    AgkyXF1pi,
    /// AGKY pT distribution, 1π.
    AgkyPT1pi,
    /// DIS nuclear-model switch. Passes through verbatim.
    DisNuclMod,
    /// Fermi-gas momentum cutoff kF.
    FgmKF,
    /// Formation zone length.
    FormZone,
    /// Pion mean free path.
    MfpPi,
    /// Nucleon mean free path.
    MfpN,
    /// Pion charge-exchange fraction.
    FrCexPi,
    /// Pion inelastic fraction.
    FrInelPi,
    /// Pion absorption fraction.
    FrAbsPi,
    /// MEC normalization.
    NormMec,
}

impl Knob {
    /// Parse the configuration label of a knob.
    pub fn parse(label: &str) -> Result<Self> {
        Ok(match label {
            "MaNCEL" => Knob::MaNcel,
            "EtaNCEL" => Knob::EtaNcel,
            "MaCCQE" => Knob::MaCcqe,
            "NormCCQE" => Knob::NormCcqe,
            "CCQEPauliSupViaKF" => Knob::CcqePauliSupViaKF,
            "CCQEMomDistroFGtoSF" => Knob::CcqeMomDistroFGtoSF,
            "VecFFCCQEshape" => Knob::VecFFCcqeShape,
            "MaCCRES" => Knob::MaCcRes,
            "MvCCRES" => Knob::MvCcRes,
            "MaNCRES" => Knob::MaNcRes,
            "MvNCRES" => Knob::MvNcRes,
            "RvpCC1pi" => Knob::RvpCc1pi,
            "RvnCC1pi" => Knob::RvnCc1pi,
            "Theta_Delta2Npi" => Knob::ThetaDelta2Npi,
            "AhtBY" => Knob::AhtBy,
            "BhtBY" => Knob::BhtBy,
            "CV1uBY" => Knob::Cv1uBy,
            "CV2uBY" => Knob::Cv2uBy,
            "MaCOHpi" => Knob::MaCoh,
            "R0COHpi" => Knob::R0Coh,
            "AGKYxF1pi" => Knob::AgkyXF1pi,
            "AGKYpT1pi" => Knob::AgkyPT1pi,
            "DISNuclMod" => Knob::DisNuclMod,
            "FGMkF" => Knob::FgmKF,
            "FormZone" => Knob::FormZone,
            "MFP_pi" => Knob::MfpPi,
            "MFP_N" => Knob::MfpN,
            "FrCEx_pi" => Knob::FrCexPi,
            "FrInel_pi" => Knob::FrInelPi,
            "FrAbs_pi" => Knob::FrAbsPi,
            "NormCCMEC" => Knob::NormMec,
            other => return Err(Error::Config(format!("unknown reweight knob '{other}'"))),
        })
    }

    /// The calculator family this knob belongs to.
    pub fn calculator(&self) -> Calculator {
        match self {
            Knob::MaNcel | Knob::EtaNcel => Calculator::NcEl,
            Knob::MaCcqe
            | Knob::NormCcqe
            | Knob::CcqePauliSupViaKF
            | Knob::CcqeMomDistroFGtoSF => Calculator::CcqeAxial,
            Knob::VecFFCcqeShape => Calculator::CcqeVector,
            Knob::MaCcRes | Knob::MvCcRes => Calculator::CcRes,
            Knob::MaNcRes | Knob::MvNcRes => Calculator::NcRes,
            Knob::RvpCc1pi | Knob::RvnCc1pi => Calculator::ResBkg,
            Knob::ThetaDelta2Npi => Calculator::ResDecay,
            Knob::AhtBy | Knob::BhtBy | Knob::Cv1uBy | Knob::Cv2uBy => Calculator::Dis,
            Knob::MaCoh | Knob::R0Coh => Calculator::Coh,
            Knob::AgkyXF1pi | Knob::AgkyPT1pi => Calculator::HadroAgky,
            Knob::DisNuclMod => Calculator::DisNucl,
            Knob::FgmKF => Calculator::FermiGas,
            Knob::FormZone => Calculator::FormZone,
            Knob::MfpPi | Knob::MfpN | Knob::FrCexPi | Knob::FrInelPi | Knob::FrAbsPi => {
                Calculator::Intranuke
            }
            Knob::NormMec => Calculator::Mec,
        }
    }

    /// True for the continuous-switch knobs whose configured value passes
    /// through without the value→sigma transformation.
    pub fn is_switch(&self) -> bool {
        matches!(self, Knob::CcqeMomDistroFGtoSF | Knob::ThetaDelta2Npi | Knob::DisNuclMod)
    }

    /// Nominal value and (plus, minus) fractional one-sigma errors, for
    /// knobs that support value mode. Nominals are pinned here; the
    /// asymmetric fractional errors mirror the generator's defaults.
    pub fn nominal(&self) -> Option<(f64, f64, f64)> {
        Some(match self {
            Knob::MaCcqe => (0.99, 0.25, 0.15),
            Knob::MaNcel => (0.99, 0.25, 0.15),
            Knob::EtaNcel => (0.12, 0.30, 0.30),
            Knob::MaCcRes => (1.12, 0.20, 0.20),
            Knob::MvCcRes => (0.84, 0.10, 0.10),
            Knob::MaNcRes => (1.12, 0.20, 0.20),
            Knob::MvNcRes => (0.84, 0.10, 0.10),
            Knob::RvpCc1pi => (1.0, 0.50, 0.50),
            Knob::RvnCc1pi => (1.0, 0.50, 0.50),
            Knob::AhtBy => (0.538, 0.25, 0.25),
            Knob::BhtBy => (0.305, 0.25, 0.25),
            Knob::Cv1uBy => (0.291, 0.30, 0.30),
            Knob::Cv2uBy => (0.189, 0.40, 0.40),
            Knob::MaCoh => (1.0, 0.50, 0.50),
            Knob::R0Coh => (1.0, 0.10, 0.10),
            Knob::FgmKF => (1.0, 0.35, 0.35),
            Knob::FormZone => (1.0, 0.50, 0.50),
            Knob::MfpPi => (1.0, 0.20, 0.20),
            Knob::MfpN => (1.0, 0.20, 0.20),
            Knob::FrCexPi => (1.0, 0.50, 0.50),
            Knob::FrInelPi => (1.0, 0.40, 0.40),
            Knob::FrAbsPi => (1.0, 0.30, 0.30),
            Knob::NormCcqe => (1.0, 0.20, 0.15),
            Knob::NormMec => (1.0, 0.50, 0.50),
            Knob::AgkyXF1pi => (1.0, 0.20, 0.20),
            Knob::AgkyPT1pi => (1.0, 0.03, 0.03),
            Knob::VecFFCcqeShape => (1.0, 0.10, 0.10),
            Knob::CcqePauliSupViaKF => (1.0, 0.35, 0.35),
            Knob::CcqeMomDistroFGtoSF | Knob::ThetaDelta2Npi | Knob::DisNuclMod => return None,
        })
    }
}

/// How configured knob values are interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InputMode {
    /// Values are in units of one-sigma uncertainties (default).
    Sigma,
    /// Values are intended parameter values, converted to sigma via the
    /// pinned nominal table.
    Value,
}

impl Default for InputMode {
    fn default() -> Self {
        InputMode::Sigma
    }
}

/// Convert a configured knob value to the sigma handed to the engine.
///
/// In sigma mode, and for the continuous-switch knobs, the value passes
/// through unchanged. In value mode,
/// `sigma = (value − nominal) / (frac_err · nominal)` with the
/// sign-matched fractional error.
pub fn to_sigma(knob: Knob, value: f64, mode: InputMode) -> Result<f64> {
    if mode == InputMode::Sigma || knob.is_switch() {
        return Ok(value);
    }
    let (nominal, frac_plus, frac_minus) = knob.nominal().ok_or_else(|| {
        Error::Config(format!("knob {knob:?} does not support value mode"))
    })?;
    if nominal == 0.0 {
        return Err(Error::Config(format!("knob {knob:?} has zero nominal value")));
    }
    let frac = if value >= nominal { frac_plus } else { frac_minus };
    Ok((value - nominal) / (frac * nominal))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_family_partition() {
        assert_eq!(Knob::MaCcqe.calculator(), Calculator::CcqeAxial);
        assert_eq!(Knob::VecFFCcqeShape.calculator(), Calculator::CcqeVector);
        assert_eq!(Knob::MfpPi.calculator(), Calculator::Intranuke);
        assert_eq!(Knob::ThetaDelta2Npi.calculator(), Calculator::ResDecay);
    }

    #[test]
    fn test_value_mode_conversion() {
        // CCQE Ma nominal 0.99, +25% fractional error: value 1.2375 is +1σ.
        let sigma = to_sigma(Knob::MaCcqe, 0.99 * 1.25, InputMode::Value).unwrap();
        assert_relative_eq!(sigma, 1.0, epsilon = 1e-12);
        // Below nominal uses the minus-side error (15%).
        let sigma = to_sigma(Knob::MaCcqe, 0.99 * 0.85, InputMode::Value).unwrap();
        assert_relative_eq!(sigma, -1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_sigma_mode_passthrough() {
        assert_eq!(to_sigma(Knob::MaCcRes, 1.7, InputMode::Sigma).unwrap(), 1.7);
    }

    #[test]
    fn test_switches_bypass_conversion() {
        for k in [Knob::CcqeMomDistroFGtoSF, Knob::ThetaDelta2Npi, Knob::DisNuclMod] {
            assert!(k.is_switch());
            assert_eq!(to_sigma(k, 0.6, InputMode::Value).unwrap(), 0.6);
        }
    }

    #[test]
    fn test_label_parse() {
        assert_eq!(Knob::parse("MaCCQE").unwrap(), Knob::MaCcqe);
        assert_eq!(Knob::parse("Theta_Delta2Npi").unwrap(), Knob::ThetaDelta2Npi);
        assert!(Knob::parse("MaWrong").is_err());
    }
}
