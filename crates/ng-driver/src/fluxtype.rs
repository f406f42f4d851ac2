//! Flux-type vocabulary: free-form user strings regularized to a closed
//! tag set.

use ng_core::{Error, Result};
use ng_event::FluxKind;
use serde::{Deserialize, Serialize};

/// Normalized flux tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FluxTag {
    /// Full beamline ntuple ("NuMI" family).
    TreeNuMi,
    /// Condensed beamline ntuple.
    TreeSimple,
    /// Decay-to-neutrino ntuple.
    TreeDk2nu,
    /// Six per-flavor energy histograms in a file.
    Histogram,
    /// Mono-energetic in a fixed direction.
    Mono,
    /// User-supplied analytic formula binned over an energy range.
    Function,
    /// Atmospheric tables, FLUKA model.
    AtmoFluka,
    /// Atmospheric tables, BGLRS model.
    AtmoBglrs,
    /// Atmospheric tables, HAKKM model.
    AtmoHakkm,
}

impl FluxTag {
    /// True for the beamline-ntuple family (randomized file selection,
    /// hard failure on an empty resolved list).
    pub fn is_tree(&self) -> bool {
        matches!(self, FluxTag::TreeNuMi | FluxTag::TreeSimple | FluxTag::TreeDk2nu)
    }

    /// True for the atmospheric-model family.
    pub fn is_atmo(&self) -> bool {
        matches!(self, FluxTag::AtmoFluka | FluxTag::AtmoBglrs | FluxTag::AtmoHakkm)
    }

    /// Flux-record tag produced by the drivers of this mode.
    pub fn flux_kind(&self) -> FluxKind {
        match self {
            FluxTag::TreeNuMi => FluxKind::NuMi,
            FluxTag::TreeSimple => FluxKind::SimpleNtuple,
            FluxTag::TreeDk2nu => FluxKind::Dk2nu,
            FluxTag::Histogram | FluxTag::Function => FluxKind::HistPlusFocus,
            FluxTag::Mono | FluxTag::AtmoFluka | FluxTag::AtmoBglrs | FluxTag::AtmoHakkm => {
                FluxKind::Simple
            }
        }
    }

    /// The canonical configuration spelling.
    pub fn as_str(&self) -> &'static str {
        match self {
            FluxTag::TreeNuMi => "tree_numi",
            FluxTag::TreeSimple => "tree_simple",
            FluxTag::TreeDk2nu => "tree_dk2nu",
            FluxTag::Histogram => "histogram",
            FluxTag::Mono => "mono",
            FluxTag::Function => "function",
            FluxTag::AtmoFluka => "atmo_FLUKA",
            FluxTag::AtmoBglrs => "atmo_BGLRS",
            FluxTag::AtmoHakkm => "atmo_HAKKM",
        }
    }
}

/// Regularize a free-form flux-type string. Trims whitespace, matches
/// canonical spellings case-insensitively, and maps legacy aliases.
pub fn regularize(raw: &str) -> Result<FluxTag> {
    let trimmed = raw.trim();
    let lower = trimmed.to_ascii_lowercase();
    let tag = match lower.as_str() {
        "tree_numi" | "ntuple" | "numi" => FluxTag::TreeNuMi,
        "tree_simple" | "simple_flux" | "gsimple" => FluxTag::TreeSimple,
        "tree_dk2nu" | "dk2nu" => FluxTag::TreeDk2nu,
        "histogram" | "hist" => FluxTag::Histogram,
        "mono" | "monochromatic" => FluxTag::Mono,
        "function" | "func" => FluxTag::Function,
        "atmo_fluka" | "fluka" => FluxTag::AtmoFluka,
        "atmo_bglrs" | "bglrs" | "bartol" => FluxTag::AtmoBglrs,
        "atmo_hakkm" | "hakkm" | "honda" => FluxTag::AtmoHakkm,
        _ => return Err(Error::Config(format!("unrecognized flux type '{trimmed}'"))),
    };
    Ok(tag)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_forms() {
        assert_eq!(regularize("tree_numi").unwrap(), FluxTag::TreeNuMi);
        assert_eq!(regularize("  histogram ").unwrap(), FluxTag::Histogram);
        assert_eq!(regularize("atmo_HAKKM").unwrap(), FluxTag::AtmoHakkm);
    }

    #[test]
    fn test_legacy_aliases() {
        assert_eq!(regularize("ntuple").unwrap(), FluxTag::TreeNuMi);
        assert_eq!(regularize("gsimple").unwrap(), FluxTag::TreeSimple);
        assert_eq!(regularize("dk2nu").unwrap(), FluxTag::TreeDk2nu);
        assert_eq!(regularize("BARTOL").unwrap(), FluxTag::AtmoBglrs);
        assert_eq!(regularize("HONDA").unwrap(), FluxTag::AtmoHakkm);
        assert_eq!(regularize("FLUKA").unwrap(), FluxTag::AtmoFluka);
        assert_eq!(regularize("monochromatic").unwrap(), FluxTag::Mono);
        assert_eq!(regularize("func").unwrap(), FluxTag::Function);
    }

    #[test]
    fn test_unknown_is_config_error() {
        assert!(regularize("laser").is_err());
    }

    #[test]
    fn test_family_predicates() {
        assert!(FluxTag::TreeDk2nu.is_tree());
        assert!(!FluxTag::Histogram.is_tree());
        assert!(FluxTag::AtmoBglrs.is_atmo());
        assert_eq!(FluxTag::TreeDk2nu.flux_kind(), FluxKind::Dk2nu);
        assert_eq!(FluxTag::Function.flux_kind(), FluxKind::HistPlusFocus);
    }
}
