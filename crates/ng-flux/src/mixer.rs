//! Flavor mixing: remap the flavor of sampled rays before generation.
//!
//! The mixer configuration string starts with a keyword that either names
//! a built-in (`map`, `swap`, `fixedfrac`) or is looked up in the factory;
//! the mixer is wrapped around the raw flux driver by a
//! [`FluxBlender`], which also carries the oscillation baseline.

use crate::driver::{FluxDriver, FluxRay};
use ng_core::{Error, Result};
use ng_event::FluxKind;
use rand::rngs::StdRng;
use rand::Rng;
use std::collections::HashMap;

/// A flavor mixer: maps a sampled flavor to the flavor handed to the
/// generator.
pub trait FlavorMix: Send {
    /// Remap one ray's flavor. `baseline` is in km, `energy` in GeV.
    fn mix(&self, pdg: i32, energy: f64, baseline: f64, rng: &mut StdRng) -> i32;
}

/// Deterministic flavor map; unmapped flavors pass through.
struct MapMix {
    table: HashMap<i32, i32>,
}

impl FlavorMix for MapMix {
    fn mix(&self, pdg: i32, _energy: f64, _baseline: f64, _rng: &mut StdRng) -> i32 {
        self.table.get(&pdg).copied().unwrap_or(pdg)
    }
}

/// Exchanges two flavors in both directions, preserving the sign.
struct SwapMix {
    a: i32,
    b: i32,
}

impl FlavorMix for SwapMix {
    fn mix(&self, pdg: i32, _energy: f64, _baseline: f64, _rng: &mut StdRng) -> i32 {
        if pdg.abs() == self.a {
            pdg.signum() * self.b
        } else if pdg.abs() == self.b {
            pdg.signum() * self.a
        } else {
            pdg
        }
    }
}

/// Replaces every flavor by a draw from a fixed fraction table.
struct FixedFracMix {
    fractions: Vec<(i32, f64)>,
}

impl FlavorMix for FixedFracMix {
    fn mix(&self, pdg: i32, _energy: f64, _baseline: f64, rng: &mut StdRng) -> i32 {
        let mut target = rng.gen::<f64>();
        for &(out, frac) in &self.fractions {
            if target < frac {
                return out;
            }
            target -= frac;
        }
        pdg
    }
}

/// Constructor signature for factory-registered mixers.
pub type MixBuilder = fn(&str) -> Result<Box<dyn FlavorMix>>;

/// Value-type mixer factory built once at configuration time.
///
/// Built-ins are always available; additional mixers are registered
/// explicitly before the driver initializes, so construction order is
/// deterministic.
#[derive(Default)]
pub struct FlavorMixerFactory {
    custom: HashMap<String, MixBuilder>,
}

impl FlavorMixerFactory {
    /// Factory with only the built-in mixers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a named mixer constructor.
    pub fn register(&mut self, name: impl Into<String>, builder: MixBuilder) {
        self.custom.insert(name.into(), builder);
    }

    /// Build a mixer from its configuration string.
    ///
    /// Grammar of the built-ins:
    /// - `map: 14:12 -14:-12`, explicit pdg-to-pdg pairs
    /// - `swap: 14 12`, exchange |pdg| values both ways
    /// - `fixedfrac: 12=0.25 14=0.75`, draw from fixed fractions
    pub fn build(&self, cfg: &str) -> Result<Box<dyn FlavorMix>> {
        let cfg = cfg.trim();
        let (key, body) = match cfg.split_once(':') {
            Some((k, b)) => (k.trim(), b.trim()),
            None => (cfg, ""),
        };
        match key.to_ascii_lowercase().as_str() {
            "map" => {
                let mut table = HashMap::new();
                for tok in body.split_whitespace() {
                    let (from, to) = tok.split_once(':').ok_or_else(|| {
                        Error::Config(format!("bad map mixer pair '{tok}'"))
                    })?;
                    let from: i32 = from
                        .parse()
                        .map_err(|_| Error::Config(format!("bad PDG in mixer pair '{tok}'")))?;
                    let to: i32 = to
                        .parse()
                        .map_err(|_| Error::Config(format!("bad PDG in mixer pair '{tok}'")))?;
                    table.insert(from, to);
                }
                if table.is_empty() {
                    return Err(Error::Config("map mixer has no pairs".into()));
                }
                Ok(Box::new(MapMix { table }))
            }
            "swap" => {
                let mut it = body.split_whitespace();
                let (a, b) = match (it.next(), it.next(), it.next()) {
                    (Some(a), Some(b), None) => (a, b),
                    _ => return Err(Error::Config("swap mixer needs exactly two PDG codes".into())),
                };
                let a: i32 =
                    a.parse().map_err(|_| Error::Config(format!("bad PDG '{a}' in swap mixer")))?;
                let b: i32 =
                    b.parse().map_err(|_| Error::Config(format!("bad PDG '{b}' in swap mixer")))?;
                Ok(Box::new(SwapMix { a: a.abs(), b: b.abs() }))
            }
            "fixedfrac" => {
                let mut fractions = Vec::new();
                for tok in body.split_whitespace() {
                    let (pdg, frac) = tok.split_once('=').ok_or_else(|| {
                        Error::Config(format!("bad fixedfrac mixer entry '{tok}'"))
                    })?;
                    let pdg: i32 = pdg
                        .parse()
                        .map_err(|_| Error::Config(format!("bad PDG in mixer entry '{tok}'")))?;
                    let frac: f64 = frac
                        .parse()
                        .map_err(|_| Error::Config(format!("bad fraction in mixer entry '{tok}'")))?;
                    if !(0.0..=1.0).contains(&frac) {
                        return Err(Error::Config(format!(
                            "mixer fraction for PDG {pdg} must be in [0, 1]"
                        )));
                    }
                    fractions.push((pdg, frac));
                }
                let total: f64 = fractions.iter().map(|(_, f)| f).sum();
                if (total - 1.0).abs() > 1e-9 {
                    return Err(Error::Config(format!(
                        "fixedfrac mixer fractions sum to {total}, expected 1"
                    )));
                }
                Ok(Box::new(FixedFracMix { fractions }))
            }
            other => match self.custom.get(other) {
                Some(builder) => builder(body),
                None => Err(Error::Config(format!("unknown flavor mixer '{other}'"))),
            },
        }
    }
}

/// A flux driver wrapped with a flavor mixer and a baseline distance.
pub struct FluxBlender {
    inner: Box<dyn FluxDriver>,
    mixer: Box<dyn FlavorMix>,
    /// Oscillation baseline in km, available to probability-model mixers.
    baseline: f64,
}

impl FluxBlender {
    /// Wrap a raw driver.
    pub fn new(inner: Box<dyn FluxDriver>, mixer: Box<dyn FlavorMix>, baseline: f64) -> Self {
        Self { inner, mixer, baseline }
    }

    /// The configured baseline in km.
    pub fn baseline(&self) -> f64 {
        self.baseline
    }
}

impl FluxDriver for FluxBlender {
    fn kind(&self) -> FluxKind {
        self.inner.kind()
    }

    fn generate_ray(&mut self, rng: &mut StdRng) -> Result<Option<FluxRay>> {
        let Some(mut ray) = self.inner.generate_ray(rng)? else {
            return Ok(None);
        };
        ray.pdg = self.mixer.mix(ray.pdg, ray.p4.t, self.baseline, rng);
        Ok(Some(ray))
    }

    fn used_pot(&self) -> f64 {
        self.inner.used_pot()
    }

    fn n_flown(&self) -> u64 {
        self.inner.n_flown()
    }

    fn max_energy(&self) -> f64 {
        self.inner.max_energy()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::MonoFlux;
    use rand::SeedableRng;

    #[test]
    fn test_map_mixer() {
        let factory = FlavorMixerFactory::new();
        let m = factory.build("map: 14:12 -14:-12").unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(m.mix(14, 1.0, 0.0, &mut rng), 12);
        assert_eq!(m.mix(-14, 1.0, 0.0, &mut rng), -12);
        assert_eq!(m.mix(16, 1.0, 0.0, &mut rng), 16);
    }

    #[test]
    fn test_swap_mixer_preserves_sign() {
        let factory = FlavorMixerFactory::new();
        let m = factory.build("swap: 14 12").unwrap();
        let mut rng = StdRng::seed_from_u64(2);
        assert_eq!(m.mix(14, 1.0, 0.0, &mut rng), 12);
        assert_eq!(m.mix(-12, 1.0, 0.0, &mut rng), -14);
    }

    #[test]
    fn test_fixedfrac_must_sum_to_one() {
        let factory = FlavorMixerFactory::new();
        assert!(factory.build("fixedfrac: 12=0.5 14=0.4").is_err());
        assert!(factory.build("fixedfrac: 12=0.5 14=0.5").is_ok());
    }

    #[test]
    fn test_unknown_mixer_unless_registered() {
        let mut factory = FlavorMixerFactory::new();
        assert!(factory.build("osc: 1300").is_err());
        fn build_identity(_body: &str) -> Result<Box<dyn FlavorMix>> {
            struct Identity;
            impl FlavorMix for Identity {
                fn mix(&self, pdg: i32, _e: f64, _l: f64, _rng: &mut StdRng) -> i32 {
                    pdg
                }
            }
            Ok(Box::new(Identity))
        }
        factory.register("osc", build_identity);
        assert!(factory.build("osc: 1300").is_ok());
    }

    #[test]
    fn test_blender_remaps_rays() {
        let factory = FlavorMixerFactory::new();
        let mixer = factory.build("swap: 14 12").unwrap();
        let mono = MonoFlux::new(vec![14], 2.0, [0.0; 3], [0.0, 0.0, 1.0]).unwrap();
        let mut blend = FluxBlender::new(Box::new(mono), mixer, 1300.0);
        let mut rng = StdRng::seed_from_u64(3);
        let ray = blend.generate_ray(&mut rng).unwrap().unwrap();
        assert_eq!(ray.pdg, 12);
        assert_eq!(blend.baseline(), 1300.0);
    }
}
