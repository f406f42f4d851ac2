//! Spill-time models: per-event time offsets drawn from a configurable
//! distribution.
//!
//! Models are selected by a single configuration string whose leading
//! keyword names the model; unknown keywords are fatal. The global fixed
//! offset is added on top by the driver, outside this module.

use ng_core::{Error, Result};
use rand::rngs::StdRng;
use rand::Rng;
use rand_distr::{Distribution, Normal};

/// A spill-time distribution. Offsets are in nanoseconds.
pub trait SpillTime: Send {
    /// Draw the next per-event time offset.
    fn next_offset(&self, rng: &mut StdRng) -> f64;
}

/// The `none` model: always zero.
struct NoOffset;

impl SpillTime for NoOffset {
    fn next_offset(&self, _rng: &mut StdRng) -> f64 {
        0.0
    }
}

/// The `uniform` model: uniform over `[0, width]`.
struct UniformOffset {
    width: f64,
}

impl SpillTime for UniformOffset {
    fn next_offset(&self, rng: &mut StdRng) -> f64 {
        rng.gen::<f64>() * self.width
    }
}

/// The `beam` model: Gaussian bunches inside rectangular batch envelopes.
struct BeamStructure {
    n_batch: usize,
    batch_width: f64,
    gap: f64,
    bunch_sigma: f64,
    n_bunch: usize,
    /// Global bunch indices (batch-major) that carry no beam.
    skip: Vec<usize>,
}

impl BeamStructure {
    fn bunch_spacing(&self) -> f64 {
        self.batch_width / self.n_bunch as f64
    }
}

impl SpillTime for BeamStructure {
    fn next_offset(&self, rng: &mut StdRng) -> f64 {
        let total = self.n_batch * self.n_bunch;
        let live = total - self.skip.len();
        debug_assert!(live > 0);
        // Index among live bunches, then map past the skipped ones.
        let mut pick = rng.gen_range(0..live);
        let mut global = 0usize;
        loop {
            if !self.skip.contains(&global) {
                if pick == 0 {
                    break;
                }
                pick -= 1;
            }
            global += 1;
        }
        let batch = global / self.n_bunch;
        let bunch = global % self.n_bunch;
        let center = batch as f64 * (self.batch_width + self.gap)
            + (bunch as f64 + 0.5) * self.bunch_spacing();
        let normal = Normal::new(0.0, self.bunch_sigma).unwrap_or_else(|_| {
            Normal::new(0.0, f64::MIN_POSITIVE).unwrap()
        });
        center + normal.sample(rng)
    }
}

fn parse_kv(body: &str) -> Result<std::collections::HashMap<String, String>> {
    let mut map = std::collections::HashMap::new();
    for tok in body.split_whitespace() {
        let (k, v) = tok
            .split_once('=')
            .ok_or_else(|| Error::Config(format!("bad spill-time parameter '{tok}'")))?;
        map.insert(k.to_string(), v.to_string());
    }
    Ok(map)
}

fn get_f64(map: &std::collections::HashMap<String, String>, key: &str) -> Result<f64> {
    map.get(key)
        .ok_or_else(|| Error::Config(format!("spill-time config missing '{key}'")))?
        .parse()
        .map_err(|_| Error::Config(format!("spill-time parameter '{key}' is not a number")))
}

fn get_usize(map: &std::collections::HashMap<String, String>, key: &str) -> Result<usize> {
    map.get(key)
        .ok_or_else(|| Error::Config(format!("spill-time config missing '{key}'")))?
        .parse()
        .map_err(|_| Error::Config(format!("spill-time parameter '{key}' is not an integer")))
}

/// Build a spill-time model from its configuration string.
///
/// Grammar:
/// - `none` (also the empty string)
/// - `uniform: <width_ns>`
/// - `beam: nbatch=<n> batch_width=<ns> gap=<ns> bunch_sigma=<ns>
///   nbunch=<n> [skip=<i,j,...>]`
pub fn from_config(cfg: &str) -> Result<Box<dyn SpillTime>> {
    let cfg = cfg.trim();
    if cfg.is_empty() || cfg.eq_ignore_ascii_case("none") {
        return Ok(Box::new(NoOffset));
    }
    let (key, body) = match cfg.split_once(':') {
        Some((k, b)) => (k.trim(), b.trim()),
        None => (cfg, ""),
    };
    match key.to_ascii_lowercase().as_str() {
        "none" => Ok(Box::new(NoOffset)),
        "uniform" => {
            let width: f64 = body
                .parse()
                .map_err(|_| Error::Config(format!("bad uniform spill width '{body}'")))?;
            if width < 0.0 {
                return Err(Error::Config("uniform spill width must be >= 0".into()));
            }
            Ok(Box::new(UniformOffset { width }))
        }
        "beam" => {
            let map = parse_kv(body)?;
            let n_batch = get_usize(&map, "nbatch")?;
            let n_bunch = get_usize(&map, "nbunch")?;
            let batch_width = get_f64(&map, "batch_width")?;
            let gap = get_f64(&map, "gap")?;
            let bunch_sigma = get_f64(&map, "bunch_sigma")?;
            let skip: Vec<usize> = match map.get("skip") {
                Some(s) if !s.is_empty() => s
                    .split(',')
                    .map(|t| {
                        t.trim().parse().map_err(|_| {
                            Error::Config(format!("bad skipped-bunch index '{t}'"))
                        })
                    })
                    .collect::<Result<_>>()?,
                _ => Vec::new(),
            };
            if n_batch == 0 || n_bunch == 0 {
                return Err(Error::Config("beam structure needs nbatch > 0 and nbunch > 0".into()));
            }
            if skip.len() >= n_batch * n_bunch {
                return Err(Error::Config("beam structure skips every bunch".into()));
            }
            if let Some(&bad) = skip.iter().find(|&&i| i >= n_batch * n_bunch) {
                return Err(Error::Config(format!("skipped-bunch index {bad} out of range")));
            }
            Ok(Box::new(BeamStructure { n_batch, batch_width, gap, bunch_sigma, n_bunch, skip }))
        }
        other => Err(Error::Config(format!("unknown spill-time model '{other}'"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn test_none_is_zero() {
        let m = from_config("none").unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..10 {
            assert_eq!(m.next_offset(&mut rng), 0.0);
        }
    }

    #[test]
    fn test_uniform_within_width() {
        let m = from_config("uniform: 1600").unwrap();
        let mut rng = StdRng::seed_from_u64(2);
        for _ in 0..1000 {
            let t = m.next_offset(&mut rng);
            assert!((0.0..=1600.0).contains(&t));
        }
    }

    #[test]
    fn test_beam_offsets_within_spill_envelope() {
        let m = from_config(
            "beam: nbatch=6 batch_width=1600 gap=120 bunch_sigma=1.0 nbunch=84 skip=0,83",
        )
        .unwrap();
        let mut rng = StdRng::seed_from_u64(3);
        let spill_len = 6.0 * 1600.0 + 5.0 * 120.0;
        for _ in 0..1000 {
            let t = m.next_offset(&mut rng);
            // 6σ slack on either side for the Gaussian tails.
            assert!(t > -6.0 && t < spill_len + 6.0, "offset {t} outside spill");
        }
    }

    #[test]
    fn test_beam_skips_first_bunch() {
        // One batch, two bunches, bunch 0 skipped, tiny sigma: every draw
        // must sit near the second bunch center.
        let m = from_config(
            "beam: nbatch=1 batch_width=100 gap=0 bunch_sigma=0.001 nbunch=2 skip=0",
        )
        .unwrap();
        let mut rng = StdRng::seed_from_u64(4);
        for _ in 0..200 {
            let t = m.next_offset(&mut rng);
            assert!((t - 75.0).abs() < 1.0, "draw {t} not in live bunch");
        }
    }

    #[test]
    fn test_unknown_model_is_fatal() {
        assert!(matches!(from_config("sawtooth: 3"), Err(Error::Config(_))));
    }

    #[test]
    fn test_all_bunches_skipped_is_fatal() {
        let r = from_config("beam: nbatch=1 batch_width=10 gap=0 bunch_sigma=1 nbunch=1 skip=0");
        assert!(matches!(r, Err(Error::Config(_))));
    }
}
