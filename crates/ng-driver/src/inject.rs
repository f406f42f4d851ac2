//! Event injector: replays externally generated events from a record
//! file, a sampled count per spill, with vertex and time offsets.

use ng_core::{Error, FourVector, Result};
use ng_event::{FluxData, FluxRecord, GenEvent, GeneratorTruth, NeutrinoEvent, RayGeometry};
use ng_flux::{spill_from_config, SpillTime};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal, Poisson};
use serde::{Deserialize, Serialize};
use std::io::{BufRead, Write};
use std::path::PathBuf;
use tracing::info;

/// Per-call count distribution, configured by a single string.
#[derive(Debug, Clone, PartialEq)]
pub enum CountModel {
    /// `fixed: n`
    Fixed(u64),
    /// `flat: a b`, uniform integer in `[a, b]`.
    Flat(u64, u64),
    /// `poisson: mu`
    Poisson(f64),
    /// `poisson-1: mu`, `max(Poisson(mu) - 1, 0)`.
    PoissonMinusOne(f64),
    /// `gauss: mu sigma`, floored and clamped at 0.
    Gauss(f64, f64),
}

impl CountModel {
    /// Parse the count-distribution selector. Unknown forms are fatal.
    pub fn parse(cfg: &str) -> Result<Self> {
        let (key, args) = match cfg.split_once(':') {
            Some((k, a)) => (k.trim(), a.trim()),
            None => (cfg.trim(), ""),
        };
        let nums: Vec<f64> = args
            .split_whitespace()
            .map(|v| {
                v.parse::<f64>()
                    .map_err(|_| Error::Config(format!("bad count value '{v}' in '{cfg}'")))
            })
            .collect::<Result<_>>()?;
        let want = |n: usize| -> Result<()> {
            if nums.len() == n {
                Ok(())
            } else {
                Err(Error::Config(format!("count form '{key}' needs {n} value(s), got {}", nums.len())))
            }
        };
        Ok(match key {
            "fixed" => {
                want(1)?;
                CountModel::Fixed(nums[0] as u64)
            }
            "flat" => {
                want(2)?;
                if nums[0] > nums[1] {
                    return Err(Error::Config(format!("flat range is inverted in '{cfg}'")));
                }
                CountModel::Flat(nums[0] as u64, nums[1] as u64)
            }
            "poisson" => {
                want(1)?;
                CountModel::Poisson(nums[0])
            }
            "poisson-1" => {
                want(1)?;
                CountModel::PoissonMinusOne(nums[0])
            }
            "gauss" => {
                want(2)?;
                CountModel::Gauss(nums[0], nums[1])
            }
            other => {
                return Err(Error::Config(format!("unknown count distribution '{other}'")));
            }
        })
    }

    /// Draw a count.
    pub fn sample(&self, rng: &mut StdRng) -> u64 {
        match self {
            CountModel::Fixed(n) => *n,
            CountModel::Flat(a, b) => rng.gen_range(*a..=*b),
            CountModel::Poisson(mu) => poisson_draw(*mu, rng),
            CountModel::PoissonMinusOne(mu) => poisson_draw(*mu, rng).saturating_sub(1),
            CountModel::Gauss(mu, sigma) => match Normal::new(*mu, *sigma) {
                Ok(n) => n.sample(rng).floor().max(0.0) as u64,
                Err(_) => 0,
            },
        }
    }
}

fn poisson_draw(mu: f64, rng: &mut StdRng) -> u64 {
    if mu <= 0.0 {
        return 0;
    }
    match Poisson::new(mu) {
        Ok(p) => p.sample(rng) as u64,
        Err(_) => 0,
    }
}

/// One record of the injector source file (JSON lines).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceEntry {
    /// The externally generated event.
    pub gen: GenEvent,
    /// Flux pass-through carried alongside, when the producer kept it.
    #[serde(default)]
    pub flux: Option<FluxData>,
}

/// Injector configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct InjectorConfig {
    /// Source record files, concatenated in order.
    pub file_list: Vec<PathBuf>,
    /// Count-distribution selector.
    pub count_config: String,
    /// Fixed time offset (ns) added to every event.
    #[serde(default)]
    pub global_time_offset: f64,
    /// Spill-time model selector; empty for none.
    #[serde(default)]
    pub time_config: String,
    /// Vertex-offset box `[xlo, xhi, ylo, yhi, zlo, zhi]` (cm).
    #[serde(default)]
    pub vtx_offsets: [f64; 6],
    /// Forward flux pass-through records when the source carries them.
    #[serde(default)]
    pub add_mc_flux: bool,
    /// Random selection without replacement instead of round-robin.
    #[serde(default)]
    pub random_entries: bool,
    /// Dump verbosity; negative disables the dump.
    #[serde(default = "neg_one")]
    pub output_print_level: i32,
    /// Dump destination; absent means standard output.
    #[serde(default)]
    pub output_dump_file_name: Option<PathBuf>,
    /// RNG seed.
    #[serde(default)]
    pub seed: u64,
}

fn neg_one() -> i32 {
    -1
}

/// One injected event with its provenance.
#[derive(Debug, Clone)]
pub struct InjectedEvent {
    /// Framework-native event.
    pub event: NeutrinoEvent,
    /// Generator truth.
    pub truth: GeneratorTruth,
    /// Flux record, when the source carried pass-through data and
    /// `addMCFlux` is set.
    pub flux: Option<FluxRecord>,
    /// Index of the source entry this event came from.
    pub source_entry: usize,
}

/// Replays recorded events as framework-native triples.
pub struct EventInjector {
    cfg: InjectorConfig,
    entries: Vec<SourceEntry>,
    count: CountModel,
    spill_model: Box<dyn SpillTime>,
    rng: StdRng,
    cursor: usize,
}

impl EventInjector {
    /// Load the source chain and parse the selectors.
    pub fn new(cfg: InjectorConfig) -> Result<Self> {
        let count = CountModel::parse(&cfg.count_config)?;
        let spill_model = if cfg.time_config.trim().is_empty() {
            spill_from_config("none")?
        } else {
            spill_from_config(&cfg.time_config)?
        };
        let mut entries = Vec::new();
        for path in &cfg.file_list {
            let fh = std::fs::File::open(path).map_err(|e| {
                Error::Resource(format!("cannot open injector file '{}': {e}", path.display()))
            })?;
            for line in std::io::BufReader::new(fh).lines() {
                let line = line?;
                if line.trim().is_empty() {
                    continue;
                }
                entries.push(serde_json::from_str::<SourceEntry>(&line)?);
            }
        }
        if entries.is_empty() {
            return Err(Error::Resource("injector source chain holds no entries".into()));
        }
        info!(n_entries = entries.len(), "injector source loaded");
        let rng = StdRng::seed_from_u64(cfg.seed);
        Ok(Self { cfg, entries, count, spill_model, rng, cursor: 0 })
    }

    fn select_entries(&mut self, n: usize) -> Vec<usize> {
        if self.cfg.random_entries {
            // Without replacement within one call; a call asking for
            // more than the source holds gets every entry once.
            let mut pool: Vec<usize> = (0..self.entries.len()).collect();
            let take = n.min(pool.len());
            for i in 0..take {
                let j = self.rng.gen_range(i..pool.len());
                pool.swap(i, j);
            }
            pool.truncate(take);
            pool
        } else {
            (0..n)
                .map(|_| {
                    let idx = self.cursor;
                    self.cursor = (self.cursor + 1) % self.entries.len();
                    idx
                })
                .collect()
        }
    }

    fn draw_vertex_offset(&mut self) -> [f64; 3] {
        let v = &self.cfg.vtx_offsets;
        let mut out = [0.0; 3];
        for (i, o) in out.iter_mut().enumerate() {
            let (lo, hi) = (v[2 * i], v[2 * i + 1]);
            *o = if hi > lo { lo + (hi - lo) * self.rng.gen::<f64>() } else { lo };
        }
        out
    }

    /// Produce one call's worth of injected events.
    pub fn inject(&mut self) -> Result<Vec<InjectedEvent>> {
        let n = self.count.sample(&mut self.rng) as usize;
        let selected = self.select_entries(n);
        let mut out = Vec::with_capacity(selected.len());
        for idx in selected {
            let entry = self.entries[idx].clone();
            let mut gen = entry.gen;

            // Vertex offsets are detector centimeters; the generator
            // record keeps meters.
            let off = self.draw_vertex_offset();
            gen.vertex = gen.vertex
                + FourVector::new(off[0] / 100.0, off[1] / 100.0, off[2] / 100.0, 0.0);

            let offset =
                self.cfg.global_time_offset + self.spill_model.next_offset(&mut self.rng);
            let event = ng_translate::fill_event(&gen, offset);
            let truth = ng_translate::fill_truth(&gen);
            let flux = match (&entry.flux, self.cfg.add_mc_flux) {
                (Some(data), true) => {
                    let vertex = [
                        gen.vertex.x * 100.0,
                        gen.vertex.y * 100.0,
                        gen.vertex.z * 100.0,
                    ];
                    Some(ng_translate::fill_flux(
                        data.clone(),
                        RayGeometry { ray_origin: vertex, vertex, dk2gen: -1.0, gen2vtx: 0.0 },
                    ))
                }
                _ => None,
            };
            out.push(InjectedEvent { event, truth, flux, source_entry: idx });
        }
        if self.cfg.output_print_level >= 0 {
            self.dump(&out)?;
        }
        Ok(out)
    }

    fn dump(&self, events: &[InjectedEvent]) -> Result<()> {
        let mut sink: Box<dyn Write> = match &self.cfg.output_dump_file_name {
            Some(path) => Box::new(
                std::fs::OpenOptions::new().create(true).append(true).open(path)?,
            ),
            None => Box::new(std::io::stdout()),
        };
        for ev in events {
            writeln!(
                sink,
                "entry {} : {} particles, mode {:?}, weight {}",
                ev.source_entry,
                ev.event.particles.len(),
                ev.event.summary.as_ref().map(|s| s.mode),
                ev.truth.weight
            )?;
            if self.cfg.output_print_level > 0 {
                for p in &ev.event.particles {
                    let p4 = p.momentum();
                    writeln!(
                        sink,
                        "  [{:3}] pdg {:>10} status {:?} E {:.4}",
                        p.track_id, p.pdg, p.status, p4.t
                    )?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ng_core::types::ion_pdg;
    use ng_event::{
        GenParticle, HitNucleon, InteractionType, KineVar, ParticleStatus, ProcessInfo,
        ScatteringType, Target,
    };
    use std::io::Write as _;
    use std::path::Path;

    fn source_event(energy: f64) -> GenEvent {
        let probe_p4 = FourVector::new(0.0, 0.0, energy, energy);
        let nucleon_p4 = FourVector::new(0.0, 0.0, 0.0, 0.9395654);
        let lepton_p4 = FourVector::from_energy_direction(0.8 * energy, [0.1, 0.0, 1.0], 0.1056584);
        let mut ev = GenEvent::default();
        ev.interaction.process = ProcessInfo::new(ScatteringType::QuasiElastic, InteractionType::WeakCC);
        ev.interaction.initial_state.probe_pdg = 14;
        ev.interaction.initial_state.probe_p4 = probe_p4;
        ev.interaction.initial_state.target = Target { pdg: ion_pdg(18, 40), z: 18, a: 40 };
        ev.interaction.initial_state.hit_nucleon = Some(HitNucleon { pdg: 2112, p4: nucleon_p4 });
        ev.interaction.kinematics.set(KineVar::Q2, 0.3);
        ev.interaction.kinematics.set(KineVar::Y, 0.2);
        ev.particles = vec![
            GenParticle {
                pdg: 14,
                status: ParticleStatus::InitialState,
                mother: -1,
                p4: probe_p4,
                x4: FourVector::zero(),
                polarization: None,
                rescatter: None,
            },
            GenParticle {
                pdg: 13,
                status: ParticleStatus::StableFinalState,
                mother: 0,
                p4: lepton_p4,
                x4: FourVector::zero(),
                polarization: None,
                rescatter: None,
            },
        ];
        ev.vertex = FourVector::new(0.1, 0.2, 0.3, 0.0);
        ev
    }

    fn write_source(dir: &Path, n: usize) -> PathBuf {
        let path = dir.join("events.jsonl");
        let mut f = std::fs::File::create(&path).unwrap();
        for i in 0..n {
            let entry = SourceEntry { gen: source_event(1.0 + i as f64), flux: None };
            writeln!(f, "{}", serde_json::to_string(&entry).unwrap()).unwrap();
        }
        path
    }

    fn config(path: PathBuf, count: &str) -> InjectorConfig {
        InjectorConfig {
            file_list: vec![path],
            count_config: count.into(),
            global_time_offset: 0.0,
            time_config: String::new(),
            vtx_offsets: [0.0; 6],
            add_mc_flux: false,
            random_entries: false,
            output_print_level: -1,
            output_dump_file_name: None,
            seed: 5,
        }
    }

    #[test]
    fn test_fixed_count_emits_distinct_source_entries() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_source(dir.path(), 5);
        let mut injector = EventInjector::new(config(path, "fixed: 3")).unwrap();
        let out = injector.inject().unwrap();
        assert_eq!(out.len(), 3);
        let mut seen: Vec<usize> = out.iter().map(|e| e.source_entry).collect();
        seen.dedup();
        assert_eq!(seen, vec![0, 1, 2]);
    }

    #[test]
    fn test_round_robin_wraps_across_calls() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_source(dir.path(), 4);
        let mut injector = EventInjector::new(config(path, "fixed: 3")).unwrap();
        let first: Vec<usize> = injector.inject().unwrap().iter().map(|e| e.source_entry).collect();
        let second: Vec<usize> = injector.inject().unwrap().iter().map(|e| e.source_entry).collect();
        assert_eq!(first, vec![0, 1, 2]);
        assert_eq!(second, vec![3, 0, 1]);
    }

    #[test]
    fn test_random_entries_are_distinct_within_a_call() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_source(dir.path(), 6);
        let mut cfg = config(path, "fixed: 4");
        cfg.random_entries = true;
        let mut injector = EventInjector::new(cfg).unwrap();
        let mut seen: Vec<usize> = injector.inject().unwrap().iter().map(|e| e.source_entry).collect();
        seen.sort_unstable();
        seen.dedup();
        assert_eq!(seen.len(), 4);
    }

    #[test]
    fn test_vertex_offset_box_is_applied() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_source(dir.path(), 1);
        let mut cfg = config(path, "fixed: 1");
        // Shift by exactly +100 cm in x.
        cfg.vtx_offsets = [100.0, 100.0, 0.0, 0.0, 0.0, 0.0];
        let mut injector = EventInjector::new(cfg).unwrap();
        let out = injector.inject().unwrap();
        let start = out[0].event.particles[0].start().unwrap();
        // Source vertex x = 0.1 m -> 10 cm, plus the 100 cm offset.
        assert_relative_eq!(start.position.x, 110.0, epsilon = 1e-9);
    }

    #[test]
    fn test_time_offset_lands_in_trajectory() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_source(dir.path(), 1);
        let mut cfg = config(path, "fixed: 1");
        cfg.global_time_offset = 250.0;
        let mut injector = EventInjector::new(cfg).unwrap();
        let out = injector.inject().unwrap();
        let start = out[0].event.particles[0].start().unwrap();
        assert_relative_eq!(start.position.t, 250.0, epsilon = 1e-9);
    }

    #[test]
    fn test_count_model_grammar() {
        assert_eq!(CountModel::parse("fixed: 3").unwrap(), CountModel::Fixed(3));
        assert_eq!(CountModel::parse("flat: 1 4").unwrap(), CountModel::Flat(1, 4));
        assert_eq!(CountModel::parse("poisson: 2.5").unwrap(), CountModel::Poisson(2.5));
        assert_eq!(
            CountModel::parse("poisson-1: 2.5").unwrap(),
            CountModel::PoissonMinusOne(2.5)
        );
        assert_eq!(CountModel::parse("gauss: 3 0.5").unwrap(), CountModel::Gauss(3.0, 0.5));
        assert!(CountModel::parse("binomial: 3").is_err());
        assert!(CountModel::parse("flat: 4 1").is_err());
    }

    #[test]
    fn test_poisson_minus_one_is_clamped() {
        let mut rng = StdRng::seed_from_u64(3);
        let m = CountModel::PoissonMinusOne(0.01);
        for _ in 0..50 {
            // At a tiny mean nearly every draw is 0 and must not wrap.
            let n = m.sample(&mut rng);
            assert!(n < 100);
        }
    }
}
