//! nugen CLI

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use ng_driver::{
    DriverConfig, EventInjector, GeneratorDriver, InjectorConfig, KinematicsBackend, SampledEvent,
};
use ng_reweight::{InputMode, Reweighter};
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "nugen")]
#[command(about = "nugen - neutrino event generation driver")]
#[command(version)]
struct Cli {
    /// Log verbosity level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "info")]
    log_level: tracing::Level,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Produce spills of generator events
    Run {
        /// Driver configuration (JSON key/value map)
        #[arg(short, long)]
        config: PathBuf,

        /// Detector geometry description (JSON)
        #[arg(short, long)]
        geometry: PathBuf,

        /// Number of spills to produce
        #[arg(long, default_value = "1")]
        spills: u64,

        /// Output directory for the three parallel record streams
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Recompute event weights under parameter tweaks
    Reweight {
        /// Event stream written by `run` (JSON lines)
        #[arg(long)]
        events: PathBuf,

        /// Truth stream written by `run` (JSON lines)
        #[arg(long)]
        truth: PathBuf,

        /// Knob settings, `Label=value`, repeatable
        #[arg(short = 'k', long = "knob")]
        knobs: Vec<String>,

        /// Interpret values as intended parameter values instead of sigmas
        #[arg(long)]
        value_mode: bool,

        /// Output file for per-event weights (JSON lines). Defaults to stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Replay recorded events with count, vertex and time offsets
    Inject {
        /// Injector configuration (JSON)
        #[arg(short, long)]
        config: PathBuf,

        /// Number of injection calls
        #[arg(long, default_value = "1")]
        calls: u64,

        /// Output directory for the record streams
        #[arg(short, long)]
        output: PathBuf,
    },
}

fn write_triples(dir: &Path, triples: &[SampledEvent]) -> Result<()> {
    std::fs::create_dir_all(dir)?;
    let mut events = std::fs::File::create(dir.join("events.jsonl"))?;
    let mut flux = std::fs::File::create(dir.join("flux.jsonl"))?;
    let mut truth = std::fs::File::create(dir.join("truth.jsonl"))?;
    for (e, f, t) in triples {
        writeln!(events, "{}", serde_json::to_string(e)?)?;
        writeln!(flux, "{}", serde_json::to_string(f)?)?;
        writeln!(truth, "{}", serde_json::to_string(t)?)?;
    }
    Ok(())
}

fn cmd_run(config: &Path, geometry: &Path, spills: u64, output: &Path) -> Result<()> {
    let cfg_text = std::fs::read_to_string(config)
        .with_context(|| format!("reading driver config {}", config.display()))?;
    let cfg = DriverConfig::from_json(&cfg_text)?;
    let geom_text = std::fs::read_to_string(geometry)
        .with_context(|| format!("reading geometry {}", geometry.display()))?;
    let geom: ng_driver::DetectorGeometry = serde_json::from_str(&geom_text)?;

    let backend = KinematicsBackend::new(cfg.target_z, cfg.target_a);
    let mut driver = GeneratorDriver::configure(cfg, geom, Box::new(backend))?;
    let mut all = Vec::new();
    for spill in 0..spills {
        let produced = driver.run_spill()?;
        tracing::info!(
            spill,
            n_events = produced.len(),
            total_exposure = driver.total_exposure(),
            "spill done"
        );
        all.extend(produced);
    }
    driver.teardown();
    write_triples(output, &all)?;
    println!("{} events -> {}", all.len(), output.display());
    Ok(())
}

fn read_lines<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let fh = std::fs::File::open(path)
        .with_context(|| format!("opening record stream {}", path.display()))?;
    let mut out = Vec::new();
    for line in std::io::BufReader::new(fh).lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        out.push(serde_json::from_str(&line)?);
    }
    Ok(out)
}

fn cmd_reweight(
    events: &Path,
    truth: &Path,
    knobs: &[String],
    value_mode: bool,
    output: Option<&PathBuf>,
) -> Result<()> {
    let events: Vec<ng_event::NeutrinoEvent> = read_lines(events)?;
    let truths: Vec<ng_event::GeneratorTruth> = read_lines(truth)?;
    if events.len() != truths.len() {
        bail!("event and truth streams differ in length: {} vs {}", events.len(), truths.len());
    }

    let mut settings = Vec::with_capacity(knobs.len());
    for k in knobs {
        let (label, value) = k
            .split_once('=')
            .with_context(|| format!("knob '{k}' is not of the form Label=value"))?;
        settings.push((label.trim().to_string(), value.trim().parse::<f64>()?));
    }
    let mode = if value_mode { InputMode::Value } else { InputMode::Sigma };
    let rw = Reweighter::new(&settings, mode)?;

    let mut sink: Box<dyn Write> = match output {
        Some(path) => Box::new(std::fs::File::create(path)?),
        None => Box::new(std::io::stdout()),
    };
    for (i, (e, t)) in events.iter().zip(&truths).enumerate() {
        let weight = rw.calc_weight(e, t)?;
        writeln!(sink, r#"{{"entry": {i}, "weight": {weight}}}"#)?;
    }
    Ok(())
}

fn cmd_inject(config: &Path, calls: u64, output: &Path) -> Result<()> {
    let cfg_text = std::fs::read_to_string(config)
        .with_context(|| format!("reading injector config {}", config.display()))?;
    let cfg: InjectorConfig = serde_json::from_str(&cfg_text)?;
    let mut injector = EventInjector::new(cfg)?;

    std::fs::create_dir_all(output)?;
    let mut events = std::fs::File::create(output.join("events.jsonl"))?;
    let mut truth = std::fs::File::create(output.join("truth.jsonl"))?;
    let mut flux = std::fs::File::create(output.join("flux.jsonl"))?;
    let mut n = 0usize;
    for _ in 0..calls {
        for injected in injector.inject()? {
            writeln!(events, "{}", serde_json::to_string(&injected.event)?)?;
            writeln!(truth, "{}", serde_json::to_string(&injected.truth)?)?;
            if let Some(f) = &injected.flux {
                writeln!(flux, "{}", serde_json::to_string(f)?)?;
            }
            n += 1;
        }
    }
    println!("{n} events -> {}", output.display());
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt().with_max_level(cli.log_level).with_target(false).init();

    match cli.command {
        Commands::Run { config, geometry, spills, output } => {
            cmd_run(&config, &geometry, spills, &output)
        }
        Commands::Reweight { events, truth, knobs, value_mode, output } => {
            cmd_reweight(&events, &truth, &knobs, value_mode, output.as_ref())
        }
        Commands::Inject { config, calls, output } => cmd_inject(&config, calls, &output),
    }
}
