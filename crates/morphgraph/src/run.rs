use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use graphconfig::{Backend, GraphConfig};
use renderer::{Renderer, RendererConfig, SimulationReport};
use scheduler::{PhaseChange, TransitionScheduler};
use serde_json::json;
use tracing_subscriber::EnvFilter;

use crate::cli::{CheckArgs, RunArgs, SimulateArgs};
use crate::paths::AppPaths;

pub fn initialise_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Settings after the config file and CLI overrides have been merged.
pub struct ResolvedConfig {
    pub graph: GraphConfig,
    /// File the settings were read from; `None` when running on defaults.
    pub source: Option<PathBuf>,
    pub seed: u64,
}

/// Opens the interactive preview.
pub fn run(args: RunArgs) -> Result<()> {
    let resolved = resolve(&args, None)?;
    tracing::info!(
        source = %describe_source(resolved.source.as_deref()),
        backend = %resolved.graph.backend,
        resolution = resolved.graph.resolution,
        seed = resolved.seed,
        "starting morphgraph preview"
    );
    let mut renderer = Renderer::new(RendererConfig {
        graph: resolved.graph,
        seed: resolved.seed,
    });
    renderer.run()
}

pub fn check(run_args: &RunArgs, args: &CheckArgs) -> Result<()> {
    let resolved = resolve(run_args, None)?;
    let catalog = resolved.graph.catalog()?;
    let functions: Vec<&str> = catalog.names().map(|name| name.as_str()).collect();

    if args.json {
        let output = json!({
            "source": resolved.source.as_ref().map(|path| path.display().to_string()),
            "seed": resolved.seed,
            "catalog": functions,
            "config": &resolved.graph,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    let graph = &resolved.graph;
    println!("Configuration OK ({})", describe_source(resolved.source.as_deref()));
    println!("  backend:             {}", graph.backend);
    println!("  resolution:          {}", graph.resolution);
    println!("  function:            {}", graph.function);
    println!("  catalog:             {}", functions.join(", "));
    println!("  transition mode:     {}", graph.transition_mode);
    println!("  function duration:   {}s", graph.function_seconds());
    println!("  transition duration: {}s", graph.transition_seconds());
    println!("  seed:                {}", resolved.seed);
    println!(
        "  window:              {}x{} \"{}\"",
        graph.window.width, graph.window.height, graph.window.title
    );
    Ok(())
}

pub fn simulate(run_args: &RunArgs, args: &SimulateArgs) -> Result<()> {
    let resolved = resolve(run_args, Some(Backend::Cpu))?;
    let graph = &resolved.graph;
    let scheduler = TransitionScheduler::from_config(graph, resolved.seed)
        .context("failed to build transition scheduler")?;
    tracing::info!(
        backend = %graph.backend,
        resolution = graph.resolution,
        frames = args.frames,
        delta = args.delta,
        "running headless simulation"
    );
    let report = renderer::simulate(
        scheduler,
        graph.backend,
        graph.resolution,
        args.frames,
        args.delta,
    )?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report_json(&report))?);
    } else {
        print_report(&report);
    }
    Ok(())
}

/// Loads the config file, applies CLI overrides and validates the result.
///
/// `backend_fallback` replaces the file's backend when `--backend` is absent.
pub fn resolve(args: &RunArgs, backend_fallback: Option<Backend>) -> Result<ResolvedConfig> {
    let (mut graph, source) = load_config(args.config.as_deref())?;
    if let Some(backend) = args.backend.or(backend_fallback) {
        graph.backend = backend;
    }
    apply_overrides(&mut graph, args)?;
    graph.validate().context("configuration rejected")?;
    let seed = graph.seed.unwrap_or_else(rand::random);
    Ok(ResolvedConfig {
        graph,
        source,
        seed,
    })
}

fn load_config(explicit: Option<&Path>) -> Result<(GraphConfig, Option<PathBuf>)> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => {
            let default = AppPaths::discover()?.config_file();
            if !default.exists() {
                tracing::debug!(path = %default.display(), "no config file; using defaults");
                return Ok((GraphConfig::default(), None));
            }
            default
        }
    };
    let contents = fs::read_to_string(&path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    let graph = GraphConfig::from_toml_str(&contents)
        .with_context(|| format!("failed to load config {}", path.display()))?;
    tracing::debug!(path = %path.display(), "loaded config");
    Ok((graph, Some(path)))
}

fn apply_overrides(graph: &mut GraphConfig, args: &RunArgs) -> Result<()> {
    if let Some(resolution) = args.resolution {
        graph.resolution = resolution;
    }
    if let Some(function) = args.function {
        graph.function = function;
    }
    if let Some(mode) = args.mode {
        graph.transition_mode = mode;
    }
    if let Some(duration) = args.function_duration {
        graph.function_duration = duration;
    }
    if let Some(duration) = args.transition_duration {
        graph.transition_duration = duration;
    }
    if let Some(seed) = args.seed {
        graph.seed = Some(seed);
    }
    if let Some(size) = args.size.as_deref() {
        let (width, height) = parse_surface_size(size)?;
        graph.window.width = width;
        graph.window.height = height;
    }
    Ok(())
}

pub fn parse_surface_size(spec: &str) -> Result<(u32, u32)> {
    let trimmed = spec.trim();
    let (width, height) = trimmed
        .split_once(['x', 'X', '×'])
        .ok_or_else(|| anyhow::anyhow!("expected WxH format, e.g. 1280x720"))?;

    let width: u32 = width
        .trim()
        .parse()
        .map_err(|_| anyhow::anyhow!("invalid width in size specification"))?;
    let height: u32 = height
        .trim()
        .parse()
        .map_err(|_| anyhow::anyhow!("invalid height in size specification"))?;

    if width == 0 || height == 0 {
        anyhow::bail!("window dimensions must be greater than zero");
    }

    Ok((width, height))
}

fn describe_source(source: Option<&Path>) -> String {
    match source {
        Some(path) => path.display().to_string(),
        None => "built-in defaults".to_string(),
    }
}

fn describe_change(change: &PhaseChange) -> String {
    match change {
        PhaseChange::Began { from, to } => format!("began {from} -> {to}"),
        PhaseChange::Finished { function } => format!("finished at {function}"),
    }
}

fn print_report(report: &SimulationReport) {
    println!(
        "Simulated {} frames ({:.3}s) on {} at resolution {}",
        report.frames, report.time, report.backend, report.resolution
    );
    for (time, change) in &report.changes {
        println!("  {time:>8.3}s  {}", describe_change(change));
    }
    let sample = &report.final_sample;
    match sample.progress {
        Some(progress) => println!(
            "Final state: {} -> {} at {:.3}",
            sample.from, sample.to, progress
        ),
        None => println!("Final state: steady at {}", sample.to),
    }
    println!(
        "Centroid: ({:.4}, {:.4}, {:.4}); points outside bounds: {}",
        report.centroid.x, report.centroid.y, report.centroid.z, report.escaped
    );
}

fn report_json(report: &SimulationReport) -> serde_json::Value {
    let changes: Vec<_> = report
        .changes
        .iter()
        .map(|(time, change)| match change {
            PhaseChange::Began { from, to } => {
                json!({ "time": time, "event": "began", "from": from, "to": to })
            }
            PhaseChange::Finished { function } => {
                json!({ "time": time, "event": "finished", "function": function })
            }
        })
        .collect();
    let sample = &report.final_sample;
    json!({
        "backend": report.backend,
        "resolution": report.resolution,
        "frames": report.frames,
        "time": report.time,
        "changes": changes,
        "final": {
            "from": sample.from,
            "to": sample.to,
            "progress": sample.progress,
        },
        "bounds_half_extent": report.bounds.half_extent,
        "centroid": [report.centroid.x, report.centroid.y, report.centroid.z],
        "escaped": report.escaped,
    })
}
