use std::path::PathBuf;
use std::time::Duration;

use catalog::{FunctionName, TransitionMode};
use clap::{Parser, Subcommand};
use graphconfig::Backend;

#[derive(Parser, Debug)]
#[command(
    name = "morphgraph",
    author,
    version,
    about = "Animated point grid morphing between parametric surfaces",
    arg_required_else_help = false
)]
pub struct Cli {
    #[command(flatten)]
    pub run: RunArgs,
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Parser, Debug, Default)]
pub struct RunArgs {
    /// Configuration file; defaults to `morphgraph.toml` in the config directory.
    #[arg(long, global = true, value_name = "FILE", env = "MORPHGRAPH_CONFIG")]
    pub config: Option<PathBuf>,

    /// Evaluation backend: `cpu` or `gpu`.
    #[arg(long, global = true, value_name = "BACKEND", value_parser = parse_backend)]
    pub backend: Option<Backend>,

    /// Points per grid side.
    #[arg(long, global = true, value_name = "N")]
    pub resolution: Option<u32>,

    /// Surface shown first (`wave`, `multi_wave`, `ripple`, `sphere`, `torus`).
    #[arg(long, global = true, value_name = "NAME", value_parser = parse_function)]
    pub function: Option<FunctionName>,

    /// How the next surface is chosen: `cycle` or `random`.
    #[arg(long, global = true, value_name = "MODE", value_parser = parse_mode)]
    pub mode: Option<TransitionMode>,

    /// Time each surface is held (seconds or e.g. `1500ms`).
    #[arg(long, global = true, value_name = "DURATION", value_parser = parse_duration)]
    pub function_duration: Option<Duration>,

    /// Time each morph takes (seconds or e.g. `1500ms`).
    #[arg(long, global = true, value_name = "DURATION", value_parser = parse_duration)]
    pub transition_duration: Option<Duration>,

    /// Seed for random selection.
    #[arg(long, global = true, value_name = "SEED")]
    pub seed: Option<u64>,

    /// Preview window size (e.g. `1280x720`).
    #[arg(long, value_name = "WIDTHxHEIGHT")]
    pub size: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Validate the configuration and print the resolved settings.
    Check(CheckArgs),
    /// Advance the animation with a fixed time step without opening a window.
    Simulate(SimulateArgs),
}

#[derive(Parser, Debug)]
pub struct CheckArgs {
    /// Print the resolved settings as JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Parser, Debug)]
pub struct SimulateArgs {
    /// Number of frames to advance.
    #[arg(long, value_name = "N", default_value_t = 600)]
    pub frames: u32,

    /// Seconds per frame.
    #[arg(long, value_name = "SECONDS", default_value_t = 1.0 / 60.0, value_parser = parse_delta)]
    pub delta: f32,

    /// Print the run summary as JSON.
    #[arg(long)]
    pub json: bool,
}

pub fn parse() -> Cli {
    Cli::parse()
}

pub fn parse_backend(value: &str) -> Result<Backend, String> {
    value.parse().map_err(|err| format!("{err}"))
}

pub fn parse_function(value: &str) -> Result<FunctionName, String> {
    value.parse().map_err(|err| format!("{err}"))
}

pub fn parse_mode(value: &str) -> Result<TransitionMode, String> {
    value.parse().map_err(|err| format!("{err}"))
}

pub fn parse_duration(value: &str) -> Result<Duration, String> {
    graphconfig::parse_duration(value)
}

pub fn parse_delta(value: &str) -> Result<f32, String> {
    let delta: f32 = value
        .trim()
        .parse()
        .map_err(|_| format!("invalid frame delta '{value}'"))?;
    if !delta.is_finite() || delta <= 0.0 {
        return Err("frame delta must be a positive number of seconds".to_string());
    }
    Ok(delta)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_run_overrides() {
        let cli = Cli::try_parse_from([
            "morphgraph",
            "--backend",
            "cpu",
            "--resolution",
            "64",
            "--function",
            "multi-wave",
            "--mode",
            "random",
            "--function-duration",
            "2s",
            "--transition-duration",
            "0.25",
        ])
        .unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.run.backend, Some(Backend::Cpu));
        assert_eq!(cli.run.resolution, Some(64));
        assert_eq!(cli.run.function, Some(FunctionName::MultiWave));
        assert_eq!(cli.run.mode, Some(TransitionMode::Random));
        assert_eq!(cli.run.function_duration, Some(Duration::from_secs(2)));
        assert_eq!(
            cli.run.transition_duration,
            Some(Duration::from_millis(250))
        );
    }

    #[test]
    fn global_flags_reach_subcommands() {
        let cli = Cli::try_parse_from([
            "morphgraph",
            "simulate",
            "--frames",
            "10",
            "--delta",
            "0.1",
            "--backend",
            "cpu",
        ])
        .unwrap();
        assert_eq!(cli.run.backend, Some(Backend::Cpu));
        match cli.command {
            Some(Command::Simulate(args)) => {
                assert_eq!(args.frames, 10);
                assert!((args.delta - 0.1).abs() < f32::EPSILON);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn rejects_unknown_function_and_bad_delta() {
        assert!(Cli::try_parse_from(["morphgraph", "--function", "cube"]).is_err());
        assert!(parse_delta("0").is_err());
        assert!(parse_delta("-1").is_err());
        assert!(parse_delta("nan").is_err());
    }
}
