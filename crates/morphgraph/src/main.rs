mod cli;
mod paths;
mod run;

use anyhow::Result;
use cli::Command;

fn main() -> Result<()> {
    let cli = cli::parse();
    run::initialise_tracing();

    match cli.command {
        Some(Command::Check(args)) => run::check(&cli.run, &args),
        Some(Command::Simulate(args)) => run::simulate(&cli.run, &args),
        None => run::run(cli.run),
    }
}
