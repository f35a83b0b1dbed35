use clap::Parser;

#[path = "vqa-bench/args.rs"]
mod args;
#[path = "vqa-bench/commands.rs"]
mod commands;
#[path = "vqa-bench/logging.rs"]
mod logging;

#[cfg(test)]
#[path = "tests/vqa_bench_test.rs"]
mod tests;

use args::{CliArgs, Command};
use vqa_bench::config::load_config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();
    let config = load_config(args.config.clone())?;
    let _logger = logging::init_logging(&config.logging)?;

    match args.command {
        Command::Run(run) => commands::run(&config, run).await,
        Command::Eval(eval) => commands::eval(&config, eval).await,
    }
}
