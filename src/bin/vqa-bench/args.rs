use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use vqa_bench::config::JudgeKind;

#[derive(Parser, Debug)]
#[command(
    name = "vqa-bench",
    about = "Ask several vision models the same questions, repeatedly, and score their answers"
)]
pub struct CliArgs {
    /// Configuration file (defaults to ./vqa-bench.toml, then ~/.config/vqa-bench/config.toml)
    #[arg(long, short = 'c', global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run every provider over a dataset and write a numbered run directory
    Run(RunArgs),
    /// Judge run artifacts and write accuracy tables
    Eval(EvalArgs),
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Dataset file: [{"image": {"path": ...}, "query": ..., "answer": ...}]
    #[arg(long)]
    pub dataset: PathBuf,
    /// Trials per entry
    #[arg(long)]
    pub trials: Option<usize>,
    /// Directory receiving the numbered run directories
    #[arg(long)]
    pub output: Option<PathBuf>,
    /// Comma separated subset of configured providers
    #[arg(long, value_delimiter = ',')]
    pub providers: Vec<String>,
    /// Treat a response without << >> as a failed trial
    #[arg(long)]
    pub require_answer_token: bool,
    /// Directory image paths are resolved against
    #[arg(long)]
    pub image_root: Option<PathBuf>,
    /// Give up on a provider call after this many attempts
    #[arg(long)]
    pub max_attempts: Option<usize>,
}

#[derive(Args, Debug)]
pub struct EvalArgs {
    /// Artifact to evaluate, as <provider>=<path> or just <path>
    #[arg(long = "input", required = true, value_parser = parse_input)]
    pub inputs: Vec<InputSpec>,
    /// Prefix of the three output tables
    #[arg(long, default_value = "eval")]
    pub out_prefix: String,
    /// Overrides [judge].kind
    #[arg(long, value_enum)]
    pub judge: Option<JudgeChoice>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InputSpec {
    pub name: String,
    pub path: PathBuf,
}

/// `claude=runs/001/claude.json`, or a bare path named after its file stem.
pub fn parse_input(raw: &str) -> Result<InputSpec, String> {
    if let Some((name, path)) = raw.split_once('=') {
        let name = name.trim();
        if name.is_empty() || path.trim().is_empty() {
            return Err(format!("expected <provider>=<path>, got '{raw}'"));
        }
        return Ok(InputSpec {
            name: name.to_string(),
            path: PathBuf::from(path.trim()),
        });
    }
    let path = PathBuf::from(raw);
    let name = path
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| format!("cannot derive a provider name from '{raw}'"))?
        .to_string();
    Ok(InputSpec { name, path })
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum JudgeChoice {
    Rules,
    Llm,
}

impl From<JudgeChoice> for JudgeKind {
    fn from(choice: JudgeChoice) -> Self {
        match choice {
            JudgeChoice::Rules => JudgeKind::Rules,
            JudgeChoice::Llm => JudgeKind::Llm,
        }
    }
}
