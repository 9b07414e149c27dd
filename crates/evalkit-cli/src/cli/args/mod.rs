use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub mod common;
pub use common::*;

#[derive(Parser)]
#[command(
    name = "evalkit",
    version,
    about = "Scaffold, validate and preview promptfoo evaluation repositories"
)]
pub struct Cli {
    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Write the starter scaffold (config, prompts, test inputs, assertion sets)
    Init(InitArgs),
    /// Check references, placeholders and assertion specs without calling any model
    Validate(ValidateArgs),
    /// Print every prompt rendered against its test cases
    Render(RenderArgs),
    /// Show the prompt x test matrix with effective assertions
    Plan(PlanArgs),
    /// Check that provider credentials the evaluation needs are set
    Doctor(DoctorArgs),
    Version,
}

#[derive(clap::Args, Debug, Clone)]
pub struct InitArgs {
    /// Directory to write the scaffold into
    #[arg(long, default_value = ".")]
    pub dir: PathBuf,

    /// Overwrite files that already exist
    #[arg(long)]
    pub force: bool,
}

#[derive(clap::Args, Debug, Clone)]
pub struct ValidateArgs {
    #[command(flatten)]
    pub config: ConfigArg,

    /// `EVALKIT_FORMAT` applies to validate only; sarif has no render/plan/doctor form
    #[arg(long, value_enum, env = "EVALKIT_FORMAT", default_value_t = ValidateOutputFormat::Text)]
    pub format: ValidateOutputFormat,

    /// Write the json/sarif report here instead of stdout
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Exit non-zero on warnings too
    #[arg(long)]
    pub deny_warnings: bool,
}

#[derive(clap::Args, Debug, Clone)]
pub struct RenderArgs {
    #[command(flatten)]
    pub config: ConfigArg,

    /// Only this use case: 1-based position or description
    #[arg(long)]
    pub use_case: Option<String>,

    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

#[derive(clap::Args, Debug, Clone)]
pub struct PlanArgs {
    #[command(flatten)]
    pub config: ConfigArg,

    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

#[derive(clap::Args, Debug, Clone)]
pub struct DoctorArgs {
    #[command(flatten)]
    pub config: ConfigArg,

    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}
