use super::super::args::*;
use crate::exit_codes;

pub fn dispatch(cli: Cli) -> anyhow::Result<i32> {
    match cli.cmd {
        Command::Init(args) => super::init::run(args),
        Command::Validate(args) => super::validate::run(args),
        Command::Render(args) => super::render::run(args),
        Command::Plan(args) => super::plan::run(args),
        Command::Doctor(args) => super::doctor::run(args),
        Command::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(exit_codes::OK)
        }
    }
}
