use clap::Parser;

mod cli;
pub mod exit_codes;
mod templates;

use cli::args::Cli;
use cli::commands::dispatch;

fn main() {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info");
    }
    env_logger::init();
    let cli = Cli::parse();
    let code = match dispatch(cli) {
        Ok(code) => code,
        Err(e) => {
            match evalkit_core::errors::try_map_error(&e) {
                Some(diag) => eprint!("{}", diag),
                None => eprintln!("fatal: {e:?}"),
            }
            exit_codes::CONFIG_ERROR
        }
    };
    std::process::exit(code);
}
