use clap::Parser;
use stockpulse::cli::{run, Cli};

fn main() -> std::process::ExitCode {
    run(Cli::parse())
}
