use colored::*;
use lockstep::cli::{Args, Parser};
use lockstep::{logger, repl};

fn main() {
    let args = Args::parse();
    if let Err(e) = logger::init(args.log_filter()) {
        eprintln!("failed to initialize logger: {}", e);
    }

    if let Err(e) = repl::start(args.into()) {
        eprintln!("{} {:#}", "Error:".bright_red().bold(), e);
        std::process::exit(1);
    }
}
