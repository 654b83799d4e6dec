use std::process::ExitCode;

use clap::Parser;

use self::arg::Args;
use self::arg::Command;

mod arg;
mod inspect;
mod lines;
mod logging;
mod serve;

pub fn run() -> ExitCode {
    match run_impl() {
        Ok(exit_code) => exit_code,
        Err(error) => {
            tracing::error!(?error);
            eprintln!("{:#}", error);
            ExitCode::FAILURE
        }
    }
}

fn run_impl() -> anyhow::Result<ExitCode> {
    let args = Args::parse();

    self::logging::set_up_logging(args.log_level, args.log_file.as_deref(), args.log_json)?;

    match args.command {
        Command::Serve(args) => self::serve::serve(&args)?,
        Command::Lines(args) => self::lines::lines(&args)?,
        Command::Inspect(args) => self::inspect::inspect(&args)?,
    }

    Ok(ExitCode::SUCCESS)
}
