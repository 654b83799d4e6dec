use std::process::ExitCode;

fn main() -> ExitCode {
    httpfromtcp::app::run()
}
