use std::process::ExitCode;

fn main() -> ExitCode {
    outreach_cli::run()
}
