use std::process::ExitCode;

fn main() -> ExitCode {
    joblab_cli::run()
}
