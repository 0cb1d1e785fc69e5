use std::process::ExitCode;

fn main() -> ExitCode {
    carely_cli::run()
}
