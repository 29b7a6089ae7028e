use std::process::ExitCode;

fn main() -> ExitCode {
    flatwise_cli::run()
}
