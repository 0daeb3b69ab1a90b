use std::process::ExitCode;

use owo_colors::OwoColorize;

fn main() -> ExitCode {
    match quill::driver::main() {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("{} {error:#}", "error:".red().bold());
            ExitCode::FAILURE
        }
    }
}
