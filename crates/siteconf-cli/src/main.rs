use std::process::ExitCode;

fn main() -> ExitCode {
    siteconf_cli::run()
}
