use clap::Parser;
use kitwarden::commands::{self, Cli};
use kitwarden::utils::init_logger;
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse();

    // 初始化日志系统
    if let Err(err) = init_logger(cli.global.log_level.as_deref(), cli.global.log_file.clone()) {
        eprintln!("Failed to initialize logger: {:#}", err);
        return ExitCode::from(2);
    }

    match commands::run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(category = err.category().display_name(), "{}", err);
            eprintln!("{}", err.user_message());
            ExitCode::from(err.exit_code())
        }
    }
}
