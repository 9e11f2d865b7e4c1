use std::process::ExitCode;

use clap::Parser;

use certimorph::cli::{self, Cli};

#[tokio::main]
async fn main() -> ExitCode {
    certimorph::init_tracing();
    let cli = Cli::parse();
    let pretty = cli.pretty;

    match cli::run(cli).await {
        Ok(outcome) => {
            let rendered = if pretty {
                serde_json::to_string_pretty(&outcome.output)
            } else {
                serde_json::to_string(&outcome.output)
            };
            match rendered {
                Ok(text) => println!("{text}"),
                Err(e) => {
                    eprintln!("error: {e}");
                    return ExitCode::FAILURE;
                }
            }
            if outcome.success {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(2)
            }
        }
        Err(e) => {
            tracing::error!(error = %e, "Command failed");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
