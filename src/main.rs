// src/main.rs

use anyhow::Result;
use clap::Parser;

mod cli;
mod commands;

use cli::{Cli, Commands};

fn main() -> Result<()> {
    // Initialize tracing subscriber for logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = cli.config;

    match cli.command {
        Some(Commands::Generate {
            name,
            serial,
            balance,
            token,
            output,
        }) => commands::cmd_generate(&config, &name, serial, balance, token, output),

        Some(Commands::Issue { name, output }) => commands::cmd_issue(&config, &name, output),

        Some(Commands::Register {
            serial,
            device,
            push_token,
            auth,
        }) => commands::cmd_register(&config, &serial, &device, &push_token, &auth),

        Some(Commands::Fetch {
            serial,
            auth,
            if_modified_since,
            output,
        }) => commands::cmd_fetch(&config, &serial, &auth, if_modified_since, output),

        Some(Commands::Balance { serial, balance }) => {
            commands::cmd_balance(&config, &serial, balance)
        }

        Some(Commands::Inspect { package, json }) => commands::cmd_inspect(&package, json),

        Some(Commands::Verify {
            package,
            public_key,
            certificate,
            mode,
            json,
        }) => commands::cmd_verify(&package, public_key, certificate, mode, json),

        None => {
            println!("walletpass {}", env!("CARGO_PKG_VERSION"));
            println!("Run 'walletpass --help' for usage information");
            Ok(())
        }
    }
}
