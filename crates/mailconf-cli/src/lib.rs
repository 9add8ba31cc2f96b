//! Implementation of the `mailconf` command.

use anyhow::Result;
use clap::Parser;
use mailconf_discover::{discover_smtp, DiscoverError, SmtpConfig};
use tracing_subscriber::EnvFilter;

/// Discover outbound SMTP settings for an e-mail address
#[derive(Debug, Parser)]
#[command(name = "mailconf", version, about)]
struct Cli {
    /// E-mail address to discover settings for
    address: String,

    /// Print the result as JSON
    #[arg(long)]
    json: bool,
}

fn print_config(config: &SmtpConfig, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(config)?);
    } else {
        println!("hostname:   {}", config.hostname);
        println!("port:       {}", config.port);
        println!("encryption: {}", config.encryption);
        if let Some(username) = &config.username {
            println!("username:   {username}");
        }
    }
    Ok(())
}

pub async fn run() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match discover_smtp(&cli.address).await {
        Ok(config) => print_config(&config, cli.json),
        Err(DiscoverError::NotFound) => {
            eprintln!("no mail server found for {}", cli.address);
            std::process::exit(1);
        }
        Err(err) => Err(err.into()),
    }
}
