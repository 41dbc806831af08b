pub mod commands;

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};

#[derive(Parser)]
#[command(name = "helpdesk-api")]
#[command(about = "Help-desk ticketing REST API")]
#[command(version)]
pub struct Cli {
    #[arg(long, global = true, help = "Output in human-readable text format")]
    pub text: bool,

    #[arg(long, global = true, help = "Output in JSON format")]
    pub json: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Run the HTTP server (default)")]
    Serve {
        #[arg(long, help = "Bind address, overrides HOST")]
        host: Option<String>,
        #[arg(long, help = "Port, overrides PORT")]
        port: Option<u16>,
    },

    #[command(about = "Mint a JWT with the configured secret")]
    Token {
        #[arg(long, help = "Staff, user or API key id")]
        id: i64,
        #[arg(long = "type", default_value = "user", help = "user, staff or apikey")]
        kind: String,
        #[arg(long, help = "Display name")]
        name: Option<String>,
        #[arg(long, help = "E-mail address")]
        email: Option<String>,
        #[arg(long, help = "Mark a staff token as administrator")]
        admin: bool,
    },

    #[command(about = "Check server health via its /health endpoint")]
    Ping {
        #[arg(default_value = "http://localhost:3000", help = "Server base URL")]
        url: String,
    },

    #[command(about = "Print the effective configuration with secrets redacted")]
    Config,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn from_cli(cli: &Cli) -> Self {
        if cli.json {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        }
    }
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let output_format = OutputFormat::from_cli(&cli);
    let config = crate::config::AppConfig::from_env();

    match cli.command.unwrap_or(Commands::Serve { host: None, port: None }) {
        Commands::Serve { host, port } => commands::server::serve(config, host, port).await,
        Commands::Ping { url } => commands::server::ping(&url, output_format).await,
        Commands::Token {
            id,
            kind,
            name,
            email,
            admin,
        } => commands::token::mint(&config, id, &kind, name, email, admin, output_format),
        Commands::Config => commands::config::show(&config, output_format),
    }
}
