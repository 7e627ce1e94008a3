use chrono::Utc;
use clap::{Parser, Subcommand};
use serde_json::Value;

use journal_access::casa::CasaIssuer;
use journal_access::security::TicketSigner;
use journal_access::subscription::SubscriptionId;

#[derive(Parser)]
#[command(name = "access-cli")]
#[command(about = "Operator CLI for the journal access engine", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8080")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute the prepublication ticket for an issue
    Ticket {
        #[arg(long, env = "TICKET_KEY")]
        key: String,
        localidentifier: String,
    },
    /// Mint a CASA token
    MintCasa {
        #[arg(long, env = "CASA_SECRET")]
        secret: String,
        #[arg(long)]
        subscription: u64,
        #[arg(long)]
        cidr: String,
        /// Token lifetime in seconds
        #[arg(long, default_value_t = 300)]
        ttl: i64,
    },
    /// Ask a running server whether access to an issue or article is granted
    Check {
        #[arg(long, value_enum, default_value = "issue")]
        kind: Kind,
        localidentifier: String,
        #[arg(long)]
        ticket: Option<String>,
        #[arg(long)]
        casa_token: Option<String>,
        /// Request the raw datastream decision (issues only)
        #[arg(long)]
        raw: bool,
    },
    /// Fetch the embargo report for a journal
    Restrictions { journal_code: String },
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum Kind {
    Issue,
    Article,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Ticket { key, localidentifier } => {
            println!("{}", TicketSigner::new(key).ticket_for(&localidentifier));
        }
        Commands::MintCasa { secret, subscription, cidr, ttl } => {
            let expiry = expiry_ms(Utc::now().timestamp_millis(), ttl);
            println!(
                "{}",
                CasaIssuer::new(secret).mint(SubscriptionId(subscription), expiry, &cidr)
            );
        }
        Commands::Check { kind, localidentifier, ticket, casa_token, raw } => {
            let path = match (kind, raw) {
                (Kind::Issue, false) => format!("/access/issues/{}", localidentifier),
                (Kind::Issue, true) => format!("/access/issues/{}/raw", localidentifier),
                (Kind::Article, _) => format!("/access/articles/{}", localidentifier),
            };
            let mut query = Vec::new();
            if let Some(ticket) = ticket {
                query.push(("ticket", ticket));
            }
            if let Some(token) = casa_token {
                query.push(("casa_token", token));
            }
            let res = reqwest::Client::new()
                .get(format!("{}{}", cli.url, path))
                .query(&query)
                .send()
                .await?;
            print_response(res).await?;
        }
        Commands::Restrictions { journal_code } => {
            let url = format!("{}/webservices/restrictions/{}", cli.url, journal_code);
            let res = reqwest::get(url).await?;
            print_response(res).await?;
        }
    }

    Ok(())
}

fn expiry_ms(now_ms: i64, ttl_secs: i64) -> i64 {
    now_ms.saturating_add(ttl_secs.saturating_mul(1000))
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    let text = res.text().await?;
    match serde_json::from_str::<Value>(&text) {
        Ok(json) => println!("{} {}", status, serde_json::to_string_pretty(&json)?),
        Err(_) => println!("{} {}", status, text),
    }
    Ok(())
}
