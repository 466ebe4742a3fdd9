//! Storefront CLI
//!
//! Offline price conversion against the configured exchange rates, plus
//! fixtures for exercising the payment flow against a database.

use anyhow::Result;
use clap::{Parser, Subcommand};

use storefront_repo::build_repo;
use storefront_types::{
    ConvertResponse, CreateOrderRequest, Currency, ExchangeRateMatrix, OrderId,
    StorefrontRepository, UserId, format_price,
};

#[derive(Parser)]
#[command(name = "storefront")]
#[command(author, version, about = "Storefront pricing and payment tools", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert an amount using the RATE_* environment variables
    Convert {
        amount: f64,
        /// Source currency (toman, dollar, euro)
        #[arg(long, value_parser = parse_currency)]
        from: Currency,
        /// Target currency (toman, dollar, euro)
        #[arg(long, value_parser = parse_currency)]
        to: Currency,
    },
    /// Format an amount for display without converting it
    Format {
        amount: f64,
        #[arg(long, value_parser = parse_currency, default_value = "toman")]
        currency: Currency,
    },
    /// Show configured rates out of a currency
    Rates {
        #[arg(long, value_parser = parse_currency, default_value = "toman")]
        base: Currency,
        /// Also list pairs with no rate
        #[arg(long)]
        missing: bool,
    },
    /// Order fixtures
    Order {
        #[arg(long, env = "DATABASE_URL")]
        database_url: String,
        #[command(subcommand)]
        action: OrderCommands,
    },
    /// Session fixtures
    Session {
        #[arg(long, env = "DATABASE_URL")]
        database_url: String,
        #[command(subcommand)]
        action: SessionCommands,
    },
}

#[derive(Subcommand)]
enum OrderCommands {
    /// Create an unpaid order
    Create {
        /// Owner (UUID)
        #[arg(long, value_parser = parse_user_id)]
        user: UserId,
        /// Payable total in Toman
        #[arg(long)]
        amount: i64,
    },
    /// Show an order and its payment record
    Get {
        #[arg(value_parser = parse_order_id)]
        id: OrderId,
    },
}

#[derive(Subcommand)]
enum SessionCommands {
    /// Create a session and print its token
    Create {
        #[arg(long, value_parser = parse_user_id)]
        user: UserId,
        /// Lifetime in hours
        #[arg(long, default_value = "24")]
        ttl_hours: i64,
    },
}

fn parse_currency(s: &str) -> Result<Currency> {
    s.parse()
        .map_err(|_| anyhow::anyhow!("Unknown currency: {}. Supported: toman, dollar, euro", s))
}

fn parse_user_id(s: &str) -> Result<UserId> {
    s.parse()
        .map_err(|_| anyhow::anyhow!("Invalid user ID: {}", s))
}

fn parse_order_id(s: &str) -> Result<OrderId> {
    s.parse()
        .map_err(|_| anyhow::anyhow!("Invalid order ID: {}", s))
}

fn convert(rates: &ExchangeRateMatrix, amount: f64, from: Currency, to: Currency) -> ConvertResponse {
    let converted = rates.convert(amount, from, to);
    ConvertResponse {
        amount,
        from,
        to,
        converted,
        formatted: format_price(converted, to),
    }
}

fn rates_from_env() -> ExchangeRateMatrix {
    ExchangeRateMatrix::from_vars(|key: &str| std::env::var(key).ok())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Rate parsing warnings go to stderr so stdout stays machine-readable
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Convert { amount, from, to } => {
            let rates = rates_from_env();
            if from != to && rates.rate(from, to).is_none() {
                eprintln!("! No rate for {} -> {}, amount passed through", from, to);
            }
            let response = convert(&rates, amount, from, to);
            println!("{}", serde_json::to_string_pretty(&response)?);
        }

        Commands::Format { amount, currency } => {
            println!("{}", format_price(amount, currency));
        }

        Commands::Rates { base, missing } => {
            let rates = rates_from_env();
            println!("{}", serde_json::to_string_pretty(&rates.rates_from(base))?);
            if missing {
                for (from, to) in rates.missing_pairs() {
                    println!("missing: {} -> {}", from, to);
                }
            }
        }

        Commands::Order {
            database_url,
            action,
        } => {
            let repo = build_repo(&database_url).await?;
            match action {
                OrderCommands::Create { user, amount } => {
                    let order = repo
                        .create_order(CreateOrderRequest {
                            user_id: user,
                            amount,
                        })
                        .await?;
                    println!("{}", serde_json::to_string_pretty(&order)?);
                }
                OrderCommands::Get { id } => {
                    let order = repo
                        .get_order(id)
                        .await?
                        .ok_or_else(|| anyhow::anyhow!("Order {} not found", id))?;
                    let details = repo.get_payment_details(id).await?;
                    println!(
                        "{}",
                        serde_json::to_string_pretty(&serde_json::json!({
                            "order": order,
                            "payment": details,
                        }))?
                    );
                }
            }
        }

        Commands::Session {
            database_url,
            action,
        } => {
            let repo = build_repo(&database_url).await?;
            match action {
                SessionCommands::Create { user, ttl_hours } => {
                    if ttl_hours <= 0 {
                        anyhow::bail!("--ttl-hours must be positive");
                    }
                    let (session, token) = repo
                        .create_session(user, chrono::Duration::hours(ttl_hours))
                        .await?;
                    eprintln!("✓ Session for {} expires at {}", session.user_id, session.expires_at);
                    println!("{}", token);
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_convert() {
        let cli = Cli::try_parse_from([
            "storefront", "convert", "12.5", "--from", "dollar", "--to", "toman",
        ])
        .unwrap();

        match cli.command {
            Commands::Convert { amount, from, to } => {
                assert_eq!(amount, 12.5);
                assert_eq!(from, Currency::Dollar);
                assert_eq!(to, Currency::Toman);
            }
            _ => panic!("expected convert"),
        }
    }

    #[test]
    fn test_unknown_currency_rejected() {
        let result =
            Cli::try_parse_from(["storefront", "format", "10", "--currency", "yen"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_order_create_needs_valid_user() {
        let result = Cli::try_parse_from([
            "storefront",
            "order",
            "--database-url",
            "sqlite::memory:",
            "create",
            "--user",
            "nobody",
            "--amount",
            "1000",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_convert_formats_target_currency() {
        let rates = ExchangeRateMatrix::empty()
            .with_rate(Currency::Dollar, Currency::Toman, 60_000.0)
            .unwrap();

        let response = convert(&rates, 12.5, Currency::Dollar, Currency::Toman);
        assert_eq!(response.converted, 750_000.0);
        assert_eq!(response.formatted, "۷۵۰٬۰۰۰ تومان");
    }

    #[test]
    fn test_convert_without_rate_passes_through() {
        let response = convert(
            &ExchangeRateMatrix::empty(),
            10.0,
            Currency::Euro,
            Currency::Dollar,
        );
        assert_eq!(response.converted, 10.0);
        assert_eq!(response.formatted, "$10");
    }
}
