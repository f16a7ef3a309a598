use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use storefront_ai_core::config::Settings;
use storefront_ai_core::domain::Product;
use storefront_ai_core::llm::AdapterManager;

#[derive(Debug, Parser)]
#[command(
    name = "storefront-ai",
    about = "Product recommendations from the configured AI providers"
)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Generate recommendations for one product and print them as JSON.
    Recommend {
        #[arg(long)]
        product_name: String,

        #[arg(long)]
        description: Option<String>,

        #[arg(long)]
        price: Option<f64>,

        #[arg(long)]
        category: Option<String>,
    },
    /// Probe every configured provider.
    Health,
    /// Print adapter info for every configured provider.
    Providers,
}

impl Command {
    fn product(&self) -> Option<Product> {
        let Command::Recommend {
            product_name,
            description,
            price,
            category,
        } = self
        else {
            return None;
        };
        Some(Product {
            id: None,
            name: product_name.clone(),
            description: description.clone(),
            price: *price,
            category: category.clone(),
        })
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_tracing::layer())
        .init();
    settings.warn_ignored();

    let args = Args::parse();
    let manager = AdapterManager::initialize(settings.ai).await;

    match &args.command {
        Command::Recommend { .. } => {
            let product = args.command.product().unwrap_or_default();
            match manager.generate_with_provider(&product).await {
                Ok((provider, res)) => {
                    tracing::info!(
                        %provider,
                        count = res.recommendations.len(),
                        "recommendations generated"
                    );
                    println!("{}", serde_json::to_string_pretty(&res)?);
                }
                Err(err) => {
                    println!("{}", serde_json::to_string_pretty(&err.to_api_error())?);
                    let err = anyhow::Error::new(err);
                    sentry_anyhow::capture_anyhow(&err);
                    tracing::error!(error = %err, "recommendation run failed");
                    return Err(err);
                }
            }
        }
        Command::Health => {
            let report = manager.health_status().await;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Providers => {
            println!("{}", serde_json::to_string_pretty(&manager.info())?);
        }
    }

    Ok(())
}

fn init_sentry(settings: &Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}
