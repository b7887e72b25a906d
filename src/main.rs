//! storefront-dal - command-line entry point.
//!
//! Runs catalog queries and account maintenance against the configured
//! database and prints the results as JSON.

use clap::Parser;
use storefront_dal::config::{Command, Config};
use storefront_dal::db::{Dao, DbPool, UnitOfWork};
use storefront_dal::repositories::ProductCriteria;
use storefront_dal::services::{AccountService, CatalogService};
use storefront_dal::specifications::{Category, Ordering, Pagination, ProductFilter, ProductSearch};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Initialize the tracing subscriber for logging.
fn init_tracing(config: &Config) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    // Logs go to stderr so stdout stays valid JSON.
    let subscriber = tracing_subscriber::registry().with(filter);

    if config.json_logs {
        subscriber
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        subscriber
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn run(config: &Config, uow: &UnitOfWork) -> Result<(), Box<dyn std::error::Error>> {
    let catalog = CatalogService::new(uow);

    match &config.command {
        Command::Products {
            page,
            per_page,
            ordering,
            gender,
            min_year,
            max_year,
            search,
            master,
            sub,
            article,
        } => {
            let mut filter = ProductFilter::new();
            filter.set_year_range(*min_year, *max_year);
            if let Some(genders) = gender {
                filter.set_genders_csv(genders);
            }

            let mut criteria = ProductCriteria::new(Pagination::new(*page, *per_page))
                .with_ordering(Ordering::for_products(ordering.as_deref()))
                .with_filter(filter)
                .with_search(ProductSearch::new(search.as_deref()));
            if let Some(master) = master {
                criteria = criteria.with_category(Category::new(*master, *sub, *article));
            }

            print_json(&catalog.catalog(&criteria).await?)
        }
        Command::Menu { master: Some(id) } => print_json(&catalog.master_category(*id).await?),
        Command::Menu { master: None } => print_json(&catalog.category_menu().await?),
        Command::Filters => print_json(&catalog.filters().await?),
        Command::PurgeTokens => {
            let accounts = AccountService::new(uow, config.activation_ttl()?);
            let removed = accounts.purge_expired_tokens().await?;
            info!(removed, "Expired tokens purged");
            print_json(&serde_json::json!({ "removed": removed }))
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::parse();

    init_tracing(&config);

    let db_config = config.database()?;
    info!(
        db_type = %db_config.db_type,
        "Starting storefront-dal v{}",
        env!("CARGO_PKG_VERSION")
    );

    let pool = DbPool::connect(&db_config).await?;
    let mut uow = UnitOfWork::new(Dao::new(pool.clone()));
    if let Some(level) = config.isolation {
        uow = uow.with_isolation(level);
    }

    let result = run(&config, &uow).await;

    info!(stats = ?uow.dao().stats(), "Transaction statistics");
    pool.close().await;

    if let Err(e) = result {
        error!(error = %e, "Command failed");
        return Err(e);
    }
    Ok(())
}
