mod config;
mod hygiene;
mod storage;
mod tg;

use dotenvy::dotenv;
use teloxide::prelude::*;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let bot = Bot::from_env();
    let config = config::Config::from_env()?;

    // путь к базе (можно через ENV)
    let database_url =
        std::env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite:movies.db".to_string());
    let catalog = storage::CatalogStore::connect(&database_url).await?;
    let last_messages = hygiene::LastMessages::new();

    tg::run(bot, config, catalog, last_messages).await;
    Ok(())
}
