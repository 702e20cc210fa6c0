//! Dashboard binary.
//!
use std::{net::SocketAddr, sync::Arc};

use anyhow::Result;
use clap::Parser;
use common::store::DocumentStore;
use dashboard::{router, session::session_key, Dashboard};
use env_logger::TimestampPrecision;
use uuid::Uuid;

#[derive(Parser, Debug)]
#[clap(author, version)]
struct Args {
    /// Address to serve the dashboard on
    #[clap(long, env = "DASHBOARD_ADDRESS", default_value = "127.0.0.1:5001")]
    server_address: String,

    /// Document store shared with the prediction service
    #[clap(long, env = "DATABASE_URL", default_value = "signs.db")]
    database_url: String,

    /// Secret the session cookie signing key is derived from
    #[clap(long, env = "SESSION_SECRET", hide_env_values = true)]
    session_secret: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Setup logger
    env_logger::builder()
        .format_timestamp(Some(TimestampPrecision::Millis))
        .init();

    let secret = match args.session_secret {
        Some(secret) => secret,
        None => {
            log::warn!("SESSION_SECRET not set, signing session cookies with a random key");
            format!("{}{}", Uuid::new_v4(), Uuid::new_v4())
        }
    };

    log::info!("Reading predictions from {}", &args.database_url);
    let store = Arc::new(DocumentStore::open(&args.database_url)?);

    let app = router(Arc::new(Dashboard::new(store)), session_key(&secret));

    // Serve HTTP server
    let addr: SocketAddr = args.server_address.parse()?;
    log::info!("Listening on {addr}");
    axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .await?;

    Ok(())
}
