//! Shared Quota Example
//!
//! Two clients drawing from one rate-limit store, as several workers of the
//! same account would. The callback reports every time a call has to wait.
//!
//! ```bash
//! RUST_LOG=spacetrack=info cargo run --example shared_quota
//! ```

use chrono::{DateTime, Utc};
use spacetrack::resilience::{MemoryStore, RateLimitStore};
use spacetrack::{Query, RateLimitCallback, SpaceTrackClient};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let store: Arc<dyn RateLimitStore> = Arc::new(MemoryStore::new());
    let callback: RateLimitCallback = Arc::new(|until| {
        let until: DateTime<Utc> = until.into();
        println!("rate limited until {}", until.format("%H:%M:%S"));
    });

    let clients = (0..2)
        .map(|_| {
            SpaceTrackClient::builder()
                .rate_limit_store(store.clone(), "demo:")
                .callback(callback.clone())
                .build()
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut tasks = Vec::new();
    for (i, client) in clients.iter().enumerate() {
        tasks.push(async move {
            for page in 0..20 {
                let query = Query::new("boxscore").predicate("limit", format!("1,{}", i * 20 + page));
                client.generic_request(query).await?;
            }
            spacetrack::Result::Ok(())
        });
    }
    for result in futures::future::join_all(tasks).await {
        result?;
    }

    println!(
        "{} admissions in the last minute",
        clients[0].rate_limiter().admitted_this_minute()?
    );
    for client in clients {
        client.close().await?;
    }
    Ok(())
}
