//! Basic Query Example
//!
//! Fetches the latest general perturbations record for the ISS, then the same
//! data with typed fields.
//!
//! Credentials come from `SPACETRACK_IDENTITY` / `SPACETRACK_PASSWORD` (or the
//! OS keyring). Run with:
//!
//! ```bash
//! RUST_LOG=spacetrack=debug cargo run --example basic_query
//! ```

use spacetrack::schema::greater_than;
use spacetrack::{Query, SpaceTrackClient, TypedValue};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let client = SpaceTrackClient::builder().build()?;

    let predicates = client.get_predicates("gp", None).await?;
    println!("gp accepts {} predicates", predicates.len());

    let latest = client
        .generic_request(
            Query::new("gp")
                .predicate("norad_cat_id", 25544)
                .predicate("orderby", "epoch desc")
                .predicate("limit", 1),
        )
        .await?
        .into_json();
    println!("{}", serde_json::to_string_pretty(&latest)?);

    let rows = client
        .generic_request(
            Query::new("decay")
                .predicate("decay_epoch", greater_than("now-7"))
                .parse_types(),
        )
        .await?
        .into_typed()
        .unwrap_or_default();
    for row in &rows {
        if let Some(TypedValue::Text(name)) = row.get("OBJECT_NAME") {
            println!("decayed: {name}");
        }
    }

    client.close().await?;
    Ok(())
}
