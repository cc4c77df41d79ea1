//! Streaming Example
//!
//! Streams the full three-line element catalog line by line instead of
//! buffering it, using the blocking client on a plain thread.
//!
//! ```bash
//! cargo run --example stream_lines
//! ```

use spacetrack::schema::greater_than;
use spacetrack::{BlockingSpaceTrackClient, Query};
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let client = BlockingSpaceTrackClient::builder().build_blocking()?;

    let query = Query::new("gp")
        .predicate("epoch", greater_than("now-30"))
        .predicate("decay_date", Option::<String>::None)
        .predicate("format", "3le")
        .iter_lines();

    let mut objects = 0usize;
    if let Some(lines) = client.generic_request(query)?.into_lines() {
        for line in lines {
            if line?.starts_with("0 ") {
                objects += 1;
            }
        }
    }
    println!("{objects} objects in the catalog");

    client.close()?;
    Ok(())
}
