use stencil_core::prelude::*;
use stencil_examples::messages::{GET_MESSAGE, LIST_MESSAGES};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Resolves a few templates offline and prints the resulting URLs.
///
/// Logs the template cache at `trace` unless `RUST_LOG` says otherwise.
fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "stencil_core=trace".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let client = RestClient::new(ClientConfig::https("api.example.com"))?;

    for id in ["m-1", "m/2", "hello world"] {
        let url = client.resolve_target(GET_MESSAGE, &PathParams::new().with("message", id), &QueryMap::new())?;
        println!("{url}");
    }

    let overrides: QueryMap = [("MaxResults", "10"), ("Version", "2024-06-01")].into_iter().collect();
    let url = client.resolve_target(LIST_MESSAGES, &PathParams::new().with("mailbox", "inbox"), &overrides)?;
    println!("{url}");

    match client.resolve_target("/apis/v1/messages/{message", &PathParams::new(), &QueryMap::new()) {
        Ok(url) => println!("unexpected: {url}"),
        Err(e) => println!("rejected: {e}"),
    }

    let stats = client.cache_stats();
    println!(
        "cache: entries={} hits={} misses={}",
        stats.entries, stats.hits, stats.misses
    );
    Ok(())
}
