//! One-shot bootstrap for the target store: creates every collection and
//! the `hotspots.geo_location` geospatial index. There is no schema
//! migration to run against a document store, so this stands in for one.

use dotenv::dotenv;
use graph_etl::config::Settings;
use graph_etl::sink::ArangoSink;

const DOCUMENT_COLLECTIONS: &[&str] = &["accounts", "hotspots", "cities", "balances"];
const EDGE_COLLECTIONS: &[&str] = &["payments", "witnesses"];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt::init();

    let settings = Settings::new()?;
    let sink = ArangoSink::new(
        settings.arango.url.clone(),
        settings.arango.database_name.clone(),
        settings.arango.username.clone(),
        settings.arango.password.clone(),
    );

    for collection in DOCUMENT_COLLECTIONS {
        sink.ensure_collection(collection, false).await?;
        println!("ensured document collection: {collection}");
    }

    for collection in EDGE_COLLECTIONS {
        sink.ensure_collection(collection, true).await?;
        println!("ensured edge collection: {collection}");
    }

    sink.ensure_geo_index("hotspots", "geo_location").await?;
    println!("ensured geo index on hotspots.geo_location");

    println!("target store initialized successfully");
    Ok(())
}
