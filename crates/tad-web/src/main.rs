use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use tad_core::catalog::seed_catalog;
use tad_core::config::SimulatorConfig;
use tad_core::simulator::LifecycleSimulator;
use tad_state::SqliteDatabase;
use tad_web::api::ApiServer;

#[derive(Parser, Debug)]
#[command(name = "tad-web", about = "Serve the task automation dashboard API")]
struct Args {
    /// Database connection string
    #[arg(long, default_value = "sqlite://./.tad/tad.db?mode=rwc")]
    database_url: String,
    /// Address to bind (e.g., 127.0.0.1:3001)
    #[arg(long, default_value = "127.0.0.1:3001")]
    addr: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let database_url = std::env::var("DATABASE_URL").unwrap_or(args.database_url);

    let db = Arc::new(SqliteDatabase::new(&database_url).await?);
    db.run_migrations().await?;
    seed_catalog(&*db).await?;

    let config = SimulatorConfig::default();
    let _simulator = LifecycleSimulator::with_config(db.clone(), config.clone()).start();

    let server = ApiServer::with_config(db, config);
    let addr: SocketAddr = args.addr.parse()?;
    let _server = server.serve(addr).await;
    tracing::info!("serving on http://{}", addr);
    futures::future::pending::<()>().await;
    Ok(())
}
