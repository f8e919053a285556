extern crate dotenv;

use std::sync::Arc;

use dotenv::dotenv;
use testbed_orchestrator::{
    context::{AppContext, ProvisionSettings},
    controllers::container_controller::DockerRuntime,
    db::{
        memory_store::MemoryStore,
        port_registry::{MongoPortRegistryRepository, PortRegistryRepository},
        testbeds::{MongoTestbedRepository, TestbedRepository},
    },
    handlers::testbed_handler::testbed_router,
    utils::{
        docker_utils,
        env_utils::{AppConfig, StoreBackend},
        mongodb_utils,
    },
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    let config = AppConfig::from_env()?;
    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .init();
    tracing::info!("starting in {:?} mode", config.state);

    let runtime = Arc::new(DockerRuntime::new(docker_utils::connect()?));
    let (testbeds, registry): (Arc<dyn TestbedRepository>, Arc<dyn PortRegistryRepository>) =
        match config.store_backend {
            StoreBackend::Mongo => {
                let database =
                    mongodb_utils::connect(&config.database_uri, &config.database_name).await?;
                (
                    Arc::new(MongoTestbedRepository::new(&database)),
                    Arc::new(MongoPortRegistryRepository::new(&database)),
                )
            }
            StoreBackend::Memory => {
                tracing::warn!("using the in-memory store, testbeds will not survive a restart");
                let store = Arc::new(MemoryStore::new());
                (store.clone(), store)
            }
        };

    if let Err(err) = registry.init_registry().await {
        tracing::error!("[ERROR] cannot initialize the port registry: {}", err);
        return Err(err.into());
    }

    let settings = ProvisionSettings {
        image_registry: config.image_registry.clone(),
        ..ProvisionSettings::default()
    };
    let ctx = AppContext::new(runtime, testbeds, registry, settings);
    let app = testbed_router().with_state(ctx);
    let listener = tokio::net::TcpListener::bind(config.listening_socket()).await?;
    tracing::info!("listening on {}", config.listening_socket());
    axum::serve(listener, app).await?;
    Ok(())
}
