use actix_web::{middleware::Logger, web, App, HttpServer};
use std::sync::Arc;

use zaintech::catalog::seed_blog_posts;
use zaintech::config::{AppConfig, StoreBackend};
use zaintech::members::{MemberProvider, RemoteMemberProvider, StaticMemberProvider};
use zaintech::server;
use zaintech::templates::{load_templates, watch_templates};
use zaintech::{EntityStore, MemoryStore, ScyllaStore, StoreStateManager};

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();
    let config = AppConfig::from_env()?;

    tracing_subscriber::fmt().with_max_level(config.log_level).init();
    tracing::info!("Starting ZainTech site");

    let store: Arc<dyn EntityStore> = match &config.store {
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory store. Data is lost on restart.");
            Arc::new(MemoryStore::new())
        }
        StoreBackend::Scylla(scylla) => Arc::new(ScyllaStore::connect(scylla).await?),
    };

    let members: Arc<dyn MemberProvider> = match &config.members_api {
        Some(api) => {
            tracing::info!("Using member API at {}", api.base_url);
            Arc::new(RemoteMemberProvider::new(api))
        }
        None => {
            tracing::warn!("MEMBERS_API_URL not set. Using in-process member accounts.");
            Arc::new(StaticMemberProvider::new())
        }
    };

    let state_manager = Arc::new(StoreStateManager::new(store, members).with_config(&config));
    state_manager
        .seed_configured_admin(&config.admin_email, config.admin_password.as_deref())
        .await?;
    if config.seed_defaults {
        seed_blog_posts(state_manager.store()).await?;
    }

    let template_cache = load_templates(&config.template_dir)?;
    let template_cache_clone = template_cache.clone();
    let template_dir = config.template_dir.clone();
    tokio::spawn(async move {
        if let Err(e) = watch_templates(template_cache_clone, template_dir).await {
            tracing::error!("Template watcher failed: {}", e);
        }
    });

    let state_data = web::Data::new(state_manager);
    let template_data = web::Data::new(template_cache);

    tracing::info!("Starting HTTP server on {}", config.bind_addr);
    HttpServer::new(move || {
        App::new()
            .app_data(state_data.clone())
            .app_data(template_data.clone())
            .wrap(Logger::default())
            .configure(server::routes)
    })
    .bind(&config.bind_addr)?
    .run()
    .await?;

    Ok(())
}
