#[tokio::main]
async fn main() {
    use sqlx::postgres::PgPoolOptions;
    use tower_http::trace::TraceLayer;
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
    use washline_server::{config::ServerConfig, db::PgWorkflowStore, routes};
    use washline_workflow::{Engine, WorkflowService, builtin};

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration from environment
    let config = ServerConfig::from_env().expect("failed to load configuration");
    tracing::info!("Loaded configuration");

    let db_pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.database_url)
        .await
        .expect("failed to connect to database");

    tracing::info!("Running database migrations...");
    sqlx::migrate!("./migrations")
        .run(&db_pool)
        .await
        .expect("failed to run migrations");

    let engine = builtin::register(Engine::builder(), &config.webhook)
        .expect("failed to build webhook client")
        .build();
    let catalog = engine.catalog();
    tracing::info!(
        triggers = catalog.triggers.len(),
        actions = catalog.actions.len(),
        "Registered workflow catalog"
    );

    let service = WorkflowService::new(engine, PgWorkflowStore::new(db_pool));
    let app = routes::router(service).layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(&config.listen_addr)
        .await
        .expect("failed to bind to address");

    tracing::info!("listening on http://{}", config.listen_addr);

    axum::serve(listener, app.into_make_service())
        .await
        .expect("server error");
}
