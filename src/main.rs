use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tokio::sync::watch;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use taskgate::config::Config;
use taskgate::models::*;
use taskgate::routes::{self, AppState};
use taskgate::services::executor::Executor;
use taskgate::services::inbox::{WebhookEntry, WebhookInbox};
use taskgate::services::queue;
use taskgate::services::store::ResultStore;
use taskgate::services::worker::WorkerPool;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Taskgate API",
        version = "1.0.0",
        description = "Gateway per job asincroni: accoda, esegue verso il servizio a valle e conserva i risultati",
        license(name = "MIT"),
    ),
    paths(
        taskgate::routes::health::health_check,
        taskgate::routes::jobs::submit_job,
        taskgate::routes::jobs::get_job_status,
        taskgate::routes::webhooks::receive_webhook,
        taskgate::routes::webhooks::view_webhook,
        taskgate::routes::webhooks::get_webhook,
    ),
    components(schemas(
        HealthResponse,
        SubmitRequest,
        SubmitResponse,
        StatusResponse,
        StatusKind,
        JobStatus,
        JobRecord,
        WebhookAck,
        WebhookEntry,
        ErrorResponse,
    )),
    tags(
        (name = "Sistema", description = "Health check e info"),
        (name = "Jobs", description = "Invio job e stato"),
        (name = "Webhook", description = "Ricezione e visualizzazione webhook"),
    ),
    servers(
        (url = "http://localhost:5000", description = "Server locale"),
    ),
    modifiers(&SecurityAddon)
)]
struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                utoipa::openapi::security::SecurityScheme::Http(
                    utoipa::openapi::security::HttpBuilder::new()
                        .scheme(utoipa::openapi::security::HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[tokio::main]
async fn main() {
    // Carica variabili da .env
    dotenvy::dotenv().ok();

    // Inizializza logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "taskgate=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Carica configurazione
    let config = Config::from_env();

    // Coda: Redis se configurato, altrimenti in memoria
    let work_queue = match queue::connect(config.redis_url.as_deref(), config.registry_lease()).await {
        Ok(q) => {
            tracing::info!("Coda inizializzata (backend: {})", q.backend());
            q
        }
        Err(e) => {
            tracing::error!("Errore connessione alla coda: {}", e);
            std::process::exit(1);
        }
    };

    // Archivio risultati
    let store = ResultStore::new(config.results_file.clone(), config.retention());
    if let Err(e) = store.ensure_exists() {
        tracing::error!(
            "Errore inizializzazione archivio {}: {}",
            store.path().display(),
            e
        );
        std::process::exit(1);
    }
    tracing::info!("Archivio risultati: {}", store.path().display());

    let executor = match Executor::new(
        store.clone(),
        config.downstream_url.clone(),
        config.downstream_timeout(),
        config.forward_timeout(),
    ) {
        Ok(executor) => Arc::new(executor),
        Err(e) => {
            tracing::error!("Errore creazione client HTTP: {}", e);
            std::process::exit(1);
        }
    };

    // Segnale di shutdown per i task in background
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let inbox = WebhookInbox::new(config.retention());
    let sweeper = inbox.spawn_sweeper(config.sweep_interval(), shutdown_rx.clone());

    let workers = WorkerPool::new(
        work_queue.clone(),
        executor,
        config.workers,
        config.poll_interval(),
    )
    .spawn(shutdown_rx);

    // CORS layer
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let addr: SocketAddr = match format!("{}:{}", config.host, config.port).parse() {
        Ok(addr) => addr,
        Err(e) => {
            tracing::error!("Indirizzo non valido {}:{}: {}", config.host, config.port, e);
            std::process::exit(1);
        }
    };

    let jwt_enabled = config.jwt_secret.is_some();
    let public_url = config.public_url.clone();
    let downstream_url = config.downstream_url.clone();

    let state = AppState::new(config, store, inbox, work_queue);

    // Costruisci router completo con Swagger
    let app = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(routes::create_router(state))
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    tracing::info!("========================================");
    tracing::info!("  Taskgate v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("========================================");
    tracing::info!("Server: http://{}", addr);
    tracing::info!("Swagger UI: http://{}/swagger-ui/", addr);
    tracing::info!("Servizio a valle: {}", downstream_url);
    tracing::info!("----------------------------------------");
    tracing::info!("Endpoints:");
    tracing::info!("  GET  /api/v1/health              - Health check");
    tracing::info!("  POST /submit                     - Invia job");
    tracing::info!("  GET  /status/:job_id             - Stato job");
    tracing::info!("  POST /dashboard_webhook_receiver - Ricevi webhook");
    tracing::info!("  GET  /view_webhook/:job_id       - Viewer webhook");
    tracing::info!("  GET  /api/v1/webhooks/:job_id    - Webhook in JSON");
    tracing::info!("----------------------------------------");
    if jwt_enabled {
        tracing::info!("Autenticazione JWT: attiva su /submit");
    } else {
        tracing::warn!("Autenticazione JWT: NON configurata (imposta TASKGATE_JWT_SECRET)");
    }
    match public_url {
        Some(url) => tracing::info!("URL pubblico per i webhook: {}", url),
        None => tracing::warn!(
            "URL pubblico NON configurato (imposta TASKGATE_PUBLIC_URL): create_webhook non disponibile"
        ),
    }

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!("Impossibile ascoltare su {}: {}", addr, e);
            std::process::exit(1);
        }
    };

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        tracing::error!("Errore server: {}", e);
    }

    tracing::info!("Arresto in corso, attendo i worker...");
    let _ = shutdown_tx.send(true);
    if let Err(e) = workers.await {
        tracing::error!("Task worker terminato con errore: {}", e);
    }
    if let Err(e) = sweeper.await {
        tracing::error!("Task pulizia inbox terminato con errore: {}", e);
    }
    tracing::info!("Arresto completato");
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Impossibile installare il gestore Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Impossibile installare il gestore SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Segnale di arresto ricevuto");
}
