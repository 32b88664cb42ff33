use crate::{
    api::routes::{
        attach_trade_proof, create_bounty, create_game, create_submission, delete_bounty,
        delete_game, get_bounty, get_clan_snapshot, get_game, get_game_version, get_settings,
        get_submission, health_check, list_bounties, list_game_submissions, list_games,
        list_submissions, refresh_clan, remove_team_member, review_bingo_submission,
        review_submission, serve_media, set_game_active, submit_tile, sync_player, update_bounty,
        update_settings,
    },
    config::Settings,
    domain::{
        BingoService, BingoStore, BountyService, BountyStore, ClanService, ClanStore, Identity,
        OperatorDirectory,
    },
    infra::{
        blob::{BlobStore, LocalBlobStore},
        db::{DBConnection, DatabasePoolConfig, DatabaseType},
        file_utils::create_folder,
        stats::StatsClient,
        webhook::WebhookClient,
    },
};
use anyhow::anyhow;
use axum::{
    body::Body,
    extract::{connect_info::IntoMakeServiceWithConnectInfo, ConnectInfo, DefaultBodyLimit, Request},
    http::{Extensions, HeaderValue},
    middleware::{self, AddExtension, Next},
    response::IntoResponse,
    routing::{delete, get, post, put},
    serve::Serve,
    Router,
};
use hyper::{
    header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
    Method,
};
use log::{error, info, warn};
use reqwest_middleware::{
    reqwest::{self, Client},
    ClientBuilder, ClientWithMiddleware, Middleware,
};
use reqwest_retry::{
    default_on_request_failure, default_on_request_success, policies::ExponentialBackoff,
    RetryTransientMiddleware, Retryable, RetryableStrategy,
};
use std::{net::SocketAddr, str::FromStr, sync::Arc, time::Duration};
use tokio::{
    net::TcpListener,
    select,
    signal::unix::{signal, SignalKind},
};
use tower_http::cors::{AllowOrigin, CorsLayer};

/// Headroom above `max_upload_bytes` for the multipart framing and text fields
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

pub struct Application {
    server: Serve<
        TcpListener,
        IntoMakeServiceWithConnectInfo<Router, SocketAddr>,
        AddExtension<Router, ConnectInfo<SocketAddr>>,
    >,
}

impl Application {
    pub async fn build(config: Settings) -> Result<Self, anyhow::Error> {
        let address = format!(
            "{}:{}",
            config.api_settings.domain, config.api_settings.port
        );
        let listener = SocketAddr::from_str(&address)?;
        let app_state = build_app(config.clone()).await?;
        let server = build_server(listener, app_state, config.api_settings.origins).await?;
        Ok(Self { server })
    }

    pub async fn run_until_stopped(self) -> Result<(), anyhow::Error> {
        info!("Starting server...");
        match self.server.with_graceful_shutdown(shutdown_signal()).await {
            Ok(_) => {
                info!("Shutdown complete");
                Ok(())
            }
            Err(e) => {
                error!("Server shutdown error: {}", e);
                Err(anyhow!("Error during server shutdown: {}", e))
            }
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub clan: Arc<ClanService>,
    pub bounties: Arc<BountyService>,
    pub bingo: Arc<BingoService>,
    pub identity: Arc<dyn Identity>,
    pub blob: Arc<dyn BlobStore>,
    pub max_upload_bytes: usize,
}

pub async fn build_app(config: Settings) -> Result<AppState, anyhow::Error> {
    create_folder(&config.db_settings.data_folder);
    let pool_config: DatabasePoolConfig = config.db_settings.clone().into();

    let clan_db = DBConnection::new(
        &config.db_settings.data_folder,
        "clan",
        pool_config.clone(),
        DatabaseType::Clan,
    )
    .await
    .map_err(|e| anyhow!("failed to open clan database: {}", e))?;

    let bingo_db = DBConnection::new(
        &config.db_settings.data_folder,
        "bingo",
        pool_config,
        DatabaseType::Bingo,
    )
    .await
    .map_err(|e| anyhow!("failed to open bingo database: {}", e))?;

    let stats_client = build_reqwest_client_with_timeout(Duration::from_secs(
        config.stats_settings.timeout_secs,
    ))
    .map_err(|e| anyhow!("failed to build stats http client: {}", e))?;
    let stats = Arc::new(StatsClient::new(stats_client, &config.stats_settings)?);

    let notifier = Arc::new(WebhookClient::new(
        build_reqwest_client(),
        &config.webhook_settings,
    ));
    if config.webhook_settings.url.is_none() {
        warn!("no webhook url configured, submission notifications are disabled");
    }

    let blob: Arc<dyn BlobStore> = Arc::new(LocalBlobStore::new(
        &config.media_settings.media_folder,
        &config.media_settings.public_base_url,
    ));

    let bounty_store = BountyStore::new(clan_db.clone());
    let clan = ClanService::new(
        stats,
        ClanStore::new(clan_db),
        bounty_store.clone(),
        config.stats_settings.group_id,
    );
    let bounties = BountyService::new(bounty_store, blob.clone(), notifier.clone());
    let bingo = BingoService::new(BingoStore::new(bingo_db), blob.clone(), notifier);

    let identity = Arc::new(OperatorDirectory::new(&config.auth_settings));

    Ok(AppState {
        clan: Arc::new(clan),
        bounties: Arc::new(bounties),
        bingo: Arc::new(bingo),
        identity,
        blob,
        max_upload_bytes: config.api_settings.max_upload_bytes,
    })
}

pub async fn build_server(
    socket_addr: SocketAddr,
    app_state: AppState,
    origins: Vec<String>,
) -> Result<
    Serve<
        TcpListener,
        IntoMakeServiceWithConnectInfo<Router, SocketAddr>,
        AddExtension<Router, ConnectInfo<SocketAddr>>,
    >,
    anyhow::Error,
> {
    let listener = TcpListener::bind(socket_addr).await?;

    info!("Setting up service");
    let app = app(app_state, origins);
    let server = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    );
    info!(
        "Service running @: http://{}:{}",
        socket_addr.ip(),
        socket_addr.port()
    );
    Ok(server)
}

pub fn app(app_state: AppState, origins: Vec<String>) -> Router {
    let origins: Vec<HeaderValue> = origins
        .into_iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([ACCEPT, CONTENT_TYPE, AUTHORIZATION])
        .allow_origin(AllowOrigin::list(origins))
        .allow_credentials(true);

    let body_limit = app_state.max_upload_bytes + MULTIPART_OVERHEAD_BYTES;

    let clan_endpoints = Router::new()
        .route("/snapshot", get(get_clan_snapshot))
        .route("/refresh", post(refresh_clan))
        .route("/sync/{index}", post(sync_player));

    let bingo_endpoints = Router::new()
        .route("/games", get(list_games).post(create_game))
        .route("/games/{game_id}", get(get_game).delete(delete_game))
        .route("/games/{game_id}/active", put(set_game_active))
        .route("/games/{game_id}/version", get(get_game_version))
        .route("/games/{game_id}/submissions", get(list_game_submissions))
        .route("/submissions", post(submit_tile))
        .route(
            "/submissions/{submission_id}/review",
            post(review_bingo_submission),
        )
        .route(
            "/teams/{team_id}/members/{player_name}",
            delete(remove_team_member),
        );

    let api_endpoints = Router::new()
        .route("/health_check", get(health_check))
        .route("/bounties", get(list_bounties).post(create_bounty))
        .route(
            "/bounties/{bounty_id}",
            get(get_bounty).put(update_bounty).delete(delete_bounty),
        )
        .route("/submissions", get(list_submissions).post(create_submission))
        .route("/submissions/{submission_id}", get(get_submission))
        .route(
            "/submissions/{submission_id}/review",
            post(review_submission),
        )
        .route(
            "/submissions/{submission_id}/trade_proof",
            post(attach_trade_proof),
        )
        .route("/settings", get(get_settings).put(update_settings))
        .nest("/clan", clan_endpoints)
        .nest("/bingo", bingo_endpoints);

    Router::new()
        .nest("/api/v1", api_endpoints)
        .route("/media/{bucket}/{*name}", get(serve_media))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(middleware::from_fn(log_request))
        .with_state(Arc::new(app_state))
        .layer(cors)
}

async fn log_request(request: Request<Body>, next: Next) -> impl IntoResponse {
    let now = time::OffsetDateTime::now_utc();
    let path = request
        .uri()
        .path_and_query()
        .map(|p| p.as_str())
        .unwrap_or_default();
    info!(target: "http_request","new request, {} {}", request.method().as_str(), path);

    let response = next.run(request).await;
    let response_time = time::OffsetDateTime::now_utc() - now;
    info!(target: "http_response", "response, code: {}, time: {}", response.status().as_str(), response_time);

    response
}

/// Transient failures are retried, a 429 is handed straight back so the caller paces the next attempt
struct RateLimitIsFatal;

impl RetryableStrategy for RateLimitIsFatal {
    fn handle(
        &self,
        res: &Result<reqwest::Response, reqwest_middleware::Error>,
    ) -> Option<Retryable> {
        match res {
            Ok(response) if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS => {
                Some(Retryable::Fatal)
            }
            Ok(response) => default_on_request_success(response),
            Err(error) => default_on_request_failure(error),
        }
    }
}

fn with_middleware(client: Client) -> ClientWithMiddleware {
    let retry_policy = ExponentialBackoff::builder().build_with_max_retries(3);
    ClientBuilder::new(client)
        .with(RetryTransientMiddleware::new_with_policy_and_strategy(
            retry_policy,
            RateLimitIsFatal,
        ))
        .with(LoggingMiddleware)
        .build()
}

pub fn build_reqwest_client() -> ClientWithMiddleware {
    with_middleware(Client::new())
}

pub fn build_reqwest_client_with_timeout(
    timeout: Duration,
) -> Result<ClientWithMiddleware, reqwest::Error> {
    let client = Client::builder().timeout(timeout).build()?;
    Ok(with_middleware(client))
}

struct LoggingMiddleware;

#[async_trait::async_trait]
impl Middleware for LoggingMiddleware {
    async fn handle(
        &self,
        req: reqwest::Request,
        extensions: &mut Extensions,
        next: reqwest_middleware::Next<'_>,
    ) -> reqwest_middleware::Result<reqwest::Response> {
        let method = req.method().clone();
        let url = req.url().clone();

        info!("Making {} request to: {}", method, url);

        let result = next.run(req, extensions).await;

        match &result {
            Ok(response) => {
                info!("{} {} -> Status: {}", method, url, response.status());
            }
            Err(error) => {
                warn!("{} {} -> Error: {:?}", method, url, error);
            }
        }

        result
    }
}

async fn shutdown_signal() {
    let (mut sigint, mut sigterm) = match (
        signal(SignalKind::interrupt()),
        signal(SignalKind::terminate()),
    ) {
        (Ok(sigint), Ok(sigterm)) => (sigint, sigterm),
        (Err(e), _) | (_, Err(e)) => {
            error!("failed to install signal handlers, falling back to ctrl-c: {}", e);
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("failed to listen for ctrl-c: {}", e);
            }
            return;
        }
    };

    select! {
        _ = sigint.recv() => info!("Received SIGINT signal"),
        _ = sigterm.recv() => info!("Received SIGTERM signal"),
    }
}
