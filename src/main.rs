use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{error, info};
use whale_swap_tracker::config::AppConfig;
use whale_swap_tracker::database::address_book::{load_addresses, refresh_periodically, AddressBook};
use whale_swap_tracker::database::connection;
use whale_swap_tracker::database::repository::{PostgresSwapStore, SwapStore};
use whale_swap_tracker::dispatch::fetch::{HeliusFetcher, RetryPolicy, RpcFetcher, TransactionFetcher};
use whale_swap_tracker::dispatch::lock::{DedupLock, InMemoryLockStore, LockStore, RedisLockStore};
use whale_swap_tracker::dispatch::queue::{InMemoryJobQueue, JobQueue, RedisJobQueue};
use whale_swap_tracker::dispatch::{run_worker_pool, Cohort, IntakeCoordinator, SwapWorker};
use whale_swap_tracker::error::AppError;
use whale_swap_tracker::grpc::client::GeyserSubscription;
use whale_swap_tracker::grpc::stream_handler::run_cohort_stream;
use whale_swap_tracker::pricing::{JupiterPriceOracle, PriceOracle};
use whale_swap_tracker::swap::usd_filter::UsdFilter;
use whale_swap_tracker::{metrics, metrics_server, telemetry};

/// Shared collaborators handed to every cohort.
struct Shared {
    config: AppConfig,
    db: Arc<Mutex<tokio_postgres::Client>>,
    redis: Option<redis::Client>,
    lock_store: Arc<dyn LockStore>,
    fetcher: Arc<dyn TransactionFetcher>,
    prices: Arc<dyn PriceOracle>,
    store: Arc<dyn SwapStore>,
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();

    let config = AppConfig::from_env()?;
    telemetry::init_telemetry(&config.log_level);
    metrics::init_metrics()?;

    info!("Starting whale swap tracker");
    info!(
        grpc_endpoint = %config.grpc_endpoint,
        provider = if config.helius_api_key.is_some() { "helius" } else { "rpc" },
        redis = config.redis_url.is_some(),
        min_confidence = config.min_confidence.as_str(),
        min_usd_notional = config.min_usd_notional,
        "Configuration loaded"
    );

    let mut db_client = connection::create_client(&config.database_url).await?;
    connection::run_migrations(&mut db_client).await?;
    let db = Arc::new(Mutex::new(db_client));

    let redis = match &config.redis_url {
        Some(url) => Some(redis::Client::open(url.as_str())?),
        None => None,
    };
    let lock_store: Arc<dyn LockStore> = match &redis {
        Some(client) => Arc::new(RedisLockStore::connect(client).await?),
        None => Arc::new(InMemoryLockStore::new()),
    };

    let fetcher: Arc<dyn TransactionFetcher> = match &config.helius_api_key {
        Some(key) => Arc::new(HeliusFetcher::new(
            config.helius_api_url.clone(),
            key.clone(),
            config.fetch_timeout,
        )?),
        None => Arc::new(RpcFetcher::new(&config.rpc_http_url, config.fetch_timeout)),
    };
    let prices: Arc<dyn PriceOracle> =
        Arc::new(JupiterPriceOracle::new(config.price_api_url.clone(), config.fetch_timeout)?);
    let store: Arc<dyn SwapStore> = Arc::new(PostgresSwapStore::new(db.clone()));

    let metrics_port = config.metrics_port;
    tokio::spawn(async move {
        if let Err(e) = metrics_server::start_metrics_server(metrics_port).await {
            error!("Metrics server error: {}", e);
        }
    });

    let start_time = std::time::Instant::now();
    tokio::spawn(async move {
        loop {
            metrics::APP_UPTIME.set(start_time.elapsed().as_secs_f64());
            tokio::time::sleep(tokio::time::Duration::from_secs(1)).await;
        }
    });

    let shared = Shared {
        config,
        db,
        redis,
        lock_store,
        fetcher,
        prices,
        store,
    };

    let mut handles = Vec::new();
    for cohort in Cohort::ALL {
        handles.extend(spawn_cohort(&shared, cohort).await?);
    }

    info!("All systems initialized, processing cohort streams");

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received");
        }
        _ = futures::future::select_all(handles) => {
            error!("A cohort task exited unexpectedly");
        }
    }

    Ok(())
}

async fn spawn_cohort(shared: &Shared, cohort: Cohort) -> Result<Vec<JoinHandle<()>>, AppError> {
    let config = &shared.config;
    let namespace = cohort.as_str();

    let addresses = AddressBook::new(load_addresses(&shared.db, cohort).await?);
    metrics::MONITORED_ADDRESSES
        .with_label_values(&[namespace])
        .set(addresses.len() as i64);
    info!(cohort = %cohort, addresses = addresses.len(), "Loaded monitored addresses");

    let queue: Arc<dyn JobQueue> = match &shared.redis {
        Some(client) => Arc::new(RedisJobQueue::connect(client, namespace).await?),
        None => Arc::new(InMemoryJobQueue::new(config.queue_capacity)),
    };
    let lock = DedupLock::new(shared.lock_store.clone(), namespace, config.lock_ttl);

    let worker = Arc::new(SwapWorker::new(
        cohort,
        shared.fetcher.clone(),
        RetryPolicy {
            max_retries: config.fetch_max_retries,
            backoff: config.fetch_retry_backoff,
        },
        addresses.clone(),
        config.parser_config(),
        UsdFilter::new(config.min_usd_notional),
        shared.prices.clone(),
        shared.store.clone(),
    ));
    let concurrency = match cohort {
        Cohort::Whale => config.whale_worker_concurrency,
        Cohort::Kol => config.kol_worker_concurrency,
    };

    let (sender, receiver) = mpsc::channel(config.ingest_channel_capacity);
    let subscription = GeyserSubscription::new(
        cohort,
        config.grpc_endpoint.clone(),
        config.grpc_token.clone(),
        config.include_failed_transactions,
    );
    let intake = IntakeCoordinator::new(cohort, addresses.clone(), lock, queue.clone());

    let stream_addresses = addresses.clone();
    let mut handles = vec![
        tokio::spawn(async move {
            if let Err(e) = run_cohort_stream(subscription, stream_addresses, sender).await {
                error!(cohort = %cohort, error = %e, "Cohort stream stopped");
            }
        }),
        tokio::spawn(intake.run(receiver)),
        tokio::spawn(run_worker_pool(worker, queue, concurrency)),
    ];
    handles.push(tokio::spawn(refresh_periodically(
        shared.db.clone(),
        addresses,
        cohort,
        config.address_refresh_interval,
    )));

    Ok(handles)
}
