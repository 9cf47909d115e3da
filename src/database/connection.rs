use crate::error::AppError;
use refinery::embed_migrations;
use tokio_postgres::Client;
use tokio_postgres_rustls::MakeRustlsConnect;
use tracing::{error, info};

// Swap and wallet tables are compiled into the binary from migrations/
embed_migrations!("migrations");

/// Open a PostgreSQL connection for the swap store and the address book.
///
/// The connection is TLS-only, verified against the webpki root set, which
/// works for managed providers without shipping a CA bundle. tokio-postgres
/// hands back the socket driver separately, so it is spawned here and the
/// returned `Client` is shared behind a mutex by the caller.
pub async fn create_client(database_url: &str) -> Result<Client, AppError> {
    info!("Establishing database connection");

    // Trust anchors for server certificate verification
    let mut root_store = rustls::RootCertStore::empty();
    root_store.add_trust_anchors(webpki_roots::TLS_SERVER_ROOTS.iter().map(|ta| {
        rustls::OwnedTrustAnchor::from_subject_spki_name_constraints(
            ta.subject,
            ta.spki,
            ta.name_constraints,
        )
    }));

    let tls_config = rustls::ClientConfig::builder()
        .with_safe_defaults()
        .with_root_certificates(root_store)
        .with_no_client_auth();

    let (client, connection) = tokio_postgres::connect(database_url, MakeRustlsConnect::new(tls_config))
        .await
        .map_err(|e| AppError::Database(format!("Failed to connect: {}", e)))?;

    // The driver must be polled for the client to make progress
    tokio::spawn(async move {
        if let Err(e) = connection.await {
            error!(error = %e, "Database connection error");
        }
    });

    info!("Database connection established");

    Ok(client)
}

/// Apply pending schema migrations before any cohort starts.
///
/// Refinery records applied versions in `refinery_schema_history`, so a
/// restart only runs migrations added since the last deploy. The count of
/// newly applied migrations is logged.
pub async fn run_migrations(client: &mut Client) -> Result<(), AppError> {
    info!("Running database migrations");

    let report = migrations::runner()
        .run_async(client)
        .await
        .map_err(|e| AppError::Database(format!("Migration failed: {}", e)))?;

    info!(applied = report.applied_migrations().len(), "Database migrations completed");

    Ok(())
}
