// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::{sync::Arc, time::Duration};

use axum_server::tls_rustls::RustlsConfig;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use ballot_chain_server::{
    api::router,
    auth::{hash_password, JwtKeys, SecretBox},
    blockchain::{ChainClient, WalletProvider},
    config::{Settings, DEFAULT_LOG_FILTER, LOG_FORMAT_ENV},
    ledger::Reconciler,
    mailer::mailer_from_settings,
    state::AppState,
    storage::{AccountRepository, UploadStore, VotingDb},
};

/// How long in-flight requests get to finish after a shutdown signal.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let json = std::env::var(LOG_FORMAT_ENV)
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    if json {
        fmt().with_env_filter(filter).json().init();
    } else {
        fmt().with_env_filter(filter).init();
    }
}

async fn shutdown_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
    shutdown.cancel();
}

#[tokio::main]
async fn main() {
    init_tracing();

    let settings = Settings::from_env().expect("Invalid configuration");

    std::fs::create_dir_all(&settings.data_dir).expect("Failed to create data directory");
    std::fs::create_dir_all(&settings.public_dir).expect("Failed to create public directory");

    let db = Arc::new(VotingDb::open(&settings.database_path()).expect("Failed to open database"));
    let secrets = Arc::new(
        SecretBox::new(&settings.server_secret_key).expect("Invalid SERVER_SECRET_KEY"),
    );

    // Admin account and the wallet that signs admin-side contract calls
    let admin_hash = hash_password(&settings.admin.password).expect("Failed to hash admin password");
    let admin = AccountRepository::new(&db)
        .ensure_admin(
            &settings.admin.user_name,
            &settings.admin.name,
            &settings.admin.email,
            &admin_hash,
        )
        .expect("Failed to seed admin account");
    let admin_wallet = WalletProvider::new(&db, &secrets)
        .get_or_create(admin.id)
        .expect("Failed to provision admin wallet");
    info!(admin_id = admin.id, address = %admin_wallet.address, "Admin account ready");

    let chain = ChainClient::from_settings(&settings.chain).expect("Failed to load voting contract");
    info!(
        contract = %chain.contract_address(),
        chain_id = settings.chain.chain_id,
        "Voting contract loaded"
    );
    let mailer = mailer_from_settings(&settings.mail).expect("Failed to build mailer");

    let state = AppState {
        db: db.clone(),
        chain: Arc::new(chain),
        mailer: Arc::from(mailer),
        secrets,
        jwt: Arc::new(JwtKeys::new(settings.jwt_secret.as_bytes(), settings.jwt_ttl)),
        uploads: UploadStore::new(&settings.public_dir),
        admin_id: admin.id,
        code_length: settings.verification_code_length,
        reconcile_grace: settings.reconcile_grace,
    };

    let shutdown = CancellationToken::new();
    let reconciler = Reconciler::new(db, settings.reconcile_interval, settings.reconcile_grace);
    let reconciler_task = tokio::spawn(reconciler.run(shutdown.clone()));

    let app = router(state);
    let addr = settings.bind_addr;

    match &settings.tls {
        Some((cert, key)) => {
            // Install the ring crypto provider for rustls (must be done before any TLS operations)
            rustls::crypto::ring::default_provider()
                .install_default()
                .expect("Failed to install rustls crypto provider");
            let tls_config = RustlsConfig::from_pem_file(cert, key)
                .await
                .expect("Failed to load TLS certificate");

            let handle = axum_server::Handle::new();
            let signal_handle = handle.clone();
            let signal_token = shutdown.clone();
            tokio::spawn(async move {
                shutdown_signal(signal_token).await;
                signal_handle.graceful_shutdown(Some(SHUTDOWN_GRACE));
            });

            info!("Ballot Chain server listening on https://{addr} (docs at /docs)");
            axum_server::bind_rustls(addr, tls_config)
                .handle(handle)
                .serve(app.into_make_service())
                .await
                .expect("HTTPS server failed");
        }
        None => {
            warn!("TLS_CERT_PATH/TLS_KEY_PATH not set; serving plain HTTP");
            let listener = tokio::net::TcpListener::bind(addr)
                .await
                .expect("Failed to bind address");
            info!("Ballot Chain server listening on http://{addr} (docs at /docs)");
            axum::serve(listener, app)
                .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
                .await
                .expect("HTTP server failed");
        }
    }

    shutdown.cancel();
    if let Err(e) = reconciler_task.await {
        warn!(error = %e, "Reconciler task ended abnormally");
    }
    info!("Server stopped");
}
