use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use tokio::signal;
use tracing::{error, info, warn};

use cafe_pos_api as api;
use api::{
    entities::Role,
    services::users::CreateUserRequest,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = api::config::load_config()?;
    api::config::init_tracing(cfg.log_level(), cfg.log_json);

    // Init DB
    let db_config = api::db::DbConfig::from(&cfg);
    let db_pool = api::db::establish_connection_with_config(&db_config)
        .await
        .context("failed to connect to the database")?;
    if cfg.auto_migrate {
        api::db::run_migrations(&db_pool).await.map_err(|e| {
            error!("Failed running migrations: {}", e);
            e
        })?;
    }

    let app_state = api::AppState::new(Arc::new(db_pool), cfg.clone());
    bootstrap_admin(&app_state).await?;

    let app = api::build_router(app_state);

    // Bind and serve
    let addr: SocketAddr = format!("{}:{}", cfg.host, cfg.port)
        .parse()
        .with_context(|| format!("invalid listen address {}:{}", cfg.host, cfg.port))?;
    info!("cafe-pos-api listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

/// Creates the first manager account on an empty database so the
/// back-office is reachable after a fresh install.
async fn bootstrap_admin(state: &api::AppState) -> anyhow::Result<()> {
    let users = state.services.users.count_users().await?;
    if users > 0 {
        return Ok(());
    }

    match (
        state.config.bootstrap_admin_username.clone(),
        state.config.bootstrap_admin_password.clone(),
    ) {
        (Some(username), Some(password)) => {
            let user = state
                .services
                .users
                .create_user(CreateUserRequest {
                    username,
                    password,
                    full_name: "Administrator".to_string(),
                    role: Role::Manager,
                })
                .await
                .context("failed to create bootstrap manager")?;
            info!(user_id = user.id, username = %user.username, "Bootstrap manager created");
        }
        _ => warn!(
            "No users exist; set APP__BOOTSTRAP_ADMIN_USERNAME and APP__BOOTSTRAP_ADMIN_PASSWORD or run `pos-admin create-user`"
        ),
    }
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("failed to install signal handler: {}", e);
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
    info!("Shutdown signal received");
}
