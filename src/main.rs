// OOH Planner - background worker entry point

use log::{error, info, warn};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use oohplanner::config::{validate_config, AppConfig};
use oohplanner::database::Database;
use oohplanner::scheduler::ActiveUsersMonitor;
use oohplanner::subscription::SubscriptionHub;
use oohplanner::utils::logging::{init_logging, log_error_with_context};

#[tokio::main]
async fn main() {
    if let Err(e) = init_logging() {
        eprintln!("Failed to initialize logging: {}", e);
    }

    info!("Starting OOH Planner worker");

    let config = match AppConfig::from_env().and_then(|config| {
        validate_config(&config)?;
        Ok(config)
    }) {
        Ok(config) => Arc::new(config),
        Err(e) => {
            error!("Invalid configuration: {}", e);
            eprintln!("Invalid configuration: {}", e);
            std::process::exit(2);
        }
    };

    let db = match Database::connect(&config.database_url).await {
        Ok(database) => Arc::new(database),
        Err(e) => {
            log_error_with_context(&e, "Startup");
            eprintln!("Failed to initialize database: {}", e);
            std::process::exit(1);
        }
    };

    let shutdown = CancellationToken::new();
    let mut tasks = Vec::new();

    match std::env::var("OOH_USER_ID") {
        Ok(user_id) => match db.get_user(&user_id).await {
            Ok(Some(user)) => {
                let hub = Arc::new(SubscriptionHub::new());
                let monitor = Arc::new(ActiveUsersMonitor::new(
                    db.clone(),
                    hub,
                    &user.company_id,
                    config.active_user_window_minutes,
                ));
                tasks.push(monitor.spawn(config.active_user_poll, shutdown.clone()));
            }
            Ok(None) => warn!("OOH_USER_ID {} not found, active-user monitor disabled", user_id),
            Err(e) => log_error_with_context(&e, "Startup"),
        },
        Err(_) => info!("OOH_USER_ID not set, active-user monitor disabled"),
    }

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
    }

    info!("Shutting down");
    shutdown.cancel();
    for task in tasks {
        let name = task.name().to_string();
        if let Err(e) = task.join().await {
            log_error_with_context(&e, &name);
        }
    }
    db.pool.close().await;
    info!("OOH Planner stopped");
}
