//! termin server entry point.

use std::process::ExitCode;
use std::sync::Arc;

use tracing::{error, info};

use termin_core::tracing::{TracingConfig, init_tracing};
use termin_ical::Organizer;
use termin_providers::GoogleCalendarProvider;
use termin_server::{
    AppointmentStore, BookingService, PidFile, ServerConfig, ServerResult, SignalHandler,
    SocketServer, Sweeper, SweeperConfig, default_pid_path, make_connection_handler,
    new_shared_state,
};

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(e) = init_tracing(TracingConfig::daemon()) {
        eprintln!("error: failed to initialize tracing: {}", e);
        return ExitCode::FAILURE;
    }

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Server failed");
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run() -> ServerResult<()> {
    let config = ServerConfig::from_env()?;
    config.validate()?;

    let _pidfile = PidFile::create(default_pid_path())?;

    let store = Arc::new(AppointmentStore::new(config.confirmation_window));
    let provider = Arc::new(GoogleCalendarProvider::new(
        config.calendar_access_token.clone(),
        config.calendar_id.clone(),
        config.timezone,
        config.provider_timeout,
    ));
    let booking = Arc::new(BookingService::new(
        store.clone(),
        provider,
        config.policy.clone(),
        config.timezone,
        Organizer::new(config.organizer_name.clone(), config.organizer_email.clone()),
    ));

    let signals = SignalHandler::new();
    signals.spawn_listener();

    let state = new_shared_state();

    let sweeper = Sweeper::new(SweeperConfig::new(config.sweep_interval));
    let sweeper_handle = sweeper.handle();
    let sweeper_task = tokio::spawn(sweeper.run(store.clone(), state.clone()));

    let server = SocketServer::bind(&config).await?;
    info!(path = %server.socket_path().display(), "termin server ready");

    let handler = make_connection_handler(
        state,
        store,
        booking,
        signals.shutdown_handle(),
    );
    server
        .run_until_shutdown(handler, signals.shutdown().wait())
        .await?;

    let _ = sweeper_handle.stop().await;
    let _ = sweeper_task.await;

    info!("termin server stopped");
    Ok(())
}
