use std::{future::IntoFuture, process, sync::Arc, time::Duration};

use teorema::{
    application::{convert::ConvertService, error::AppError},
    config::{self, EngineMode, EngineSettings},
    domain::{
        formats::{OutputKind, SourceKind},
        request::ConversionRequest,
    },
    engine::{TypesetEngine, katex::KatexEngine, remote::RemoteEngine},
    infra::{
        error::InfraError,
        http::{HttpState, build_router},
        telemetry,
    },
};
use tokio::net::TcpListener;
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
    }
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let engine = build_engine(&settings.engine)?;
    let convert = Arc::new(ConvertService::new(
        engine,
        settings.engine.defaults.clone(),
        settings.engine.timeout,
        settings.raster.max_dimension,
    ));

    spawn_warmup(convert.clone());

    let router = build_router(HttpState {
        convert: convert.clone(),
    });

    let listener = TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    info!(
        addr = %settings.server.addr,
        engine = engine_mode_name(settings.engine.mode),
        "teorema listening"
    );

    let server = axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(shutdown_signal());

    tokio::select! {
        result = server.into_future() => {
            result.map_err(|err| AppError::unexpected(format!("server error: {err}")))?;
        }
        () = forced_shutdown(settings.server.graceful_shutdown) => {
            warn!("graceful drain window elapsed; exiting");
        }
    }

    Ok(())
}

fn build_engine(settings: &EngineSettings) -> Result<Arc<dyn TypesetEngine>, AppError> {
    match settings.mode {
        EngineMode::Remote => {
            let engine = RemoteEngine::new(settings.url.clone())
                .map_err(|err| AppError::unexpected(err.to_string()))?;
            Ok(Arc::new(engine))
        }
        EngineMode::Katex => Ok(Arc::new(KatexEngine)),
    }
}

fn engine_mode_name(mode: EngineMode) -> &'static str {
    match mode {
        EngineMode::Remote => "remote",
        EngineMode::Katex => "katex",
    }
}

/// The first engine call pays JS-engine startup and font cache costs; take
/// that hit off the request path.
fn spawn_warmup(convert: Arc<ConvertService>) {
    tokio::spawn(async move {
        let request = match ConversionRequest::new(SourceKind::Latex, "x^2", OutputKind::Mathml) {
            Ok(request) => request,
            Err(_) => return,
        };
        if let Err(error) = convert.convert(&request).await {
            warn!(detail = error.log_detail(), "warm-up conversion failed");
        }
    });
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        error!("failed to listen for the shutdown signal");
        return;
    }
    info!("shutdown signal received; draining connections");
}

async fn forced_shutdown(grace: Duration) {
    if tokio::signal::ctrl_c().await.is_err() {
        // Without signal delivery the forced path can never trigger.
        std::future::pending::<()>().await;
    }
    tokio::time::sleep(grace).await;
}
