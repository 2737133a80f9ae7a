use std::path::Path;
use std::sync::Arc;

use tracing::info;

use crate::api::{self, AppState};
use crate::cli::commands::ServeArgs;
use crate::config;
use crate::errors::GatecheckError;

pub async fn handle_serve(args: ServeArgs) -> Result<(), GatecheckError> {
    let session = config::parse_session(Path::new(&args.session)).await?;
    let manager: Arc<_> = config::manager_from_session(&session, args.timeout)?;

    info!(host = %args.host, port = args.port, "Starting API server");
    let app = api::build_router(AppState { manager });

    let addr = format!("{}:{}", args.host, args.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Listening on {}", addr);

    axum::serve(listener, app)
        .await
        .map_err(|e| GatecheckError::Internal(format!("Server error: {}", e)))?;

    Ok(())
}
