use crate::config::{HEALTHCHECK_ROUTE, Listener as ListenerConfig};
use crate::errors::ResponderError;
use crate::handler::{Outcome, ResponseHandler};
use crate::healthcheck::{HealthReport, sheet_healthcheck};
use axum::{
    Json, Router,
    extract::{Query, State},
    http::{StatusCode, header},
    response::{Html, IntoResponse, Response},
    routing::get,
};
use std::collections::HashMap;
use tokio::net::TcpListener;

pub fn router(handler: ResponseHandler) -> Router {
    Router::new()
        .route(handler.route(), get(respond))
        .route(HEALTHCHECK_ROUTE, get(healthcheck))
        .with_state(handler)
}

pub async fn serve(listener: ListenerConfig, handler: ResponseHandler) -> Result<(), ResponderError> {
    let addr = format!("{}:{}", listener.host, listener.port);
    let app = router(handler);

    let listener = TcpListener::bind(&addr).await?;
    tracing::info!(addr = %addr, "serving responses");
    axum::serve(listener, app).await?;
    Ok(())
}

async fn respond(
    State(handler): State<ResponseHandler>,
    Query(params): Query<HashMap<String, String>>,
) -> Outcome {
    handler.handle(&params).await
}

async fn healthcheck(State(handler): State<ResponseHandler>) -> Response {
    let range = handler.spreadsheet().read_range();
    let report = sheet_healthcheck(handler.provider().as_ref(), &range).await;

    let status = match report {
        HealthReport::Ok { .. } => StatusCode::OK,
        HealthReport::Failed { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(report)).into_response()
}

impl IntoResponse for Outcome {
    fn into_response(self) -> Response {
        match self {
            Outcome::Redirect { location } => {
                (StatusCode::FOUND, [(header::LOCATION, location)]).into_response()
            }
            Outcome::ReasonForm { html } => (StatusCode::OK, Html(html)).into_response(),
            Outcome::ClientError { message } => (StatusCode::BAD_REQUEST, message).into_response(),
            Outcome::Debug { status, report } => (status, Json(report)).into_response(),
        }
    }
}
