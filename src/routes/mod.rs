use axum::Router;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{services::documentation::ApiDoc, state::SharedState};

pub mod catalog;
pub mod events;
pub mod health;
pub mod rooms;

/// Compose all route trees, wiring in shared state and the Swagger UI.
pub fn router(state: SharedState) -> Router<()> {
    let swagger = SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi());

    health::router()
        .merge(rooms::router())
        .merge(events::router())
        .merge(catalog::router())
        .merge(swagger)
        .with_state(state)
}
