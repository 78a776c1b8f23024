use utoipa::OpenApi;

use crate::routes::{api, health};

#[derive(OpenApi)]
#[openapi(info(
    title = "tasklet-server",
    description = "Task records with idempotent writes. POST, PUT and PATCH require an `Idempotency-Key` header.",
    version = "0.1.0"
))]
pub struct ApiDoc;

pub fn get_docs() -> utoipa::openapi::OpenApi {
    let mut root = ApiDoc::openapi();
    root.merge(health::HealthApi::openapi());
    root.merge(api::api_docs());
    root
}
