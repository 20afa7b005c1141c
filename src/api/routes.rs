use actix_web::{
    error::InternalError,
    http::header::{CACHE_CONTROL, CONNECTION},
    post, web, HttpResponse, Result as WebResult,
};
use bytes::Bytes;
use futures_util::TryStreamExt;
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

use crate::api::models::{ErrorBody, GenerateBody};
use crate::config::AppConfig;
use crate::llm::{framing::relay_fragments, LlmProvider};

#[post("/generate")]
pub async fn generate(
    config: web::Data<AppConfig>,
    llm: web::Data<Arc<dyn LlmProvider>>,
    req: web::Json<GenerateBody>,
) -> WebResult<HttpResponse> {
    let request_id = Uuid::new_v4();
    let prompt = req.into_inner().prompt;

    if prompt.trim().is_empty() {
        return Ok(HttpResponse::BadRequest().json(ErrorBody::new("prompt must not be empty")));
    }

    info!(%request_id, model = llm.model(), "Relaying prompt of {} bytes", prompt.len());

    let upstream = match llm.generate_stream(&prompt).await {
        Ok(stream) => stream,
        Err(e) => {
            error!(%request_id, "Upstream request failed: {}", e);
            return Ok(HttpResponse::InternalServerError().json(ErrorBody::new("Internal Server Error")));
        }
    };

    // Status and headers are committed from here on; a failure can only cut the body short.
    let body = relay_fragments(upstream, config.relay.framing)
        .inspect_err(move |e| error!(%request_id, "Stream processing error: {}", e))
        .map_ok(Bytes::from);

    Ok(HttpResponse::Ok()
        .content_type("text/event-stream")
        .insert_header((CACHE_CONTROL, "no-cache"))
        .insert_header((CONNECTION, "keep-alive"))
        .streaming(body))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    let json_config = web::JsonConfig::default().error_handler(|err, _req| {
        let response = HttpResponse::BadRequest().json(ErrorBody::new(err.to_string()));
        InternalError::from_response(err, response).into()
    });

    cfg.service(web::scope("/api").app_data(json_config).service(generate));
}
