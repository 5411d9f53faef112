use crate::tools::Citation;
use crate::AppState;
use actix_web::{web, HttpResponse, Responder};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    pub query: String,
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct QueryResponse {
    pub answer: String,
    pub sources: Vec<Citation>,
    pub session_id: String,
}

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/api/query").route(web::post().to(query_courses)));
}

/// Answer a question about the indexed course materials. A session is
/// created when the caller does not supply one, so follow-up questions can
/// carry conversation context.
async fn query_courses(
    state: web::Data<AppState>,
    body: web::Json<QueryRequest>,
) -> impl Responder {
    let request = body.into_inner();

    if request.query.trim().is_empty() {
        return HttpResponse::BadRequest().json(serde_json::json!({
            "error": "query must not be empty"
        }));
    }

    let session_id = request
        .session_id
        .unwrap_or_else(|| state.rag.sessions.create_session());

    match state.rag.query(&request.query, Some(&session_id)).await {
        Ok((answer, sources)) => HttpResponse::Ok().json(QueryResponse {
            answer,
            sources,
            session_id,
        }),
        Err(e) => {
            log::error!("Query failed: {}", e);
            HttpResponse::InternalServerError().json(serde_json::json!({ "error": e }))
        }
    }
}
