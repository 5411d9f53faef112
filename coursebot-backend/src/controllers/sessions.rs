use crate::AppState;
use actix_web::{web, HttpResponse, Responder};

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/api/sessions").route(web::post().to(create_session)));
    cfg.service(
        web::resource("/api/sessions/{session_id}/clear").route(web::post().to(clear_session)),
    );
}

/// Start a fresh conversation session
async fn create_session(state: web::Data<AppState>) -> impl Responder {
    let session_id = state.rag.sessions.create_session();
    HttpResponse::Ok().json(serde_json::json!({ "session_id": session_id }))
}

/// Drop a session's conversation history so the next question starts clean
async fn clear_session(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> impl Responder {
    let session_id = path.into_inner();
    state.rag.sessions.clear_session(&session_id);
    HttpResponse::Ok().json(serde_json::json!({ "session_id": session_id, "cleared": true }))
}
