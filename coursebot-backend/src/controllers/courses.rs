use crate::AppState;
use actix_web::{web, HttpResponse, Responder};

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/api/courses").route(web::get().to(get_course_stats)));
}

/// Catalog statistics: how many courses are indexed and their titles
async fn get_course_stats(state: web::Data<AppState>) -> impl Responder {
    HttpResponse::Ok().json(state.rag.get_course_analytics())
}
