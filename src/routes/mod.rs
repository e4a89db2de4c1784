pub mod wsroute;

use actix_web::{web, HttpResponse};

async fn health() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "ok",
        "service": "realtime-interaction-service",
    }))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health))
        .service(
            web::scope("/ws")
                .route("/streams/{stream_id}", web::get().to(wsroute::stream_ws))
                .route("/posts/{post_id}", web::get().to(wsroute::comments_ws))
                .route(
                    "/conversations/{conversation_id}",
                    web::get().to(wsroute::conversation_ws),
                )
                .route("/dm/{other_user_id}", web::get().to(wsroute::direct_ws))
                .route("/inbox", web::get().to(wsroute::inbox_ws)),
        );
}
