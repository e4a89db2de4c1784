use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};
use realtime_interaction_service::models::room::{Room, RoomKind};
use realtime_interaction_service::websocket::session::broadcast_viewer_count;
use realtime_interaction_service::{config::Config, db, logging, redis_client::RedisClient, routes, state::AppState};
use std::io;
use std::time::Duration;

#[actix_web::main]
async fn main() -> io::Result<()> {
    logging::init_tracing();

    let config = Config::from_env().map_err(|e| {
        tracing::error!(error = %e, "configuration error");
        io::Error::new(io::ErrorKind::InvalidInput, e.to_string())
    })?;

    tracing::info!("starting realtime-interaction-service");

    let db_pool = match db::init_pool(&config.database_url).await {
        Ok(pool) => {
            tracing::info!("database pool ready, migrations applied");
            pool
        }
        Err(e) => {
            tracing::error!(error = %e, "database connection failed");
            return Err(io::Error::new(io::ErrorKind::Other, "database connection failed"));
        }
    };

    let redis_pool = redis_utils::RedisPool::connect(&config.redis_url)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "redis connection failed");
            io::Error::new(io::ErrorKind::Other, "redis connection failed")
        })?;
    let redis = RedisClient::new(redis_pool.manager());

    let port = config.port;
    let redis_url = config.redis_url.clone();
    let presence_cfg = config.presence.clone();
    let state = AppState::build(config, db_pool, redis);

    // Broker bridge: keeps this process's rooms converged with the rest
    // of the fleet.
    tokio::spawn(state.bus.clone().run_bridge(redis_url));

    // Presence reaper: reclaims participants whose sessions died without
    // a leave, then rebroadcasts the affected stream viewer counts.
    {
        let state = state.clone();
        tokio::spawn(async move {
            let mut ticker =
                tokio::time::interval(Duration::from_secs(presence_cfg.reaper_interval_secs));
            loop {
                ticker.tick().await;
                match state.presence.reap_stale(presence_cfg.ttl_secs).await {
                    Ok(rooms) => {
                        for room_key in rooms {
                            let Some(room) = Room::parse(&room_key) else {
                                continue;
                            };
                            if room.kind() == RoomKind::Stream {
                                broadcast_viewer_count(&state, &room).await;
                            }
                        }
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "presence reap failed");
                    }
                }
            }
        });
    }

    let addr = format!("0.0.0.0:{port}");
    tracing::info!(%addr, instance = %state.bus.instance_id(), "starting HTTP server");

    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(state.clone()))
            .wrap(Logger::default())
            .wrap(Cors::permissive())
            .configure(routes::configure)
    })
    .bind(&addr)?
    .run()
    .await
}
