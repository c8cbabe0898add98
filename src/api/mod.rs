use actix_web::{web, App, HttpResponse, HttpServer, Responder};
use log::{error, info};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;
use serde::Serialize;
use std::time::{SystemTime, UNIX_EPOCH};
use utoipa::ToSchema;

use crate::config::Config;
use crate::exporter::{get_app_status, AppStatus, PrometheusSink};
use crate::metering_61107::structs::CycleReport;

pub struct ApiManager {
    config: Config,
    sink: PrometheusSink,
}

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub uptime_seconds: u64,
    pub cycles: u64,
    pub last_cycle: Option<CycleReport>,
    pub timestamp: u64,
}

#[utoipa::path(get,
    path = "/metrics",
    summary = "Get the latest meter readings in prometheus format",
    responses(
        (status = 200, description = "Current gauge values in the text exposition format"),
        (status = 500, description = "The registry could not be encoded")
    ),
)]
async fn metrics(sink: web::Data<PrometheusSink>) -> impl Responder {
    match sink.render() {
        Ok(body) => HttpResponse::Ok()
            .content_type("text/plain; version=0.0.4")
            .body(body),
        Err(e) => {
            error!("Unable to render metrics: {}", e);
            HttpResponse::InternalServerError().body(e.to_string())
        }
    }
}

#[utoipa::path(get,
    path = "/health",
    summary = "Health check endpoint for container monitoring",
    responses(
        (status = 200, description = "The last poll cycle read at least one meter", body = HealthResponse),
        (status = 503, description = "No meter could be read in the last poll cycle", body = HealthResponse)
    ),
)]
async fn health_check() -> impl Responder {
    health_response(get_app_status())
}

fn health_response(app_status: AppStatus) -> HttpResponse {
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();

    let healthy = app_status.is_healthy();
    let response = HealthResponse {
        status: if healthy { "healthy".to_string() } else { "unhealthy".to_string() },
        uptime_seconds: app_status.uptime_seconds(),
        cycles: app_status.cycles,
        last_cycle: app_status.last_cycle,
        timestamp,
    };

    if healthy {
        HttpResponse::Ok().json(response)
    } else {
        HttpResponse::ServiceUnavailable().json(response)
    }
}

#[utoipa::path(get,
    path = "/api/v1/config",
    summary = "Get the whole configuration as loaded at startup",
    responses(
        (status = 200, description = "Get current running config")
    ),
)]
async fn get_config(config: web::Data<Config>) -> impl Responder {
    HttpResponse::Ok().content_type("application/json").json(config.get_ref())
}

#[derive(OpenApi)]
#[openapi(
    info(description = "energomera-exporter API description"),
    paths(
        metrics,
        health_check,
        get_config,
    )
)]
struct ApiDoc;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/metrics", web::get().to(metrics))
        .route("/health", web::get().to(health_check))
        .route("/api/v1/config", web::get().to(get_config));
}

impl ApiManager {
    pub fn new(config: Config, sink: PrometheusSink) -> Self {
        return ApiManager { config, sink };
    }

    pub async fn start_thread(&self) -> std::io::Result<()> {
        let listen_address = self.config.httpd.listen_address.clone();
        let config = web::Data::new(self.config.clone());
        let sink = web::Data::new(self.sink.clone());

        info!("Starting web server at {}", listen_address);
        HttpServer::new(move || {
            App::new()
                .app_data(config.clone())
                .app_data(sink.clone())
                .configure(configure)
                .service(
                    SwaggerUi::new("/swagger-ui/{_:.*}")
                        .url("/api/v1/openapi.json", ApiDoc::openapi()),
                )
        })
        .bind(listen_address)?
        .run()
        .await
    }
}
