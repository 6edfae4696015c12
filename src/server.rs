// Marker overlay service: exposes the marker state and the hover / click / recolor
// operations to the map frontend, and keeps the fleet colors fresh in the background.

use actix_cors::Cors;
use actix_web::{App, HttpResponse, HttpServer, middleware, web};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time;

use crate::color::{Color, IconHandle};
use crate::error::MarkerError;
use crate::fleet::SyncOutcome;
use crate::marker::{MarkerEntity, Popup};
use crate::models::{Station, StationId};
use crate::state::AppState;

#[derive(Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
    pub timestamp: i64,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        ApiResponse {
            success: true,
            data: Some(data),
            error: None,
            timestamp: Utc::now().timestamp(),
        }
    }

    pub fn error(message: String) -> Self {
        ApiResponse {
            success: false,
            data: None,
            error: Some(message),
            timestamp: Utc::now().timestamp(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MarkerView {
    pub id: StationId,
    pub latitude: f64,
    pub longitude: f64,
    pub name: Option<String>,
    pub color: Color,
    pub icon: IconHandle,
}

impl From<&MarkerEntity> for MarkerView {
    fn from(marker: &MarkerEntity) -> Self {
        MarkerView {
            id: marker.id(),
            latitude: marker.station.latitude,
            longitude: marker.station.longitude,
            name: marker.name().map(str::to_string),
            color: marker.color,
            icon: marker.icon.clone(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DateBody {
    pub instant: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct SyncView {
    pub outcome: SyncOutcome,
    pub markers: Vec<MarkerView>,
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
}

fn marker_views(markers: &[MarkerEntity]) -> Vec<MarkerView> {
    markers.iter().map(MarkerView::from).collect()
}

fn marker_error(e: MarkerError) -> HttpResponse {
    log::warn!("⚠️  {}", e);
    match e {
        MarkerError::UnknownMarker(_) => HttpResponse::NotFound().json(ApiResponse::<()>::error(e.to_string())),
        MarkerError::DuplicateMarker(_) => HttpResponse::Conflict().json(ApiResponse::<()>::error(e.to_string())),
    }
}

async fn sync_view(state: &AppState) -> SyncView {
    let sync = state.fleet_sync();
    let outcome = sync.sync().await;
    SyncView {
        outcome,
        markers: marker_views(&state.markers.snapshot()),
    }
}

// ============================================================================
// Marker Routes
// ============================================================================

async fn get_markers(state: web::Data<AppState>) -> HttpResponse {
    let markers = state.markers.snapshot();
    log::debug!("📍 Markers requested: {} total", markers.len());
    HttpResponse::Ok().json(ApiResponse::success(marker_views(&markers)))
}

async fn hover_marker(state: web::Data<AppState>, path: web::Path<StationId>) -> HttpResponse {
    let id = path.into_inner();
    let controller = match state.controller(id) {
        Ok(controller) => controller,
        Err(e) => return marker_error(e),
    };

    match controller.hover().await {
        Ok(name) => HttpResponse::Ok().json(ApiResponse::success(name)),
        Err(e) => marker_error(e),
    }
}

async fn click_marker(state: web::Data<AppState>, path: web::Path<StationId>) -> HttpResponse {
    let id = path.into_inner();
    let controller = match state.controller(id) {
        Ok(controller) => controller,
        Err(e) => return marker_error(e),
    };

    match controller.click().await {
        Ok(popup) => HttpResponse::Ok().json(ApiResponse::<Popup>::success(popup)),
        Err(e) => marker_error(e),
    }
}

async fn marker_icon(state: web::Data<AppState>, path: web::Path<StationId>) -> HttpResponse {
    let id = path.into_inner();
    match state.markers.get(id) {
        Some(marker) => HttpResponse::Ok()
            .content_type("image/svg+xml")
            .body(marker.icon.svg().to_string()),
        None => marker_error(MarkerError::UnknownMarker(id)),
    }
}

// ============================================================================
// Selection & Control Routes
// ============================================================================

async fn get_date(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(ApiResponse::success(DateBody {
        instant: state.selected.get(),
    }))
}

async fn put_date(state: web::Data<AppState>, body: web::Json<DateBody>) -> HttpResponse {
    state.select_instant(body.instant);
    HttpResponse::Ok().json(ApiResponse::success(sync_view(&state).await))
}

async fn force_refresh(state: web::Data<AppState>) -> HttpResponse {
    log::info!("🔄 Manual refresh requested...");
    HttpResponse::Ok().json(ApiResponse::success(sync_view(&state).await))
}

async fn reload_stations(state: web::Data<AppState>) -> HttpResponse {
    let count = state.reload_stations().await;
    if count == 0 {
        log::warn!("⚠️  Station reload returned no stations");
    }
    HttpResponse::Ok().json(ApiResponse::success(sync_view(&state).await))
}

async fn search_stations(state: web::Data<AppState>, query: web::Query<SearchQuery>) -> HttpResponse {
    let stations: Vec<Station> = state.search(&query.q).await;
    log::debug!("🔎 Search '{}' matched {} stations", query.q, stations.len());
    HttpResponse::Ok().json(ApiResponse::success(stations))
}

async fn weather(state: web::Data<AppState>) -> HttpResponse {
    match state.source.weather_forecast().await {
        Some(forecast) => HttpResponse::Ok().json(ApiResponse::success(forecast)),
        None => HttpResponse::BadGateway()
            .json(ApiResponse::<()>::error("Weather forecast unavailable".to_string())),
    }
}

async fn health_check(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "service": "Vélo'v forecast map",
        "version": env!("CARGO_PKG_VERSION"),
        "markers": state.markers.len(),
        "selected_instant": state.selected.get(),
        "timestamp": Utc::now().timestamp(),
    }))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health_check)).service(
        web::scope("/api")
            .route("/markers", web::get().to(get_markers))
            .route("/markers/{id}/tooltip", web::get().to(hover_marker))
            .route("/markers/{id}/popup", web::get().to(click_marker))
            .route("/markers/{id}/icon.svg", web::get().to(marker_icon))
            .route("/date", web::get().to(get_date))
            .route("/date", web::put().to(put_date))
            .route("/refresh", web::post().to(force_refresh))
            .route("/stations/reload", web::post().to(reload_stations))
            .route("/search", web::get().to(search_stations))
            .route("/weather", web::get().to(weather)),
    );
}

// ============================================================================
// Background Task
// ============================================================================

pub async fn fleet_refresh_task(state: AppState, every: Duration) {
    let mut interval = time::interval(every);
    // The first tick fires immediately; startup already ran a sync.
    interval.tick().await;

    loop {
        interval.tick().await;
        log::debug!("🔄 Auto-refreshing marker colors...");
        match state.fleet_sync().sync().await {
            SyncOutcome::PredictionsUnavailable => log::warn!("⚠️  Auto-refresh found no predictions"),
            outcome => log::debug!("✓ Auto-refresh finished: {:?}", outcome),
        }
    }
}

// ============================================================================
// Server Setup
// ============================================================================

pub async fn run_server(state: AppState, bind: (String, u16), refresh: Option<Duration>) -> std::io::Result<()> {
    if let Some(every) = refresh {
        let refresh_state = state.clone();
        tokio::spawn(async move {
            fleet_refresh_task(refresh_state, every).await;
        });
    }

    log::info!("🌐 Marker service running on http://{}:{}", bind.0, bind.1);

    let data = web::Data::new(state);
    HttpServer::new(move || {
        App::new()
            .app_data(data.clone())
            .wrap(Cors::permissive())
            .wrap(middleware::Logger::default())
            .wrap(middleware::Compress::default())
            .configure(configure)
    })
    .bind(bind)?
    .run()
    .await
}
