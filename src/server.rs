use crate::config::AppConfig;
use crate::render::RenderedPage;
use crate::types::{EducationIndex, EducationRecord};
use anyhow::Result;
use axum::{
    extract::{Query, State},
    response::{Html, Json},
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;

pub struct AppState {
    pub page: String,
    pub education: EducationIndex,
}

#[derive(Deserialize)]
pub struct QueryParams {
    fips: u32,
}

#[derive(Serialize)]
pub struct TooltipPayload {
    fips: u32,
    area_name: String,
    state: String,
    bachelors_or_higher: f64,
    /// Preformatted hover label, "{county}, {state}: {value}%".
    label: String,
}

impl TooltipPayload {
    fn from_record(record: &EducationRecord) -> Self {
        Self {
            fips: record.fips,
            area_name: record.area_name.clone(),
            state: record.state.clone(),
            bachelors_or_higher: record.bachelors_or_higher,
            label: format!(
                "{}, {}: {}%",
                record.area_name, record.state, record.bachelors_or_higher
            ),
        }
    }
}

pub async fn start_server(
    config: AppConfig,
    page: RenderedPage,
    education: EducationIndex,
) -> Result<()> {
    let state = Arc::new(AppState {
        page: page.html,
        education,
    });

    let port = config.server.port;
    let addr = SocketAddr::from(([127, 0, 0, 1], port));

    println!("Starting server on http://{}", addr);

    let output_dir = config
        .output
        .page
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| std::path::Path::new("."))
        .to_path_buf();

    let app = Router::new()
        .route("/", get(page_handler))
        .route("/api/county", get(county_handler))
        .nest_service("/out", ServeDir::new(output_dir))
        .layer(CorsLayer::permissive())
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn page_handler(State(state): State<Arc<AppState>>) -> Html<String> {
    Html(state.page.clone())
}

async fn county_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<QueryParams>,
) -> Json<Option<TooltipPayload>> {
    Json(state.education.get(&params.fips).map(TooltipPayload::from_record))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tooltip_label_matches_hover_contract() {
        let record = EducationRecord {
            fips: 1,
            area_name: "A".to_string(),
            state: "X".to_string(),
            bachelors_or_higher: 10.0,
        };
        let payload = TooltipPayload::from_record(&record);
        assert_eq!(payload.label, "A, X: 10%");
        assert_eq!(payload.fips, 1);
    }
}
