//! Axum route handlers for the Recommendation API.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::recommend::{list_industries, recommend, ProductQuery, Recommendation, RecommendParams};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct RecommendRequest {
    pub customer_id: String,
    pub products: Vec<ProductQuery>,
    /// Overrides the configured sampling temperature.
    pub temperature: Option<f32>,
}

#[derive(Debug, Serialize)]
pub struct RecommendResponse {
    pub customer_id: String,
    #[serde(rename = "availableIndustries")]
    pub available_industries: Vec<String>,
    pub recommendations: Vec<Recommendation>,
}

#[derive(Debug, Serialize)]
pub struct IndustriesResponse {
    pub customer_id: String,
    pub industries: Vec<String>,
}

/// POST /recommend/products
pub async fn handle_recommend(
    State(state): State<AppState>,
    payload: Result<Json<RecommendRequest>, JsonRejection>,
) -> Result<Json<RecommendResponse>, AppError> {
    let Json(request) = payload?;
    let defaults = &state.config.llm;
    let temperature = request.temperature.unwrap_or(defaults.recommend_temperature);
    if !(0.0..=2.0).contains(&temperature) {
        return Err(AppError::Validation(
            "temperature must be between 0 and 2".to_string(),
        ));
    }

    let params = RecommendParams {
        model: defaults.model.clone(),
        temperature,
        max_tokens: defaults.recommend_max_tokens,
    };

    // Listed up front so a storage failure costs no model calls.
    let available_industries = list_industries(state.store.as_ref(), &request.customer_id).await?;

    let recommendations = recommend(
        state.store.as_ref(),
        state.llm.as_ref(),
        &request.customer_id,
        &request.products,
        &params,
    )
    .await?;

    Ok(Json(RecommendResponse {
        customer_id: request.customer_id.trim().to_string(),
        available_industries,
        recommendations,
    }))
}

/// GET /recommend/industries/:customer_id
pub async fn handle_list_industries(
    State(state): State<AppState>,
    Path(customer_id): Path<String>,
) -> Result<Json<IndustriesResponse>, AppError> {
    let industries = list_industries(state.store.as_ref(), &customer_id).await?;
    Ok(Json(IndustriesResponse {
        customer_id,
        industries,
    }))
}
