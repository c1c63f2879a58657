pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

use crate::chat::handlers as chat;
use crate::recommend::handlers as recommend;
use crate::state::AppState;
use crate::upload::handlers as upload;

pub fn build_router(state: AppState) -> Router {
    let upload_limit = DefaultBodyLimit::max(state.config.max_upload_bytes);

    let uploads = Router::new()
        .route("/upload/files/", post(upload::handle_upload_files))
        .route("/upload/prompt/", post(upload::handle_upload_prompt))
        .route("/chat/with-files", post(chat::handle_chat_with_files))
        .layer(upload_limit);

    Router::new()
        .route("/", get(health::health_handler))
        .route("/health", get(health::health_handler))
        // Upload API
        .route("/upload/files/:customer_id", get(upload::handle_list_files))
        // Recommendation API
        .route("/recommend/products", post(recommend::handle_recommend))
        .route(
            "/recommend/industries/:customer_id",
            get(recommend::handle_list_industries),
        )
        // Chat API
        .route("/chat/", post(chat::handle_chat))
        .route("/chat/stream", post(chat::handle_chat_stream))
        .route("/chat/files/:customer_id", get(chat::handle_list_chat_files))
        .merge(uploads)
        .with_state(state)
}
