use axum::extract::State;
use axum::Json;
use serde_json::json;

use crate::api::types::AppState;

pub async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    let options = state.store.options();
    Json(json!({
        "version": env!("CARGO_PKG_VERSION"),
        "store": state.store.kind(),
        "deleteMode": options.delete_mode,
        "uniqueNames": options.unique_names,
        "ageRange": { "min": state.ages.min, "max": state.ages.max },
    }))
}
