//! Built-in liveness router mounted at `/api/hello`.

use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};

pub fn routes() -> Router {
    Router::new().route("/", get(say_hello))
}

async fn say_hello() -> Json<Value> {
    Json(json!({
        "status": "success",
        "message": "Hello from the server!",
    }))
}
