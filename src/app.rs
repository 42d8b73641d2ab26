use std::future::Future;
use std::net::SocketAddr;

use axum::{middleware, routing::get, Router};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::state::AppState;
use crate::{auth, carts, catalog, categories, products, ratings, recipes};

pub fn build_app(state: AppState) -> Router {
    let protected = Router::new()
        .merge(recipes::router())
        .merge(catalog::router())
        .merge(products::router())
        .merge(carts::router())
        .merge(categories::router())
        .merge(ratings::router())
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_auth,
        ));

    Router::new()
        .nest(
            "/v1",
            Router::new()
                .route("/health", get(|| async { "ok" }))
                .merge(protected),
        )
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    let method = req.method().clone();
                    let uri = req.uri().clone();
                    tracing::info_span!("http_request", %method, uri = %uri, status = tracing::field::Empty)
                })
                .on_response(
                    |res: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     span: &tracing::Span| {
                        let status = res.status();
                        span.record("status", tracing::field::display(status));
                        let latency_ms = latency.as_millis() as u64;
                        if status.is_server_error() {
                            tracing::error!(%status, latency_ms, "response");
                        } else {
                            tracing::info!(%status, latency_ms, "response");
                        }
                    },
                ),
        )
}

pub async fn serve(
    app: Router,
    host: &str,
    port: u16,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{host}:{port}").parse()?;

    tracing::info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::extractors::ACCESS_TOKEN_HEADER;
    use crate::auth::verifier::sign_for_tests;
    use crate::search::{memory::MemoryIndex, IndexName, SearchIndex};
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tower::ServiceExt;

    fn token() -> String {
        sign_for_tests(AppState::FAKE_JWT_SECRET, json!({ "user_id": 11 }))
    }

    async fn send(app: Router, req: Request<Body>) -> (StatusCode, Value) {
        let resp = app.oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    fn authed(method: &str, uri: &str, body: Option<Value>) -> Request<Body> {
        let builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(ACCESS_TOKEN_HEADER, token());
        match body {
            Some(b) => builder
                .header("content-type", "application/json")
                .body(Body::from(b.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    #[tokio::test]
    async fn health_is_public() {
        let app = build_app(AppState::fake());
        let resp = app
            .oneshot(Request::builder().uri("/v1/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn protected_routes_require_token() {
        for (method, uri) in [
            ("GET", "/v1/list-recipe"),
            ("POST", "/v1/recipe"),
            ("GET", "/v1/pantries/search?name=rice"),
            ("DELETE", "/v1/carts"),
            ("GET", "/v1/product/3/average-rating"),
        ] {
            let req = Request::builder()
                .method(method)
                .uri(uri)
                .body(Body::empty())
                .unwrap();
            let (status, body) = send(build_app(AppState::fake()), req).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED, "{method} {uri}");
            assert_eq!(body["error"], "No access token provided");
        }
    }

    #[tokio::test]
    async fn product_without_backing_is_rejected_before_any_write() {
        let body = json!({ "title": "Jam", "price": 500, "stock": 2 });
        let (status, body) = send(
            build_app(AppState::fake()),
            authed("POST", "/v1/product", Some(body)),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().ends_with("is required"));
    }

    #[tokio::test]
    async fn empty_search_term_is_bad_request() {
        for uri in ["/v1/recipes/search", "/v1/tools/search?name=", "/v1/products/search?name=%20"] {
            let (status, body) =
                send(build_app(AppState::fake()), authed("GET", uri, None)).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
            assert_eq!(body["error"], "Search query is required");
        }
    }

    #[tokio::test]
    async fn invalid_recipe_payload_is_bad_request() {
        let body = json!({
            "recipeData": {
                "name": "", "difficulty": "easy", "prep_time": 1,
                "cook_time": 1, "servings": 1, "category": "x"
            }
        });
        let (status, body) = send(
            build_app(AppState::fake()),
            authed("POST", "/v1/recipe", Some(body)),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "name is required");
    }

    #[tokio::test]
    async fn malformed_json_is_bad_request() {
        let req = Request::builder()
            .method("POST")
            .uri("/v1/cart")
            .header(ACCESS_TOKEN_HEADER, token())
            .header("content-type", "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let (status, _) = send(build_app(AppState::fake()), req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn recipes_are_found_by_ingredient_ids() {
        let index = Arc::new(MemoryIndex::default());
        index
            .upsert(
                IndexName::Recipes,
                1,
                &json!({ "id": 1, "name": "Caprese", "ingredients": [ { "ingredient_id": 4 } ] }),
            )
            .await
            .unwrap();
        index
            .upsert(
                IndexName::Recipes,
                2,
                &json!({ "id": 2, "name": "Omelette", "ingredients": [ { "ingredient_id": 7 } ] }),
            )
            .await
            .unwrap();
        let app = build_app(AppState::fake_with_index(index));

        let (status, body) = send(
            app,
            authed(
                "POST",
                "/v1/recipes/search/ingredients",
                Some(json!({ "ingredients": [4, 99] })),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total"], 1);
        assert_eq!(body["recipes"][0]["name"], "Caprese");
    }

    #[tokio::test]
    async fn empty_ingredient_list_is_bad_request() {
        let (status, body) = send(
            build_app(AppState::fake()),
            authed("POST", "/v1/recipes/search/ingredients", Some(json!({ "ingredients": [] }))),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "At least one ingredient ID is required");
    }

    #[tokio::test]
    async fn catalog_search_uses_the_kind_index() {
        let index = Arc::new(MemoryIndex::default());
        index
            .upsert(IndexName::Tools, 3, &json!({ "id": 3, "name": "Wooden spoon" }))
            .await
            .unwrap();
        index
            .upsert(IndexName::Pantries, 3, &json!({ "id": 3, "name": "Spoon rest" }))
            .await
            .unwrap();
        let app = build_app(AppState::fake_with_index(index));

        let (status, body) = send(app, authed("GET", "/v1/tools/search?name=spoon", None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total"], 1);
        assert_eq!(body["tools"][0]["name"], "Wooden spoon");
    }

    #[tokio::test]
    async fn bulk_catalog_create_validates_every_item_first() {
        let items = json!([
            { "name": "Salt", "category": "spice", "unit": "g" },
            { "name": "Pepper", "category": "spice" }
        ]);
        let (status, body) = send(
            build_app(AppState::fake()),
            authed("POST", "/v1/list-ingredient", Some(items)),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "item 1: unit is required");
    }
}
