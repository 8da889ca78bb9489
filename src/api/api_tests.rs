#[cfg(test)]
mod search_api_tests {
    use axum::{
        Router,
        body::{Body, to_bytes},
        http::{Request, StatusCode},
    };
    use serde_json::{Value, json};
    use std::sync::Arc;
    use tower::ServiceExt;

    use crate::api::app_state::AppState;
    use crate::api::create_router;
    use crate::models::school::{SchoolRecord, SchoolType};
    use crate::storage::memory::{
        InMemoryFavoriteRepository, InMemorySchoolRepository, InMemorySearchAnalytics,
    };

    fn seeded_app() -> (Router, Arc<InMemorySchoolRepository>) {
        let schools = Arc::new(InMemorySchoolRepository::new());
        schools.insert_all([
            SchoolRecord::new("Szkoła Podstawowa nr 1", SchoolType::Primary),
            SchoolRecord::new("Szkoła Podstawowa nr 4", SchoolType::Primary),
            SchoolRecord::new("Liceum Ogólnokształcące", SchoolType::HighSchool),
        ]);

        let state = AppState::development(
            Arc::clone(&schools) as Arc<dyn crate::storage::repository::SchoolRepository>,
            Arc::new(InMemoryFavoriteRepository::new()),
            Arc::new(InMemorySearchAnalytics::new()),
        );
        (create_router(state), schools)
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_search_returns_200_with_miss_then_hit() {
        let (app, _) = seeded_app();
        let uri = "/api/v1/schools/search?type=primary";

        let response = app
            .clone()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers().get("X-Cache").unwrap(), "MISS");
        assert_eq!(
            response.headers().get("Cache-Control").unwrap(),
            "public, max-age=300, stale-while-revalidate=60"
        );

        let body = body_json(response).await;
        assert_eq!(body["pagination"]["totalCount"], 2);
        assert_eq!(body["schools"].as_array().unwrap().len(), 2);
        // searchInfo 回显规范化后的生效过滤条件
        assert_eq!(body["searchInfo"]["filters"]["type"], "primary");
        assert!(body["searchInfo"]["filters"]["city"].is_null());
        assert_eq!(body["searchInfo"]["sort"]["sortBy"], "name");

        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.headers().get("X-Cache").unwrap(), "HIT");
        assert_eq!(
            response.headers().get("Cache-Control").unwrap(),
            "public, max-age=300, stale-while-revalidate=60"
        );
    }

    #[tokio::test]
    async fn test_invalid_params_return_400_with_field_details() {
        let (app, _) = seeded_app();

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/v1/schools/search?page=0&type=bogus")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = body_json(response).await;
        let fields: Vec<&str> = body["fields"]
            .as_array()
            .unwrap()
            .iter()
            .map(|f| f["field"].as_str().unwrap())
            .collect();
        assert!(fields.contains(&"page"));
        assert!(fields.contains(&"type"));
    }

    #[tokio::test]
    async fn test_invalid_api_key_returns_401() {
        let (app, _) = seeded_app();

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/v1/schools/search")
                    .header("X-API-Key", "wrong-key")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_security_headers_present() {
        let (app, _) = seeded_app();

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/v1/schools/search")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(
            response.headers().get("X-Content-Type-Options").unwrap(),
            "nosniff"
        );
    }

    #[tokio::test]
    async fn test_admin_cache_stats_requires_credentials() {
        let (app, _) = seeded_app();

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/api/v1/admin/cache/stats")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/v1/admin/cache/stats")
                    .header("X-API-Key", "dev-api-key")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_admin_invalidate_by_tag_forces_miss() {
        let (app, _) = seeded_app();
        let uri = "/api/v1/schools/search?type=primary";

        // 填充缓存
        app.clone()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/admin/cache/invalidate")
                    .header("X-API-Key", "dev-api-key")
                    .header("Content-Type", "application/json")
                    .body(Body::from(json!({"tag": "schools"}).to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["invalidated"], 1);

        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.headers().get("X-Cache").unwrap(), "MISS");
    }
}
