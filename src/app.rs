use std::net::SocketAddr;

use axum::{routing::get, Router};
use tokio::signal;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

use crate::{entries, foods, state::AppState, summary};

pub fn build_app(state: AppState) -> Router {
    Router::new()
        .nest(
            "/api/v1",
            Router::new()
                .merge(entries::router())
                .merge(foods::router())
                .merge(summary::router())
                .route("/health", get(|| async { "ok" })),
        )
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    let method = req.method().clone();
                    let uri = req.uri().clone();
                    let user = req
                        .headers()
                        .get(crate::identity::USER_HEADER)
                        .and_then(|h| h.to_str().ok())
                        .unwrap_or("-")
                        .to_string();
                    tracing::info_span!("http_request", %method, uri = %uri, %user, status = tracing::field::Empty)
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

pub async fn serve(app: Router, bind: &str) -> anyhow::Result<()> {
    let addr: SocketAddr = bind.parse()?;

    info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
        info!("received ctrl-c, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
                info!("received terminate signal, shutting down");
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[cfg(test)]
mod tests {
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;
    use uuid::Uuid;

    use super::*;

    async fn call(app: &Router, method: &str, uri: &str, user: Option<Uuid>, body: Option<Value>) -> (StatusCode, Value) {
        let mut req = Request::builder().method(method).uri(uri);
        if let Some(user) = user {
            req = req.header("x-user-id", user.to_string());
        }
        let req = match body {
            Some(body) => req
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => req.body(Body::empty()).unwrap(),
        };

        let res = app.clone().oneshot(req).await.unwrap();
        let status = res.status();
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    async fn create_rice(app: &Router) -> Uuid {
        let (status, food) = call(
            app,
            "POST",
            "/api/v1/foods",
            None,
            Some(json!({
                "name": "rice",
                "calories": 130.0,
                "carbs_g": 28.0,
                "serving_size": 100.0,
                "serving_unit": "g",
                "servings": [{ "name": "cup", "weight_g": 158.0 }]
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        food["id"].as_str().unwrap().parse().unwrap()
    }

    async fn log_rice(app: &Router, user: Uuid, rice: Uuid, date: &str, meal: &str, grams: f64) -> Value {
        let (status, logged) = call(
            app,
            "POST",
            "/api/v1/entries/food",
            Some(user),
            Some(json!({
                "food_id": rice,
                "date": date,
                "meal_type": meal,
                "quantity": grams,
                "unit": "g"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{logged}");
        logged
    }

    #[tokio::test]
    async fn health_is_ok() {
        let app = build_app(AppState::fake());
        let res = app
            .oneshot(Request::builder().uri("/api/v1/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn entry_routes_need_a_user() {
        let app = build_app(AppState::fake());
        let (status, body) = call(&app, "GET", "/api/v1/summary/2024-01-01", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(body["error"].as_str().unwrap().contains("x-user-id"));
    }

    #[tokio::test]
    async fn logging_food_updates_the_summary() {
        let app = build_app(AppState::fake());
        let user = Uuid::new_v4();
        let rice = create_rice(&app).await;

        let (status, logged) = call(
            &app,
            "POST",
            "/api/v1/entries/food",
            Some(user),
            Some(json!({
                "food_id": rice,
                "date": "2024-01-01",
                "meal_type": "dinner",
                "quantity": 200,
                "unit": "g"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(logged["entry"]["calories"], 260.0);
        assert_eq!(logged["resolution"]["path"], "raw_quantity");

        let (status, day) = call(&app, "GET", "/api/v1/summary/2024-01-01", Some(user), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(day["calories"], 260.0);
        assert_eq!(day["entry_count"], 1);

        let (status, dinner) =
            call(&app, "GET", "/api/v1/summary/2024-01-01/dinner", Some(user), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(dinner["carbs_g"], 56.0);

        let (status, _) = call(&app, "GET", "/api/v1/summary/2024-01-01/lunch", Some(user), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        // other users see nothing
        let (status, body) =
            call(&app, "GET", "/api/v1/summary/2024-01-01", Some(Uuid::new_v4()), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "no data for this key");
    }

    #[tokio::test]
    async fn deleting_the_last_entry_removes_the_row() {
        let app = build_app(AppState::fake());
        let user = Uuid::new_v4();

        let (status, logged) = call(
            &app,
            "POST",
            "/api/v1/entries/exercise",
            Some(user),
            Some(json!({
                "date": "2024-01-02",
                "name": "cycling",
                "duration_min": 40,
                "calories_burned": 320
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let id = logged["entry"]["id"].as_str().unwrap().to_string();

        let (status, activity) = call(&app, "GET", "/api/v1/activity/2024-01-02", Some(user), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(activity["calories_burned"], 320.0);

        let uri = format!("/api/v1/entries/exercise/{id}");
        let (status, deleted) = call(&app, "DELETE", &uri, Some(user), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(deleted["aggregates"][0]["outcome"], "removed");

        let (status, _) = call(&app, "GET", "/api/v1/activity/2024-01-02", Some(user), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = call(&app, "DELETE", &uri, Some(user), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn invalid_writes_are_bad_requests() {
        let app = build_app(AppState::fake());
        let user = Uuid::new_v4();
        let rice = create_rice(&app).await;

        for (quantity, unit, meal) in [(0.0, "g", "lunch"), (1.0, "bushel", "lunch"), (1.0, "g", "elevenses")] {
            let (status, body) = call(
                &app,
                "POST",
                "/api/v1/entries/food",
                Some(user),
                Some(json!({
                    "food_id": rice,
                    "date": "2024-01-03",
                    "meal_type": meal,
                    "quantity": quantity,
                    "unit": unit
                })),
            )
            .await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
        }

        let (status, _) = call(&app, "GET", "/api/v1/entries?date=2024-01-03", Some(user), None).await;
        assert_eq!(status, StatusCode::OK);
        let (_, entries) = call(&app, "GET", "/api/v1/entries?date=2024-01-03", Some(user), None).await;
        assert_eq!(entries, json!([]));
    }

    #[tokio::test]
    async fn recompute_endpoints_report_outcomes() {
        let app = build_app(AppState::fake());
        let user = Uuid::new_v4();
        let rice = create_rice(&app).await;
        let (status, _) = call(
            &app,
            "POST",
            "/api/v1/entries/food/bundle",
            Some(user),
            Some(json!({
                "date": "2024-01-04",
                "meal_type": "lunch",
                "items": [
                    { "food_id": rice, "quantity": 1, "unit": "serving" },
                    { "food_id": rice, "quantity": 50, "unit": "g" }
                ]
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, res) = call(
            &app,
            "POST",
            "/api/v1/recompute",
            Some(user),
            Some(json!({ "date": "2024-01-04", "meal_type": "lunch" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(res["outcome"], "unchanged");
        assert_eq!(res["row"]["calories"], 195.0);

        let (status, all) = call(&app, "POST", "/api/v1/recompute/all", Some(user), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(all["keys"], 2);
        assert_eq!(all["changed"], 0);
    }

    #[tokio::test]
    async fn meals_of_a_day_are_listed_in_meal_order() {
        let app = build_app(AppState::fake());
        let user = Uuid::new_v4();
        let rice = create_rice(&app).await;
        log_rice(&app, user, rice, "2024-01-05", "dinner", 200.0).await;
        log_rice(&app, user, rice, "2024-01-05", "breakfast", 100.0).await;

        let (status, meals) = call(&app, "GET", "/api/v1/summary/2024-01-05/meals", Some(user), None).await;
        assert_eq!(status, StatusCode::OK, "{meals}");
        let listed: Vec<_> = meals
            .as_array()
            .unwrap()
            .iter()
            .map(|row| (row["meal"].as_str().unwrap(), row["calories"].as_f64().unwrap()))
            .collect();
        assert_eq!(listed, vec![("breakfast", 130.0), ("dinner", 260.0)]);

        let (status, empty) = call(&app, "GET", "/api/v1/summary/2024-01-06/meals", Some(user), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(empty, json!([]));
    }

    #[tokio::test]
    async fn patching_moves_entries_between_days() {
        let app = build_app(AppState::fake());
        let user = Uuid::new_v4();
        let rice = create_rice(&app).await;
        let logged = log_rice(&app, user, rice, "2024-01-07", "lunch", 100.0).await;
        let id = logged["entry"]["id"].as_str().unwrap().to_string();

        let uri = format!("/api/v1/entries/food/{id}");
        let (status, moved) = call(&app, "PATCH", &uri, Some(user), Some(json!({ "date": "2024-01-08" }))).await;
        assert_eq!(status, StatusCode::OK, "{moved}");
        assert_eq!(moved["entry"]["date"], "2024-01-08");
        assert_eq!(moved["entry"]["meal"], "lunch");

        let (status, _) = call(&app, "GET", "/api/v1/summary/2024-01-07", Some(user), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, day) = call(&app, "GET", "/api/v1/summary/2024-01-08", Some(user), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(day["calories"], 130.0);

        let (status, _) = call(
            &app,
            "PATCH",
            &uri,
            Some(Uuid::new_v4()),
            Some(json!({ "date": "2024-01-09" })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, ride) = call(
            &app,
            "POST",
            "/api/v1/entries/exercise",
            Some(user),
            Some(json!({
                "date": "2024-01-07",
                "name": "cycling",
                "duration_min": 30,
                "calories_burned": 240
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let uri = format!("/api/v1/entries/exercise/{}", ride["entry"]["id"].as_str().unwrap());
        let (status, _) = call(&app, "PATCH", &uri, Some(user), Some(json!({ "date": "2024-01-08" }))).await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = call(&app, "GET", "/api/v1/activity/2024-01-07", Some(user), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, activity) = call(&app, "GET", "/api/v1/activity/2024-01-08", Some(user), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(activity["calories_burned"], 240.0);
    }
}
