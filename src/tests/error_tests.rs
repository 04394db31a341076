#[cfg(test)]
mod tests {
    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
        middleware::from_fn,
        response::{IntoResponse, Response},
        routing::get,
        Router,
    };
    use http_body_util::BodyExt;
    use serde_json::Value;
    use tower::ServiceExt;

    use crate::error::{expose_error_details, panic_response, AppError, OptionExt};
    use crate::store::StoreError;

    async fn body_json(res: Response) -> Value {
        let bytes = res.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_status_mapping() {
        let cases = [
            (AppError::validation("f", "bad"), StatusCode::BAD_REQUEST),
            (AppError::BadRequest("x".into()), StatusCode::BAD_REQUEST),
            (AppError::InvalidState("x".into()), StatusCode::BAD_REQUEST),
            (AppError::Conflict("x".into()), StatusCode::BAD_REQUEST),
            (AppError::Unauthenticated("x".into()), StatusCode::UNAUTHORIZED),
            (AppError::Forbidden("x".into()), StatusCode::FORBIDDEN),
            (AppError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (AppError::RateLimited { retry_after_seconds: 5 }, StatusCode::TOO_MANY_REQUESTS),
            (AppError::Internal(anyhow::anyhow!("boom")), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(err.status(), status, "{}", err);
        }
    }

    #[tokio::test]
    async fn test_error_body_shape() {
        let res = AppError::validation("qr_code", "is required").into_response();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        let body = body_json(res).await;
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
        assert_eq!(body["error"]["details"]["field"], "qr_code");
        assert_eq!(body["error"]["details"]["message"], "is required");
        assert_eq!(body["status"], 400);
        assert!(body["timestamp"].is_string());
    }

    #[tokio::test]
    async fn test_rate_limited_sets_retry_after() {
        let res = AppError::RateLimited { retry_after_seconds: 17 }.into_response();
        assert_eq!(res.headers()[header::RETRY_AFTER], "17");
        let body = body_json(res).await;
        assert_eq!(body["error"]["code"], "RATE_LIMITED");
        assert_eq!(body["error"]["details"]["retry_after_seconds"], 17);
    }

    #[tokio::test]
    async fn test_internal_error_hides_detail() {
        let res = AppError::Internal(anyhow::anyhow!("disk on fire")).into_response();
        let body = body_json(res).await;
        assert_eq!(body["error"]["code"], "INTERNAL_ERROR");
        assert!(body["error"]["details"]["error_id"].is_string());
        assert!(!body.to_string().contains("disk on fire"));
    }

    #[test]
    fn test_store_error_conversion() {
        let conflict: AppError = StoreError::Conflict("QR code already exists".into()).into();
        assert!(matches!(conflict, AppError::Conflict(ref m) if m == "QR code already exists"));

        let db: AppError = StoreError::Database(sqlx::Error::RowNotFound).into();
        assert_eq!(db.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_option_ext() {
        let missing: Option<i32> = None;
        match missing.ok_or_not_found("Unit") {
            Err(AppError::NotFound(msg)) => assert_eq!(msg, "Unit not found"),
            other => panic!("unexpected: {:?}", other),
        }
        assert_eq!(Some(3).ok_or_not_found("Unit").unwrap(), 3);
    }

    async fn failing() -> Result<&'static str, AppError> {
        Err(AppError::Internal(anyhow::anyhow!("disk on fire")))
    }

    #[tokio::test]
    async fn test_debug_mode_exposes_internal_detail() {
        let app = Router::new().route("/fail", get(failing)).layer(from_fn(expose_error_details));
        let res = app.oneshot(Request::builder().uri("/fail").body(Body::empty()).unwrap()).await.unwrap();
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(res).await;
        assert!(body["error"]["details"]["details"].as_str().unwrap().contains("disk on fire"));
        assert!(body["error"]["details"]["error_id"].is_string());
    }

    #[tokio::test]
    async fn test_panic_payload_becomes_internal_error() {
        let res = panic_response(Box::new("handler exploded"));
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(res).await;
        assert_eq!(body["error"]["code"], "INTERNAL_ERROR");
    }
}
