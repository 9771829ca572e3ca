use actix_web::error::JsonPayloadError;
use actix_web::{HttpRequest, HttpResponse, Responder};
use serde::Serialize;
use serde_json::json;

use super::error::{AppError, Res};

/// Success envelope: `{ "success": true, "data": <payload> }`.
pub struct Success;
impl Success {
    pub fn created<T: Serialize>(data: T) -> Res<impl Responder> {
        Result::Ok(HttpResponse::Created().json(json!({ "success": true, "data": data })))
    }
    pub fn ok<T: Serialize>(data: T) -> Res<impl Responder> {
        Result::Ok(HttpResponse::Ok().json(json!({ "success": true, "data": data })))
    }
}

/// Maps a malformed or mistyped JSON body onto the validation
/// envelope. Registered via `JsonConfig::error_handler` so transport
/// parsing failures never surface as actix's default text body.
pub fn json_error_handler(err: JsonPayloadError, _req: &HttpRequest) -> actix_web::Error {
    AppError::Validation(vec![err.to_string()]).into()
}

/// Default service for unmatched routes.
pub async fn not_found() -> HttpResponse {
    AppError::NotFound("The requested endpoint does not exist".to_string()).to_http_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{App, http::StatusCode, test, web};
    use serde_json::Value;

    async fn echo(body: web::Json<Value>) -> HttpResponse {
        HttpResponse::Ok().json(body.into_inner())
    }

    macro_rules! envelope_app {
        () => {
            test::init_service(
                App::new()
                    .app_data(web::JsonConfig::default().error_handler(json_error_handler))
                    .route("/echo", web::post().to(echo))
                    .default_service(web::route().to(not_found)),
            )
            .await
        };
    }

    #[actix_web::test]
    async fn malformed_json_is_a_validation_error() {
        let app = envelope_app!();
        let resp = test::call_service(
            &app,
            test::TestRequest::post()
                .uri("/echo")
                .insert_header(("content-type", "application/json"))
                .set_payload("{ not json")
                .to_request(),
        )
        .await;

        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
        assert!(body["error"]["details"]["issues"].is_array());
    }

    #[actix_web::test]
    async fn unmatched_route_is_endpoint_not_found() {
        let app = envelope_app!();
        let resp = test::call_service(
            &app,
            test::TestRequest::get().uri("/nope").to_request(),
        )
        .await;

        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["error"]["code"], "ENDPOINT_NOT_FOUND");
    }
}
