use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::app_state::AppState;
use crate::models::tryon::{ErrorBody, TryOnResponse};
use crate::services::tryon::TryOnError;

/// POST /tryon — multipart upload of a person photo and a garment photo,
/// with an optional model variant field.
pub async fn try_on(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<TryOnResponse>, ApiError> {
    let mut user_image: Option<Vec<u8>> = None;
    let mut outfit_image: Option<Vec<u8>> = None;
    let mut model: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|_| ApiError::bad_request("invalid_multipart", "malformed multipart body"))?
    {
        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some("user_image") => {
                let data = field
                    .bytes()
                    .await
                    .map_err(|_| ApiError::bad_request("user_image_missing", "failed to read user image"))?;
                user_image = Some(data.to_vec());
            }
            Some("outfit_image") => {
                let data = field
                    .bytes()
                    .await
                    .map_err(|_| ApiError::bad_request("outfit_image_missing", "failed to read outfit image"))?;
                outfit_image = Some(data.to_vec());
            }
            Some("model") => {
                let text = field
                    .text()
                    .await
                    .map_err(|_| ApiError::bad_request("invalid_multipart", "failed to read model field"))?;
                model = Some(text);
            }
            _ => {}
        }
    }

    let user_image = user_image
        .filter(|b| !b.is_empty())
        .ok_or_else(|| ApiError::bad_request("user_image_missing", "user image is empty"))?;
    let outfit_image = outfit_image
        .filter(|b| !b.is_empty())
        .ok_or_else(|| ApiError::bad_request("outfit_image_missing", "outfit image is empty"))?;

    let result = state
        .tryon
        .generate(&user_image, &outfit_image, model.as_deref())
        .await?;

    Ok(Json(TryOnResponse {
        job_id: result.job_id,
        result_image_base64: result.image_base64,
        image_url: result.image_url,
        model: result.model,
        prompt: result.prompt,
        message: "try-on complete".to_string(),
    }))
}

/// Error shape every non-2xx response carries: `{code, message}`.
pub struct ApiError {
    status: StatusCode,
    body: ErrorBody,
}

impl ApiError {
    fn bad_request(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            body: ErrorBody {
                code,
                message: message.into(),
            },
        }
    }
}

impl From<TryOnError> for ApiError {
    fn from(err: TryOnError) -> Self {
        match err {
            // User-fixable input problems.
            TryOnError::Image(e) => Self {
                status: StatusCode::BAD_REQUEST,
                body: ErrorBody {
                    code: "invalid_image",
                    message: e.to_string(),
                },
            },
            // Everything vendor-side is normalized to one upstream-failure shape.
            other => Self {
                status: StatusCode::BAD_GATEWAY,
                body: ErrorBody {
                    code: "try_on_failed",
                    message: other.to_string(),
                },
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}
