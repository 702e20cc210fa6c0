//! Failure kinds of a prediction request and their HTTP mapping.
use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use common::store::StoreError;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PredictError {
    #[error("No image provided")]
    MissingImage,
    #[error("Empty image")]
    EmptyImage,
    #[error("Invalid request body: {0}")]
    InvalidBody(String),
    #[error("failed to decode image: {0}")]
    Decode(String),
    #[error("unexpected shape: {0}")]
    ShapeMismatch(String),
    #[error("predicted index {index} is outside of the {labels} known labels")]
    LabelIndex { index: usize, labels: usize },
    #[error("inference failed: {0}")]
    Inference(anyhow::Error),
    #[error("failed to store prediction: {0}")]
    Storage(#[from] StoreError),
}

impl PredictError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::MissingImage | Self::EmptyImage | Self::InvalidBody(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::Decode(_)
            | Self::ShapeMismatch(_)
            | Self::LabelIndex { .. }
            | Self::Inference(_)
            | Self::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<JsonRejection> for PredictError {
    fn from(rejection: JsonRejection) -> Self {
        Self::InvalidBody(rejection.body_text())
    }
}

impl From<base64::DecodeError> for PredictError {
    fn from(err: base64::DecodeError) -> Self {
        Self::Decode(format!("invalid base64: {err}"))
    }
}

impl From<image::ImageError> for PredictError {
    fn from(err: image::ImageError) -> Self {
        Self::Decode(err.to_string())
    }
}

impl IntoResponse for PredictError {
    fn into_response(self) -> Response {
        let status = self.status();
        match status.is_server_error() {
            true => log::error!("Prediction failed: {self}"),
            false => log::info!("Rejected prediction request: {self}"),
        }

        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

#[cfg(test)]
mod test {

    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(PredictError::MissingImage.status(), StatusCode::BAD_REQUEST);
        assert_eq!(PredictError::EmptyImage.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            PredictError::InvalidBody("expected a string".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            PredictError::LabelIndex {
                index: 3,
                labels: 2
            }
            .status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            PredictError::Decode("bad".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
