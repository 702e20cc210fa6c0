//! Endpoints of HTTP server.
//!
use std::sync::Arc;

use axum::{
    extract::rejection::JsonRejection,
    routing::{get, post},
    Extension, Json, Router,
};
use common::{
    records::{PredictionRecord, PREDICTIONS},
    store::DocumentStore,
};
use serde::{Deserialize, Serialize};

use crate::{
    error::PredictError,
    pipeline::{Prediction, SignClassifier},
};

/// Body of a prediction request.
#[derive(Debug, Deserialize)]
pub struct PredictParams {
    #[serde(default)]
    image: Option<String>,
    #[serde(default)]
    user_id: Option<String>,
}

#[derive(Debug, Deserialize, PartialEq, Serialize)]
pub struct PredictResponse {
    pub prediction: String,
    pub confidence: f32,
}

impl From<Prediction> for PredictResponse {
    fn from(prediction: Prediction) -> Self {
        Self {
            prediction: prediction.label,
            confidence: prediction.confidence,
        }
    }
}

/// Dependencies shared by all requests, built once at startup.
pub struct PredictService {
    classifier: SignClassifier,
    store: Option<Arc<DocumentStore>>,
}

impl PredictService {
    pub fn new(classifier: SignClassifier, store: Option<Arc<DocumentStore>>) -> Self {
        Self { classifier, store }
    }

    /// Append a prediction record. Best effort: failures are only logged.
    fn record(&self, prediction: &Prediction, user_id: Option<String>) {
        let Some(store) = &self.store else {
            return;
        };

        let record = PredictionRecord::new(prediction.label.clone(), prediction.confidence, user_id);
        match store
            .insert_one(PREDICTIONS, &record)
            .map_err(PredictError::from)
        {
            Ok(id) => log::debug!("Stored prediction {} as document {}", &record.prediction, id),
            Err(e) => log::warn!("{e}"),
        }
    }
}

pub fn router(service: Arc<PredictService>) -> Router {
    Router::new()
        .route("/", get(healthcheck))
        .route("/healthcheck", get(healthcheck))
        .route("/predict", post(predict))
        .route("/predict_login", post(predict_login))
        .layer(Extension(service))
}

/// Health check endpoint.
pub async fn healthcheck() -> &'static str {
    "Sign prediction service is running"
}

/// Classify the image and append the outcome to the document store, if one is configured.
pub async fn predict(
    Extension(service): Extension<Arc<PredictService>>,
    payload: Result<Json<PredictParams>, JsonRejection>,
) -> Result<Json<PredictResponse>, PredictError> {
    let Json(params) = payload?;
    let user_id = params.user_id.clone();
    let prediction = classify(Arc::clone(&service), params).await?;

    let stored = prediction.clone();
    if let Err(e) = tokio::task::spawn_blocking(move || service.record(&stored, user_id)).await {
        log::warn!("Storing prediction did not complete: {e}");
    }

    Ok(Json(prediction.into()))
}

/// Same contract as `predict`, without persisting anything.
pub async fn predict_login(
    Extension(service): Extension<Arc<PredictService>>,
    payload: Result<Json<PredictParams>, JsonRejection>,
) -> Result<Json<PredictResponse>, PredictError> {
    let Json(params) = payload?;
    let prediction = classify(service, params).await?;
    Ok(Json(prediction.into()))
}

async fn classify(
    service: Arc<PredictService>,
    params: PredictParams,
) -> Result<Prediction, PredictError> {
    let image = params.image.ok_or(PredictError::MissingImage)?;

    let prediction =
        tokio::task::spawn_blocking(move || service.classifier.classify_base64(&image))
            .await
            .map_err(|e| PredictError::Inference(e.into()))??;

    log::info!(
        "Predicted {} ({:.2})",
        &prediction.label,
        prediction.confidence
    );

    Ok(prediction)
}
