use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};

use crate::core::capability::CapabilityClassifier;
use crate::error::ApiError;
use crate::routing::AppState;

/// Known shapes of a provider's model listing.
#[derive(Deserialize)]
#[serde(untagged)]
enum ProviderListing {
    /// OpenAI list object: `{"object":"list","data":[...]}`
    Data { data: Vec<ProviderModel> },
    /// `{"models":[...]}` as served by several self-hosted gateways
    Models { models: Vec<ProviderModel> },
    Bare(Vec<ProviderModel>),
}

impl ProviderListing {
    fn into_models(self) -> Vec<ProviderModel> {
        match self {
            ProviderListing::Data { data } => data,
            ProviderListing::Models { models } => models,
            ProviderListing::Bare(models) => models,
        }
    }
}

#[derive(Deserialize)]
struct ProviderModel {
    #[serde(alias = "name")]
    id: String,
    #[serde(default)]
    created: Option<i64>,
    #[serde(default)]
    owned_by: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ModelList {
    pub object: &'static str,
    pub data: Vec<ModelEntry>,
}

#[derive(Debug, Serialize)]
pub struct ModelEntry {
    pub id: String,
    pub object: &'static str,
    pub created: i64,
    pub owned_by: String,
    pub capabilities: Capabilities,
    pub context_length: u32,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct Capabilities {
    pub vision: bool,
    pub function_calling: bool,
    pub json_output: bool,
    pub audio: bool,
}

/// Rough context window guess from the parameter-count marker in the id.
pub fn context_length(model_id: &str) -> u32 {
    let id = model_id.to_ascii_lowercase();
    let has = |markers: &[&str]| markers.iter().any(|m| id.contains(m));
    if has(&["671b", "405b"]) {
        128_000
    } else if has(&["70b", "32b"]) {
        64_000
    } else if has(&["17b", "11b"]) {
        32_000
    } else if has(&["8b", "7b"]) {
        16_384
    } else if has(&["3b"]) {
        8_192
    } else {
        16_384
    }
}

fn describe(model: ProviderModel, classifier: &CapabilityClassifier) -> ModelEntry {
    let lower = model.id.to_ascii_lowercase();
    ModelEntry {
        capabilities: Capabilities {
            vision: classifier.supports_vision(&model.id),
            function_calling: true,
            json_output: true,
            audio: lower.contains("audio") || lower.contains("speech"),
        },
        context_length: context_length(&model.id),
        created: model.created.unwrap_or_default(),
        owned_by: model.owned_by.unwrap_or_else(|| "upstream".into()),
        object: "model",
        id: model.id,
    }
}

pub fn normalize(
    body: serde_json::Value,
    classifier: &CapabilityClassifier,
) -> Result<ModelList, ApiError> {
    let listing: ProviderListing = serde_json::from_value(body).map_err(|e| {
        tracing::error!(error = %e, "unrecognised models response");
        ApiError::UpstreamRequest {
            status: StatusCode::BAD_GATEWAY.as_u16(),
            message: "Failed to fetch models from external API".into(),
        }
    })?;
    Ok(ModelList {
        object: "list",
        data: listing
            .into_models()
            .into_iter()
            .map(|m| describe(m, classifier))
            .collect(),
    })
}

/// `GET /api/models`
pub async fn list_models(State(app): State<AppState>) -> Result<Json<ModelList>, ApiError> {
    let body = app.connector().list_models().await?;
    let list = normalize(body, app.classifier())?;
    tracing::debug!(count = list.data.len(), "listed upstream models");
    Ok(Json(list))
}
