use std::cmp::Ordering;

use serde_json::Value;

use crate::models::{ModelDescriptor, ModelPricing};

/// Capability a caller can require from the catalog listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelCapability {
    Any,
    Image,
    Video,
}

impl ModelCapability {
    pub fn from_query(raw: Option<&str>) -> Self {
        match raw {
            Some("image") => ModelCapability::Image,
            Some("video") => ModelCapability::Video,
            _ => ModelCapability::Any,
        }
    }
}

// Known raw shapes for modality fields, tried in order. New upstream
// shapes get a new entry here instead of another chained fallback.
const OUTPUT_MODALITY_PATHS: &[&[&str]] = &[
    &["architecture", "output_modalities"],
    &["output_modalities"],
];
const INPUT_MODALITY_PATHS: &[&[&str]] = &[
    &["architecture", "input_modalities"],
    &["input_modalities"],
];

/// Maps the raw upstream model list into normalized descriptors. Records
/// that cannot be parsed are dropped; a bad entry never aborts the batch.
pub fn normalize_models(raw: &[Value]) -> Vec<ModelDescriptor> {
    raw.iter().filter_map(normalize_model).collect()
}

fn normalize_model(record: &Value) -> Option<ModelDescriptor> {
    let id = record["id"].as_str()?.to_string();
    let name = record["name"].as_str().unwrap_or(&id).to_string();
    let description = record["description"].as_str().unwrap_or_default().to_string();

    let pricing = ModelPricing {
        prompt: parse_price(&record["pricing"]["prompt"]),
        completion: parse_price(&record["pricing"]["completion"]),
    };
    let is_free = pricing.prompt == 0.0 && pricing.completion == 0.0;

    let input_modalities = extract_modalities(record, INPUT_MODALITY_PATHS);
    let output_modalities = extract_modalities(record, OUTPUT_MODALITY_PATHS);
    let is_image_capable = output_modalities.iter().any(|m| m == "image");
    let is_video_capable = output_modalities.iter().any(|m| m == "video")
        || input_modalities.iter().any(|m| m == "video");

    Some(ModelDescriptor {
        id,
        name,
        description,
        pricing,
        is_free,
        input_modalities,
        output_modalities,
        is_image_capable,
        is_video_capable,
    })
}

// Upstream pricing comes back as either a JSON number or a decimal string.
fn parse_price(value: &Value) -> f64 {
    let parsed = match value {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => s.trim().parse().unwrap_or(0.0),
        _ => 0.0,
    };
    parsed.max(0.0)
}

fn extract_modalities(record: &Value, paths: &[&[&str]]) -> Vec<String> {
    for path in paths {
        let mut cursor = record;
        for key in *path {
            cursor = &cursor[*key];
        }
        if let Some(entries) = cursor.as_array() {
            return entries
                .iter()
                .filter_map(|v| v.as_str().map(|s| s.to_lowercase()))
                .collect();
        }
    }
    Vec::new()
}

/// Orders descriptors free-first, then by ascending prompt price. The sort
/// is stable so ties keep the upstream order.
pub fn rank(mut models: Vec<ModelDescriptor>) -> Vec<ModelDescriptor> {
    models.sort_by(|a, b| {
        b.is_free.cmp(&a.is_free).then_with(|| {
            a.pricing
                .prompt
                .partial_cmp(&b.pricing.prompt)
                .unwrap_or(Ordering::Equal)
        })
    });
    models
}

pub fn filter_by_capability(
    models: &[ModelDescriptor],
    capability: ModelCapability,
) -> Vec<ModelDescriptor> {
    models
        .iter()
        .filter(|m| match capability {
            ModelCapability::Any => true,
            ModelCapability::Image => m.is_image_capable,
            ModelCapability::Video => m.is_video_capable,
        })
        .cloned()
        .collect()
}

/// The listing a mode presents to the user: filter first, then rank, so
/// the default-selection tie-break applies to the filtered set.
pub fn models_for_capability(
    models: &[ModelDescriptor],
    capability: ModelCapability,
) -> Vec<ModelDescriptor> {
    rank(filter_by_capability(models, capability))
}
