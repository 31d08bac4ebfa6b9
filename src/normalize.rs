//! Result normalization for provider payloads.
//!
//! Providers answer the same capability with different JSON shapes, and a
//! single provider may switch shape between response variants. Each payload is
//! first classified into a tagged union ([`RawClassification`]) and then
//! reduced to the fixed output schema of its capability.
//!
//! # Classification shapes
//!
//! | Variant | Example |
//! |---------|---------|
//! | `Pairs` | `[{"label": "LABEL_2", "score": 0.91}, ...]` |
//! | `Nested` | `[[{"label": "LABEL_2", "score": 0.91}, ...]]` |
//! | `Parallel` | `{"labels": ["sports", ...], "scores": [0.8, ...]}` |
//! | `Single` | `{"label": "positive", "score": 0.97}` |
//! | `Unknown` | anything else |
//!
//! Scores become integer percentages in `0..=100`, categories are sorted by
//! descending score, and `label`/`confidence` mirror the top category.

use serde_json::Value;

use crate::error::NormalizeError;
use crate::models::{Category, ClassificationResult, ClassificationTask};

/// Confidence used by the degraded path when a payload carries none.
pub const DEFAULT_CONFIDENCE: u8 = 50;

const SENTIMENT_LABELS: &[&str] = &["negative", "neutral", "positive"];

const EMOTION_LABELS: &[&str] = &[
    "admiration",
    "amusement",
    "anger",
    "annoyance",
    "approval",
    "caring",
    "confusion",
    "curiosity",
    "desire",
    "disappointment",
    "disapproval",
    "disgust",
    "embarrassment",
    "excitement",
    "fear",
    "gratitude",
    "grief",
    "joy",
    "love",
    "nervousness",
    "optimism",
    "pride",
    "realization",
    "relief",
    "remorse",
    "sadness",
    "surprise",
    "neutral",
];

/// One `{label, score}` entry of a classification payload.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelScore {
    pub label: Option<String>,
    pub score: Option<f64>,
}

impl LabelScore {
    fn from_object(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        let label = obj
            .get("label")
            .or_else(|| obj.get("class"))
            .and_then(|v| v.as_str())
            .map(|s| s.to_string());
        let score = obj
            .get("score")
            .or_else(|| obj.get("confidence"))
            .and_then(|v| v.as_f64());
        Some(Self { label, score })
    }
}

/// Raw classification payload, tagged by shape.
#[derive(Debug, Clone, PartialEq)]
pub enum RawClassification {
    Pairs(Vec<LabelScore>),
    Nested(Vec<Vec<LabelScore>>),
    Parallel { labels: Vec<String>, scores: Vec<f64> },
    Single(LabelScore),
    Unknown(Value),
}

impl RawClassification {
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::Array(items) if !items.is_empty() && items.iter().all(|i| i.is_array()) => {
                let groups: Option<Vec<Vec<LabelScore>>> = items
                    .iter()
                    .map(|group| {
                        group
                            .as_array()
                            .into_iter()
                            .flatten()
                            .map(LabelScore::from_object)
                            .collect::<Option<Vec<LabelScore>>>()
                    })
                    .collect();
                match groups {
                    Some(groups) => RawClassification::Nested(groups),
                    None => RawClassification::Unknown(value.clone()),
                }
            }
            Value::Array(items) => {
                let pairs: Option<Vec<LabelScore>> =
                    items.iter().map(LabelScore::from_object).collect();
                match pairs {
                    Some(pairs) => RawClassification::Pairs(pairs),
                    None => RawClassification::Unknown(value.clone()),
                }
            }
            Value::Object(obj) => {
                let labels = obj.get("labels").and_then(|v| v.as_array());
                let scores = obj.get("scores").and_then(|v| v.as_array());
                if let (Some(labels), Some(scores)) = (labels, scores) {
                    let labels: Option<Vec<String>> = labels
                        .iter()
                        .map(|l| l.as_str().map(|s| s.to_string()))
                        .collect();
                    let scores: Option<Vec<f64>> = scores.iter().map(|s| s.as_f64()).collect();
                    if let (Some(labels), Some(scores)) = (labels, scores) {
                        return RawClassification::Parallel { labels, scores };
                    }
                    return RawClassification::Unknown(value.clone());
                }

                let label = obj.get("label").and_then(|v| v.as_str());
                let score = obj.get("score").and_then(|v| v.as_f64());
                match (label, score) {
                    (Some(label), Some(score)) => RawClassification::Single(LabelScore {
                        label: Some(label.to_string()),
                        score: Some(score),
                    }),
                    _ => RawClassification::Unknown(value.clone()),
                }
            }
            other => RawClassification::Unknown(other.clone()),
        }
    }
}

/// Translate an opaque class identifier (`LABEL_n`) for tasks whose
/// Hugging Face model reports them. Unmapped identifiers pass through.
pub fn map_label(task: ClassificationTask, label: &str) -> String {
    let table = match task {
        ClassificationTask::Sentiment => SENTIMENT_LABELS,
        ClassificationTask::Emotion => EMOTION_LABELS,
        ClassificationTask::Topic => return label.to_string(),
    };
    label
        .strip_prefix("LABEL_")
        .and_then(|idx| idx.parse::<usize>().ok())
        .and_then(|idx| table.get(idx))
        .map(|name| name.to_string())
        .unwrap_or_else(|| label.to_string())
}

/// Scale a fractional score to an integer percentage.
pub fn to_percent(score: f64) -> u8 {
    if !score.is_finite() {
        return 0;
    }
    (score * 100.0).round().clamp(0.0, 100.0) as u8
}

/// Like [`to_percent`], but integers and values above 1.0 are taken as
/// percentages already.
fn lenient_percent(value: &Value) -> Option<u8> {
    if value.is_u64() || value.is_i64() {
        return value.as_i64().map(|v| v.clamp(0, 100) as u8);
    }
    let v = value.as_f64()?;
    if v > 1.0 {
        Some(v.round().clamp(0.0, 100.0) as u8)
    } else {
        Some(to_percent(v))
    }
}

fn category(task: ClassificationTask, pair: &LabelScore) -> Category {
    Category {
        name: pair
            .label
            .as_deref()
            .map(|l| map_label(task, l))
            .unwrap_or_else(|| "unknown".to_string()),
        score: to_percent(pair.score.unwrap_or(0.0)),
    }
}

fn finish(mut categories: Vec<Category>) -> Result<ClassificationResult, NormalizeError> {
    // Stable sort keeps provider order among equal scores.
    categories.sort_by(|a, b| b.score.cmp(&a.score));
    let top = categories.first().ok_or_else(|| NormalizeError::Empty {
        capability: "classification".to_string(),
    })?;
    Ok(ClassificationResult {
        label: top.name.clone(),
        confidence: top.score,
        categories,
    })
}

/// Reduce a tagged classification payload to a [`ClassificationResult`].
pub fn normalize_classification(
    task: ClassificationTask,
    raw: &RawClassification,
) -> Result<ClassificationResult, NormalizeError> {
    let categories = match raw {
        RawClassification::Pairs(pairs) => pairs.iter().map(|p| category(task, p)).collect(),
        RawClassification::Nested(groups) => groups
            .iter()
            .flatten()
            .map(|p| category(task, p))
            .collect(),
        RawClassification::Parallel { labels, scores } => labels
            .iter()
            .enumerate()
            .map(|(i, label)| Category {
                name: map_label(task, label),
                score: to_percent(scores.get(i).copied().unwrap_or(0.0)),
            })
            .collect(),
        RawClassification::Single(pair) => vec![category(task, pair)],
        RawClassification::Unknown(value) => {
            return Err(NormalizeError::UnknownShape {
                capability: "classification".to_string(),
                detail: describe_shape(value),
            })
        }
    };
    finish(categories)
}

/// Best-effort extraction for payloads no known shape matched.
///
/// Pulls `label` or `labels` and any `score`/`confidence`/`scores` found,
/// defaulting confidence to [`DEFAULT_CONFIDENCE`]. Returns `None` when the
/// payload carries no label at all.
pub fn degraded_classification(
    task: ClassificationTask,
    value: &Value,
) -> Option<ClassificationResult> {
    let obj = value.as_object()?;

    if let Some(label) = obj.get("label").and_then(|v| v.as_str()) {
        let confidence = obj
            .get("score")
            .or_else(|| obj.get("confidence"))
            .and_then(lenient_percent)
            .unwrap_or(DEFAULT_CONFIDENCE);
        let name = map_label(task, label);
        return Some(ClassificationResult {
            label: name.clone(),
            confidence,
            categories: vec![Category {
                name,
                score: confidence,
            }],
        });
    }

    let labels = obj.get("labels").and_then(|v| v.as_array())?;
    let scores = obj.get("scores").and_then(|v| v.as_array());
    let categories: Vec<Category> = labels
        .iter()
        .enumerate()
        .filter_map(|(i, label)| {
            let name = label.as_str()?;
            let score = scores
                .and_then(|s| s.get(i))
                .and_then(lenient_percent)
                .unwrap_or(DEFAULT_CONFIDENCE);
            Some(Category {
                name: map_label(task, name),
                score,
            })
        })
        .collect();
    finish(categories).ok()
}

/// Normalize a classification payload, falling back to degraded extraction
/// before giving up with the original parse error.
pub fn normalize_or_degrade(
    task: ClassificationTask,
    value: &Value,
) -> Result<ClassificationResult, NormalizeError> {
    let raw = RawClassification::from_value(value);
    match normalize_classification(task, &raw) {
        Ok(result) => Ok(result),
        Err(err) => {
            tracing::warn!(task = task.as_str(), error = %err, "falling back to degraded extraction");
            degraded_classification(task, value).ok_or(err)
        }
    }
}

/// Pull the generated text out of a summarization payload.
pub fn extract_summary_text(value: &Value) -> Result<String, NormalizeError> {
    let text = match value {
        Value::String(s) => Some(s.clone()),
        Value::Array(items) => items.iter().find_map(text_field),
        Value::Object(_) => text_field(value),
        _ => None,
    };

    match text {
        Some(t) if !t.trim().is_empty() => Ok(t),
        Some(_) => Err(NormalizeError::Empty {
            capability: "summarization".to_string(),
        }),
        None => Err(NormalizeError::UnknownShape {
            capability: "summarization".to_string(),
            detail: describe_shape(value),
        }),
    }
}

fn text_field(value: &Value) -> Option<String> {
    if let Some(s) = value.as_str() {
        return Some(s.to_string());
    }
    ["summary_text", "generated_text", "text"]
        .iter()
        .find_map(|key| value.get(*key).and_then(|v| v.as_str()))
        .map(|s| s.to_string())
}

/// Pull the recognised text out of an image-to-text payload
/// (`[{"generated_text": "..."}]`).
pub fn extract_generated_text(value: &Value) -> Result<String, NormalizeError> {
    let text = value
        .as_array()
        .and_then(|items| items.first())
        .and_then(|first| first.get("generated_text"))
        .and_then(|v| v.as_str())
        .ok_or_else(|| NormalizeError::UnknownShape {
            capability: "ocr".to_string(),
            detail: describe_shape(value),
        })?;

    if text.trim().is_empty() {
        return Err(NormalizeError::Empty {
            capability: "ocr".to_string(),
        });
    }
    Ok(text.to_string())
}

/// Strip Markdown code fences that chat models wrap around JSON answers.
pub fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let without_open = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    without_open
        .strip_suffix("```")
        .unwrap_or(without_open)
        .trim()
}

fn describe_shape(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(_) => "boolean".to_string(),
        Value::Number(_) => "number".to_string(),
        Value::String(_) => "string".to_string(),
        Value::Array(items) => format!("array of {} items", items.len()),
        Value::Object(obj) => {
            let keys: Vec<&str> = obj.keys().map(|k| k.as_str()).collect();
            format!("object with keys [{}]", keys.join(", "))
        }
    }
}
