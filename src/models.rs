//! Core data models shared by the capabilities and the HTTP layer.
//!
//! Request enums deserialize from the kebab-case tags used by the public API;
//! result types serialize with camelCase field names.

use serde::{Deserialize, Serialize};

// ============ Chat ============

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// Assistant persona selecting the system prompt for enhanced chat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Persona {
    Developer,
    Creative,
    Analyst,
    #[default]
    General,
}

impl Persona {
    pub fn display_name(&self) -> &'static str {
        match self {
            Persona::Developer => "Developer Assistant",
            Persona::Creative => "Creative Assistant",
            Persona::Analyst => "Business Analyst",
            Persona::General => "AI Assistant",
        }
    }

    pub fn system_prompt(&self) -> &'static str {
        match self {
            Persona::Developer => {
                "You are a senior software engineer with broad experience across frontend, \
                 backend, databases, system architecture and deployment.\n\n\
                 Give clear, actionable solutions with commented code examples. Point out \
                 pitfalls, performance considerations and how to test the result. Ask a \
                 clarifying question when the request is ambiguous."
            }
            Persona::Creative => {
                "You are a creative professional skilled in writing, copywriting, brand \
                 messaging and design thinking.\n\n\
                 Offer original, engaging ideas, give several options when it helps, explain \
                 the reasoning behind creative choices and suggest concrete next steps."
            }
            Persona::Analyst => {
                "You are a senior business analyst experienced in data analysis, strategy, \
                 financial modelling and risk assessment.\n\n\
                 Ground recommendations in data, state the rationale and trade-offs, outline \
                 an implementation plan and name the metrics that track success."
            }
            Persona::General => {
                "You are a knowledgeable, helpful assistant.\n\n\
                 Give accurate, well-structured answers that are complete but concise. Use \
                 headings, lists and examples where they help, say so when you do not know \
                 something, and keep a friendly, professional tone."
            }
        }
    }
}

// ============ Classification ============

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClassificationTask {
    #[serde(rename = "sentiment-analysis")]
    Sentiment,
    #[serde(rename = "topic-classification")]
    Topic,
    #[serde(rename = "emotion-detection")]
    Emotion,
}

impl ClassificationTask {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClassificationTask::Sentiment => "sentiment-analysis",
            ClassificationTask::Topic => "topic-classification",
            ClassificationTask::Emotion => "emotion-detection",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "sentiment-analysis" => Some(ClassificationTask::Sentiment),
            "topic-classification" => Some(ClassificationTask::Topic),
            "emotion-detection" => Some(ClassificationTask::Emotion),
            _ => None,
        }
    }

    /// Hugging Face model serving this task.
    pub fn huggingface_model(&self) -> &'static str {
        match self {
            ClassificationTask::Sentiment => "cardiffnlp/twitter-roberta-base-sentiment",
            ClassificationTask::Topic => "facebook/bart-large-mnli",
            ClassificationTask::Emotion => "SamLowe/roberta-base-go_emotions",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub name: String,
    pub score: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub label: String,
    pub confidence: u8,
    pub categories: Vec<Category>,
}

// ============ Summarization ============

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SummaryModel {
    #[default]
    #[serde(rename = "bart-cnn")]
    BartCnn,
    #[serde(rename = "t5-small")]
    T5Small,
    #[serde(rename = "pegasus")]
    Pegasus,
}

impl SummaryModel {
    pub fn key(&self) -> &'static str {
        match self {
            SummaryModel::BartCnn => "bart-cnn",
            SummaryModel::T5Small => "t5-small",
            SummaryModel::Pegasus => "pegasus",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "bart-cnn" => Some(SummaryModel::BartCnn),
            "t5-small" => Some(SummaryModel::T5Small),
            "pegasus" => Some(SummaryModel::Pegasus),
            _ => None,
        }
    }

    pub fn huggingface_model(&self) -> &'static str {
        match self {
            SummaryModel::BartCnn => "facebook/bart-large-cnn",
            SummaryModel::T5Small => "google/flan-t5-small",
            SummaryModel::Pegasus => "google/pegasus-xsum",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummarizationResult {
    pub original_text: String,
    pub summary: String,
    pub word_count: usize,
    pub compression_ratio: i64,
}

// ============ OCR ============

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OcrModel {
    #[default]
    #[serde(rename = "trocr-base")]
    TrocrBase,
    #[serde(rename = "trocr-large")]
    TrocrLarge,
    #[serde(rename = "nougat")]
    Nougat,
}

impl OcrModel {
    pub fn key(&self) -> &'static str {
        match self {
            OcrModel::TrocrBase => "trocr-base",
            OcrModel::TrocrLarge => "trocr-large",
            OcrModel::Nougat => "nougat",
        }
    }

    pub fn huggingface_model(&self) -> &'static str {
        match self {
            OcrModel::TrocrBase => "microsoft/trocr-base-printed",
            OcrModel::TrocrLarge => "microsoft/trocr-large-printed",
            OcrModel::Nougat => "facebook/nougat-small",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "trocr-base" => Some(OcrModel::TrocrBase),
            "trocr-large" => Some(OcrModel::TrocrLarge),
            "nougat" => Some(OcrModel::Nougat),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OcrResult {
    pub text: String,
    pub confidence: u8,
    pub language: String,
}

// ============ Q&A and RAG ============

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QnaResult {
    pub question: String,
    pub answer: String,
    pub context: String,
    pub confidence: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RagUploadResult {
    pub filename: String,
    pub chunk_count: usize,
    pub total_documents: usize,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RagQueryResult {
    pub question: String,
    pub answer: String,
    pub total_documents: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RagStatus {
    pub total_documents: usize,
    pub total_chunks: usize,
    pub has_documents: bool,
    pub status: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_tags() {
        let task: ClassificationTask = serde_json::from_str("\"emotion-detection\"").unwrap();
        assert_eq!(task, ClassificationTask::Emotion);
        assert!(serde_json::from_str::<ClassificationTask>("\"spam\"").is_err());
    }

    #[test]
    fn test_summary_result_is_camel_case() {
        let result = SummarizationResult {
            original_text: "a b".to_string(),
            summary: "a".to_string(),
            word_count: 1,
            compression_ratio: 50,
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["wordCount"], 1);
        assert_eq!(json["compressionRatio"], 50);
        assert!(json.get("originalText").is_some());
    }

    #[test]
    fn test_persona_defaults_to_general() {
        assert_eq!(Persona::default(), Persona::General);
        let p: Persona = serde_json::from_str("\"analyst\"").unwrap();
        assert_eq!(p.display_name(), "Business Analyst");
    }
}
