use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub memory: MemoryConfig,
    #[serde(default)]
    pub rag: RagConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:3000".to_string()
}
fn default_max_upload_bytes() -> usize {
    10 * 1024 * 1024
}

#[derive(Debug, Deserialize, Clone)]
pub struct ProvidersConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_huggingface_url")]
    pub huggingface_url: String,
    #[serde(default = "default_gemini_url")]
    pub gemini_url: String,
    #[serde(default = "default_openrouter_url")]
    pub openrouter_url: String,
    #[serde(default = "default_gemini_model")]
    pub gemini_model: String,
    #[serde(default = "default_openrouter_chat_model")]
    pub openrouter_chat_model: String,
    #[serde(default = "default_openrouter_answer_model")]
    pub openrouter_answer_model: String,
    /// Probe requests sent while a Hugging Face model reports it is loading.
    #[serde(default = "default_warmup_attempts")]
    pub warmup_attempts: u32,
    #[serde(default = "default_warmup_delay_ms")]
    pub warmup_delay_ms: u64,
    #[serde(default = "default_referer")]
    pub referer: String,
    #[serde(default = "default_app_title")]
    pub app_title: String,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            huggingface_url: default_huggingface_url(),
            gemini_url: default_gemini_url(),
            openrouter_url: default_openrouter_url(),
            gemini_model: default_gemini_model(),
            openrouter_chat_model: default_openrouter_chat_model(),
            openrouter_answer_model: default_openrouter_answer_model(),
            warmup_attempts: default_warmup_attempts(),
            warmup_delay_ms: default_warmup_delay_ms(),
            referer: default_referer(),
            app_title: default_app_title(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    60
}
fn default_huggingface_url() -> String {
    "https://api-inference.huggingface.co".to_string()
}
fn default_gemini_url() -> String {
    "https://generativelanguage.googleapis.com".to_string()
}
fn default_openrouter_url() -> String {
    "https://openrouter.ai/api/v1".to_string()
}
fn default_gemini_model() -> String {
    "gemini-1.5-flash".to_string()
}
fn default_openrouter_chat_model() -> String {
    "meta-llama/llama-3.2-3b-instruct:free".to_string()
}
fn default_openrouter_answer_model() -> String {
    "openai/gpt-3.5-turbo".to_string()
}
fn default_warmup_attempts() -> u32 {
    3
}
fn default_warmup_delay_ms() -> u64 {
    2000
}
fn default_referer() -> String {
    "http://localhost:3000".to_string()
}
fn default_app_title() -> String {
    "AI Applications Demo".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct MemoryConfig {
    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,
    #[serde(default = "default_max_token_limit")]
    pub max_token_limit: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            max_sessions: default_max_sessions(),
            max_token_limit: default_max_token_limit(),
        }
    }
}

fn default_max_sessions() -> usize {
    1000
}
fn default_max_token_limit() -> usize {
    2000
}

#[derive(Debug, Deserialize, Clone)]
pub struct RagConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_embedding_dims")]
    pub embedding_dims: usize,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            top_k: default_top_k(),
            embedding_dims: default_embedding_dims(),
        }
    }
}

fn default_chunk_size() -> usize {
    1000
}
fn default_chunk_overlap() -> usize {
    200
}
fn default_top_k() -> usize {
    4
}
fn default_embedding_dims() -> usize {
    64
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

pub fn validate(config: &Config) -> Result<()> {
    if config.server.max_upload_bytes == 0 {
        anyhow::bail!("server.max_upload_bytes must be > 0");
    }

    if config.providers.timeout_secs == 0 {
        anyhow::bail!("providers.timeout_secs must be > 0");
    }

    if config.memory.max_sessions == 0 {
        anyhow::bail!("memory.max_sessions must be > 0");
    }
    if config.memory.max_token_limit == 0 {
        anyhow::bail!("memory.max_token_limit must be > 0");
    }

    if config.rag.chunk_size == 0 {
        anyhow::bail!("rag.chunk_size must be > 0");
    }
    if config.rag.chunk_overlap >= config.rag.chunk_size {
        anyhow::bail!(
            "rag.chunk_overlap ({}) must be smaller than rag.chunk_size ({})",
            config.rag.chunk_overlap,
            config.rag.chunk_size
        );
    }
    if config.rag.top_k == 0 {
        anyhow::bail!("rag.top_k must be >= 1");
    }
    if config.rag.embedding_dims == 0 {
        anyhow::bail!("rag.embedding_dims must be > 0");
    }

    Ok(())
}

// ============ Credentials ============

pub const HUGGINGFACE_TOKEN_VAR: &str = "HUGGINGFACE_API_TOKEN";
pub const GEMINI_KEY_VAR: &str = "GOOGLE_GEMINI_API_KEY";
pub const OPENROUTER_KEY_VAR: &str = "OPENROUTER_API_KEY";

/// Provider API credentials, read from the environment.
///
/// Empty values and the `your_..._here` placeholders shipped in sample env
/// files are treated as absent.
#[derive(Clone, Default)]
pub struct Credentials {
    pub huggingface: Option<String>,
    pub gemini: Option<String>,
    pub openrouter: Option<String>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("huggingface", &self.huggingface.is_some())
            .field("gemini", &self.gemini.is_some())
            .field("openrouter", &self.openrouter.is_some())
            .finish()
    }
}

/// Whether a provider has a usable credential.
#[derive(Debug, Clone, Serialize)]
pub struct CredentialStatus {
    pub provider: String,
    pub env_var: String,
    pub configured: bool,
}

impl Credentials {
    pub fn from_env() -> Self {
        Self {
            huggingface: read_credential(HUGGINGFACE_TOKEN_VAR),
            gemini: read_credential(GEMINI_KEY_VAR),
            openrouter: read_credential(OPENROUTER_KEY_VAR),
        }
    }

    pub fn status(&self) -> Vec<CredentialStatus> {
        [
            ("huggingface", HUGGINGFACE_TOKEN_VAR, &self.huggingface),
            ("gemini", GEMINI_KEY_VAR, &self.gemini),
            ("openrouter", OPENROUTER_KEY_VAR, &self.openrouter),
        ]
        .into_iter()
        .map(|(provider, var, value)| CredentialStatus {
            provider: provider.to_string(),
            env_var: var.to_string(),
            configured: value.is_some(),
        })
        .collect()
    }
}

fn read_credential(var: &str) -> Option<String> {
    std::env::var(var).ok().and_then(usable_credential)
}

/// Filters out empty and placeholder credential values.
pub fn usable_credential(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() || (trimmed.starts_with("your_") && trimmed.ends_with("_here")) {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let cfg = Config::default();
        assert!(validate(&cfg).is_ok());
        assert_eq!(cfg.rag.chunk_size, 1000);
        assert_eq!(cfg.rag.chunk_overlap, 200);
        assert_eq!(cfg.memory.max_token_limit, 2000);
        assert_eq!(cfg.providers.warmup_attempts, 3);
    }

    #[test]
    fn test_load_partial_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[server]\nbind = \"0.0.0.0:8080\"\n\n[rag]\ntop_k = 2\n"
        )
        .unwrap();

        let cfg = load_config(file.path()).unwrap();
        assert_eq!(cfg.server.bind, "0.0.0.0:8080");
        assert_eq!(cfg.rag.top_k, 2);
        assert_eq!(cfg.rag.chunk_size, 1000);
        assert_eq!(cfg.providers.gemini_model, "gemini-1.5-flash");
    }

    #[test]
    fn test_example_config_parses() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("config/aigw.example.toml");
        let cfg = load_config(&path).unwrap();
        assert_eq!(cfg.server.bind, "127.0.0.1:3000");
        assert_eq!(cfg.memory.max_sessions, 1000);
        assert_eq!(cfg.providers.openrouter_answer_model, "openai/gpt-3.5-turbo");
    }

    #[test]
    fn test_overlap_must_be_smaller_than_chunk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[rag]\nchunk_size = 100\nchunk_overlap = 100\n").unwrap();

        let err = load_config(file.path()).unwrap_err();
        assert!(err.to_string().contains("chunk_overlap"));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let mut cfg = Config::default();
        cfg.providers.timeout_secs = 0;
        assert!(validate(&cfg).is_err());
    }

    #[test]
    fn test_placeholder_credentials_are_absent() {
        assert_eq!(usable_credential(String::new()), None);
        assert_eq!(usable_credential("   ".to_string()), None);
        assert_eq!(
            usable_credential("your_huggingface_token_here".to_string()),
            None
        );
        assert_eq!(
            usable_credential("hf_abc123".to_string()),
            Some("hf_abc123".to_string())
        );
    }

    #[test]
    fn test_status_never_exposes_secret() {
        let creds = Credentials {
            huggingface: Some("secret-token".to_string()),
            gemini: None,
            openrouter: None,
        };
        let status = creds.status();
        assert_eq!(status.len(), 3);
        assert!(status[0].configured);
        assert!(!status[1].configured);
        let dumped = format!("{:?} {:?}", creds, status);
        assert!(!dumped.contains("secret-token"));
    }
}
