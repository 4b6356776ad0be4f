use serde::{Deserialize, Serialize};

pub const DEFAULT_APP_NAME: &str = "Disease Explainer";
pub const DEFAULT_APP_DESCRIPTION: &str = "A virtual assistant for differential diagnosis. \
Describe symptoms or ask about a disease and it answers from a curated medical catalog, \
citing the source it used.";

/// Typed view of `config.yml` merged with `secrets.yaml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub app: AppSection,
    pub server: ServerSection,
    pub catalog: CatalogSection,
    pub splitter: SplitterSection,
    pub retrieval: RetrievalSection,
    pub memory: MemorySection,
    pub chain: ChainSection,
    pub openai: OpenAiSection,
    pub history: HistorySection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSection {
    pub name: String,
    pub description: String,
}

impl Default for AppSection {
    fn default() -> Self {
        Self {
            name: DEFAULT_APP_NAME.to_string(),
            description: DEFAULT_APP_DESCRIPTION.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    pub host: String,
    pub port: u16,
    pub cors_allowed_origins: Vec<String>,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8501,
            cors_allowed_origins: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogSection {
    pub path: String,
    pub delimiter: char,
    pub quote: char,
}

impl Default for CatalogSection {
    fn default() -> Self {
        Self {
            path: "data/msd.csv".to_string(),
            delimiter: ';',
            quote: '"',
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitterSection {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for SplitterSection {
    fn default() -> Self {
        Self {
            chunk_size: 100,
            chunk_overlap: 50,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchType {
    Similarity,
    Mmr,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalSection {
    pub search_type: SearchType,
    pub k: usize,
    pub fetch_k: usize,
    pub lambda_mult: f32,
    pub embed_batch_size: usize,
    pub cache_enabled: bool,
}

impl Default for RetrievalSection {
    fn default() -> Self {
        Self {
            search_type: SearchType::Mmr,
            k: 2,
            fetch_k: 20,
            lambda_mult: 0.5,
            embed_batch_size: 64,
            cache_enabled: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MemorySection {
    pub max_token_limit: usize,
}

impl Default for MemorySection {
    fn default() -> Self {
        Self {
            max_token_limit: 1800,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainSection {
    pub max_tokens_limit: usize,
    pub max_question_chars: usize,
}

impl Default for ChainSection {
    fn default() -> Self {
        Self {
            max_tokens_limit: 1800,
            max_question_chars: 2000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenAiSection {
    pub api_key: Option<String>,
    pub base_url: String,
    pub chat_model: String,
    pub embedding_model: String,
    pub temperature: f64,
    pub max_tokens: Option<u32>,
    pub timeout_secs: u64,
}

impl Default for OpenAiSection {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.openai.com".to_string(),
            chat_model: "gpt-3.5-turbo".to_string(),
            embedding_model: "text-embedding-ada-002".to_string(),
            temperature: 0.0,
            max_tokens: None,
            timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HistorySection {
    pub persist: bool,
    pub default_limit: i64,
}

impl Default for HistorySection {
    fn default() -> Self {
        Self {
            persist: true,
            default_limit: 100,
        }
    }
}
