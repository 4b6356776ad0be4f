use serde_json::{Map, Value};

use super::service::ConfigError;

pub fn validate_config(config: &Value) -> Result<(), ConfigError> {
    let root = config
        .as_object()
        .ok_or_else(|| config_type_error("root", "object"))?;

    if let Some(app) = expect_optional_object(root, "app")? {
        validate_optional_string_field(app, "app.name", "name")?;
        validate_optional_string_field(app, "app.description", "description")?;
    }

    if let Some(server) = expect_optional_object(root, "server")? {
        validate_optional_string_field(server, "server.host", "host")?;
        validate_u64_field(server, "server.port", "port", 0, 65535)?;
        validate_string_array_field(
            server,
            "server.cors_allowed_origins",
            "cors_allowed_origins",
        )?;
    }

    if let Some(catalog) = expect_optional_object(root, "catalog")? {
        validate_non_empty_string_field(catalog, "catalog.path", "path")?;
        validate_single_char_field(catalog, "catalog.delimiter", "delimiter")?;
        validate_single_char_field(catalog, "catalog.quote", "quote")?;
    }

    if let Some(splitter) = expect_optional_object(root, "splitter")? {
        validate_u64_field(splitter, "splitter.chunk_size", "chunk_size", 1, 100_000)?;
        validate_u64_field(
            splitter,
            "splitter.chunk_overlap",
            "chunk_overlap",
            0,
            100_000,
        )?;
        let size = splitter.get("chunk_size").and_then(Value::as_u64).unwrap_or(100);
        let overlap = splitter
            .get("chunk_overlap")
            .and_then(Value::as_u64)
            .unwrap_or(50);
        if overlap >= size {
            return Err(ConfigError::Invalid {
                path: "splitter.chunk_overlap".to_string(),
                reason: format!("must be smaller than chunk_size ({})", size),
            });
        }
    }

    if let Some(retrieval) = expect_optional_object(root, "retrieval")? {
        if let Some(value) = retrieval.get("search_type") {
            match value.as_str() {
                Some("mmr") | Some("similarity") => {}
                _ => return Err(config_type_error("retrieval.search_type", "'mmr' or 'similarity'")),
            }
        }
        validate_u64_field(retrieval, "retrieval.k", "k", 1, 100)?;
        validate_u64_field(retrieval, "retrieval.fetch_k", "fetch_k", 1, 10_000)?;
        validate_f64_field(retrieval, "retrieval.lambda_mult", "lambda_mult", 0.0, 1.0)?;
        validate_u64_field(
            retrieval,
            "retrieval.embed_batch_size",
            "embed_batch_size",
            1,
            2048,
        )?;
        validate_bool_field(retrieval, "retrieval.cache_enabled", "cache_enabled")?;
    }

    if let Some(memory) = expect_optional_object(root, "memory")? {
        validate_u64_field(
            memory,
            "memory.max_token_limit",
            "max_token_limit",
            1,
            1_000_000,
        )?;
    }

    if let Some(chain) = expect_optional_object(root, "chain")? {
        validate_u64_field(
            chain,
            "chain.max_tokens_limit",
            "max_tokens_limit",
            1,
            1_000_000,
        )?;
        validate_u64_field(
            chain,
            "chain.max_question_chars",
            "max_question_chars",
            1,
            1_000_000,
        )?;
    }

    if let Some(openai) = expect_optional_object(root, "openai")? {
        validate_optional_string_field(openai, "openai.api_key", "api_key")?;
        validate_non_empty_string_field(openai, "openai.base_url", "base_url")?;
        validate_non_empty_string_field(openai, "openai.chat_model", "chat_model")?;
        validate_non_empty_string_field(openai, "openai.embedding_model", "embedding_model")?;
        validate_f64_field(openai, "openai.temperature", "temperature", 0.0, 2.0)?;
        validate_u64_field(openai, "openai.max_tokens", "max_tokens", 1, 1_000_000)?;
        validate_u64_field(openai, "openai.timeout_secs", "timeout_secs", 1, 86_400)?;
    }

    if let Some(history) = expect_optional_object(root, "history")? {
        validate_bool_field(history, "history.persist", "persist")?;
        validate_u64_field(
            history,
            "history.default_limit",
            "default_limit",
            1,
            100_000,
        )?;
    }

    Ok(())
}

fn expect_optional_object<'a>(
    root: &'a Map<String, Value>,
    key: &str,
) -> Result<Option<&'a Map<String, Value>>, ConfigError> {
    match root.get(key) {
        Some(Value::Object(map)) => Ok(Some(map)),
        Some(_) => Err(config_type_error(key, "object")),
        None => Ok(None),
    }
}

fn validate_bool_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
) -> Result<(), ConfigError> {
    let Some(value) = section.get(key) else {
        return Ok(());
    };
    if value.as_bool().is_some() {
        return Ok(());
    }
    Err(config_type_error(path, "boolean"))
}

fn validate_u64_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
    min: u64,
    max: u64,
) -> Result<(), ConfigError> {
    let Some(value) = section.get(key) else {
        return Ok(());
    };
    if value.is_null() {
        return Ok(());
    }
    let Some(number) = value.as_u64() else {
        return Err(config_type_error(path, "integer"));
    };
    if number < min || number > max {
        return Err(range_error(path, min, max));
    }
    Ok(())
}

fn validate_f64_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
    min: f64,
    max: f64,
) -> Result<(), ConfigError> {
    let Some(value) = section.get(key) else {
        return Ok(());
    };
    let Some(number) = value.as_f64() else {
        return Err(config_type_error(path, "number"));
    };
    if number < min || number > max {
        return Err(range_error(path, min, max));
    }
    Ok(())
}

fn validate_non_empty_string_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
) -> Result<(), ConfigError> {
    let Some(value) = section.get(key) else {
        return Ok(());
    };
    let Some(text) = value.as_str() else {
        return Err(config_type_error(path, "string"));
    };
    if text.trim().is_empty() {
        return Err(ConfigError::Invalid {
            path: path.to_string(),
            reason: "value cannot be empty".to_string(),
        });
    }
    Ok(())
}

fn validate_optional_string_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
) -> Result<(), ConfigError> {
    let Some(value) = section.get(key) else {
        return Ok(());
    };
    if value.is_null() || value.as_str().is_some() {
        return Ok(());
    }
    Err(config_type_error(path, "string"))
}

fn validate_single_char_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
) -> Result<(), ConfigError> {
    let Some(value) = section.get(key) else {
        return Ok(());
    };
    match value.as_str() {
        Some(text) if text.chars().count() == 1 && text.is_ascii() => Ok(()),
        _ => Err(config_type_error(path, "a single ASCII character")),
    }
}

fn validate_string_array_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
) -> Result<(), ConfigError> {
    let Some(value) = section.get(key) else {
        return Ok(());
    };
    let Some(items) = value.as_array() else {
        return Err(config_type_error(path, "array of strings"));
    };
    for (index, item) in items.iter().enumerate() {
        let Some(text) = item.as_str() else {
            return Err(config_type_error(&format!("{}[{}]", path, index), "string"));
        };
        if text.trim().is_empty() {
            return Err(ConfigError::Invalid {
                path: format!("{}[{}]", path, index),
                reason: "value cannot be empty".to_string(),
            });
        }
    }
    Ok(())
}

fn range_error<T: std::fmt::Display>(path: &str, min: T, max: T) -> ConfigError {
    ConfigError::Invalid {
        path: path.to_string(),
        reason: format!("must be between {} and {}", min, max),
    }
}

fn config_type_error(path: &str, expected: &str) -> ConfigError {
    ConfigError::Invalid {
        path: path.to_string(),
        reason: format!("expected {}", expected),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn accepts_defaults_and_partial_sections() {
        assert!(validate_config(&json!({})).is_ok());
        assert!(validate_config(&json!({
            "splitter": { "chunk_size": 200, "chunk_overlap": 20 },
            "retrieval": { "search_type": "similarity", "k": 4 }
        }))
        .is_ok());
    }

    #[test]
    fn rejects_overlap_not_smaller_than_chunk_size() {
        let err = validate_config(&json!({
            "splitter": { "chunk_size": 50, "chunk_overlap": 50 }
        }))
        .unwrap_err();
        assert!(err.to_string().contains("splitter.chunk_overlap"));
    }

    #[test]
    fn rejects_out_of_range_and_mistyped_values() {
        assert!(validate_config(&json!({ "retrieval": { "lambda_mult": 1.5 } })).is_err());
        assert!(validate_config(&json!({ "retrieval": { "search_type": "hybrid" } })).is_err());
        assert!(validate_config(&json!({ "catalog": { "delimiter": ";;" } })).is_err());
        assert!(validate_config(&json!({ "openai": { "chat_model": "" } })).is_err());
        assert!(validate_config(&json!({ "memory": "lots" })).is_err());
    }
}
