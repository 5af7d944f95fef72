//! Model name resolution.
//!
//! Users type a model the way they would for any of the usual agent
//! frameworks: a short alias (`claude`, `gemini`), an explicit
//! `provider:model` pair (`ollama:qwen3:14b`), or a bare model id whose
//! provider is guessed from its name (`gpt-5-mini`).

use std::fmt;

use crate::error::Error;
use crate::Result;

/// LLM provider behind a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Gemini,
    OpenAi,
    Anthropic,
    /// Ollama through its OpenAI-compatible API
    Ollama,
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Provider::Gemini => "gemini",
            Provider::OpenAi => "openai",
            Provider::Anthropic => "anthropic",
            Provider::Ollama => "ollama",
        })
    }
}

const ALIASES: &[(&str, Provider, &str)] = &[
    ("claude", Provider::Anthropic, "claude-sonnet-4-20250514"),
    ("gemini", Provider::Gemini, "gemini-2.5-pro"),
    ("gemini-pro", Provider::Gemini, "gemini-2.5-pro"),
    ("gemini-flash", Provider::Gemini, "gemini-2.0-flash"),
];

const PREFIXES: &[(&str, Provider)] = &[
    ("openai", Provider::OpenAi),
    ("anthropic", Provider::Anthropic),
    ("google", Provider::Gemini),
    ("google-gla", Provider::Gemini),
    ("gemini", Provider::Gemini),
    ("ollama", Provider::Ollama),
];

/// A resolved `(provider, model id)` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSpec {
    pub provider: Provider,
    pub model: String,
}

impl ModelSpec {
    pub fn new(provider: Provider, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
        }
    }

    pub fn parse(name: &str) -> Result<Self> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::Config("Model name is empty".to_string()));
        }

        if let Some((_, provider, model)) = ALIASES.iter().find(|(alias, _, _)| *alias == name) {
            return Ok(Self::new(*provider, *model));
        }

        if let Some((prefix, rest)) = name.split_once(':') {
            if let Some((_, provider)) = PREFIXES.iter().find(|(p, _)| *p == prefix) {
                if rest.is_empty() {
                    return Err(Error::Config(format!("Model name missing after '{prefix}:'")));
                }
                return Ok(Self::new(*provider, rest));
            }
        }

        let lower = name.to_lowercase();
        let provider = if lower.contains("gpt")
            || ["o1", "o3", "o4"].iter().any(|p| lower.starts_with(p))
        {
            Provider::OpenAi
        } else if lower.contains("gemini") {
            Provider::Gemini
        } else if lower.contains("claude") {
            Provider::Anthropic
        } else {
            Provider::Ollama
        };

        Ok(Self::new(provider, name))
    }
}

impl fmt::Display for ModelSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.provider, self.model)
    }
}
