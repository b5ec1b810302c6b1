//! Environment-variable configuration (`spec.md` §6 "Environment").

use crate::llm::{OpenAiModel, OpenAiModelConfig};

const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";
const DEFAULT_MCP_WEB_URL: &str = "http://localhost:7001";
const DEFAULT_MCP_DATA_URL: &str = "http://localhost:7002";

/// Runtime configuration read once at process start.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    pub openai_api_key: String,
    pub openai_model: String,
    pub mcp_web_url: String,
    pub mcp_data_url: String,
}

impl RunnerConfig {
    /// Reads configuration from the environment, applying the defaults
    /// named in `spec.md` §6. Fails only if `OPENAI_API_KEY` is absent.
    pub fn from_env() -> Result<Self, String> {
        let openai_api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| "OPENAI_API_KEY is not set".to_string())?;
        let openai_model =
            std::env::var("OPENAI_MODEL").unwrap_or_else(|_| DEFAULT_OPENAI_MODEL.to_string());
        let mcp_web_url =
            std::env::var("MCP_WEB_URL").unwrap_or_else(|_| DEFAULT_MCP_WEB_URL.to_string());
        let mcp_data_url =
            std::env::var("MCP_DATA_URL").unwrap_or_else(|_| DEFAULT_MCP_DATA_URL.to_string());

        Ok(Self {
            openai_api_key,
            openai_model,
            mcp_web_url,
            mcp_data_url,
        })
    }

    pub fn build_model(&self) -> Result<OpenAiModel, crate::error::ProviderError> {
        OpenAiModel::new(OpenAiModelConfig::new(
            self.openai_api_key.clone(),
            self.openai_model.clone(),
        ))
    }
}
