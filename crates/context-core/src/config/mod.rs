//! Environment configuration.
//!
//! All tunables named in the external-interfaces surface (TTLs, caps,
//! timeouts, default keywords, profile version, upstream credentials) are
//! resolved once at startup into this immutable record. Nothing downstream
//! re-reads the environment.

pub mod error;


pub use error::ConfigError;

use std::env;

/// Resolved, immutable configuration for the gateway.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub bind_addr: String,

    pub dify_base_url: String,
    pub dify_api_key: String,
    pub dify_workflow_run_url: String,
    pub dify_workflow_id_anchor: String,
    pub dify_timeout_secs: f64,

    pub mcp_protocol_version_default: String,
    pub anchor_snip_max: usize,
    pub gateway_ctx_debug: bool,
    pub retrieval_top_n: usize,
    pub retrieval_profile_version: String,
    pub gateway_ctx_cache_ttl_secs: f64,
    pub gateway_ctx_cache_max: usize,
    pub garbled_kw_repair_enabled: bool,

    pub upstream_base_url: String,
    pub upstream_api_key: String,
    pub openrouter_http_referer: String,
    pub openrouter_x_title: String,

    pub force_gateway_every_turn: bool,
    pub anchor_inject_enabled: bool,
    pub gateway_ctx_user: String,
    pub writer_mode_default: String,
    pub tool_empty_content_compat: bool,
    pub tool_empty_content_placeholder: String,

    pub local_mcp_gateway_url: String,
    pub local_mcp_timeout_secs: f64,
    pub openai_proxy_debug_echo: bool,

    pub memory_id_default: String,
    pub agent_id_default: String,

    pub s4_every_user_turns: u32,
    pub s60_every_user_turns: u32,
    pub s4_window_user_turns: u32,
    pub s60_window_user_turns: u32,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: 8000,
            bind_addr: "0.0.0.0".to_string(),

            dify_base_url: "https://api.dify.ai".to_string(),
            dify_api_key: String::new(),
            dify_workflow_run_url: "https://api.dify.ai/v1/workflows/run".to_string(),
            dify_workflow_id_anchor: String::new(),
            dify_timeout_secs: 30.0,

            mcp_protocol_version_default: "2025-06-18".to_string(),
            anchor_snip_max: 400,
            gateway_ctx_debug: false,
            retrieval_top_n: 3,
            retrieval_profile_version: "v1.0.0".to_string(),
            gateway_ctx_cache_ttl_secs: 20.0,
            gateway_ctx_cache_max: 256,
            garbled_kw_repair_enabled: true,

            upstream_base_url: "https://openrouter.ai/api/v1".to_string(),
            upstream_api_key: String::new(),
            openrouter_http_referer: String::new(),
            openrouter_x_title: String::new(),

            force_gateway_every_turn: true,
            anchor_inject_enabled: true,
            gateway_ctx_user: "rikkahub".to_string(),
            writer_mode_default: "normal".to_string(),
            tool_empty_content_compat: true,
            tool_empty_content_placeholder: "（正在调用工具…）".to_string(),

            local_mcp_gateway_url: "http://127.0.0.1:8000/gateway_ctx".to_string(),
            local_mcp_timeout_secs: 20.0,
            openai_proxy_debug_echo: false,

            memory_id_default: String::new(),
            agent_id_default: String::new(),

            s4_every_user_turns: 4,
            s60_every_user_turns: 30,
            s4_window_user_turns: 4,
            s60_window_user_turns: 30,
        }
    }
}

impl AppConfig {
    const ENV_PORT: &'static str = "GATEWAY_PORT";
    const ENV_BIND_ADDR: &'static str = "GATEWAY_BIND_ADDR";

    const ENV_DIFY_BASE_URL: &'static str = "DIFY_BASE_URL";
    const ENV_DIFY_API_KEY: &'static str = "DIFY_API_KEY";
    const ENV_DIFY_WORKFLOW_API_KEY: &'static str = "DIFY_WORKFLOW_API_KEY";
    const ENV_DIFY_WORKFLOW_RUN_URL: &'static str = "DIFY_WORKFLOW_RUN_URL";
    const ENV_DIFY_WORKFLOW_ID_ANCHOR: &'static str = "DIFY_WORKFLOW_ID_ANCHOR";
    const ENV_DIFY_TIMEOUT_SECS: &'static str = "DIFY_TIMEOUT_SECS";

    const ENV_MCP_PROTOCOL_VERSION: &'static str = "MCP_PROTOCOL_VERSION";
    const ENV_ANCHOR_SNIP_MAX: &'static str = "ANCHOR_SNIP_MAX";
    const ENV_GATEWAY_CTX_DEBUG: &'static str = "GATEWAY_CTX_DEBUG";
    const ENV_RETRIEVAL_TOP_N: &'static str = "RETRIEVAL_TOP_N";
    const ENV_RETRIEVAL_PROFILE_VERSION: &'static str = "RETRIEVAL_PROFILE_VERSION";
    const ENV_GATEWAY_CTX_CACHE_TTL: &'static str = "GATEWAY_CTX_CACHE_TTL";
    const ENV_GATEWAY_CTX_CACHE_MAX: &'static str = "GATEWAY_CTX_CACHE_MAX";
    const ENV_GARBLED_KW_REPAIR_ENABLED: &'static str = "GARBLED_KW_REPAIR_ENABLED";

    const ENV_UPSTREAM_BASE_URL: &'static str = "UPSTREAM_BASE_URL";
    const ENV_UPSTREAM_API_KEY: &'static str = "UPSTREAM_API_KEY";
    const ENV_OPENROUTER_HTTP_REFERER: &'static str = "OPENROUTER_HTTP_REFERER";
    const ENV_OPENROUTER_X_TITLE: &'static str = "OPENROUTER_X_TITLE";

    const ENV_FORCE_GATEWAY_EVERY_TURN: &'static str = "FORCE_GATEWAY_EVERY_TURN";
    const ENV_ANCHOR_INJECT_ENABLED: &'static str = "ANCHOR_INJECT_ENABLED";
    const ENV_GATEWAY_CTX_USER: &'static str = "GATEWAY_CTX_USER";
    const ENV_WRITER_MODE: &'static str = "WRITER_MODE";
    const ENV_TOOL_EMPTY_CONTENT_COMPAT: &'static str = "TOOL_EMPTY_CONTENT_COMPAT";
    const ENV_TOOL_EMPTY_CONTENT_PLACEHOLDER: &'static str = "TOOL_EMPTY_CONTENT_PLACEHOLDER";

    const ENV_LOCAL_MCP_GATEWAY_URL: &'static str = "LOCAL_MCP_GATEWAY_URL";
    const ENV_LOCAL_MCP_TIMEOUT: &'static str = "LOCAL_MCP_TIMEOUT";
    const ENV_OPENAI_PROXY_DEBUG_ECHO: &'static str = "OPENAI_PROXY_DEBUG_ECHO";

    const ENV_MEMORY_ID_DEFAULT: &'static str = "MEMORY_ID_DEFAULT";
    const ENV_AGENT_ID_DEFAULT: &'static str = "AGENT_ID_DEFAULT";

    const ENV_S4_EVERY_USER_TURNS: &'static str = "S4_EVERY_USER_TURNS";
    const ENV_S60_EVERY_USER_TURNS: &'static str = "S60_EVERY_USER_TURNS";
    const ENV_S4_WINDOW_USER_TURNS: &'static str = "S4_WINDOW_USER_TURNS";
    const ENV_S60_WINDOW_USER_TURNS: &'static str = "S60_WINDOW_USER_TURNS";

    /// Resolve the full config from the process environment, falling back
    /// to [`Default::default`] for anything unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        let d = Self::default();

        Ok(Self {
            port: Self::parse_u16_from_env(Self::ENV_PORT, d.port)?,
            bind_addr: Self::parse_string_from_env(Self::ENV_BIND_ADDR, d.bind_addr),

            dify_base_url: Self::parse_trimmed_from_env(Self::ENV_DIFY_BASE_URL, d.dify_base_url),
            dify_api_key: Self::parse_dify_api_key(),
            dify_workflow_run_url: Self::parse_trimmed_from_env(
                Self::ENV_DIFY_WORKFLOW_RUN_URL,
                d.dify_workflow_run_url,
            ),
            dify_workflow_id_anchor: Self::parse_trimmed_from_env(
                Self::ENV_DIFY_WORKFLOW_ID_ANCHOR,
                d.dify_workflow_id_anchor,
            ),
            dify_timeout_secs: Self::parse_f64_from_env(
                Self::ENV_DIFY_TIMEOUT_SECS,
                d.dify_timeout_secs,
            )?,

            mcp_protocol_version_default: Self::parse_trimmed_from_env(
                Self::ENV_MCP_PROTOCOL_VERSION,
                d.mcp_protocol_version_default,
            ),
            anchor_snip_max: Self::parse_usize_from_env(
                Self::ENV_ANCHOR_SNIP_MAX,
                d.anchor_snip_max,
            )?,
            gateway_ctx_debug: Self::parse_bool_from_env(
                Self::ENV_GATEWAY_CTX_DEBUG,
                d.gateway_ctx_debug,
            ),
            retrieval_top_n: Self::parse_usize_from_env(
                Self::ENV_RETRIEVAL_TOP_N,
                d.retrieval_top_n,
            )?,
            retrieval_profile_version: {
                let v = Self::parse_trimmed_from_env(
                    Self::ENV_RETRIEVAL_PROFILE_VERSION,
                    d.retrieval_profile_version.clone(),
                );
                if v.is_empty() { d.retrieval_profile_version } else { v }
            },
            gateway_ctx_cache_ttl_secs: Self::parse_f64_from_env(
                Self::ENV_GATEWAY_CTX_CACHE_TTL,
                d.gateway_ctx_cache_ttl_secs,
            )?,
            gateway_ctx_cache_max: Self::parse_usize_from_env(
                Self::ENV_GATEWAY_CTX_CACHE_MAX,
                d.gateway_ctx_cache_max,
            )?,
            garbled_kw_repair_enabled: Self::parse_bool_from_env(
                Self::ENV_GARBLED_KW_REPAIR_ENABLED,
                d.garbled_kw_repair_enabled,
            ),

            upstream_base_url: Self::parse_string_from_env(
                Self::ENV_UPSTREAM_BASE_URL,
                d.upstream_base_url,
            ),
            upstream_api_key: Self::parse_trimmed_from_env(
                Self::ENV_UPSTREAM_API_KEY,
                d.upstream_api_key,
            ),
            openrouter_http_referer: Self::parse_trimmed_from_env(
                Self::ENV_OPENROUTER_HTTP_REFERER,
                d.openrouter_http_referer,
            ),
            openrouter_x_title: Self::parse_trimmed_from_env(
                Self::ENV_OPENROUTER_X_TITLE,
                d.openrouter_x_title,
            ),

            force_gateway_every_turn: Self::parse_bool_from_env(
                Self::ENV_FORCE_GATEWAY_EVERY_TURN,
                d.force_gateway_every_turn,
            ),
            anchor_inject_enabled: Self::parse_bool_from_env(
                Self::ENV_ANCHOR_INJECT_ENABLED,
                d.anchor_inject_enabled,
            ),
            gateway_ctx_user: {
                let v = Self::parse_trimmed_from_env(
                    Self::ENV_GATEWAY_CTX_USER,
                    d.gateway_ctx_user.clone(),
                );
                if v.is_empty() { d.gateway_ctx_user } else { v }
            },
            writer_mode_default: Self::parse_trimmed_from_env(
                Self::ENV_WRITER_MODE,
                d.writer_mode_default,
            )
            .to_lowercase(),
            tool_empty_content_compat: Self::parse_bool_from_env(
                Self::ENV_TOOL_EMPTY_CONTENT_COMPAT,
                d.tool_empty_content_compat,
            ),
            tool_empty_content_placeholder: {
                let v = Self::parse_trimmed_from_env(
                    Self::ENV_TOOL_EMPTY_CONTENT_PLACEHOLDER,
                    d.tool_empty_content_placeholder.clone(),
                );
                if v.is_empty() { d.tool_empty_content_placeholder } else { v }
            },

            local_mcp_gateway_url: Self::parse_string_from_env(
                Self::ENV_LOCAL_MCP_GATEWAY_URL,
                d.local_mcp_gateway_url,
            ),
            local_mcp_timeout_secs: Self::parse_f64_from_env(
                Self::ENV_LOCAL_MCP_TIMEOUT,
                d.local_mcp_timeout_secs,
            )?,
            openai_proxy_debug_echo: Self::parse_bool_from_env(
                Self::ENV_OPENAI_PROXY_DEBUG_ECHO,
                d.openai_proxy_debug_echo,
            ),

            memory_id_default: Self::parse_trimmed_from_env(
                Self::ENV_MEMORY_ID_DEFAULT,
                d.memory_id_default,
            ),
            agent_id_default: Self::parse_trimmed_from_env(
                Self::ENV_AGENT_ID_DEFAULT,
                d.agent_id_default,
            ),

            s4_every_user_turns: Self::parse_u32_from_env(
                Self::ENV_S4_EVERY_USER_TURNS,
                d.s4_every_user_turns,
            )?,
            s60_every_user_turns: Self::parse_u32_from_env(
                Self::ENV_S60_EVERY_USER_TURNS,
                d.s60_every_user_turns,
            )?,
            s4_window_user_turns: Self::parse_u32_from_env(
                Self::ENV_S4_WINDOW_USER_TURNS,
                d.s4_window_user_turns,
            )?,
            s60_window_user_turns: Self::parse_u32_from_env(
                Self::ENV_S60_WINDOW_USER_TURNS,
                d.s60_window_user_turns,
            )?,
        })
    }

    /// Structural validation only — a missing `UPSTREAM_API_KEY` is a
    /// request-time [`ConfigError`], not a startup failure (see
    /// [`Self::require_upstream_api_key`]).
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.retrieval_top_n == 0 {
            return Err(ConfigError::InvalidValue {
                name: Self::ENV_RETRIEVAL_TOP_N,
                value: "0".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.bind_addr, self.port)
    }

    /// Returns the upstream bearer token, or a [`ConfigError`] if it was
    /// never configured. Called at request time, not at startup.
    pub fn require_upstream_api_key(&self) -> Result<&str, ConfigError> {
        if self.upstream_api_key.is_empty() {
            Err(ConfigError::MissingEnvVar(Self::ENV_UPSTREAM_API_KEY))
        } else {
            Ok(&self.upstream_api_key)
        }
    }

    fn parse_dify_api_key() -> String {
        env::var(Self::ENV_DIFY_API_KEY)
            .ok()
            .or_else(|| env::var(Self::ENV_DIFY_WORKFLOW_API_KEY).ok())
            .unwrap_or_default()
            .trim()
            .to_string()
    }

    fn parse_string_from_env(var_name: &str, default: String) -> String {
        env::var(var_name).unwrap_or(default)
    }

    fn parse_trimmed_from_env(var_name: &str, default: String) -> String {
        env::var(var_name)
            .map(|v| v.trim().to_string())
            .unwrap_or(default)
    }

    fn parse_bool_from_env(var_name: &str, default: bool) -> bool {
        match env::var(var_name) {
            Ok(v) => matches!(v.trim().to_lowercase().as_str(), "1" | "true" | "yes"),
            Err(_) => default,
        }
    }

    fn parse_u16_from_env(var_name: &'static str, default: u16) -> Result<u16, ConfigError> {
        Self::parse_numeric_from_env(var_name, default)
    }

    fn parse_u32_from_env(var_name: &'static str, default: u32) -> Result<u32, ConfigError> {
        Self::parse_numeric_from_env(var_name, default)
    }

    fn parse_usize_from_env(var_name: &'static str, default: usize) -> Result<usize, ConfigError> {
        Self::parse_numeric_from_env(var_name, default)
    }

    fn parse_f64_from_env(var_name: &'static str, default: f64) -> Result<f64, ConfigError> {
        Self::parse_numeric_from_env(var_name, default)
    }

    fn parse_numeric_from_env<T: std::str::FromStr>(
        var_name: &'static str,
        default: T,
    ) -> Result<T, ConfigError>
    where
        T::Err: std::fmt::Display,
    {
        match env::var(var_name) {
            Ok(value) => value.trim().parse::<T>().map_err(|e| ConfigError::InvalidValue {
                name: var_name,
                value,
                reason: e.to_string(),
            }),
            Err(_) => Ok(default),
        }
    }
}
