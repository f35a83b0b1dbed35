use std::sync::Arc;

use secrecy::SecretString;

use crate::{
    config::{
        BackendKind, BenchConfig, JudgeConfig, JudgeKind, ProviderConfig, DEFAULT_SYSTEM_PROMPT,
    },
    error::BenchError,
    judge::{Judge, RuleJudge},
    provider::{ProviderRegistry, VisionProvider},
    resilient::RetryExecutor,
};

use super::transport::BackendSettings;

/// Reads a credential from the environment.
///
/// A missing or empty variable is a configuration error.
pub fn resolve_api_key(env_var: &str) -> Result<SecretString, BenchError> {
    match std::env::var(env_var) {
        Ok(key) if !key.trim().is_empty() => Ok(SecretString::new(key)),
        _ => Err(BenchError::ConfigError(format!(
            "missing credential: environment variable {env_var} is not set"
        ))),
    }
}

/// Builds one provider per enabled `[providers.<name>]` entry, in name order.
pub fn build_registry(config: &BenchConfig) -> Result<ProviderRegistry, BenchError> {
    let mut registry = ProviderRegistry::new();
    for (name, provider) in &config.providers {
        if !provider.enabled {
            log::debug!("provider '{name}' is disabled");
            continue;
        }
        let kind = backend_kind(name, provider.backend.as_deref())?;
        let settings = provider_settings(kind, provider)?;
        log::info!("provider '{name}': {kind} / {}", settings.model);
        registry.try_insert(name.clone(), build_provider(kind, settings)?)?;
    }
    Ok(registry)
}

/// Builds the judge selected by `[judge]`.
pub fn build_judge(config: &JudgeConfig, executor: RetryExecutor) -> Result<Arc<dyn Judge>, BenchError> {
    match config.kind {
        JudgeKind::Rules => Ok(Arc::new(
            RuleJudge::new()
                .with_tolerance(config.tolerance)
                .with_equivalences(&config.equivalences),
        )),
        JudgeKind::Llm => build_llm_judge(config, executor),
    }
}

#[cfg(feature = "openai")]
fn build_llm_judge(config: &JudgeConfig, executor: RetryExecutor) -> Result<Arc<dyn Judge>, BenchError> {
    use crate::judge::LlmJudge;

    let kind = backend_kind("judge", config.backend.as_deref().or(Some("openai")))?;
    if kind != BackendKind::OpenAI {
        return Err(BenchError::ConfigError(format!(
            "judge backend '{kind}' is not supported, use 'openai' or kind = \"rules\""
        )));
    }
    let env = config
        .api_key_env
        .clone()
        .unwrap_or_else(|| kind.default_api_key_env().to_string());
    let mut settings = BackendSettings::new(
        resolve_api_key(&env)?,
        config.model.clone().unwrap_or_else(|| "gpt-4o".to_string()),
        "",
    );
    settings.base_url = config.base_url.clone();
    settings.timeout_seconds = config.timeout_seconds;
    let backend = super::openai::OpenAI::new(settings)?;
    Ok(Arc::new(LlmJudge::new(Arc::new(backend), executor)))
}

#[cfg(not(feature = "openai"))]
fn build_llm_judge(_config: &JudgeConfig, _executor: RetryExecutor) -> Result<Arc<dyn Judge>, BenchError> {
    Err(BenchError::ConfigError(
        "the LLM judge needs the 'openai' feature; use kind = \"rules\"".to_string(),
    ))
}

fn backend_kind(name: &str, backend: Option<&str>) -> Result<BackendKind, BenchError> {
    let raw = backend.unwrap_or(name);
    BackendKind::parse(raw).ok_or_else(|| {
        BenchError::ConfigError(format!("provider '{name}': unknown backend '{raw}'"))
    })
}

fn provider_settings(kind: BackendKind, provider: &ProviderConfig) -> Result<BackendSettings, BenchError> {
    let env = provider
        .api_key_env
        .clone()
        .unwrap_or_else(|| kind.default_api_key_env().to_string());
    let mut settings = BackendSettings::new(
        resolve_api_key(&env)?,
        provider
            .model
            .clone()
            .unwrap_or_else(|| kind.default_model().to_string()),
        provider
            .system
            .clone()
            .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string()),
    );
    settings.base_url = provider.base_url.clone();
    settings.max_tokens = provider.max_tokens;
    settings.thinking_budget = provider
        .thinking_budget
        .or_else(|| kind.default_thinking_budget());
    settings.web_search = provider
        .web_search
        .unwrap_or_else(|| kind.default_web_search());
    settings.timeout_seconds = provider.timeout_seconds;
    Ok(settings)
}

#[allow(unreachable_patterns, unused_variables)]
fn build_provider(kind: BackendKind, settings: BackendSettings) -> Result<Arc<dyn VisionProvider>, BenchError> {
    match kind {
        #[cfg(feature = "openai")]
        BackendKind::OpenAI => Ok(Arc::new(super::openai::OpenAI::new(settings)?)),
        #[cfg(feature = "anthropic")]
        BackendKind::Anthropic => Ok(Arc::new(super::anthropic::Anthropic::new(settings)?)),
        #[cfg(feature = "google")]
        BackendKind::Google => Ok(Arc::new(super::google::Google::new(settings)?)),
        other => Err(BenchError::ConfigError(format!(
            "backend '{other}' is not compiled in, enable the '{other}' feature"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_config;

    #[test]
    fn missing_credential_is_fatal() {
        let err = resolve_api_key("VQA_BENCH_TEST_UNSET_KEY").unwrap_err();
        assert!(err.is_fatal());
        assert!(err.to_string().contains("VQA_BENCH_TEST_UNSET_KEY"));
    }

    #[test]
    fn provider_settings_fall_back_to_backend_defaults() {
        std::env::set_var("VQA_BENCH_TEST_KEY_D", "secret");
        let config = parse_config(
            r#"
[providers.claude]
api_key_env = "VQA_BENCH_TEST_KEY_D"

[providers.gpt]
api_key_env = "VQA_BENCH_TEST_KEY_D"
web_search = false

[providers.gemini]
api_key_env = "VQA_BENCH_TEST_KEY_D"
"#,
        )
        .expect("config");

        let claude = provider_settings(BackendKind::Anthropic, &config.providers["claude"]).expect("claude");
        assert_eq!(claude.thinking_budget, Some(1024));
        assert!(claude.web_search);

        let gpt = provider_settings(BackendKind::OpenAI, &config.providers["gpt"]).expect("gpt");
        assert!(!gpt.web_search);
        assert_eq!(gpt.model, "o4-mini");

        let gemini = provider_settings(BackendKind::Google, &config.providers["gemini"]).expect("gemini");
        assert!(!gemini.web_search);
        assert_eq!(gemini.thinking_budget, None);
    }

    #[cfg(feature = "full")]
    #[test]
    fn builds_enabled_providers_in_name_order() {
        std::env::set_var("VQA_BENCH_TEST_KEY_A", "secret");
        let config = parse_config(
            r#"
[providers.zeta]
backend = "google"
api_key_env = "VQA_BENCH_TEST_KEY_A"

[providers.alpha]
backend = "anthropic"
api_key_env = "VQA_BENCH_TEST_KEY_A"

[providers.mid]
backend = "openai"
api_key_env = "VQA_BENCH_TEST_KEY_A"
enabled = false
"#,
        )
        .expect("config");
        let registry = build_registry(&config).expect("registry");
        assert_eq!(registry.names(), vec!["alpha", "zeta"]);
    }

    #[test]
    fn unknown_backend_is_fatal() {
        std::env::set_var("VQA_BENCH_TEST_KEY_B", "secret");
        let config = parse_config(
            "[providers.llama]\napi_key_env = \"VQA_BENCH_TEST_KEY_B\"\n",
        )
        .expect("config");
        let err = build_registry(&config).unwrap_err();
        assert!(err.is_fatal());
        assert!(err.to_string().contains("llama"));
    }

    #[test]
    fn provider_without_credential_aborts() {
        let config = parse_config(
            "[providers.claude]\napi_key_env = \"VQA_BENCH_TEST_UNSET_KEY_C\"\n",
        )
        .expect("config");
        assert!(build_registry(&config).unwrap_err().is_fatal());
    }

    #[tokio::test]
    async fn rules_judge_uses_configured_equivalences() {
        let config = parse_config(
            "[judge]\nkind = \"rules\"\nequivalences = [[\"16th place\", \"last place\"]]\n",
        )
        .expect("config");
        let judge = build_judge(&config.judge, RetryExecutor::default()).expect("judge");
        let verdict = judge
            .judge("Finish?", "Last place", "16th place")
            .await
            .expect("verdict");
        assert!(verdict.is_success());
    }
}
