use crate::error::ConfigError;
use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

/// LLM vendors reachable through an OpenAI-compatible chat/completions API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Groq,
    OpenRouter,
    OpenAi,
}

impl Provider {
    pub const ALL: [Provider; 3] = [Provider::Groq, Provider::OpenRouter, Provider::OpenAi];

    pub fn name(self) -> &'static str {
        match self {
            Provider::Groq => "groq",
            Provider::OpenRouter => "openrouter",
            Provider::OpenAi => "openai",
        }
    }

    pub fn api_key_env(self) -> &'static str {
        match self {
            Provider::Groq => "GROQ_API_KEY",
            Provider::OpenRouter => "OPENROUTER_API_KEY",
            Provider::OpenAi => "OPENAI_API_KEY",
        }
    }

    pub fn model_env(self) -> &'static str {
        match self {
            Provider::Groq => "GROQ_MODEL",
            Provider::OpenRouter => "OPENROUTER_MODEL",
            Provider::OpenAi => "OPENAI_MODEL",
        }
    }

    pub fn base_url_env(self) -> &'static str {
        match self {
            Provider::Groq => "GROQ_BASE_URL",
            Provider::OpenRouter => "OPENROUTER_BASE_URL",
            Provider::OpenAi => "OPENAI_BASE_URL",
        }
    }

    pub fn default_model(self) -> &'static str {
        match self {
            Provider::Groq => "llama-3.1-8b-instant",
            Provider::OpenRouter | Provider::OpenAi => "gpt-4o-mini",
        }
    }

    pub fn default_base_url(self) -> &'static str {
        match self {
            Provider::Groq => "https://api.groq.com/openai/v1",
            Provider::OpenRouter => "https://openrouter.ai/api/v1",
            Provider::OpenAi => "https://api.openai.com/v1",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Provider {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Provider::ALL
            .into_iter()
            .find(|p| p.name() == wanted)
            .ok_or_else(|| ConfigError::UnknownProvider(s.trim().to_string()))
    }
}

#[derive(Clone)]
pub struct ProviderSettings {
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
}

impl fmt::Debug for ProviderSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderSettings")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .finish()
    }
}

/// Everything the live client needs to talk to the selected provider.
#[derive(Clone)]
pub struct UpstreamTarget {
    pub provider: Provider,
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub referer: String,
    pub app_title: String,
}

impl fmt::Debug for UpstreamTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpstreamTarget")
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

/// Process-wide configuration, read once at startup.
#[derive(Debug, Clone)]
pub struct Settings {
    pub provider: Option<String>,
    pub groq: ProviderSettings,
    pub openrouter: ProviderSettings,
    pub openai: ProviderSettings,
    pub openrouter_site_url: String,
    pub openrouter_app_title: String,
    pub use_mock: bool,
    pub request_timeout: Duration,
    pub cors_origins: Vec<String>,
    pub bind_addr: SocketAddr,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn parse_flag(value: Option<String>) -> bool {
    value
        .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(false)
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| non_blank(lookup(key));
        let provider_settings = |provider: Provider| ProviderSettings {
            api_key: get(provider.api_key_env()),
            model: get(provider.model_env()).unwrap_or_else(|| provider.default_model().to_string()),
            base_url: get(provider.base_url_env())
                .unwrap_or_else(|| provider.default_base_url().to_string())
                .trim_end_matches('/')
                .to_string(),
        };

        let request_timeout = match get("REQUEST_TIMEOUT_SECONDS") {
            Some(raw) => {
                raw.parse::<f64>()
                    .ok()
                    .filter(|s| *s > 0.0)
                    .and_then(|s| Duration::try_from_secs_f64(s).ok())
                    .ok_or(ConfigError::InvalidValue { var: "REQUEST_TIMEOUT_SECONDS", value: raw })?
            }
            None => Duration::from_secs(30),
        };

        let host = get("BACKEND_HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let port = get("BACKEND_PORT").unwrap_or_else(|| "8080".to_string());
        let bind_addr: SocketAddr = format!("{}:{}", host, port)
            .parse()
            .map_err(|_| ConfigError::InvalidValue { var: "BACKEND_HOST/BACKEND_PORT", value: format!("{}:{}", host, port) })?;

        let raw_origins = get("CORS_ALLOW_ORIGINS").unwrap_or_else(|| "http://localhost:5173".to_string());
        let cors_origins: Vec<String> = raw_origins
            .split(',')
            .map(|o| o.trim().to_string())
            .filter(|o| !o.is_empty())
            .collect();
        // Credentialed CORS cannot use a wildcard origin.
        if cors_origins.iter().any(|o| o == "*") {
            return Err(ConfigError::InvalidValue { var: "CORS_ALLOW_ORIGINS", value: raw_origins });
        }

        Ok(Self {
            provider: get("PROVIDER"),
            groq: provider_settings(Provider::Groq),
            openrouter: provider_settings(Provider::OpenRouter),
            openai: provider_settings(Provider::OpenAi),
            openrouter_site_url: get("OPENROUTER_SITE_URL").unwrap_or_else(|| "http://localhost:5173".to_string()),
            openrouter_app_title: get("OPENROUTER_APP_TITLE").unwrap_or_else(|| "AI Quiz".to_string()),
            use_mock: parse_flag(lookup("USE_MOCK")),
            request_timeout,
            cors_origins,
            bind_addr,
        })
    }

    pub fn provider_settings(&self, provider: Provider) -> &ProviderSettings {
        match provider {
            Provider::Groq => &self.groq,
            Provider::OpenRouter => &self.openrouter,
            Provider::OpenAi => &self.openai,
        }
    }

    /// Resolves the selected provider and its key. Fails when `PROVIDER` is
    /// unset or unknown, or when the matching key is missing.
    pub fn upstream(&self) -> Result<UpstreamTarget, ConfigError> {
        let provider: Provider = self
            .provider
            .as_deref()
            .ok_or(ConfigError::MissingProvider)?
            .parse()?;
        let selected = self.provider_settings(provider);
        let api_key = selected.api_key.clone().ok_or(ConfigError::MissingApiKey {
            provider: provider.name(),
            env: provider.api_key_env(),
        })?;
        Ok(UpstreamTarget {
            provider,
            api_key,
            model: selected.model.clone(),
            base_url: selected.base_url.clone(),
            referer: self.openrouter_site_url.clone(),
            app_title: self.openrouter_app_title.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn settings(vars: &[(&str, &str)]) -> Result<Settings, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn provider_parse_is_case_insensitive() {
        assert_eq!("GROQ".parse::<Provider>().unwrap(), Provider::Groq);
        assert_eq!(" OpenRouter ".parse::<Provider>().unwrap(), Provider::OpenRouter);
        assert_eq!(
            "foo".parse::<Provider>().unwrap_err(),
            ConfigError::UnknownProvider("foo".into())
        );
    }

    #[test]
    fn defaults() {
        let s = settings(&[]).unwrap();
        assert!(!s.use_mock);
        assert_eq!(s.request_timeout, Duration::from_secs(30));
        assert_eq!(s.groq.model, "llama-3.1-8b-instant");
        assert_eq!(s.openai.base_url, "https://api.openai.com/v1");
        assert_eq!(s.cors_origins, vec!["http://localhost:5173".to_string()]);
        assert_eq!(s.bind_addr.port(), 8080);
        assert_eq!(s.upstream().unwrap_err(), ConfigError::MissingProvider);
    }

    #[test]
    fn mock_flag_values() {
        for on in ["1", "true", "TRUE", "yes"] {
            assert!(settings(&[("USE_MOCK", on)]).unwrap().use_mock, "{on}");
        }
        for off in ["0", "false", "no", ""] {
            assert!(!settings(&[("USE_MOCK", off)]).unwrap().use_mock, "{off}");
        }
    }

    #[test]
    fn missing_key_for_selected_provider() {
        let s = settings(&[("PROVIDER", "openai"), ("GROQ_API_KEY", "g")]).unwrap();
        assert_eq!(
            s.upstream().unwrap_err(),
            ConfigError::MissingApiKey { provider: "openai", env: "OPENAI_API_KEY" }
        );

        let blank = settings(&[("PROVIDER", "openai"), ("OPENAI_API_KEY", "  ")]).unwrap();
        assert!(blank.upstream().is_err());
    }

    #[test]
    fn unknown_provider_ignores_keys() {
        let s = settings(&[
            ("PROVIDER", "foo"),
            ("GROQ_API_KEY", "g"),
            ("OPENROUTER_API_KEY", "r"),
            ("OPENAI_API_KEY", "o"),
        ])
        .unwrap();
        assert_eq!(s.upstream().unwrap_err(), ConfigError::UnknownProvider("foo".into()));
    }

    #[test]
    fn resolves_target_with_overrides() {
        let s = settings(&[
            ("PROVIDER", "groq"),
            ("GROQ_API_KEY", "secret"),
            ("GROQ_MODEL", "mixtral"),
            ("GROQ_BASE_URL", "http://127.0.0.1:9000/v1/"),
        ])
        .unwrap();
        let target = s.upstream().unwrap();
        assert_eq!(target.provider, Provider::Groq);
        assert_eq!(target.api_key, "secret");
        assert_eq!(target.model, "mixtral");
        assert_eq!(target.base_url, "http://127.0.0.1:9000/v1");
        assert!(!format!("{:?}", target).contains("secret"));
        assert!(!format!("{:?}", s).contains("secret"));
    }

    #[test]
    fn invalid_timeout_is_rejected() {
        assert!(matches!(
            settings(&[("REQUEST_TIMEOUT_SECONDS", "abc")]),
            Err(ConfigError::InvalidValue { var: "REQUEST_TIMEOUT_SECONDS", .. })
        ));
        assert!(settings(&[("REQUEST_TIMEOUT_SECONDS", "-1")]).is_err());
        assert!(settings(&[("REQUEST_TIMEOUT_SECONDS", "inf")]).is_err());
        assert!(matches!(
            settings(&[("REQUEST_TIMEOUT_SECONDS", "1e20")]),
            Err(ConfigError::InvalidValue { var: "REQUEST_TIMEOUT_SECONDS", .. })
        ));
        let s = settings(&[("REQUEST_TIMEOUT_SECONDS", "0.5")]).unwrap();
        assert_eq!(s.request_timeout, Duration::from_millis(500));
    }

    #[test]
    fn wildcard_cors_origin_is_rejected() {
        assert!(matches!(
            settings(&[("CORS_ALLOW_ORIGINS", "*")]),
            Err(ConfigError::InvalidValue { var: "CORS_ALLOW_ORIGINS", .. })
        ));
        assert!(settings(&[("CORS_ALLOW_ORIGINS", "http://a.test, *")]).is_err());

        let s = settings(&[("CORS_ALLOW_ORIGINS", "http://a.test, http://b.test,")]).unwrap();
        assert_eq!(s.cors_origins, vec!["http://a.test".to_string(), "http://b.test".to_string()]);
    }
}
