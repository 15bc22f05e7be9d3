use std::{env, fs, path::Path, time::Duration};

use crate::{
    domain::ChatId,
    errors::Error,
    failure::{DEFAULT_BURST_THRESHOLD, DEFAULT_WINDOW},
    persona::PersonaRegistry,
    Result,
};

/// Temperatures outside this range are rejected at startup.
pub const TEMPERATURE_RANGE: std::ops::RangeInclusive<f32> = 0.5..=0.9;

/// Typed configuration, read once at startup.
#[derive(Clone, Debug)]
pub struct Config {
    // Telegram
    pub telegram_token: String,
    pub admin_chat_ids: Vec<ChatId>,

    // Completion API
    pub openai_api_key: String,
    pub openai_base_url: String,
    pub model: String,
    pub max_output_tokens: u32,
    pub temperature: f32,
    pub completion_timeout: Duration,

    // Personas
    pub default_style: String,

    // Failure monitoring
    pub failure_window: Duration,
    pub failure_burst_threshold: usize,

    // Rate limiting
    pub rate_limit_enabled: bool,
    pub rate_limit_requests: u32,
    pub rate_limit_window: Duration,
}

impl Config {
    /// Load from the process environment, merging `.env` first (existing vars win).
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary key source.
    pub fn from_lookup(source: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| source(key).and_then(non_empty);

        let telegram_token = get("TELEGRAM_TOKEN")
            .or_else(|| get("TELEGRAM_BOT_TOKEN"))
            .ok_or_else(|| {
                Error::Config("TELEGRAM_TOKEN environment variable is required".to_string())
            })?;
        let openai_api_key = get("OPENAI_API_KEY").ok_or_else(|| {
            Error::Config("OPENAI_API_KEY environment variable is required".to_string())
        })?;

        let admin_chat_ids = parse_csv_i64(get("ADMIN_CHAT_IDS"))?
            .into_iter()
            .map(ChatId)
            .collect();

        let openai_base_url = get("OPENAI_BASE_URL")
            .unwrap_or_else(|| "https://api.openai.com/v1".to_string())
            .trim_end_matches('/')
            .to_string();
        let model = get("OPENAI_MODEL").unwrap_or_else(|| "gpt-3.5-turbo".to_string());
        let max_output_tokens: u32 =
            parse_or(get("COMPLETION_MAX_TOKENS"), "COMPLETION_MAX_TOKENS", 700)?;
        if max_output_tokens == 0 {
            return Err(Error::Config(
                "COMPLETION_MAX_TOKENS must be positive".to_string(),
            ));
        }

        let temperature: f32 =
            parse_or(get("COMPLETION_TEMPERATURE"), "COMPLETION_TEMPERATURE", 0.8)?;
        if !TEMPERATURE_RANGE.contains(&temperature) {
            return Err(Error::Config(format!(
                "COMPLETION_TEMPERATURE must be within {}..={}, got {temperature}",
                TEMPERATURE_RANGE.start(),
                TEMPERATURE_RANGE.end()
            )));
        }
        let timeout_secs: u64 =
            parse_or(get("COMPLETION_TIMEOUT_SECS"), "COMPLETION_TIMEOUT_SECS", 30)?;
        if timeout_secs == 0 {
            return Err(Error::Config(
                "COMPLETION_TIMEOUT_SECS must be positive".to_string(),
            ));
        }
        let completion_timeout = Duration::from_secs(timeout_secs);

        let default_style = get("DEFAULT_STYLE").unwrap_or_else(|| "Интуи".to_string());
        // Fail fast on a typo rather than silently serving another persona.
        PersonaRegistry::builtin(&default_style)?;

        let failure_window = Duration::from_secs(parse_or(
            get("FAILURE_WINDOW_SECS"),
            "FAILURE_WINDOW_SECS",
            DEFAULT_WINDOW.as_secs(),
        )?);
        let failure_burst_threshold: usize = parse_or(
            get("FAILURE_BURST_THRESHOLD"),
            "FAILURE_BURST_THRESHOLD",
            DEFAULT_BURST_THRESHOLD,
        )?;
        if failure_burst_threshold == 0 {
            return Err(Error::Config(
                "FAILURE_BURST_THRESHOLD must be positive".to_string(),
            ));
        }

        let rate_limit_enabled = get("RATE_LIMIT_ENABLED").map(|s| parse_bool(&s)).unwrap_or(true);
        let rate_limit_requests: u32 = parse_or(get("RATE_LIMIT_REQUESTS"), "RATE_LIMIT_REQUESTS", 10)?;
        let rate_limit_window =
            Duration::from_secs(parse_or(get("RATE_LIMIT_WINDOW"), "RATE_LIMIT_WINDOW", 60)?);

        Ok(Self {
            telegram_token,
            admin_chat_ids,
            openai_api_key,
            openai_base_url,
            model,
            max_output_tokens,
            temperature,
            completion_timeout,
            default_style,
            failure_window,
            failure_burst_threshold,
            rate_limit_enabled,
            rate_limit_requests,
            rate_limit_window,
        })
    }

    pub fn is_admin(&self, chat_id: ChatId) -> bool {
        self.admin_chat_ids.contains(&chat_id)
    }
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((k, v)) = line.split_once('=') else {
            continue;
        };

        let key = k.trim();
        if key.is_empty() || env::var_os(key).is_some() {
            continue;
        }

        env::set_var(key, strip_quotes(v.trim()));
    }
}

fn strip_quotes(v: &str) -> &str {
    if v.len() >= 2
        && ((v.starts_with('"') && v.ends_with('"')) || (v.starts_with('\'') && v.ends_with('\'')))
    {
        return &v[1..v.len() - 1];
    }
    v
}

fn parse_or<T: std::str::FromStr>(raw: Option<String>, key: &str, default: T) -> Result<T> {
    match raw {
        None => Ok(default),
        Some(s) => s
            .trim()
            .parse::<T>()
            .map_err(|_| Error::Config(format!("{key} has an invalid value: {s}"))),
    }
}

fn parse_bool(s: &str) -> bool {
    matches!(
        s.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn parse_csv_i64(v: Option<String>) -> Result<Vec<i64>> {
    v.unwrap_or_default()
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<i64>()
                .map_err(|_| Error::Config(format!("invalid chat id in ADMIN_CHAT_IDS: {s}")))
        })
        .collect()
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}
