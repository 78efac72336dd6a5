//! Engine configuration loader.
//!
//! Reads `arflow.toml` from the data directory (`~/.arflow/` by default) into
//! an [`EngineConfig`]. A missing or malformed file yields the defaults;
//! out-of-range values are clamped or reset with a warning.

use std::path::{Path, PathBuf};

use arflow_types::config::{AdvisorConfig, EngineConfig, RetryBackoffConfig, TriageConfig};

const CONFIG_FILE: &str = "arflow.toml";
const DATABASE_FILE: &str = "arflow.db";

/// Resolve the data directory.
///
/// `ARFLOW_DATA_DIR` wins, then `~/.arflow`, then `./.arflow`.
pub fn resolve_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("ARFLOW_DATA_DIR") {
        return PathBuf::from(dir);
    }
    if let Some(home) = dirs::home_dir() {
        return home.join(".arflow");
    }
    PathBuf::from(".arflow")
}

/// Upper bound on `max_retries`; larger values clamp to it.
pub const MAX_RETRIES_CEILING: u32 = 20;

/// Load engine configuration from `{data_dir}/arflow.toml`.
///
/// Out-of-range values are replaced field by field (see [`sanitize`]) rather
/// than discarding the whole file.
pub async fn load_engine_config(data_dir: &Path) -> EngineConfig {
    let config_path = data_dir.join(CONFIG_FILE);
    let parsed = read_config(&config_path).await.unwrap_or_default();
    sanitize(parsed)
}

async fn read_config(path: &Path) -> Option<EngineConfig> {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(path = %path.display(), "no engine config file; using defaults");
            return None;
        }
        Err(err) => {
            tracing::warn!(path = %path.display(), error = %err, "unreadable engine config; using defaults");
            return None;
        }
    };
    toml::from_str(&content)
        .inspect_err(|err| {
            tracing::warn!(path = %path.display(), error = %err, "malformed engine config; using defaults");
        })
        .ok()
}

/// Bring the numeric knobs the engine depends on into range. Backoff must
/// not shrink between attempts and triage ratios live in `0..=1`.
pub fn sanitize(mut config: EngineConfig) -> EngineConfig {
    if config.max_retries > MAX_RETRIES_CEILING {
        tracing::warn!(
            max_retries = config.max_retries,
            ceiling = MAX_RETRIES_CEILING,
            "max_retries above ceiling; clamping"
        );
        config.max_retries = MAX_RETRIES_CEILING;
    }
    if config.batch_concurrency == 0 {
        tracing::warn!("batch_concurrency of 0; using 1");
        config.batch_concurrency = 1;
    }

    let defaults = RetryBackoffConfig::default();
    let backoff = &mut config.retry_backoff;
    if !backoff.backoff_factor.is_finite() || backoff.backoff_factor < 1.0 {
        tracing::warn!(
            backoff_factor = backoff.backoff_factor,
            fallback = defaults.backoff_factor,
            "backoff_factor must be at least 1; using default"
        );
        backoff.backoff_factor = defaults.backoff_factor;
    }
    if backoff.max_delay_ms < backoff.initial_delay_ms {
        tracing::warn!(
            initial_delay_ms = backoff.initial_delay_ms,
            max_delay_ms = backoff.max_delay_ms,
            "max_delay_ms below initial_delay_ms; raising it"
        );
        backoff.max_delay_ms = backoff.initial_delay_ms;
    }

    let defaults = TriageConfig::default();
    let triage = &mut config.triage;
    if !is_ratio(triage.review_confidence_below) {
        tracing::warn!(
            value = triage.review_confidence_below,
            "triage.review_confidence_below outside 0..=1; using default"
        );
        triage.review_confidence_below = defaults.review_confidence_below;
    }
    if !is_ratio(triage.escalate_risk_at_least) {
        tracing::warn!(
            value = triage.escalate_risk_at_least,
            "triage.escalate_risk_at_least outside 0..=1; using default"
        );
        triage.escalate_risk_at_least = defaults.escalate_risk_at_least;
    }
    if !triage.review_amount_at_least.is_finite() || triage.review_amount_at_least < 0.0 {
        tracing::warn!(
            value = triage.review_amount_at_least,
            "triage.review_amount_at_least must be a non-negative amount; using default"
        );
        triage.review_amount_at_least = defaults.review_amount_at_least;
    }

    if config.advisors.timeout_secs == 0 {
        let fallback = AdvisorConfig::default().timeout_secs;
        tracing::warn!(fallback, "advisors.timeout_secs of 0; using default");
        config.advisors.timeout_secs = fallback;
    }

    config
}

fn is_ratio(value: f64) -> bool {
    (0.0..=1.0).contains(&value)
}

/// Checkpoint database URL: the configured one, else `{data_dir}/arflow.db`.
pub fn database_url(config: &EngineConfig, data_dir: &Path) -> String {
    match &config.database_url {
        Some(url) => url.clone(),
        None => format!(
            "sqlite://{}?mode=rwc",
            data_dir.join(DATABASE_FILE).display()
        ),
    }
}
