use std::fmt;
use std::str::FromStr;

/// Log output format. Env: `LOG_FORMAT`, default `json`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

impl FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "pretty" | "text" => Ok(Self::Pretty),
            other => anyhow::bail!("Invalid LOG_FORMAT '{other}': expected json or pretty"),
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Json => "json",
            Self::Pretty => "pretty",
        })
    }
}

/// Worker process settings. Engine settings live in [`convograph::Settings`].
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Jobs processed at once. Env: `WORKER_CONCURRENCY`, default 4.
    pub concurrency: usize,
    pub log_format: LogFormat,
    /// Fallback filter when `RUST_LOG` is unset. Env: `LOG_LEVEL`, default `info`.
    pub log_level: String,
}

impl WorkerConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// # Errors
    /// Returns an error if `WORKER_CONCURRENCY` is not a positive integer or
    /// `LOG_FORMAT` is unknown.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let concurrency = parse_env_usize(&lookup, "WORKER_CONCURRENCY", 4)?;
        if concurrency == 0 {
            anyhow::bail!("Invalid WORKER_CONCURRENCY: must be at least 1");
        }
        let log_format = match lookup("LOG_FORMAT") {
            Some(raw) if !raw.trim().is_empty() => raw.parse()?,
            _ => LogFormat::Json,
        };
        let log_level = lookup("LOG_LEVEL")
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| "info".to_string());

        Ok(Self {
            concurrency,
            log_format,
            log_level,
        })
    }
}

fn parse_env_usize<F>(lookup: &F, name: &str, default: usize) -> anyhow::Result<usize>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        Some(val) => val
            .trim()
            .parse::<usize>()
            .map_err(|e| anyhow::anyhow!("Invalid {}: {}", name, e)),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = WorkerConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config.concurrency, 4);
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_overrides_and_rejections() {
        let config = WorkerConfig::from_lookup(|key| match key {
            "WORKER_CONCURRENCY" => Some("8".to_string()),
            "LOG_FORMAT" => Some("Pretty".to_string()),
            _ => None,
        })
        .unwrap();
        assert_eq!(config.concurrency, 8);
        assert_eq!(config.log_format, LogFormat::Pretty);

        assert!(WorkerConfig::from_lookup(|key| (key == "WORKER_CONCURRENCY")
            .then(|| "0".to_string()))
        .is_err());
        assert!(WorkerConfig::from_lookup(|key| (key == "LOG_FORMAT")
            .then(|| "xml".to_string()))
        .is_err());
    }
}
