use anyhow::Context;
use splatlod_io::DownsampleOptions;
use std::str::FromStr;

/// Environment-provided defaults for the CLI
///
/// Unset variables fall back to [`DownsampleOptions::default`]; set but
/// unparsable ones are errors.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub progress_interval: usize,
    pub buffer_capacity: usize,
    pub use_mmap: bool,
    pub seed: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        let options = DownsampleOptions::default();
        Self {
            progress_interval: options.progress_interval,
            buffer_capacity: options.buffer_capacity,
            use_mmap: options.use_mmap,
            seed: options.seed,
        }
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Ok(Self {
            progress_interval: parse_var(&lookup, "SPLATLOD_PROGRESS_INTERVAL")?
                .unwrap_or(defaults.progress_interval),
            buffer_capacity: parse_var(&lookup, "SPLATLOD_BUFFER_CAPACITY")?.unwrap_or(defaults.buffer_capacity),
            use_mmap: match lookup("SPLATLOD_USE_MMAP") {
                Some(v) => parse_flag(&v)
                    .with_context(|| format!("SPLATLOD_USE_MMAP must be true or false, got '{}'", v))?,
                None => defaults.use_mmap,
            },
            seed: parse_var(&lookup, "SPLATLOD_SEED")?.or(defaults.seed),
        })
    }

    /// Options for a run, before command-line overrides
    pub fn downsample_options(&self) -> DownsampleOptions {
        let options = DownsampleOptions::default()
            .with_progress_interval(self.progress_interval)
            .with_buffer_capacity(self.buffer_capacity)
            .with_mmap(self.use_mmap);
        match self.seed {
            Some(seed) => options.with_seed(seed),
            None => options,
        }
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> anyhow::Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(v) => v
            .trim()
            .parse()
            .map(Some)
            .with_context(|| format!("{} must be an unsigned integer, got '{}'", key, v)),
        None => Ok(None),
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn from_vars(vars: &[(&str, &str)]) -> anyhow::Result<Config> {
        let vars: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_parse_flag() {
        assert_eq!(parse_flag("TRUE"), Some(true));
        assert_eq!(parse_flag(" off "), Some(false));
        assert_eq!(parse_flag("maybe"), None);
    }

    #[test]
    fn test_defaults_match_downsample_options() {
        let options = from_vars(&[]).unwrap().downsample_options();
        assert_eq!(options, DownsampleOptions::default());

        let seeded = Config {
            seed: Some(3),
            ..Config::default()
        };
        assert_eq!(seeded.downsample_options().seed, Some(3));
    }

    #[test]
    fn test_reads_variables() {
        let config = from_vars(&[
            ("SPLATLOD_PROGRESS_INTERVAL", "500"),
            ("SPLATLOD_BUFFER_CAPACITY", " 4096 "),
            ("SPLATLOD_USE_MMAP", "no"),
            ("SPLATLOD_SEED", "42"),
        ])
        .unwrap();
        assert_eq!(
            config,
            Config {
                progress_interval: 500,
                buffer_capacity: 4096,
                use_mmap: false,
                seed: Some(42),
            }
        );
    }

    #[test]
    fn test_malformed_variables_are_errors() {
        for (key, value) in [
            ("SPLATLOD_PROGRESS_INTERVAL", "often"),
            ("SPLATLOD_BUFFER_CAPACITY", "-1"),
            ("SPLATLOD_USE_MMAP", "maybe"),
            ("SPLATLOD_SEED", "0x10"),
        ] {
            let err = from_vars(&[(key, value)]).unwrap_err();
            assert!(err.to_string().contains(key), "{}", err);
        }
    }
}
