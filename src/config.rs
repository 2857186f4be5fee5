use anyhow::{anyhow, Context};
use std::path::PathBuf;

pub const DEFAULT_PUBLIC_BASE_URL: &str = "sekolahd://objects";
pub const DEFAULT_ACADEMIC_YEAR: &str = "2024/2025";
/// Ten years.
pub const MAX_SESSION_TTL_HOURS: i64 = 10 * 366 * 24;
pub const MAX_STUDENT_PAGE_SIZE: i64 = 1000;

#[derive(Debug, Clone)]
pub struct Config {
    /// Workspace opened on startup, before any `workspace.select`.
    pub workspace: Option<PathBuf>,
    pub public_base_url: String,
    pub session_ttl_hours: i64,
    pub default_academic_year: String,
    pub student_page_size: i64,
    pub log_json: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            workspace: None,
            public_base_url: DEFAULT_PUBLIC_BASE_URL.to_string(),
            session_ttl_hours: 168,
            default_academic_year: DEFAULT_ACADEMIC_YEAR.to_string(),
            student_page_size: 5,
            log_json: false,
        }
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Config::default();
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        cfg.workspace = get("SEKOLAHD_WORKSPACE").map(PathBuf::from);
        if let Some(v) = get("SEKOLAHD_PUBLIC_BASE_URL") {
            cfg.public_base_url = v.trim_end_matches('/').to_string();
        }
        if let Some(v) = get("SEKOLAHD_SESSION_TTL_HOURS") {
            cfg.session_ttl_hours =
                parse_bounded("SEKOLAHD_SESSION_TTL_HOURS", &v, MAX_SESSION_TTL_HOURS)?;
        }
        if let Some(v) = get("SEKOLAHD_DEFAULT_ACADEMIC_YEAR") {
            cfg.default_academic_year = v;
        }
        if let Some(v) = get("SEKOLAHD_STUDENT_PAGE_SIZE") {
            cfg.student_page_size =
                parse_bounded("SEKOLAHD_STUDENT_PAGE_SIZE", &v, MAX_STUDENT_PAGE_SIZE)?;
        }
        if let Some(v) = get("SEKOLAHD_LOG_JSON") {
            cfg.log_json = matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on");
        }
        Ok(cfg)
    }
}

fn parse_bounded(key: &str, raw: &str, max: i64) -> anyhow::Result<i64> {
    let n = raw
        .parse::<i64>()
        .with_context(|| format!("{key} must be an integer, got {raw:?}"))?;
    if n <= 0 || n > max {
        return Err(anyhow!("{key} must be between 1 and {max}, got {n}"));
    }
    Ok(n)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_env_is_empty() {
        let cfg = Config::from_lookup(lookup(&[])).expect("config");
        assert!(cfg.workspace.is_none());
        assert_eq!(cfg.public_base_url, DEFAULT_PUBLIC_BASE_URL);
        assert_eq!(cfg.student_page_size, 5);
        assert_eq!(cfg.default_academic_year, "2024/2025");
    }

    #[test]
    fn reads_overrides_and_rejects_bad_numbers() {
        let cfg = Config::from_lookup(lookup(&[
            ("SEKOLAHD_PUBLIC_BASE_URL", "https://cdn.example.test/"),
            ("SEKOLAHD_STUDENT_PAGE_SIZE", "20"),
            ("SEKOLAHD_LOG_JSON", "true"),
        ]))
        .expect("config");
        assert_eq!(cfg.public_base_url, "https://cdn.example.test");
        assert_eq!(cfg.student_page_size, 20);
        assert!(cfg.log_json);

        assert!(Config::from_lookup(lookup(&[("SEKOLAHD_SESSION_TTL_HOURS", "soon")])).is_err());
        assert!(Config::from_lookup(lookup(&[("SEKOLAHD_STUDENT_PAGE_SIZE", "0")])).is_err());
    }

    #[test]
    fn out_of_range_numbers_are_startup_errors() {
        let huge = Config::from_lookup(lookup(&[("SEKOLAHD_SESSION_TTL_HOURS", "9999999999999")]));
        assert!(huge.is_err());
        let max = MAX_SESSION_TTL_HOURS.to_string();
        let cfg = Config::from_lookup(lookup(&[("SEKOLAHD_SESSION_TTL_HOURS", max.as_str())]))
            .expect("ten years is accepted");
        assert_eq!(cfg.session_ttl_hours, MAX_SESSION_TTL_HOURS);
        assert!(Config::from_lookup(lookup(&[("SEKOLAHD_STUDENT_PAGE_SIZE", "1000000")])).is_err());
    }
}
