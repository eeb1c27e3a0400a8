use crate::web::security::RateLimiter;
use crate::{Config, Database};
use anyhow::Result;
use std::collections::HashMap;
use std::sync::Arc;
use tera::{Tera, Value};

pub struct AppState {
    pub config: Config,
    pub db: Database,
    pub templates: Tera,
    pub login_limiter: Arc<RateLimiter>,
}

impl AppState {
    pub fn new(config: Config, db: Database) -> Result<Self> {
        let mut templates = Tera::default();

        templates.register_filter("format_date", format_date_filter);
        templates.register_filter("truncate_str", truncate_str_filter);
        templates.register_filter("reading_time", reading_time_filter);
        templates.add_raw_templates(vec![
            ("base.html", include_str!("../../templates/base.html")),
            ("auth/login.html", include_str!("../../templates/auth/login.html")),
            ("auth/register.html", include_str!("../../templates/auth/register.html")),
            ("dashboard/index.html", include_str!("../../templates/dashboard/index.html")),
            ("dashboard/form.html", include_str!("../../templates/dashboard/form.html")),
            ("dashboard/profile.html", include_str!("../../templates/dashboard/profile.html")),
            ("public/index.html", include_str!("../../templates/public/index.html")),
            ("public/post.html", include_str!("../../templates/public/post.html")),
            ("public/profile.html", include_str!("../../templates/public/profile.html")),
            ("public/404.html", include_str!("../../templates/public/404.html")),
        ])?;

        Ok(Self {
            config,
            db,
            templates,
            login_limiter: Arc::new(RateLimiter::default()),
        })
    }
}

fn format_date_filter(value: &Value, args: &HashMap<String, Value>) -> tera::Result<Value> {
    let date_str = value
        .as_str()
        .ok_or_else(|| tera::Error::msg("format_date requires a string"))?;

    let format = args
        .get("format")
        .and_then(|v| v.as_str())
        .unwrap_or("%B %d, %Y");

    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(date_str) {
        return Ok(Value::String(dt.format(format).to_string()));
    }

    if let Ok(dt) = chrono::NaiveDateTime::parse_from_str(date_str, "%Y-%m-%dT%H:%M:%S%.f") {
        return Ok(Value::String(dt.format(format).to_string()));
    }

    if let Ok(dt) = chrono::NaiveDateTime::parse_from_str(date_str, "%Y-%m-%d %H:%M:%S") {
        return Ok(Value::String(dt.format(format).to_string()));
    }

    Ok(Value::String(date_str.to_string()))
}

/// Truncates to `len` characters, appending an ellipsis when something was cut.
fn truncate_str_filter(value: &Value, args: &HashMap<String, Value>) -> tera::Result<Value> {
    let s = value
        .as_str()
        .ok_or_else(|| tera::Error::msg("truncate_str requires a string"))?;
    let len = args.get("len").and_then(|v| v.as_u64()).unwrap_or(16) as usize;
    if s.chars().count() > len {
        let cut: String = s.chars().take(len).collect();
        Ok(Value::String(format!("{}…", cut.trim_end())))
    } else {
        Ok(Value::String(s.to_string()))
    }
}

const WORDS_PER_MINUTE: usize = 200;

/// Minutes needed to read the text, rounded up.
fn reading_time_filter(value: &Value, _args: &HashMap<String, Value>) -> tera::Result<Value> {
    let s = value
        .as_str()
        .ok_or_else(|| tera::Error::msg("reading_time requires a string"))?;
    let words = s.split_whitespace().count();
    Ok(Value::from(words.div_ceil(WORDS_PER_MINUTE)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(pairs: &[(&str, Value)]) -> HashMap<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn format_date_handles_sqlite_timestamps() {
        let out = format_date_filter(&Value::from("2026-03-05T10:20:30.123"), &HashMap::new())
            .unwrap();
        assert_eq!(out, Value::from("March 05, 2026"));
    }

    #[test]
    fn format_date_passes_unknown_strings_through() {
        let out = format_date_filter(&Value::from("yesterday"), &HashMap::new()).unwrap();
        assert_eq!(out, Value::from("yesterday"));
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        let out = truncate_str_filter(&Value::from("héllo wörld"), &args(&[("len", Value::from(5))]))
            .unwrap();
        assert_eq!(out, Value::from("héllo…"));
    }

    #[test]
    fn truncate_leaves_short_strings() {
        let out = truncate_str_filter(&Value::from("short"), &args(&[("len", Value::from(10))]))
            .unwrap();
        assert_eq!(out, Value::from("short"));
    }

    #[test]
    fn reading_time_rounds_up() {
        let none = HashMap::new();
        assert_eq!(reading_time_filter(&Value::from("one two three"), &none).unwrap(), Value::from(1));
        let exact = vec!["word"; 200].join(" ");
        assert_eq!(reading_time_filter(&Value::from(exact), &none).unwrap(), Value::from(1));
        let longer = vec!["word"; 201].join("\n");
        assert_eq!(reading_time_filter(&Value::from(longer), &none).unwrap(), Value::from(2));
        assert_eq!(reading_time_filter(&Value::from(""), &none).unwrap(), Value::from(0));
    }
}
