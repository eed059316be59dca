use std::{collections::HashMap, fs};

#[derive(Debug, Clone)]
pub struct Settings {
    pub api_url: String,
    pub token: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_url: "http://127.0.0.1:8000/api".into(),
            token: None,
        }
    }
}

/// Defaults, overridden by an optional `labflow.toml` in the working
/// directory, overridden by environment variables.
pub fn load_settings() -> Settings {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string("labflow.toml") {
        apply_file(&mut settings, &raw);
    }

    if let Ok(v) = std::env::var("LABFLOW_API_URL") {
        settings.api_url = v;
    }
    if let Ok(v) = std::env::var("LABFLOW_TOKEN") {
        settings.token = Some(v);
    }

    settings
}

fn apply_file(settings: &mut Settings, raw: &str) {
    if let Ok(file_cfg) = toml::from_str::<HashMap<String, String>>(raw) {
        if let Some(v) = file_cfg.get("api_url") {
            settings.api_url = v.clone();
        }
        if let Some(v) = file_cfg.get("token") {
            settings.token = Some(v.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_values_override_defaults() {
        let mut settings = Settings::default();
        apply_file(
            &mut settings,
            "api_url = \"https://lab.example/api\"\ntoken = \"tok-9\"\n",
        );
        assert_eq!(settings.api_url, "https://lab.example/api");
        assert_eq!(settings.token.as_deref(), Some("tok-9"));
    }

    #[test]
    fn malformed_file_leaves_defaults_alone() {
        let mut settings = Settings::default();
        apply_file(&mut settings, "api_url = [not toml");
        assert_eq!(settings.api_url, Settings::default().api_url);
        assert_eq!(settings.token, None);
    }
}
