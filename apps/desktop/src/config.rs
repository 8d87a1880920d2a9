use std::{collections::HashMap, fs};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub server_url: String,
    pub player_name: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_url: "http://127.0.0.1:8000".into(),
            player_name: None,
        }
    }
}

pub fn load_settings() -> Settings {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string("client.toml") {
        apply_file(&mut settings, &raw);
    }
    apply_env(&mut settings, |key| std::env::var(key).ok());
    settings
}

fn apply_env(settings: &mut Settings, var: impl Fn(&str) -> Option<String>) {
    if let Some(v) = var("TTT_SERVER_URL") {
        settings.server_url = v;
    }
    if let Some(v) = var("APP__SERVER_URL") {
        settings.server_url = v;
    }

    if let Some(v) = var("TTT_PLAYER_NAME") {
        settings.player_name = Some(v);
    }
}

fn apply_file(settings: &mut Settings, raw: &str) {
    if let Ok(file_cfg) = toml::from_str::<HashMap<String, String>>(raw) {
        if let Some(v) = file_cfg.get("server_url") {
            settings.server_url = v.clone();
        }
        if let Some(v) = file_cfg.get("player_name") {
            settings.player_name = Some(v.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_point_at_local_server() {
        let settings = Settings::default();
        assert_eq!(settings.server_url, "http://127.0.0.1:8000");
        assert!(settings.player_name.is_none());
    }

    #[test]
    fn file_values_override_defaults() {
        let mut settings = Settings::default();
        apply_file(
            &mut settings,
            "server_url = \"http://game.example:9000\"\nplayer_name = \"Alice\"\n",
        );
        assert_eq!(settings.server_url, "http://game.example:9000");
        assert_eq!(settings.player_name.as_deref(), Some("Alice"));
    }

    #[test]
    fn env_values_override_file_values() {
        let mut settings = Settings::default();
        apply_file(
            &mut settings,
            "server_url = \"http://file.example\"\nplayer_name = \"FromFile\"\n",
        );
        apply_env(&mut settings, |key| match key {
            "TTT_SERVER_URL" => Some("http://env.example".to_string()),
            "TTT_PLAYER_NAME" => Some("FromEnv".to_string()),
            _ => None,
        });
        assert_eq!(settings.server_url, "http://env.example");
        assert_eq!(settings.player_name.as_deref(), Some("FromEnv"));
    }

    #[test]
    fn app_alias_wins_over_the_plain_env_name() {
        let mut settings = Settings::default();
        apply_env(&mut settings, |key| match key {
            "TTT_SERVER_URL" => Some("http://plain.example".to_string()),
            "APP__SERVER_URL" => Some("http://alias.example".to_string()),
            _ => None,
        });
        assert_eq!(settings.server_url, "http://alias.example");
    }

    #[test]
    fn unparseable_file_leaves_defaults_alone() {
        let mut settings = Settings::default();
        apply_file(&mut settings, "server_url = [not toml");
        assert_eq!(settings, Settings::default());
    }
}
