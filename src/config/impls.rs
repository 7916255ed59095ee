use super::structs::PartialConfig;

use serde::Deserialize;
use std::collections::HashMap;
use std::str::FromStr;

impl PartialConfig {
    /// Overlays every field `other` sets onto `self`, recording `source` as
    /// the origin of each one.
    pub fn merge(
        &mut self,
        other: PartialConfig,
        source: &str,
        sources: &mut HashMap<String, String>,
    ) {
        if let Some(log_level) = other.log_level {
            self.log_level = Some(log_level);
            sources.insert("log_level".into(), source.into());
        }
        if let Some(base_dir) = other.base_dir {
            self.base_dir = Some(base_dir);
            sources.insert("base_dir".into(), source.into());
        }
        if let Some(user) = other.user {
            self.user = Some(user);
            sources.insert("user".into(), source.into());
        }
        if let Some(shell) = other.shell {
            self.shell = Some(shell);
            sources.insert("shell".into(), source.into());
        }
        if let Some(search_path) = other.search_path {
            self.search_path = Some(search_path);
            sources.insert("search_path".into(), source.into());
        }
        if let Some(user_namespace) = other.user_namespace {
            self.user_namespace = Some(user_namespace);
            sources.insert("user_namespace".into(), source.into());
        }
        if let Some(supervise) = other.supervise {
            self.supervise = Some(supervise);
            sources.insert("supervise".into(), source.into());
        }
    }
}

pub(crate) fn deserialize_level_filter<'de, D>(
    deserializer: D,
) -> Result<Option<log::LevelFilter>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s: Option<String> = Option::deserialize(deserializer)?;
    s.map_or(Ok(None), |s| {
        log::LevelFilter::from_str(&s)
            .map(Some)
            .map_err(serde::de::Error::custom)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use log::LevelFilter;

    #[test]
    fn test_merge_overrides_and_tracks_sources() {
        let mut base = PartialConfig {
            user: Some("alice".to_string()),
            supervise: Some(true),
            ..PartialConfig::default()
        };
        let mut sources = HashMap::new();
        sources.insert("user".to_string(), "/etc/overjail.toml".to_string());

        base.merge(
            PartialConfig {
                log_level: Some(LevelFilter::Debug),
                user: Some("bob".to_string()),
                ..PartialConfig::default()
            },
            "environment",
            &mut sources,
        );

        assert_eq!(base.log_level, Some(LevelFilter::Debug));
        assert_eq!(base.user, Some("bob".to_string()));
        assert_eq!(base.supervise, Some(true));
        assert_eq!(sources.get("user"), Some(&"environment".to_string()));
        assert_eq!(sources.get("log_level"), Some(&"environment".to_string()));
        assert_eq!(sources.get("supervise"), None);
    }

    #[test]
    fn test_parse_toml() {
        let config: PartialConfig = toml::from_str(
            r#"
            log_level = "warn"
            base_dir = "/srv/jail"
            user_namespace = true
            "#,
        )
        .expect("valid config");
        assert_eq!(config.log_level, Some(LevelFilter::Warn));
        assert_eq!(config.base_dir, Some("/srv/jail".to_string()));
        assert_eq!(config.user_namespace, Some(true));
        assert_eq!(config.shell, None);
    }

    #[test]
    fn test_parse_toml_rejects_bad_values() {
        assert!(toml::from_str::<PartialConfig>("log_level = \"loud\"").is_err());
        assert!(toml::from_str::<PartialConfig>("no_such_key = 1").is_err());
    }
}
