// Channel resolution: explicit override beats the configured default.
//
// Pure precedence logic; no lookups against the messaging service happen here.

use super::error::ConfigError;

fn present(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Pick the destination channel. Blank values count as absent.
pub fn resolve_channel(
    explicit_override: Option<&str>,
    configured_default: Option<&str>,
) -> Result<String, ConfigError> {
    if let Some(channel) = present(explicit_override) {
        log::debug!("Using explicit channel {}", channel);
        return Ok(channel.to_string());
    }
    if let Some(channel) = present(configured_default) {
        log::debug!("Using default channel {}", channel);
        return Ok(channel.to_string());
    }
    Err(ConfigError::MissingChannel)
}

/// Does `channel` (id, `name` or `#name`) refer to the destination `id`/`name`?
pub fn channel_matches(channel: &str, id: &str, name: &str) -> bool {
    let channel = channel.trim();
    if channel == id {
        return true;
    }
    let bare = channel.strip_prefix('#').unwrap_or(channel);
    let name = name.strip_prefix('#').unwrap_or(name);
    bare.eq_ignore_ascii_case(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_override_wins() {
        assert_eq!(resolve_channel(Some("#oncall"), Some("#alerts")).unwrap(), "#oncall");
    }

    #[test]
    fn test_default_used_without_override() {
        assert_eq!(resolve_channel(None, Some("#alerts")).unwrap(), "#alerts");
        assert_eq!(resolve_channel(Some("   "), Some("#alerts")).unwrap(), "#alerts");
    }

    #[test]
    fn test_override_without_default() {
        assert_eq!(resolve_channel(Some(" ops "), None).unwrap(), "ops");
    }

    #[test]
    fn test_missing_both_is_config_error() {
        assert!(matches!(resolve_channel(None, None), Err(ConfigError::MissingChannel)));
        assert!(matches!(resolve_channel(Some(""), Some(" ")), Err(ConfigError::MissingChannel)));
    }

    #[test]
    fn test_channel_matching_forms() {
        assert!(channel_matches("C024BE91L", "C024BE91L", "alerts"));
        assert!(channel_matches("#alerts", "C024BE91L", "alerts"));
        assert!(channel_matches("alerts", "C024BE91L", "alerts"));
        assert!(channel_matches("#Alerts", "C024BE91L", "alerts"));
        assert!(!channel_matches("#alert", "C024BE91L", "alerts"));
    }
}
