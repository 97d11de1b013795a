//! Realtime channel definitions

/// Channel name patterns
pub struct Channels;

impl Channels {
    /// Per-environment status channel
    pub fn environment(environment_id: &str) -> String {
        format!("orbit.environment.{}", environment_id)
    }

    /// Parse a channel name to extract the environment ID
    pub fn parse_environment_id(channel: &str) -> Option<String> {
        let parts: Vec<&str> = channel.split('.').collect();
        if parts.len() >= 3 && parts[0] == "orbit" && parts[1] == "environment" {
            Some(parts[2..].join("."))
        } else {
            None
        }
    }

    /// Check if a channel is an environment channel
    pub fn is_environment_channel(channel: &str) -> bool {
        channel.starts_with("orbit.environment.")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_generation() {
        assert_eq!(
            Channels::environment("local"),
            "orbit.environment.local"
        );
        assert_eq!(
            Channels::environment("droplet-2"),
            "orbit.environment.droplet-2"
        );
    }

    #[test]
    fn test_channel_parsing() {
        assert_eq!(
            Channels::parse_environment_id("orbit.environment.local"),
            Some("local".to_string())
        );
        assert_eq!(Channels::parse_environment_id("orbit.workspace.local"), None);
        assert!(Channels::is_environment_channel("orbit.environment.local"));
        assert!(!Channels::is_environment_channel("orbit.project.blog"));
    }
}
