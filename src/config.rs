use dotenvy::dotenv;
use std::env;

#[derive(Clone)]
pub struct Config {
    pub discord_token: String,
    pub devana_api_url: String,
    pub devana_app_url: String,
    pub devana_login: String,
    pub devana_password: String,
    /// Helper agent used to name knowledge bases and read agent descriptions
    pub devana_agent_base: String,
    pub dev_guild_id: Option<u64>,
    pub register_commands: bool,
    pub status_message: String,
    pub stream_replies: bool,
    pub config_cache_capacity: usize,
    pub http_timeout_secs: u64,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv().ok();
        Self::build()
    }

    fn build() -> anyhow::Result<Self> {
        Ok(Config {
            discord_token: env::var("DISCORD_TOKEN")
                .map_err(|_| anyhow::anyhow!("DISCORD_TOKEN must be set"))?,
            devana_api_url: env::var("DEVANA_API_URL")
                .unwrap_or_else(|_| "https://api.devana.ai".to_string())
                .trim_end_matches('/')
                .to_string(),
            devana_app_url: env::var("DEVANA_APP_URL")
                .unwrap_or_else(|_| "https://app.devana.ai".to_string())
                .trim_end_matches('/')
                .to_string(),
            devana_login: env::var("DEVANA_LOGIN")
                .map_err(|_| anyhow::anyhow!("DEVANA_LOGIN must be set"))?,
            devana_password: env::var("DEVANA_PASSWORD")
                .map_err(|_| anyhow::anyhow!("DEVANA_PASSWORD must be set"))?,
            devana_agent_base: env::var("DEVANA_AGENT_BASE")
                .map_err(|_| anyhow::anyhow!("DEVANA_AGENT_BASE must be set"))?,
            dev_guild_id: env::var("DEV_GUILD_ID").ok().and_then(|id| id.parse().ok()),
            register_commands: env::var("REGISTER_COMMANDS")
                .unwrap_or_else(|_| "true".to_string())
                .parse()
                .unwrap_or(true),
            status_message: env::var("STATUS_MESSAGE")
                .unwrap_or_else(|_| "Mention me to talk to your agent".to_string()),
            stream_replies: env::var("STREAM_REPLIES")
                .unwrap_or_else(|_| "true".to_string())
                .parse()
                .unwrap_or(true),
            config_cache_capacity: env::var("CONFIG_CACHE_CAPACITY")
                .unwrap_or_else(|_| "1000".to_string())
                .parse()
                .unwrap_or(1000),
            http_timeout_secs: env::var("HTTP_TIMEOUT_SECS")
                .unwrap_or_else(|_| "60".to_string())
                .parse()
                .unwrap_or(60),
        })
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("discord_token", &"[REDACTED]")
            .field("devana_api_url", &self.devana_api_url)
            .field("devana_app_url", &self.devana_app_url)
            .field("devana_login", &self.devana_login)
            .field("devana_password", &"[REDACTED]")
            .field("devana_agent_base", &self.devana_agent_base)
            .field("dev_guild_id", &self.dev_guild_id)
            .field("register_commands", &self.register_commands)
            .field("status_message", &self.status_message)
            .field("stream_replies", &self.stream_replies)
            .field("config_cache_capacity", &self.config_cache_capacity)
            .field("http_timeout_secs", &self.http_timeout_secs)
            .finish()
    }
}

/// Discord message limit is 2000 characters
pub const DISCORD_MESSAGE_LIMIT: usize = 2000;

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    #[test]
    fn test_config_logic() {
        // 1. Test missing vars
        env::remove_var("DISCORD_TOKEN");
        env::remove_var("DEVANA_LOGIN");
        env::remove_var("DEVANA_PASSWORD");
        env::remove_var("DEVANA_AGENT_BASE");
        let result = Config::build();
        assert!(
            result.is_err(),
            "Should fail when required vars are missing"
        );

        // 2. Test defaults
        env::set_var("DISCORD_TOKEN", "test_token");
        env::set_var("DEVANA_LOGIN", "bot@example.com");
        env::set_var("DEVANA_PASSWORD", "hunter2");
        env::set_var("DEVANA_AGENT_BASE", "base-agent");
        let config = Config::build().unwrap();
        assert_eq!(config.discord_token, "test_token");
        assert_eq!(config.devana_agent_base, "base-agent");
        assert!(config.stream_replies);
        assert_eq!(config.config_cache_capacity, 1000);

        // 3. Test debug redaction
        let debug_output = format!("{:?}", config);
        assert!(!debug_output.contains("test_token"));
        assert!(!debug_output.contains("hunter2"));
        assert!(debug_output.contains("[REDACTED]"));

        // Cleanup
        env::remove_var("DISCORD_TOKEN");
        env::remove_var("DEVANA_LOGIN");
        env::remove_var("DEVANA_PASSWORD");
        env::remove_var("DEVANA_AGENT_BASE");
    }
}
