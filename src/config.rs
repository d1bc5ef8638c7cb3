use std::collections::HashSet;

use anyhow::Context;
use teloxide::types::{ChatId, Recipient, UserId};

/// Настройки бота: спонсорский канал и список загрузчиков.
/// Токен читает сам `Bot::from_env` (TELOXIDE_TOKEN).
#[derive(Clone)]
pub struct Config {
    channel: Recipient,
    admin_ids: HashSet<UserId>,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let channel = std::env::var("CHANNEL_ID").context("CHANNEL_ID is missing")?;
        let admins = std::env::var("ADMIN_IDS").context("ADMIN_IDS is missing")?;
        Self::parse(&channel, &admins)
    }

    fn parse(channel: &str, admins: &str) -> anyhow::Result<Self> {
        let channel = if channel.starts_with('@') {
            Recipient::ChannelUsername(channel.to_string())
        } else {
            let id: i64 = channel
                .parse()
                .context("CHANNEL_ID must be @username or a numeric id")?;
            Recipient::Id(ChatId(id))
        };

        let admin_ids = admins
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| s.parse::<u64>().map(UserId))
            .collect::<Result<HashSet<_>, _>>()
            .context("ADMIN_IDS must be comma-separated numeric ids")?;
        anyhow::ensure!(!admin_ids.is_empty(), "ADMIN_IDS must contain at least one id");

        Ok(Self { channel, admin_ids })
    }

    pub fn channel(&self) -> Recipient {
        self.channel.clone()
    }

    /// Имя канала для текста приглашения, если канал задан username'ом.
    pub fn channel_tag(&self) -> Option<&str> {
        match &self.channel {
            Recipient::ChannelUsername(name) => Some(name),
            Recipient::Id(_) => None,
        }
    }

    pub fn is_uploader(&self, user: UserId) -> bool {
        self.admin_ids.contains(&user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uploader_gate_accepts_only_listed_ids() {
        let config = Config::parse("@filmfix", "100, 200").unwrap();
        assert!(config.is_uploader(UserId(100)));
        assert!(config.is_uploader(UserId(200)));
        assert!(!config.is_uploader(UserId(300)));
    }

    #[test]
    fn channel_accepts_username_and_numeric_id() {
        let by_name = Config::parse("@filmfix", "1").unwrap();
        assert_eq!(by_name.channel_tag(), Some("@filmfix"));

        let by_id = Config::parse("-1001234567890", "1").unwrap();
        assert!(matches!(by_id.channel(), Recipient::Id(ChatId(-1001234567890))));
        assert_eq!(by_id.channel_tag(), None);
    }

    #[test]
    fn empty_admin_list_is_rejected() {
        assert!(Config::parse("@filmfix", "").is_err());
        assert!(Config::parse("@filmfix", " , ").is_err());
    }

    #[test]
    fn malformed_admin_list_is_rejected() {
        assert!(Config::parse("@filmfix", "100,abc").is_err());
    }
}
