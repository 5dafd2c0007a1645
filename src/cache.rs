use crate::bindings::ConfigMessage;
use lru::LruCache;
use poise::serenity_prelude::GuildId;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, PoisonError};

/// Latest known configuration message per guild.
#[derive(Clone)]
pub struct ConfigCache {
    cache: Arc<Mutex<LruCache<GuildId, ConfigMessage>>>,
}

impl ConfigCache {
    pub fn new(capacity: usize) -> Self {
        let cap = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN.saturating_add(99));
        Self {
            cache: Arc::new(Mutex::new(LruCache::new(cap))),
        }
    }

    pub fn insert(&self, message: ConfigMessage) {
        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        cache.put(message.guild_id, message);
    }

    pub fn get(&self, guild_id: GuildId) -> Option<ConfigMessage> {
        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        cache.get(&guild_id).cloned()
    }

    pub fn remove(&self, guild_id: GuildId) -> Option<ConfigMessage> {
        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        cache.pop(&guild_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bindings::BindingSet;
    use poise::serenity_prelude::{ChannelId, MessageId};

    fn config(guild: u64) -> ConfigMessage {
        ConfigMessage {
            guild_id: GuildId::new(guild),
            channel_id: ChannelId::new(1),
            message_id: MessageId::new(guild * 10),
            title: String::new(),
            description: String::new(),
            bindings: BindingSet::default(),
        }
    }

    #[test]
    fn test_cache_lru() {
        let cache = ConfigCache::new(2);
        cache.insert(config(1));
        cache.insert(config(2));

        // Touch 1 so that 2 becomes the eviction candidate.
        assert!(cache.get(GuildId::new(1)).is_some());
        cache.insert(config(3));

        assert!(cache.get(GuildId::new(1)).is_some());
        assert!(cache.get(GuildId::new(2)).is_none());
        assert!(cache.get(GuildId::new(3)).is_some());
    }

    #[test]
    fn insert_replaces_guild_entry() {
        let cache = ConfigCache::new(10);
        cache.insert(config(1));
        let mut newer = config(1);
        newer.message_id = MessageId::new(99);
        cache.insert(newer);
        assert_eq!(cache.get(GuildId::new(1)).unwrap().message_id, MessageId::new(99));
    }

    #[test]
    fn zero_capacity_falls_back() {
        let cache = ConfigCache::new(0);
        cache.insert(config(1));
        assert!(cache.get(GuildId::new(1)).is_some());
    }
}
