//! Gateway intents bitflags
//!
//! Declares which event groups the server should deliver to a bot session.
//! Serialized as a plain integer in the Identify payload.

use bitflags::bitflags;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

bitflags! {
    /// Event-group subscription flags sent in Identify (bot mode)
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Intents: u64 {
        /// Guild create/update/delete and role/channel changes
        const GUILDS           = 1 << 0;
        /// Member join/leave/update
        const GUILD_MEMBERS    = 1 << 1;
        /// Messages sent in guild channels
        const GUILD_MESSAGES   = 1 << 9;
        /// Reactions in guild channels
        const GUILD_REACTIONS  = 1 << 10;
        /// Typing notifications in guild channels
        const GUILD_TYPING     = 1 << 11;
        /// Direct messages
        const DIRECT_MESSAGES  = 1 << 12;
        /// Reactions in direct messages
        const DIRECT_REACTIONS = 1 << 13;
        /// Presence updates
        const PRESENCES        = 1 << 8;

        /// Default subscription for a message-focused client
        const DEFAULT = Self::GUILDS.bits()
            | Self::GUILD_MESSAGES.bits()
            | Self::DIRECT_MESSAGES.bits();
    }
}

impl Serialize for Intents {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(self.bits())
    }
}

impl<'de> Deserialize<'de> for Intents {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let bits = u64::deserialize(deserializer)?;
        Ok(Self::from_bits_truncate(bits))
    }
}

impl Default for Intents {
    fn default() -> Self {
        Self::DEFAULT
    }
}
