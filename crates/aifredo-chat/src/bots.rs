//! Public bot profile lookup.
//!
//! Fetches display metadata for the chat header before connecting.
//! The backend owns bot identity; this client treats it as read-only
//! context, and a failed lookup is an ordinary error rather than a
//! connection-state change.

use anyhow::{Context, Result, bail};
use serde::Deserialize;

/// Display metadata for a bot.
#[derive(Debug, Clone, Deserialize)]
pub struct BotProfile {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub persona: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub channel: String,
    #[serde(default)]
    pub status: String,
}

#[derive(Debug, Deserialize)]
struct BotLookup {
    bot: BotProfile,
}

/// Look up a bot by its public identifier.
pub async fn fetch_bot_profile(api_base: &str, bot_id: &str) -> Result<BotProfile> {
    let url = format!(
        "{}/api/bots/public/{}",
        api_base.trim_end_matches('/'),
        bot_id
    );
    let response = reqwest::get(&url)
        .await
        .with_context(|| format!("requesting bot profile from {url}"))?;

    if !response.status().is_success() {
        bail!("bot not found or unavailable (status {})", response.status());
    }

    let lookup: BotLookup = response
        .json()
        .await
        .context("parsing bot profile response")?;
    Ok(lookup.bot)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_parses_with_missing_optional_fields() {
        let raw = r#"{"bot":{"id":"b-1","name":"AiFredo Intern"}}"#;
        let lookup: BotLookup = serde_json::from_str(raw).unwrap();
        assert_eq!(lookup.bot.name, "AiFredo Intern");
        assert!(lookup.bot.model.is_empty());
    }
}
