use crate::host::AdInfo;
use anyhow::Result;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Persisted per-profile state. Every field defaults so partial or empty
/// snapshots restore cleanly; the host owns the bytes, this struct owns
/// the shape.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientState {
    #[serde(default)]
    pub ad_uuid: String,
    #[serde(default)]
    pub available: bool,
    #[serde(default)]
    pub locale: String,
    #[serde(default)]
    pub locales: Vec<String>,
    #[serde(default)]
    pub page_score_history: Vec<Vec<f64>>,
    #[serde(default)]
    pub ads_shown_history: Vec<u64>,
    #[serde(default)]
    pub ads_uuid_seen: HashMap<String, u64>,
    #[serde(default)]
    pub shopping_active: bool,
    #[serde(default)]
    pub shopping_url: String,
    #[serde(default)]
    pub shopping_score: f64,
    #[serde(default)]
    pub search_active: bool,
    #[serde(default)]
    pub search_url: String,
    #[serde(default)]
    pub search_score: f64,
    #[serde(default)]
    pub current_ssid: String,
    #[serde(default)]
    pub current_place: String,
    #[serde(default)]
    pub last_user_activity: u64,
    #[serde(default)]
    pub last_user_idle_stop_time: u64,
}

/// Mutation and query API over the persistent client state. The engine
/// owns the only instance; persistence round-trips through the host as
/// JSON via `to_json` / `load_from_json`.
pub struct Client {
    state: ClientState,
}

impl Default for Client {
    fn default() -> Self {
        Self::new()
    }
}

impl Client {
    pub fn new() -> Self {
        Self {
            state: ClientState {
                locale: crate::engine::DEFAULT_LANGUAGE.to_string(),
                ..ClientState::default()
            },
        }
    }

    pub fn load_from_json(&mut self, json: &str) -> Result<()> {
        let mut state: ClientState = serde_json::from_str(json)?;
        if state.locale.is_empty() {
            state.locale = crate::engine::DEFAULT_LANGUAGE.to_string();
        }

        self.state = state;
        Ok(())
    }

    pub fn to_json(&self) -> Result<String> {
        let json = serde_json::to_string(&self.state)?;
        Ok(json)
    }

    pub fn locale(&self) -> String {
        self.state.locale.clone()
    }

    pub fn set_locale(&mut self, locale: &str) {
        self.state.locale = locale.to_string();
    }

    pub fn locales(&self) -> &[String] {
        &self.state.locales
    }

    pub fn set_locales(&mut self, locales: Vec<String>) {
        self.state.locales = locales;
    }

    pub fn available(&self) -> bool {
        self.state.available
    }

    pub fn set_available(&mut self, available: bool) {
        self.state.available = available;
    }

    pub fn ad_uuid(&self) -> &str {
        &self.state.ad_uuid
    }

    /// Regenerates the rotating ad correlation uuid.
    pub fn update_ad_uuid(&mut self) {
        self.state.ad_uuid = generate_uuid();
    }

    pub fn page_score_history(&self) -> &[Vec<f64>] {
        &self.state.page_score_history
    }

    pub fn append_page_score(&mut self, page_score: Vec<f64>) {
        self.state.page_score_history.push(page_score);
    }

    pub fn ads_shown_history(&self) -> &[u64] {
        &self.state.ads_shown_history
    }

    pub fn append_ad_shown(&mut self, timestamp: u64) {
        self.state.ads_shown_history.push(timestamp);
    }

    pub fn ads_uuid_seen(&self) -> &HashMap<String, u64> {
        &self.state.ads_uuid_seen
    }

    pub fn update_ads_uuid_seen(&mut self, uuid: &str) {
        self.state.ads_uuid_seen.insert(uuid.to_string(), 1);
    }

    /// Forgets the seen marks for the given candidate set only; marks for
    /// ads outside the set survive.
    pub fn reset_ads_uuid_seen(&mut self, ads: &[AdInfo]) {
        for ad in ads {
            self.state.ads_uuid_seen.remove(&ad.uuid);
        }
    }

    pub fn flag_shopping_state(&mut self, url: &str, score: f64) {
        self.state.shopping_active = true;
        self.state.shopping_url = url.to_string();
        self.state.shopping_score = score;
    }

    pub fn unflag_shopping_state(&mut self) {
        self.state.shopping_active = false;
        self.state.shopping_url.clear();
        self.state.shopping_score = 0.0;
    }

    pub fn shopping_state(&self) -> bool {
        self.state.shopping_active
    }

    pub fn flag_search_state(&mut self, url: &str, score: f64) {
        self.state.search_active = true;
        self.state.search_url = url.to_string();
        self.state.search_score = score;
    }

    pub fn unflag_search_state(&mut self) {
        self.state.search_active = false;
        self.state.search_url.clear();
        self.state.search_score = 0.0;
    }

    pub fn search_state(&self) -> bool {
        self.state.search_active
    }

    pub fn set_current_ssid(&mut self, ssid: &str) {
        self.state.current_ssid = ssid.to_string();
    }

    pub fn current_ssid(&self) -> &str {
        &self.state.current_ssid
    }

    pub fn set_current_place(&mut self, place: &str) {
        self.state.current_place = place.to_string();
    }

    pub fn current_place(&self) -> String {
        self.state.current_place.clone()
    }

    pub fn update_last_user_activity(&mut self, timestamp: u64) {
        self.state.last_user_activity = timestamp;
    }

    pub fn update_last_user_idle_stop_time(&mut self, timestamp: u64) {
        self.state.last_user_idle_stop_time = timestamp;
    }

    pub fn remove_all_history(&mut self) {
        self.state.page_score_history.clear();
        self.state.ads_shown_history.clear();
        self.state.ads_uuid_seen.clear();
        self.state.last_user_activity = 0;
        self.state.last_user_idle_stop_time = 0;
        self.unflag_shopping_state();
        self.unflag_search_state();
    }
}

fn generate_uuid() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill(&mut bytes);

    // RFC 4122 version and variant bits
    bytes[6] = (bytes[6] & 0x0f) | 0x40;
    bytes[8] = (bytes[8] & 0x3f) | 0x80;

    format!(
        "{:02x}{:02x}{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}{:02x}{:02x}{:02x}{:02x}",
        bytes[0], bytes[1], bytes[2], bytes[3],
        bytes[4], bytes[5],
        bytes[6], bytes[7],
        bytes[8], bytes[9],
        bytes[10], bytes[11], bytes[12], bytes[13], bytes[14], bytes[15]
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ad(uuid: &str) -> AdInfo {
        AdInfo {
            uuid: uuid.to_string(),
            ..AdInfo::default()
        }
    }

    #[test]
    fn test_empty_snapshot_restores_defaults() {
        let mut client = Client::new();
        client.load_from_json("{}").unwrap();
        assert_eq!(client.locale(), "en");
        assert!(client.ads_shown_history().is_empty());
        assert!(!client.available());
    }

    #[test]
    fn test_state_round_trip() {
        let mut client = Client::new();
        client.set_locale("de");
        client.append_ad_shown(1000);
        client.append_page_score(vec![0.1, 0.9]);
        client.update_ads_uuid_seen("ad-1");
        client.set_available(true);

        let json = client.to_json().unwrap();

        let mut restored = Client::new();
        restored.load_from_json(&json).unwrap();
        assert_eq!(restored.locale(), "de");
        assert_eq!(restored.ads_shown_history().to_vec(), vec![1000]);
        assert_eq!(restored.page_score_history().to_vec(), vec![vec![0.1, 0.9]]);
        assert!(restored.ads_uuid_seen().contains_key("ad-1"));
        assert!(restored.available());
    }

    #[test]
    fn test_reset_ads_uuid_seen_is_scoped_to_candidates() {
        let mut client = Client::new();
        client.update_ads_uuid_seen("ad-1");
        client.update_ads_uuid_seen("ad-2");
        client.update_ads_uuid_seen("other");

        client.reset_ads_uuid_seen(&[ad("ad-1"), ad("ad-2")]);

        assert!(!client.ads_uuid_seen().contains_key("ad-1"));
        assert!(!client.ads_uuid_seen().contains_key("ad-2"));
        assert!(client.ads_uuid_seen().contains_key("other"));
    }

    #[test]
    fn test_remove_all_history() {
        let mut client = Client::new();
        client.append_ad_shown(1);
        client.append_page_score(vec![1.0]);
        client.update_ads_uuid_seen("ad-1");
        client.flag_search_state("https://google.com/", 1.0);
        client.update_last_user_activity(99);
        client.set_locale("fr");

        client.remove_all_history();

        assert!(client.ads_shown_history().is_empty());
        assert!(client.page_score_history().is_empty());
        assert!(client.ads_uuid_seen().is_empty());
        assert!(!client.search_state());
        assert_eq!(client.locale(), "fr");
    }

    #[test]
    fn test_update_ad_uuid() {
        let mut client = Client::new();
        assert!(client.ad_uuid().is_empty());

        client.update_ad_uuid();
        let first = client.ad_uuid().to_string();
        assert_eq!(first.len(), 36);

        client.update_ad_uuid();
        assert_ne!(client.ad_uuid(), first);
    }
}
