use serde::{Deserialize, Serialize};

/// Outcome of an asynchronous host operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchResult {
    Success,
    Failed,
}

/// Host timer handle. Zero is the "no timer" sentinel: hosts must never
/// hand out a zero id, and the engine treats zero as creation failure.
pub type TimerId = u32;

/// How the user resolved a shown notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationResult {
    Clicked,
    Dismissed,
    Timeout,
}

/// Pieces of a URL as parsed by the host.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrlComponents {
    pub scheme: String,
    pub hostname: String,
    pub path: String,
    pub query: String,
}

/// One ad as delivered by the catalog.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AdInfo {
    #[serde(default)]
    pub advertiser: String,
    #[serde(default)]
    pub notification_text: String,
    #[serde(default)]
    pub notification_url: String,
    #[serde(default)]
    pub creative_set_id: String,
    #[serde(default)]
    pub uuid: String,
}

/// The notification handed to the host for display. Ownership transfers
/// to the host at dispatch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NotificationInfo {
    pub advertiser: String,
    pub category: String,
    pub text: String,
    pub url: String,
    pub creative_set_id: String,
    pub uuid: String,
}

/// Capabilities the embedding host provides to the engine: config reads,
/// timers, URL parsing, notification dispatch, persistence and fetches.
///
/// Asynchronous operations are request-only. The engine calls the request
/// method and returns; the host later re-enters the engine through the
/// matching completion method (`on_client_state_loaded`,
/// `on_user_model_loaded`, `on_catalog_downloaded`, `on_get_ads`,
/// `on_load_sample_bundle`, `on_timer`). Completions may arrive after the
/// engine has been deinitialized and must be tolerated.
pub trait AdsClient {
    fn is_ads_enabled(&self) -> bool;
    fn is_notifications_available(&self) -> bool;

    /// Locales a classifier model exists for, in preference order.
    fn locales(&self) -> Vec<String>;
    fn ads_locale(&self) -> String;
    fn ssid(&self) -> String;
    fn ads_per_hour(&self) -> u64;
    fn ads_per_day(&self) -> u64;

    fn set_idle_threshold(&mut self, seconds: u64);

    /// Arms a one-shot timer; returns zero when the timer could not be
    /// created. Expiry is delivered through `AdsEngine::on_timer`.
    fn set_timer(&mut self, seconds: u64) -> TimerId;
    fn kill_timer(&mut self, id: TimerId);

    fn url_components(&self, url: &str) -> Option<UrlComponents>;

    /// Requests the persisted client state; completion is
    /// `AdsEngine::on_client_state_loaded`.
    fn load_client_state(&mut self);
    fn save_client_state(&mut self, json: String);

    /// Requests the classifier model for a locale; completion is
    /// `AdsEngine::on_user_model_loaded`.
    fn load_user_model_for_locale(&mut self, locale: &str);

    /// Requests the bundled sample catalog; completion is
    /// `AdsEngine::on_load_sample_bundle`.
    fn load_sample_bundle(&mut self);
    fn load_json_schema(&self, name: &str) -> String;

    /// Requests a catalog refresh; completion is
    /// `AdsEngine::on_catalog_downloaded`.
    fn fetch_catalog(&mut self);

    /// Requests the ads for a region and category; completion is
    /// `AdsEngine::on_get_ads`.
    fn get_ads(&mut self, region: &str, category: &str);

    fn show_notification(&mut self, info: NotificationInfo);

    /// Appends one string-encoded reporting record to the host event log.
    fn event_log(&mut self, json: &str);
}
