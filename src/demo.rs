use crate::catalog::BundleState;
use crate::config::Settings;
use crate::engine::AdsEngine;
use crate::host::{AdInfo, AdsClient, FetchResult, NotificationInfo, TimerId, UrlComponents};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use url::Url;

const DEMO_MODEL: &str = r#"{
    "locale": "en",
    "categories": ["news-politics", "sports", "technology-gaming"],
    "keywords": {
        "election": [1.0, 0.0, 0.0],
        "senate": [1.0, 0.0, 0.0],
        "football": [0.0, 1.0, 0.0],
        "match": [0.0, 0.8, 0.0],
        "playoffs": [0.0, 1.0, 0.0],
        "console": [0.0, 0.0, 1.0],
        "gpu": [0.0, 0.0, 1.0]
    }
}"#;

const DEMO_CATALOG: &str = r#"{
    "catalog_id": "demo-catalog",
    "categories": {
        "sports": [
            {
                "advertiser": "Acme Running",
                "notification_text": "New trail shoes are in",
                "notification_url": "https://shop.acme-running.example/",
                "creative_set_id": "set-sports-1",
                "uuid": "demo-ad-1"
            },
            {
                "advertiser": "Stadium Tickets",
                "notification_text": "Playoff seats from $29",
                "notification_url": "https://tickets.example/",
                "creative_set_id": "set-sports-2",
                "uuid": "demo-ad-2"
            }
        ],
        "technology-gaming": [
            {
                "advertiser": "Voltage PC",
                "notification_text": "Custom builds, shipped fast",
                "notification_url": "https://voltage-pc.example/",
                "creative_set_id": "set-tech-1",
                "uuid": "demo-ad-3"
            }
        ]
    }
}"#;

const DEMO_SAMPLE_BUNDLE: &str = r#"{
    "catalog_id": "",
    "categories": {
        "travel": [
            {
                "advertiser": "Island Hopper",
                "notification_text": "Weekend fares to the coast",
                "notification_url": "https://island-hopper.example/",
                "creative_set_id": "",
                "uuid": "sample-ad-1"
            }
        ]
    }
}"#;

const DEMO_BUNDLE_SCHEMA: &str = r#"{"required": ["catalog_id", "categories"]}"#;

const DEMO_SPORTS_PAGE: &str =
    "<html><body><h1>Playoffs preview</h1><p>The football match of the season.</p></body></html>";

/// An asynchronous host operation issued by the engine, waiting for its
/// completion to be delivered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostRequest {
    LoadClientState,
    LoadUserModel(String),
    LoadSampleBundle,
    FetchCatalog,
    GetAds { region: String, category: String },
}

struct Inner {
    settings: Settings,
    client_state_json: Option<String>,
    saved_client_state: Option<String>,
    model_json: String,
    fail_user_model: bool,
    catalog_json: String,
    catalog: Option<BundleState>,
    sample_bundle_json: String,
    bundle_schema_json: String,
    idle_threshold: Option<u64>,
    next_timer_id: TimerId,
    active_timers: Vec<(TimerId, u64)>,
    fail_timers: bool,
    requests: VecDeque<HostRequest>,
    notifications: Vec<NotificationInfo>,
    events: Vec<String>,
}

/// In-process host: answers the engine's config reads from `Settings`,
/// queues asynchronous requests for `pump` to complete, and records
/// timers, notifications and event-log lines for inspection.
#[derive(Clone)]
pub struct DemoClient {
    inner: Rc<RefCell<Inner>>,
}

impl DemoClient {
    pub fn new(settings: Settings) -> Self {
        let catalog = BundleState::from_json(DEMO_CATALOG).ok();

        Self {
            inner: Rc::new(RefCell::new(Inner {
                settings,
                client_state_json: None,
                saved_client_state: None,
                model_json: DEMO_MODEL.to_string(),
                fail_user_model: false,
                catalog_json: DEMO_CATALOG.to_string(),
                catalog,
                sample_bundle_json: DEMO_SAMPLE_BUNDLE.to_string(),
                bundle_schema_json: DEMO_BUNDLE_SCHEMA.to_string(),
                idle_threshold: None,
                next_timer_id: 0,
                active_timers: Vec::new(),
                fail_timers: false,
                requests: VecDeque::new(),
                notifications: Vec::new(),
                events: Vec::new(),
            })),
        }
    }

    pub fn set_ads_enabled(&self, enabled: bool) {
        self.inner.borrow_mut().settings.ads_enabled = enabled;
    }

    pub fn set_notifications_available(&self, available: bool) {
        self.inner.borrow_mut().settings.notifications_available = available;
    }

    pub fn set_client_state_json(&self, json: &str) {
        self.inner.borrow_mut().client_state_json = Some(json.to_string());
    }

    pub fn set_model_json(&self, json: &str) {
        self.inner.borrow_mut().model_json = json.to_string();
    }

    pub fn set_fail_user_model(&self, fail: bool) {
        self.inner.borrow_mut().fail_user_model = fail;
    }

    pub fn set_catalog_json(&self, json: &str) {
        let mut inner = self.inner.borrow_mut();
        inner.catalog_json = json.to_string();
        inner.catalog = BundleState::from_json(json).ok();
    }

    pub fn set_sample_bundle_json(&self, json: &str) {
        self.inner.borrow_mut().sample_bundle_json = json.to_string();
    }

    pub fn set_fail_timers(&self, fail: bool) {
        self.inner.borrow_mut().fail_timers = fail;
    }

    pub fn pop_request(&self) -> Option<HostRequest> {
        self.inner.borrow_mut().requests.pop_front()
    }

    pub fn notifications(&self) -> Vec<NotificationInfo> {
        self.inner.borrow().notifications.clone()
    }

    pub fn events(&self) -> Vec<String> {
        self.inner.borrow().events.clone()
    }

    /// The `data` objects of every logged record of the given kind.
    pub fn events_of_kind(&self, kind: &str) -> Vec<serde_json::Value> {
        self.inner
            .borrow()
            .events
            .iter()
            .filter_map(|line| serde_json::from_str::<serde_json::Value>(line).ok())
            .map(|value| value["data"].clone())
            .filter(|data| data["type"] == kind)
            .collect()
    }

    pub fn active_timers(&self) -> Vec<(TimerId, u64)> {
        self.inner.borrow().active_timers.clone()
    }

    pub fn idle_threshold(&self) -> Option<u64> {
        self.inner.borrow().idle_threshold
    }

    pub fn saved_client_state(&self) -> Option<String> {
        self.inner.borrow().saved_client_state.clone()
    }

    fn client_state_json(&self) -> Option<String> {
        self.inner.borrow().client_state_json.clone()
    }

    fn model_response(&self) -> Option<String> {
        let inner = self.inner.borrow();
        if inner.fail_user_model {
            None
        } else {
            Some(inner.model_json.clone())
        }
    }

    fn catalog_json(&self) -> String {
        self.inner.borrow().catalog_json.clone()
    }

    fn sample_bundle_json(&self) -> String {
        self.inner.borrow().sample_bundle_json.clone()
    }

    fn resolve_ads(&self, category: &str) -> Option<Vec<AdInfo>> {
        let inner = self.inner.borrow();
        let catalog = inner.catalog.as_ref()?;
        let ads = catalog.categories.get(category)?;
        if ads.is_empty() {
            return None;
        }

        Some(ads.clone())
    }
}

impl AdsClient for DemoClient {
    fn is_ads_enabled(&self) -> bool {
        self.inner.borrow().settings.ads_enabled
    }

    fn is_notifications_available(&self) -> bool {
        self.inner.borrow().settings.notifications_available
    }

    fn locales(&self) -> Vec<String> {
        self.inner.borrow().settings.locales.clone()
    }

    fn ads_locale(&self) -> String {
        self.inner.borrow().settings.ads_locale.clone()
    }

    fn ssid(&self) -> String {
        String::new()
    }

    fn ads_per_hour(&self) -> u64 {
        self.inner.borrow().settings.ads_per_hour
    }

    fn ads_per_day(&self) -> u64 {
        self.inner.borrow().settings.ads_per_day
    }

    fn set_idle_threshold(&mut self, seconds: u64) {
        self.inner.borrow_mut().idle_threshold = Some(seconds);
    }

    fn set_timer(&mut self, seconds: u64) -> TimerId {
        let mut inner = self.inner.borrow_mut();
        if inner.fail_timers {
            return 0;
        }

        inner.next_timer_id += 1;
        let timer_id = inner.next_timer_id;
        inner.active_timers.push((timer_id, seconds));
        timer_id
    }

    fn kill_timer(&mut self, id: TimerId) {
        self.inner
            .borrow_mut()
            .active_timers
            .retain(|(timer_id, _)| *timer_id != id);
    }

    fn url_components(&self, url: &str) -> Option<UrlComponents> {
        let parsed = Url::parse(url).ok()?;

        Some(UrlComponents {
            scheme: parsed.scheme().to_string(),
            hostname: parsed.host_str().unwrap_or_default().to_string(),
            path: parsed.path().to_string(),
            query: parsed.query().unwrap_or_default().to_string(),
        })
    }

    fn load_client_state(&mut self) {
        self.inner
            .borrow_mut()
            .requests
            .push_back(HostRequest::LoadClientState);
    }

    fn save_client_state(&mut self, json: String) {
        self.inner.borrow_mut().saved_client_state = Some(json);
    }

    fn load_user_model_for_locale(&mut self, locale: &str) {
        self.inner
            .borrow_mut()
            .requests
            .push_back(HostRequest::LoadUserModel(locale.to_string()));
    }

    fn load_sample_bundle(&mut self) {
        self.inner
            .borrow_mut()
            .requests
            .push_back(HostRequest::LoadSampleBundle);
    }

    fn load_json_schema(&self, _name: &str) -> String {
        self.inner.borrow().bundle_schema_json.clone()
    }

    fn fetch_catalog(&mut self) {
        self.inner
            .borrow_mut()
            .requests
            .push_back(HostRequest::FetchCatalog);
    }

    fn get_ads(&mut self, region: &str, category: &str) {
        self.inner.borrow_mut().requests.push_back(HostRequest::GetAds {
            region: region.to_string(),
            category: category.to_string(),
        });
    }

    fn show_notification(&mut self, info: NotificationInfo) {
        log::info!(
            "notification: {} - {} ({})",
            info.advertiser,
            info.text,
            info.url
        );
        self.inner.borrow_mut().notifications.push(info);
    }

    fn event_log(&mut self, json: &str) {
        self.inner.borrow_mut().events.push(json.to_string());
    }
}

/// Completes every queued host request against the engine, in order,
/// until the queue drains. Completions may enqueue further requests
/// (category fallback, catalog re-arm); those are served too.
pub fn pump(engine: &mut AdsEngine, client: &DemoClient) {
    while let Some(request) = client.pop_request() {
        match request {
            HostRequest::LoadClientState => match client.client_state_json() {
                Some(json) => engine.on_client_state_loaded(FetchResult::Success, &json),
                None => engine.on_client_state_loaded(FetchResult::Failed, ""),
            },
            HostRequest::LoadUserModel(_locale) => match client.model_response() {
                Some(json) => engine.on_user_model_loaded(FetchResult::Success, &json),
                None => engine.on_user_model_loaded(FetchResult::Failed, ""),
            },
            HostRequest::LoadSampleBundle => {
                let json = client.sample_bundle_json();
                engine.on_load_sample_bundle(FetchResult::Success, &json);
            }
            HostRequest::FetchCatalog => {
                let json = client.catalog_json();
                engine.on_catalog_downloaded(FetchResult::Success, &json);
            }
            HostRequest::GetAds { region, category } => match client.resolve_ads(&category) {
                Some(ads) => engine.on_get_ads(FetchResult::Success, &region, &category, &ads),
                None => engine.on_get_ads(FetchResult::Failed, &region, &category, &[]),
            },
        }
    }
}

/// Drives a scripted browsing session against the engine and prints the
/// resulting event log and notifications.
pub fn run(settings: Settings) -> anyhow::Result<()> {
    let client = DemoClient::new(settings.clone());
    let mut engine = AdsEngine::new(Box::new(client.clone()), settings.engine_flags());

    engine.initialize();
    pump(&mut engine, &client);

    if !engine.is_initialized() {
        anyhow::bail!("engine failed to initialize");
    }

    engine.on_foreground();

    engine.tab_updated(1, "https://sports.example.com/playoffs", true, false);
    engine.classify_page("https://sports.example.com/playoffs", DEMO_SPORTS_PAGE);

    engine.tab_updated(1, "https://duckduckgo.com/?q=trail+shoes", true, false);

    engine.on_idle();
    engine.on_un_idle();
    pump(&mut engine, &client);

    let notifications = client.notifications();
    for info in &notifications {
        engine.report_notification_shown(info);
    }

    engine.save_cached_info();

    println!("--- event log ---");
    for line in client.events() {
        println!("{line}");
    }

    println!("--- notifications ---");
    if notifications.is_empty() {
        println!("(none served)");
    } else {
        for info in &notifications {
            println!("[{}] {}: {} -> {}", info.category, info.advertiser, info.text, info.url);
        }
    }

    Ok(())
}
