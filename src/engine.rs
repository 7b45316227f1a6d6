use crate::catalog::{AdsServe, Bundle, BundleState};
use crate::classifier::PageClassifier;
use crate::client::Client;
use crate::config::EngineFlags;
use crate::host::{
    AdInfo, AdsClient, FetchResult, NotificationInfo, NotificationResult, TimerId,
};
use crate::reporting;
use crate::search_providers;
use rand::Rng;
use std::collections::{HashMap, HashSet, VecDeque};

pub const IDLE_THRESHOLD_IN_SECONDS: u64 = 15;
pub const ONE_HOUR_IN_SECONDS: u64 = 3600;
pub const DEBUG_ONE_HOUR_IN_SECONDS: u64 = 25;
pub const ONE_DAY_IN_SECONDS: u64 = 86_400;
pub const SUSTAIN_AD_INTERACTION_AFTER_SECONDS: u64 = 10;
pub const NEXT_EASTER_EGG_STARTS_IN_SECONDS: u64 = 30;
pub const DEFAULT_LANGUAGE: &str = "en";
pub const UNKNOWN_SSID: &str = "--";
pub const BUNDLE_SCHEMA_NAME: &str = "bundle-schema.json";

const PAGE_SCORE_CACHE_CAP: usize = 64;
const EASTER_EGG_URL: &str = "https://www.iab.com/";

/// The ad serving decision engine. Driven entirely by host callbacks on
/// one thread: events mutate in-memory and client state, and at decision
/// points either a notification goes out through the host or the refusal
/// reason is logged.
///
/// Asynchronous host operations complete through the `on_*` methods;
/// each tolerates the engine having been deinitialized in between.
pub struct AdsEngine {
    flags: EngineFlags,
    is_first_run: bool,
    is_initialized: bool,
    is_foreground: bool,
    last_shown_tab_url: String,
    last_shown_notification: Option<NotificationInfo>,
    last_page_classification: String,
    page_score_cache: HashMap<String, Vec<f64>>,
    page_score_order: VecDeque<String>,
    media_playing: HashSet<i32>,
    collect_activity_timer_id: TimerId,
    sustain_interaction_timer_id: TimerId,
    next_easter_egg: u64,
    ads_client: Box<dyn AdsClient>,
    client: Client,
    bundle: Bundle,
    ads_serve: AdsServe,
    classifier: Option<PageClassifier>,
}

impl AdsEngine {
    pub fn new(ads_client: Box<dyn AdsClient>, flags: EngineFlags) -> Self {
        Self {
            flags,
            is_first_run: true,
            is_initialized: false,
            is_foreground: false,
            last_shown_tab_url: String::new(),
            last_shown_notification: None,
            last_page_classification: String::new(),
            page_score_cache: HashMap::new(),
            page_score_order: VecDeque::new(),
            media_playing: HashSet::new(),
            collect_activity_timer_id: 0,
            sustain_interaction_timer_id: 0,
            next_easter_egg: 0,
            ads_client,
            client: Client::new(),
            bundle: Bundle::new(),
            ads_serve: AdsServe::new(),
            classifier: None,
        }
    }

    // ----- initialization pipeline -----

    pub fn initialize(&mut self) {
        if self.is_initialized() {
            log::warn!("already initialized");
            return;
        }

        if !self.ads_client.is_ads_enabled() {
            log::info!("deinitializing as ads are disabled");
            self.deinitialize();
            return;
        }

        self.ads_client.load_client_state();
    }

    pub fn on_client_state_loaded(&mut self, result: FetchResult, json: &str) {
        if self.is_initialized() {
            return;
        }

        if result == FetchResult::Failed {
            log::info!("no persisted client state, starting fresh");
            self.client = Client::new();
        } else if let Err(e) = self.client.load_from_json(json) {
            log::warn!("failed to restore client state, starting fresh: {e}");
            self.client = Client::new();
        }

        self.initialize_step2();
    }

    fn initialize_step2(&mut self) {
        self.process_locales(self.ads_client.locales());

        self.load_user_model();
    }

    fn initialize_step3(&mut self) {
        self.is_initialized = true;

        log::info!("successfully initialized");

        self.ads_client.set_idle_threshold(IDLE_THRESHOLD_IN_SECONDS);

        self.notification_allowed_check(false);

        self.retrieve_ssid();

        self.confirm_ad_uuid_if_ad_enabled();

        self.download_catalog();
    }

    pub fn is_initialized(&self) -> bool {
        self.is_initialized && self.ads_client.is_ads_enabled() && self.classifier.is_some()
    }

    fn deinitialize(&mut self) {
        if !self.is_initialized {
            log::warn!("failed to deinitialize as not initialized");
            return;
        }

        self.ads_serve.reset();

        self.stop_sustaining_ad_interaction();

        self.remove_all_history();

        self.bundle.reset();
        self.classifier = None;

        self.last_shown_notification = None;
        self.last_shown_tab_url.clear();

        self.last_page_classification.clear();
        self.page_score_cache.clear();
        self.page_score_order.clear();

        self.is_first_run = true;
        self.is_initialized = false;
        self.is_foreground = false;
    }

    fn load_user_model(&mut self) {
        let locale = self.client.locale();
        self.ads_client.load_user_model_for_locale(&locale);
    }

    pub fn on_user_model_loaded(&mut self, result: FetchResult, json: &str) {
        if result == FetchResult::Failed {
            log::error!("failed to load user model");
            return;
        }

        match PageClassifier::from_json(json) {
            Ok(classifier) => {
                log::info!(
                    "successfully loaded user model for locale \"{}\"",
                    classifier.locale()
                );
                self.classifier = Some(classifier);
            }
            Err(e) => {
                log::error!("failed to initialize user model: {e}");
                return;
            }
        }

        if !self.is_initialized() {
            self.initialize_step3();
        }
    }

    fn process_locales(&mut self, locales: Vec<String>) {
        if locales.is_empty() {
            return;
        }

        self.client.set_locales(locales);
    }

    fn retrieve_ssid(&mut self) {
        let mut ssid = self.ads_client.ssid();
        if ssid.is_empty() {
            ssid = UNKNOWN_SSID.to_string();
        }

        self.client.set_current_ssid(&ssid);
    }

    // ----- event intake -----

    pub fn on_foreground(&mut self) {
        self.is_foreground = true;

        let record = reporting::foreground_event(&self.client.current_place());
        self.ads_client.event_log(&record);
    }

    pub fn on_background(&mut self) {
        self.is_foreground = false;

        let record = reporting::background_event(&self.client.current_place());
        self.ads_client.event_log(&record);
    }

    pub fn is_foreground(&self) -> bool {
        self.is_foreground
    }

    pub fn on_idle(&mut self) {
        log::debug!("idle state entered");
    }

    pub fn on_un_idle(&mut self) {
        self.client
            .update_last_user_idle_stop_time(reporting::now_secs());

        self.notification_allowed_check(true);
    }

    pub fn on_media_playing(&mut self, tab_id: i32) {
        self.media_playing.insert(tab_id);
    }

    pub fn on_media_stopped(&mut self, tab_id: i32) {
        self.media_playing.remove(&tab_id);
    }

    pub fn is_media_playing(&self) -> bool {
        !self.media_playing.is_empty()
    }

    pub fn tab_updated(&mut self, tab_id: i32, url: &str, is_active: bool, is_incognito: bool) {
        if is_incognito {
            return;
        }

        self.client.update_last_user_activity(reporting::now_secs());

        self.report_load_event(tab_id, url);

        if is_active {
            self.last_shown_tab_url = url.to_string();

            self.test_shopping_data(url);
            self.test_search_state(url);

            let record = reporting::focus_event(tab_id);
            self.ads_client.event_log(&record);
        } else {
            let record = reporting::blur_event(tab_id);
            self.ads_client.event_log(&record);
        }
    }

    pub fn tab_closed(&mut self, tab_id: i32) {
        self.on_media_stopped(tab_id);

        let record = reporting::destroy_event(tab_id);
        self.ads_client.event_log(&record);
    }

    pub fn remove_all_history(&mut self) {
        self.client.remove_all_history();

        self.confirm_ad_uuid_if_ad_enabled();
    }

    pub fn save_cached_info(&mut self) {
        if !self.ads_client.is_ads_enabled() {
            self.client.remove_all_history();
        }

        match self.client.to_json() {
            Ok(json) => self.ads_client.save_client_state(json),
            Err(e) => log::error!("failed to serialize client state: {e}"),
        }
    }

    // ----- classification -----

    pub fn classify_page(&mut self, url: &str, html: &str) {
        if !self.is_initialized() {
            return;
        }

        self.test_shopping_data(url);
        self.test_search_state(url);

        let Some(classifier) = &self.classifier else {
            return;
        };

        let page_score = classifier.classify(html);
        let winner = classifier.winning_category(&page_score);

        self.client.append_page_score(page_score.clone());
        self.cache_page_score(url, page_score);

        self.last_page_classification = winner;

        log::debug!(
            "classified \"{url}\" as \"{}\"",
            self.last_page_classification
        );
    }

    pub fn last_page_classification(&self) -> &str {
        &self.last_page_classification
    }

    fn cache_page_score(&mut self, url: &str, page_score: Vec<f64>) {
        if let Some(entry) = self.page_score_cache.get_mut(url) {
            *entry = page_score;
            return;
        }

        self.page_score_cache.insert(url.to_string(), page_score);
        self.page_score_order.push_back(url.to_string());

        if self.page_score_order.len() > PAGE_SCORE_CACHE_CAP {
            if let Some(evicted) = self.page_score_order.pop_front() {
                self.page_score_cache.remove(&evicted);
            }
        }
    }

    /// Category with the highest score summed over the whole page-score
    /// history. Empty history or mixed vector lengths yield an empty
    /// string; no partial aggregation.
    pub fn winner_over_time_category(&self) -> String {
        let history = self.client.page_score_history();
        if history.is_empty() {
            return String::new();
        }

        let Some(classifier) = &self.classifier else {
            return String::new();
        };

        let len = history[0].len();
        let mut sums = vec![0.0; len];

        for page_scores in history {
            if page_scores.len() != len {
                return String::new();
            }

            for (sum, score) in sums.iter_mut().zip(page_scores) {
                *sum += score;
            }
        }

        classifier.winning_category(&sums)
    }

    pub fn change_locale(&mut self, locale: &str) {
        if !self.is_initialized() {
            return;
        }

        let locales = self.ads_client.locales();

        if locales.iter().any(|supported| supported == locale) {
            self.client.set_locale(locale);
        } else {
            let language = crate::locale::language_code(locale);
            let closest = if locales.iter().any(|supported| supported == language) {
                language.to_string()
            } else {
                DEFAULT_LANGUAGE.to_string()
            };

            log::info!("locale \"{locale}\" not supported, falling back to \"{closest}\"");
            self.client.set_locale(&closest);
        }

        self.load_user_model();
    }

    // ----- shopping and search detection -----

    fn test_shopping_data(&mut self, url: &str) {
        if !self.is_initialized() {
            return;
        }

        let Some(components) = self.ads_client.url_components(url) else {
            return;
        };

        if components.hostname == "www.amazon.com" {
            self.client.flag_shopping_state(url, 1.0);
        } else {
            self.client.unflag_shopping_state();
        }
    }

    fn test_search_state(&mut self, url: &str) {
        if !self.is_initialized() {
            return;
        }

        let Some(components) = self.ads_client.url_components(url) else {
            return;
        };

        if search_providers::is_search_engine(&components) {
            self.client.flag_search_state(url, 1.0);
        } else {
            self.client.unflag_search_state();
        }
    }

    // ----- decision cycle -----

    pub fn notification_allowed_check(&mut self, serve: bool) {
        let available = self.ads_client.is_notifications_available();

        let previous = self.client.available();
        if available != previous {
            self.client.set_available(available);
        }

        if !serve || available != previous {
            self.report_settings_event();
        }

        if !serve {
            return;
        }

        if !available {
            log::info!("ad not served: notifications not presently allowed");
            return;
        }

        self.check_ready_ad_serve(false);
    }

    pub fn check_ready_ad_serve(&mut self, forced: bool) {
        if !self.is_initialized() {
            return;
        }

        if !forced {
            if !self.is_foreground {
                log::info!("ad not served: not in foreground");
                return;
            }

            if self.is_media_playing() {
                log::info!("ad not served: media playing in browser");
                return;
            }

            if !self.is_allowed_to_show_ads() {
                log::info!("ad not served: not allowed based on history");
                return;
            }
        }

        let category = self.winner_over_time_category();
        self.serve_ad_from_category(&category);
    }

    fn serve_ad_from_category(&mut self, category: &str) {
        if self.bundle.catalog_id().is_empty() {
            log::info!("ad not served: no ad catalog");
            return;
        }

        if category.is_empty() {
            log::info!("ad not served: no winning category");
            return;
        }

        let locale = self.ads_client.ads_locale();
        let region = crate::locale::country_code(&locale);

        log::debug!("requesting ads for \"{category}\" in region \"{region}\"");
        self.ads_client.get_ads(&region, category);
    }

    pub fn on_get_ads(
        &mut self,
        result: FetchResult,
        region: &str,
        category: &str,
        ads: &[AdInfo],
    ) {
        if !self.is_initialized() {
            return;
        }

        if result == FetchResult::Failed {
            if let Some(pos) = category.rfind('-') {
                let parent = &category[..pos];

                log::warn!(
                    "no ads found for \"{category}\" category, trying again with \"{parent}\" category"
                );

                self.ads_client.get_ads(region, parent);
                return;
            }

            log::warn!("no ads found for \"{category}\" category");
            return;
        }

        let mut unseen = self.unseen_ads(ads);
        if unseen.is_empty() {
            self.client.reset_ads_uuid_seen(ads);

            unseen = self.unseen_ads(ads);
            if unseen.is_empty() {
                log::info!("ad not served: no ads for \"{category}\" category");
                return;
            }
        }

        let index = rand::thread_rng().gen_range(0..unseen.len());
        let ad = unseen[index].clone();
        self.show_ad(&ad, category);
    }

    fn unseen_ads(&self, ads: &[AdInfo]) -> Vec<AdInfo> {
        let seen = self.client.ads_uuid_seen();

        ads.iter()
            .filter(|ad| !seen.contains_key(&ad.uuid))
            .cloned()
            .collect()
    }

    fn show_ad(&mut self, ad: &AdInfo, category: &str) -> bool {
        if !is_ad_valid(ad) {
            log::warn!("ad not shown: incomplete ad information");
            return false;
        }

        let info = NotificationInfo {
            advertiser: ad.advertiser.clone(),
            category: category.to_string(),
            text: ad.notification_text.clone(),
            url: ad.notification_url.clone(),
            creative_set_id: ad.creative_set_id.clone(),
            uuid: ad.uuid.clone(),
        };

        self.last_shown_notification = Some(info.clone());
        self.ads_client.show_notification(info);

        self.client.append_ad_shown(reporting::now_secs());

        true
    }

    fn is_allowed_to_show_ads(&self) -> bool {
        let hour_allowed = self.ads_client.ads_per_hour();
        if hour_allowed == 0 {
            return false;
        }

        let respects_hour_limit =
            self.history_respects_rolling_time_constraint(ONE_HOUR_IN_SECONDS, hour_allowed);

        let day_window = if self.flags.legacy_day_window {
            ONE_HOUR_IN_SECONDS
        } else {
            ONE_DAY_IN_SECONDS
        };
        let respects_day_limit =
            self.history_respects_rolling_time_constraint(day_window, self.ads_client.ads_per_day());

        let minimum_wait_time = ONE_HOUR_IN_SECONDS / hour_allowed;
        let respects_minimum_wait_time =
            self.history_respects_rolling_time_constraint(minimum_wait_time, 0);

        respects_hour_limit && respects_day_limit && respects_minimum_wait_time
    }

    fn history_respects_rolling_time_constraint(
        &self,
        seconds_window: u64,
        allowable_ad_count: u64,
    ) -> bool {
        let now = reporting::now_secs();

        let recent_count = self
            .client
            .ads_shown_history()
            .iter()
            .filter(|&&shown| now.saturating_sub(shown) < seconds_window)
            .count() as u64;

        recent_count <= allowable_ad_count
    }

    // ----- sample bundle path -----

    pub fn serve_sample_ad(&mut self) {
        if !self.is_initialized() {
            return;
        }

        self.ads_client.load_sample_bundle();
    }

    pub fn on_load_sample_bundle(&mut self, result: FetchResult, json: &str) {
        if !self.is_initialized() {
            return;
        }

        if result == FetchResult::Failed {
            log::error!("failed to load sample bundle");
            return;
        }

        let schema = self.ads_client.load_json_schema(BUNDLE_SCHEMA_NAME);
        let state = match BundleState::from_json_with_schema(json, &schema) {
            Ok(state) => state,
            Err(e) => {
                log::error!("failed to parse sample bundle: {e}");
                return;
            }
        };

        if state.categories.is_empty() {
            log::warn!("sample bundle does not contain any categories");
            return;
        }

        let category = {
            let mut categories: Vec<&String> = state.categories.keys().collect();
            categories.sort();
            let index = rand::thread_rng().gen_range(0..categories.len());
            categories[index].clone()
        };

        let ads = &state.categories[&category];
        if ads.is_empty() {
            log::warn!("no ads found for \"{category}\" sample category");
            return;
        }

        let ad = ads[rand::thread_rng().gen_range(0..ads.len())].clone();
        self.show_ad(&ad, &category);
    }

    // ----- catalog collection timer -----

    fn confirm_ad_uuid_if_ad_enabled(&mut self) {
        if !self.ads_client.is_ads_enabled() {
            self.stop_collecting_activity();
            return;
        }

        self.client.update_ad_uuid();

        self.start_collecting_activity(self.collect_period());
    }

    fn collect_period(&self) -> u64 {
        if self.flags.is_debug {
            DEBUG_ONE_HOUR_IN_SECONDS
        } else {
            ONE_HOUR_IN_SECONDS
        }
    }

    fn start_collecting_activity(&mut self, start_timer_in: u64) {
        self.stop_collecting_activity();

        let timer_id = self.ads_client.set_timer(start_timer_in);
        if timer_id == 0 {
            log::error!("failed to start collecting activity due to an invalid timer");
            return;
        }

        self.collect_activity_timer_id = timer_id;

        log::info!("start collecting activity in {start_timer_in} seconds");
    }

    fn stop_collecting_activity(&mut self) {
        if !self.is_collecting_activity() {
            return;
        }

        log::info!("stopped collecting activity");

        self.ads_client.kill_timer(self.collect_activity_timer_id);
        self.collect_activity_timer_id = 0;
    }

    pub fn is_collecting_activity(&self) -> bool {
        self.collect_activity_timer_id != 0
    }

    fn collect_activity(&mut self) {
        if !self.is_initialized() {
            return;
        }

        log::info!("collect activity");

        self.download_catalog();
    }

    fn download_catalog(&mut self) {
        if !self.ads_serve.begin_download() {
            log::debug!("catalog download already in flight");
            return;
        }

        self.ads_client.fetch_catalog();
    }

    pub fn on_catalog_downloaded(&mut self, result: FetchResult, json: &str) {
        self.ads_serve.finish_download();

        if !self.is_initialized() {
            return;
        }

        match result {
            FetchResult::Failed => log::error!("failed to download catalog"),
            FetchResult::Success => match BundleState::from_json(json) {
                Ok(state) => {
                    log::info!(
                        "applied catalog \"{}\" with {} categories",
                        state.catalog_id,
                        state.categories.len()
                    );
                    self.bundle.apply(state);
                }
                Err(e) => log::error!("failed to parse catalog: {e}"),
            },
        }

        // the next collection tick is armed here, not by the caller
        self.start_collecting_activity(self.collect_period());
    }

    // ----- ad interaction sustain -----

    fn start_sustaining_ad_interaction(&mut self, start_timer_in: u64) {
        self.stop_sustaining_ad_interaction();

        let timer_id = self.ads_client.set_timer(start_timer_in);
        if timer_id == 0 {
            log::error!("failed to start sustaining ad interaction due to an invalid timer");
            return;
        }

        self.sustain_interaction_timer_id = timer_id;

        log::info!("start sustaining ad interaction in {start_timer_in} seconds");
    }

    fn stop_sustaining_ad_interaction(&mut self) {
        if !self.is_sustaining_ad_interaction() {
            return;
        }

        log::info!("stopped sustaining ad interaction");

        self.ads_client.kill_timer(self.sustain_interaction_timer_id);
        self.sustain_interaction_timer_id = 0;
    }

    pub fn is_sustaining_ad_interaction(&self) -> bool {
        self.sustain_interaction_timer_id != 0
    }

    fn sustain_ad_interaction(&mut self) {
        if !self.is_still_viewing_ad() {
            log::debug!("ad no longer viewed, not sustaining");
            return;
        }

        let Some(info) = &self.last_shown_notification else {
            return;
        };

        let record = reporting::sustain_event(&info.uuid);
        self.ads_client.event_log(&record);

        self.start_sustaining_ad_interaction(SUSTAIN_AD_INTERACTION_AFTER_SECONDS);
    }

    fn is_still_viewing_ad(&self) -> bool {
        matches!(&self.last_shown_notification,
            Some(info) if info.url == self.last_shown_tab_url)
    }

    pub fn on_timer(&mut self, timer_id: TimerId) {
        if timer_id == 0 {
            return;
        }

        if timer_id == self.collect_activity_timer_id {
            self.collect_activity();
        } else if timer_id == self.sustain_interaction_timer_id {
            self.sustain_ad_interaction();
        }
    }

    // ----- reporting -----

    pub fn report_notification_shown(&mut self, info: &NotificationInfo) {
        self.report_restart_once();

        let record =
            reporting::notify_event("generated", &info.category, &info.creative_set_id, &info.url);
        self.ads_client.event_log(&record);
    }

    pub fn report_notification_result(
        &mut self,
        info: &NotificationInfo,
        result: NotificationResult,
    ) {
        self.report_restart_once();

        let notification_type = match result {
            NotificationResult::Clicked => {
                self.client.update_ads_uuid_seen(&info.uuid);
                self.start_sustaining_ad_interaction(SUSTAIN_AD_INTERACTION_AFTER_SECONDS);
                "clicked"
            }
            NotificationResult::Dismissed => {
                self.client.update_ads_uuid_seen(&info.uuid);
                "dismissed"
            }
            NotificationResult::Timeout => "timeout",
        };

        let record = reporting::notify_event(
            notification_type,
            &info.category,
            &info.creative_set_id,
            &info.url,
        );
        self.ads_client.event_log(&record);
    }

    fn report_restart_once(&mut self) {
        if !self.is_first_run {
            return;
        }

        self.is_first_run = false;

        let record = reporting::restart_event(&self.client.current_place());
        self.ads_client.event_log(&record);
    }

    fn report_settings_event(&mut self) {
        let record = reporting::settings_event(
            self.ads_client.is_notifications_available(),
            &self.client.current_place(),
            &self.client.locale(),
            self.ads_client.ads_per_day(),
            self.ads_client.ads_per_hour(),
        );
        self.ads_client.event_log(&record);
    }

    fn report_load_event(&mut self, tab_id: i32, url: &str) {
        let Some(components) = self.ads_client.url_components(url) else {
            return;
        };

        if components.scheme != "http" && components.scheme != "https" {
            return;
        }

        let tab_type = if self.client.search_state() {
            "search"
        } else {
            "click"
        };

        let segments = reporting::classification_segments(&self.last_page_classification);
        let record = reporting::load_event(
            tab_id,
            tab_type,
            url,
            &segments,
            self.page_score_cache.get(url),
        );
        self.ads_client.event_log(&record);

        let now = reporting::now_secs();
        if self.flags.is_testing && url == EASTER_EGG_URL && self.next_easter_egg < now {
            self.next_easter_egg = now + NEXT_EASTER_EGG_STARTS_IN_SECONDS;

            self.check_ready_ad_serve(true);
        }
    }

    // ----- accessors -----

    pub fn last_shown_notification(&self) -> Option<&NotificationInfo> {
        self.last_shown_notification.as_ref()
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    #[cfg(test)]
    pub(crate) fn client_mut(&mut self) -> &mut Client {
        &mut self.client
    }
}

fn is_ad_valid(ad: &AdInfo) -> bool {
    !ad.advertiser.is_empty() && !ad.notification_text.is_empty() && !ad.notification_url.is_empty()
}
