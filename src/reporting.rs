use chrono::{SecondsFormat, Utc};
use serde_json::json;
use std::time::{SystemTime, UNIX_EPOCH};

/// Every record shares the `{data: {type, stamp, ...}}` envelope; the
/// builders below fill in the per-kind fields and serialize to one line.

pub fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Hyphen-delimited category path split into its segments; empty input
/// yields an empty list.
pub fn classification_segments(category: &str) -> Vec<String> {
    category
        .split('-')
        .filter(|segment| !segment.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn restart_event(place: &str) -> String {
    json!({
        "data": {
            "type": "restart",
            "stamp": timestamp(),
            "place": place,
        }
    })
    .to_string()
}

pub fn foreground_event(place: &str) -> String {
    json!({
        "data": {
            "type": "foreground",
            "stamp": timestamp(),
            "place": place,
        }
    })
    .to_string()
}

pub fn background_event(place: &str) -> String {
    json!({
        "data": {
            "type": "background",
            "stamp": timestamp(),
            "place": place,
        }
    })
    .to_string()
}

pub fn settings_event(
    available: bool,
    place: &str,
    locale: &str,
    ads_per_day: u64,
    ads_per_hour: u64,
) -> String {
    json!({
        "data": {
            "type": "settings",
            "stamp": timestamp(),
            "settings": {
                "notifications": {
                    "available": available,
                },
                "place": place,
                "locale": locale,
                "adsPerDay": ads_per_day,
                "adsPerHour": ads_per_hour,
            }
        }
    })
    .to_string()
}

pub fn load_event(
    tab_id: i32,
    tab_type: &str,
    tab_url: &str,
    tab_classification: &[String],
    page_score: Option<&Vec<f64>>,
) -> String {
    let mut data = json!({
        "type": "load",
        "stamp": timestamp(),
        "tabId": tab_id,
        "tabType": tab_type,
        "tabUrl": tab_url,
        "tabClassification": tab_classification,
    });

    if let Some(score) = page_score {
        data["pageScore"] = json!(score);
    }

    json!({ "data": data }).to_string()
}

pub fn focus_event(tab_id: i32) -> String {
    tab_event("focus", tab_id)
}

pub fn blur_event(tab_id: i32) -> String {
    tab_event("blur", tab_id)
}

pub fn destroy_event(tab_id: i32) -> String {
    tab_event("destroy", tab_id)
}

fn tab_event(kind: &str, tab_id: i32) -> String {
    json!({
        "data": {
            "type": kind,
            "stamp": timestamp(),
            "tabId": tab_id,
        }
    })
    .to_string()
}

pub fn notify_event(
    notification_type: &str,
    category: &str,
    creative_set_id: &str,
    url: &str,
) -> String {
    let catalog = if creative_set_id.is_empty() {
        "sample-catalog"
    } else {
        creative_set_id
    };

    json!({
        "data": {
            "type": "notify",
            "stamp": timestamp(),
            "notificationType": notification_type,
            "notificationClassification": classification_segments(category),
            "notificationCatalog": catalog,
            "notificationUrl": url,
        }
    })
    .to_string()
}

pub fn sustain_event(notification_id: &str) -> String {
    json!({
        "data": {
            "type": "sustain",
            "stamp": timestamp(),
            "notificationId": notification_id,
            "notificationType": "viewed",
        }
    })
    .to_string()
}
