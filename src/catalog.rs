use crate::host::AdInfo;
use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A parsed ad catalog: the catalog identity plus the category to ads
/// mapping served from it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BundleState {
    #[serde(default)]
    pub catalog_id: String,
    #[serde(default)]
    pub categories: HashMap<String, Vec<AdInfo>>,
}

impl BundleState {
    pub fn from_json(json: &str) -> Result<Self> {
        let state = serde_json::from_str(json)?;
        Ok(state)
    }

    /// Parses a bundle after checking the document carries every
    /// top-level property the schema marks as required.
    pub fn from_json_with_schema(json: &str, schema: &str) -> Result<Self> {
        let document: serde_json::Value = serde_json::from_str(json)?;

        if !schema.is_empty() {
            let schema: serde_json::Value = serde_json::from_str(schema)?;
            if let Some(required) = schema.get("required").and_then(|r| r.as_array()) {
                for property in required {
                    let Some(name) = property.as_str() else {
                        continue;
                    };
                    if document.get(name).is_none() {
                        return Err(anyhow!("bundle is missing required property \"{name}\""));
                    }
                }
            }
        }

        let state = serde_json::from_value(document)?;
        Ok(state)
    }
}

/// Holder for the most recently applied catalog. Empty until the first
/// successful download; serving is refused while the catalog id is empty.
#[derive(Default)]
pub struct Bundle {
    state: Option<BundleState>,
}

impl Bundle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn catalog_id(&self) -> String {
        match &self.state {
            Some(state) => state.catalog_id.clone(),
            None => String::new(),
        }
    }

    pub fn categories_count(&self) -> usize {
        match &self.state {
            Some(state) => state.categories.len(),
            None => 0,
        }
    }

    pub fn apply(&mut self, state: BundleState) {
        self.state = Some(state);
    }

    pub fn reset(&mut self) {
        self.state = None;
    }
}

/// Bookkeeping for catalog downloads: at most one request in flight.
#[derive(Default)]
pub struct AdsServe {
    in_flight: bool,
}

impl AdsServe {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks a download as started. Returns false when one is already in
    /// flight, in which case no new request should be issued.
    pub fn begin_download(&mut self) -> bool {
        if self.in_flight {
            return false;
        }

        self.in_flight = true;
        true
    }

    pub fn finish_download(&mut self) {
        self.in_flight = false;
    }

    pub fn reset(&mut self) {
        self.in_flight = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bundle_json() -> &'static str {
        r#"{
            "catalog_id": "catalog-1",
            "categories": {
                "sports": [
                    {
                        "advertiser": "Acme Shoes",
                        "notification_text": "Run faster",
                        "notification_url": "https://shoes.example.com/",
                        "creative_set_id": "set-1",
                        "uuid": "ad-1"
                    }
                ]
            }
        }"#
    }

    #[test]
    fn test_bundle_parse() {
        let state = BundleState::from_json(bundle_json()).unwrap();
        assert_eq!(state.catalog_id, "catalog-1");
        assert_eq!(state.categories.len(), 1);
        assert_eq!(state.categories["sports"][0].advertiser, "Acme Shoes");
    }

    #[test]
    fn test_bundle_schema_required_properties() {
        let schema = r#"{"required": ["catalog_id", "categories"]}"#;
        assert!(BundleState::from_json_with_schema(bundle_json(), schema).is_ok());

        let incomplete = r#"{"categories": {}}"#;
        assert!(BundleState::from_json_with_schema(incomplete, schema).is_err());
    }

    #[test]
    fn test_bundle_schema_empty_is_structural_only() {
        assert!(BundleState::from_json_with_schema(bundle_json(), "").is_ok());
        assert!(BundleState::from_json_with_schema("not json", "").is_err());
    }

    #[test]
    fn test_bundle_apply_and_reset() {
        let mut bundle = Bundle::new();
        assert_eq!(bundle.catalog_id(), "");

        bundle.apply(BundleState::from_json(bundle_json()).unwrap());
        assert_eq!(bundle.catalog_id(), "catalog-1");
        assert_eq!(bundle.categories_count(), 1);

        bundle.reset();
        assert_eq!(bundle.catalog_id(), "");
    }

    #[test]
    fn test_ads_serve_single_flight() {
        let mut serve = AdsServe::new();
        assert!(serve.begin_download());
        assert!(!serve.begin_download());

        serve.finish_download();
        assert!(serve.begin_download());
    }
}
