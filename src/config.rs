use serde::{Deserialize, Serialize};

/// Host-tunable settings, loaded from YAML. These feed the demo host and
/// the engine construction flags; an embedding browser would supply the
/// same values through its own preference store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub ads_enabled: bool,
    pub notifications_available: bool,
    /// Locale ads are served for, e.g. `en_US`; the country segment picks
    /// the catalog region.
    pub ads_locale: String,
    /// Locales a classifier model exists for.
    pub locales: Vec<String>,
    pub ads_per_hour: u64,
    pub ads_per_day: u64,
    pub is_debug: bool,
    pub is_testing: bool,
    /// Keeps the shipped one-hour window for the per-day check. The
    /// corrected window is one day (86400 seconds).
    pub legacy_day_window: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            ads_enabled: true,
            notifications_available: true,
            ads_locale: "en_US".to_string(),
            locales: vec!["en".to_string(), "de".to_string(), "fr".to_string()],
            ads_per_hour: 2,
            ads_per_day: 20,
            is_debug: false,
            is_testing: false,
            legacy_day_window: true,
        }
    }
}

impl Settings {
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let settings: Settings = serde_yaml::from_str(&content)?;
        Ok(settings)
    }

    pub fn to_file(&self, path: &str) -> anyhow::Result<()> {
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn engine_flags(&self) -> EngineFlags {
        EngineFlags {
            is_debug: self.is_debug,
            is_testing: self.is_testing,
            legacy_day_window: self.legacy_day_window,
        }
    }
}

/// Construction-time engine flags; never process globals.
#[derive(Debug, Clone, Copy)]
pub struct EngineFlags {
    pub is_debug: bool,
    pub is_testing: bool,
    pub legacy_day_window: bool,
}

impl Default for EngineFlags {
    fn default() -> Self {
        Settings::default().engine_flags()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert!(settings.ads_enabled);
        assert_eq!(settings.ads_per_hour, 2);
        assert_eq!(settings.ads_per_day, 20);
        assert!(settings.legacy_day_window);
    }

    #[test]
    fn test_yaml_round_trip() {
        let mut settings = Settings::default();
        settings.ads_per_hour = 4;
        settings.is_testing = true;

        let yaml = serde_yaml::to_string(&settings).unwrap();
        let restored: Settings = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(restored.ads_per_hour, 4);
        assert!(restored.is_testing);
        assert_eq!(restored.locales, settings.locales);
    }
}
