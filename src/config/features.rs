//! Feature flags configuration

use serde::Deserialize;

/// Feature flags for enabling/disabling functionality
#[derive(Debug, Clone, Deserialize)]
pub struct FeatureFlags {
    /// Accept new consultation requests. Existing sessions keep working
    /// when this is turned off.
    #[serde(default = "default_consultations_enabled")]
    pub consultations_enabled: bool,
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self {
            consultations_enabled: default_consultations_enabled(),
        }
    }
}

fn default_consultations_enabled() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn consultations_default_on() {
        assert!(FeatureFlags::default().consultations_enabled);
    }

    #[test]
    fn flags_deserialize() {
        let flags: FeatureFlags =
            serde_json::from_str(r#"{"consultations_enabled": false}"#).unwrap();
        assert!(!flags.consultations_enabled);
    }
}
