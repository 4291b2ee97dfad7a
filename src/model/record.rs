use serde_json::Value;

pub const UNKNOWN_PATH: &str = "Unknown Path";
pub const UNKNOWN_ID: &str = "Unknown ID";
pub const UNKNOWN_VENDOR: &str = "Unknown Vendor";
pub const UNKNOWN_CATEGORY: &str = "Unknown Category";

/// Sentinel MuseScore writes for "no error". A missing `errorCode` field
/// is treated the same way.
pub const NO_ERROR: i64 = -1;

/// One entry of the plugin registry, kept as the raw JSON object so that
/// unknown keys (and key order) survive load → mutate → save untouched.
///
/// Every read goes through default substitution; a record missing `meta`
/// entirely, or one that is not even an object, is still a valid member
/// of the store and displays as all placeholders.
#[derive(Debug, Clone, PartialEq)]
pub struct PluginRecord(Value);

impl PluginRecord {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    // -- Raw reads (no placeholder substitution; used by the filter)

    pub fn raw_path(&self) -> Option<&str> {
        self.0.get("path").and_then(Value::as_str)
    }

    pub fn raw_id(&self) -> Option<&str> {
        self.0.pointer("/meta/id").and_then(Value::as_str)
    }

    pub fn raw_vendor(&self) -> Option<&str> {
        self.0.pointer("/meta/vendor").and_then(Value::as_str)
    }

    pub fn raw_category(&self) -> Option<&str> {
        self.0
            .pointer("/meta/attributes/categories")
            .and_then(Value::as_str)
    }

    // -- Display reads (placeholder substitution for absent fields)

    pub fn path(&self) -> &str {
        self.raw_path().unwrap_or(UNKNOWN_PATH)
    }

    pub fn id(&self) -> &str {
        self.raw_id().unwrap_or(UNKNOWN_ID)
    }

    pub fn vendor(&self) -> &str {
        self.raw_vendor().unwrap_or(UNKNOWN_VENDOR)
    }

    pub fn category(&self) -> &str {
        self.raw_category().unwrap_or(UNKNOWN_CATEGORY)
    }

    pub fn enabled(&self) -> bool {
        self.0.get("enabled").and_then(Value::as_bool).unwrap_or(false)
    }

    /// Raw error code with the no-error sentinel substituted when the
    /// field is absent, so missing and explicit `-1` sort identically.
    pub fn error_code(&self) -> i64 {
        self.0
            .get("errorCode")
            .and_then(Value::as_i64)
            .unwrap_or(NO_ERROR)
    }

    /// Case-insensitive substring match over category, id, vendor and
    /// path. A missing field contributes nothing — the display
    /// placeholders never match. An empty query matches every record.
    pub fn matches(&self, query: &str) -> bool {
        if query.is_empty() {
            return true;
        }

        let needle = query.to_lowercase();
        [
            self.raw_category(),
            self.raw_id(),
            self.raw_vendor(),
            self.raw_path(),
        ]
        .into_iter()
        .flatten()
        .any(|field| field.to_lowercase().contains(&needle))
    }

    /// Flip `enabled` in place, writing the key into the underlying
    /// object (absent counts as disabled, so the first toggle enables).
    pub fn toggle_enabled(&mut self) {
        let next = !self.enabled();
        if let Value::Object(map) = &mut self.0 {
            map.insert("enabled".to_string(), Value::Bool(next));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn missing_fields_substitute_placeholders() {
        let record = PluginRecord::new(json!({}));
        assert_eq!(record.path(), UNKNOWN_PATH);
        assert_eq!(record.id(), UNKNOWN_ID);
        assert_eq!(record.vendor(), UNKNOWN_VENDOR);
        assert_eq!(record.category(), UNKNOWN_CATEGORY);
        assert!(!record.enabled());
        assert_eq!(record.error_code(), NO_ERROR);
    }

    #[test]
    fn nested_meta_fields_are_read() {
        let record = PluginRecord::new(json!({
            "path": "/opt/vst/reverb.vst3",
            "enabled": true,
            "errorCode": 3,
            "meta": {
                "id": "Reverb",
                "vendor": "Acme",
                "attributes": { "categories": "Fx" }
            }
        }));
        assert_eq!(record.path(), "/opt/vst/reverb.vst3");
        assert_eq!(record.id(), "Reverb");
        assert_eq!(record.vendor(), "Acme");
        assert_eq!(record.category(), "Fx");
        assert!(record.enabled());
        assert_eq!(record.error_code(), 3);
    }

    #[test]
    fn toggle_writes_enabled_key() {
        let mut record = PluginRecord::new(json!({"path": "/a"}));
        record.toggle_enabled();
        assert!(record.enabled());
        assert_eq!(record.as_value().get("enabled"), Some(&json!(true)));

        record.toggle_enabled();
        assert!(!record.enabled());
    }

    #[test]
    fn non_object_record_defaults_everywhere() {
        let mut record = PluginRecord::new(json!("garbage"));
        assert_eq!(record.id(), UNKNOWN_ID);
        assert!(!record.enabled());
        record.toggle_enabled();
        assert_eq!(record.as_value(), &json!("garbage"));
    }

    #[test]
    fn match_is_case_insensitive_and_ignores_placeholders() {
        let record = PluginRecord::new(json!({
            "path": "/Library/Audio/Reverb.vst",
            "meta": { "vendor": "Acme" }
        }));
        assert!(record.matches("acme"));
        assert!(record.matches("ACME"));
        assert!(record.matches("reverb"));
        assert!(record.matches(""));
        // `meta.id` is absent; the "Unknown ID" placeholder must not match.
        assert!(!record.matches("unknown"));
        assert!(!record.matches("chorus"));
    }
}
