//! Self-describing setting wrappers.
//!
//! A [`ConfigData`] carries everything needed to create its setting: section,
//! key, description, default, constraint and tags. Anything it leaves unset
//! is filled from the fallbacks handed to [`ConfigData::bind`], usually the
//! owning model's section name and the member name.

use crate::error::BindError;
use crate::log_source::{self, LogSource};
use config_store::{
    AcceptableValues, ConfigDefinition, ConfigDescription, ConfigEntry, ConfigFile, Event,
    SettingChangedEvent, SettingValue, Subscription,
};
use std::fmt;

/// Placeholder written when a setting has no description.
pub const NO_DESCRIPTION: &str = "<None>";
/// Section, key and log source name used when nothing else is known.
pub const DEFAULT_NAME: &str = "default";

/// Payload of a wrapper's pre-bind notification.
#[derive(Debug, Clone)]
pub struct BindContext {
    pub file: ConfigFile,
    pub log: LogSource,
}

/// Payload of a wrapper's post-bind notification.
#[derive(Debug, Clone)]
pub struct PostBindEvent<T: SettingValue> {
    pub file: ConfigFile,
    pub log: LogSource,
    pub entry: ConfigEntry<T>,
}

/// Values used for whatever the wrapper does not set itself.
#[derive(Debug, Clone)]
pub struct BindFallback<'a, T> {
    pub section: Option<&'a str>,
    pub key: Option<&'a str>,
    pub description: Option<&'a str>,
    pub default_value: Option<T>,
}

impl<T> Default for BindFallback<'_, T> {
    fn default() -> Self {
        Self {
            section: None,
            key: None,
            description: None,
            default_value: None,
        }
    }
}

/// A setting declared by value and bound to a [`ConfigFile`] later.
pub struct ConfigData<T: SettingValue> {
    section_name: Option<String>,
    key: Option<String>,
    description: Option<String>,
    default_value: Option<T>,
    acceptable_values: Option<AcceptableValues<T>>,
    tags: Vec<serde_json::Value>,
    log: Option<LogSource>,
    entry: Option<ConfigEntry<T>>,
    relay: Option<Subscription>,
    setting_changed: Event<SettingChangedEvent>,
    pre_bind: Event<BindContext>,
    post_bind: Event<PostBindEvent<T>>,
}

impl<T: SettingValue> ConfigData<T> {
    pub fn new() -> Self {
        Self {
            section_name: None,
            key: None,
            description: None,
            default_value: None,
            acceptable_values: None,
            tags: Vec::new(),
            log: None,
            entry: None,
            relay: None,
            setting_changed: Event::new(),
            pre_bind: Event::new(),
            post_bind: Event::new(),
        }
    }

    pub fn with_section(mut self, section: impl Into<String>) -> Self {
        self.section_name = Some(section.into());
        self
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_default(mut self, default_value: T) -> Self {
        self.default_value = Some(default_value);
        self
    }

    pub fn with_range(mut self, min: T, max: T) -> Self {
        self.acceptable_values = Some(AcceptableValues::range(min, max));
        self
    }

    pub fn with_list(mut self, values: impl IntoIterator<Item = T>) -> Self {
        self.acceptable_values = Some(AcceptableValues::list(values));
        self
    }

    pub fn with_acceptable_values(mut self, acceptable: Option<AcceptableValues<T>>) -> Self {
        self.acceptable_values = acceptable;
        self
    }

    pub fn with_tags(mut self, tags: Vec<serde_json::Value>) -> Self {
        self.tags = tags;
        self
    }

    pub fn with_log_source(mut self, log: LogSource) -> Self {
        self.log = Some(log);
        self
    }

    /// Adds a listener run before every bind, for the life of the wrapper.
    pub fn on_pre_bind<F>(self, listener: F) -> Self
    where
        F: Fn(&BindContext) + Send + Sync + 'static,
    {
        self.pre_bind.subscribe(listener).detach();
        self
    }

    /// Adds a listener run after every successful bind, for the life of the wrapper.
    pub fn on_post_bind<F>(self, listener: F) -> Self
    where
        F: Fn(&PostBindEvent<T>) + Send + Sync + 'static,
    {
        self.post_bind.subscribe(listener).detach();
        self
    }

    pub fn subscribe_pre_bind<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&BindContext) + Send + Sync + 'static,
    {
        self.pre_bind.subscribe(listener)
    }

    pub fn subscribe_post_bind<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&PostBindEvent<T>) + Send + Sync + 'static,
    {
        self.post_bind.subscribe(listener)
    }

    /// Listens for changes of the bound setting. The listener survives
    /// re-binding to another file.
    pub fn on_setting_changed<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&SettingChangedEvent) + Send + Sync + 'static,
    {
        self.setting_changed.subscribe(listener)
    }

    /// Binds the wrapper to `file`.
    ///
    /// Section, key, description and default are taken from the wrapper,
    /// then from `fallback`, then from built-in placeholders with a warning.
    /// Binding again to the same file does nothing. Binding to a different
    /// file while still bound fails with [`BindError::AlreadyBound`].
    pub fn bind(
        &mut self,
        file: Option<&ConfigFile>,
        log: Option<&LogSource>,
        fallback: BindFallback<'_, T>,
    ) -> Result<&mut Self, BindError> {
        let log = match log.or(self.log.as_ref()) {
            Some(log) => log.clone(),
            None => log_source::resolve(None, "ConfigData::bind"),
        };
        self.log = Some(log.clone());

        let Some(file) = file else {
            log.error("ConfigData::bind | No settings file given, aborting");
            return Err(BindError::NoConfigFile);
        };

        if let Some(entry) = &self.entry {
            if entry.is_bound_to(file) {
                return Ok(self);
            }
            let definition = entry.definition().clone();
            log.error(&format!(
                "ConfigData::bind | {definition} is already bound to another settings file, unbind it first"
            ));
            return Err(BindError::AlreadyBound { definition });
        }

        self.pre_bind.emit(&BindContext {
            file: file.clone(),
            log: log.clone(),
        });

        let section = resolve_name(&mut self.section_name, fallback.section, "section name", &log);
        let key = resolve_name(&mut self.key, fallback.key, "key", &log);
        let description = match (&self.description, fallback.description) {
            (Some(own), _) => own.clone(),
            (None, Some(fallback)) => fallback.to_string(),
            (None, None) => {
                log.warn(&format!("ConfigData::bind | No description for {key}, using '{NO_DESCRIPTION}'"));
                NO_DESCRIPTION.to_string()
            }
        };
        self.description = Some(description.clone());
        let default_value = match (self.default_value.take(), fallback.default_value) {
            (Some(own), _) => own,
            (None, Some(fallback)) => fallback,
            (None, None) => {
                log.warn(&format!("ConfigData::bind | No default value for {key}, using {:?}", T::default()));
                T::default()
            }
        };
        self.default_value = Some(default_value.clone());

        let config_description = ConfigDescription::new(description)
            .with_acceptable_values(self.acceptable_values.clone())
            .with_tags(self.tags.clone());
        let entry = match file.bind(&section, &key, default_value, config_description) {
            Ok(entry) => entry,
            Err(e) => {
                log.error(&format!("ConfigData::bind | Failed to bind [{section}] {key}: {e}"));
                return Err(e.into());
            }
        };

        let relay = self.setting_changed.clone();
        self.relay = Some(entry.on_setting_changed(move |event| {
            relay.emit(event);
        }));
        self.entry = Some(entry.clone());

        self.post_bind.emit(&PostBindEvent {
            file: file.clone(),
            log,
            entry,
        });
        Ok(self)
    }

    /// Builder-style [`bind`](Self::bind) with no fallbacks.
    pub fn into_bound(mut self, file: &ConfigFile, log: Option<&LogSource>) -> Result<Self, BindError> {
        self.bind(Some(file), log, BindFallback::default())?;
        Ok(self)
    }

    /// Detaches the wrapper from its file, returning the handle it held.
    /// Resolved names and the default are kept for the next bind.
    pub fn unbind(&mut self) -> Option<ConfigEntry<T>> {
        self.relay = None;
        self.entry.take()
    }

    pub fn value(&self) -> T {
        match &self.entry {
            Some(entry) => entry.value(),
            None => {
                self.log_or_default()
                    .error(&format!("ConfigData::value | {} is not bound, returning the zero value", self.label()));
                T::default()
            }
        }
    }

    pub fn set_value(&self, value: T) {
        match &self.entry {
            Some(entry) => entry.set_value(value),
            None => self
                .log_or_default()
                .error(&format!("ConfigData::set_value | {} is not bound, value dropped", self.label())),
        }
    }

    pub fn entry(&self) -> Option<&ConfigEntry<T>> {
        self.entry.as_ref()
    }

    pub fn is_bound(&self) -> bool {
        self.entry.is_some()
    }

    pub fn is_bound_to(&self, file: &ConfigFile) -> bool {
        self.entry.as_ref().is_some_and(|entry| entry.is_bound_to(file))
    }

    pub fn definition(&self) -> Option<&ConfigDefinition> {
        self.entry.as_ref().map(ConfigEntry::definition)
    }

    pub fn section_name(&self) -> Option<&str> {
        self.section_name.as_deref()
    }

    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn default_value(&self) -> Option<&T> {
        self.default_value.as_ref()
    }

    pub fn acceptable_values(&self) -> Option<&AcceptableValues<T>> {
        self.acceptable_values.as_ref()
    }

    pub fn tags(&self) -> &[serde_json::Value] {
        &self.tags
    }

    pub fn log_source(&self) -> Option<&LogSource> {
        self.log.as_ref()
    }

    /// Overwrites the declared metadata; used by arrays to stamp their elements.
    pub(crate) fn set_declaration(
        &mut self,
        section: Option<String>,
        key: String,
        description: Option<String>,
        default_value: Option<T>,
        acceptable_values: Option<AcceptableValues<T>>,
        tags: Vec<serde_json::Value>,
    ) {
        self.section_name = section;
        self.key = Some(key);
        self.description = description;
        self.default_value = default_value;
        self.acceptable_values = acceptable_values;
        self.tags = tags;
    }

    fn log_or_default(&self) -> LogSource {
        self.log.clone().unwrap_or_default()
    }

    fn label(&self) -> String {
        match (&self.section_name, &self.key) {
            (Some(section), Some(key)) => format!("[{section}] {key}"),
            (None, Some(key)) => key.clone(),
            _ => "ConfigData".to_string(),
        }
    }
}

fn resolve_name(own: &mut Option<String>, fallback: Option<&str>, what: &str, log: &LogSource) -> String {
    let resolved = match (own.as_deref(), fallback) {
        (Some(own), _) => own.to_string(),
        (None, Some(fallback)) => fallback.to_string(),
        (None, None) => {
            log.warn(&format!("ConfigData::bind | No {what} given, using '{DEFAULT_NAME}'"));
            DEFAULT_NAME.to_string()
        }
    };
    *own = Some(resolved.clone());
    resolved
}

impl<T: SettingValue> Default for ConfigData<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: SettingValue> fmt::Debug for ConfigData<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigData")
            .field("section_name", &self.section_name)
            .field("key", &self.key)
            .field("default_value", &self.default_value)
            .field("entry", &self.entry)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_own_values_win_over_fallback() {
        let file = ConfigFile::in_memory();
        let mut data = ConfigData::new()
            .with_section("Own")
            .with_key("Speed")
            .with_description("own")
            .with_default(3);

        data.bind(
            Some(&file),
            None,
            BindFallback {
                section: Some("Fallback"),
                key: Some("Other"),
                description: Some("fallback"),
                default_value: Some(9),
            },
        )
        .unwrap();

        let entry = data.entry().unwrap();
        assert_eq!(entry.definition().to_string(), "[Own] Speed");
        assert_eq!(entry.description().description, "own");
        assert_eq!(data.value(), 3);
    }

    #[test]
    fn test_fallbacks_then_placeholders() {
        let file = ConfigFile::in_memory();
        let mut data: ConfigData<i32> = ConfigData::new();
        data.bind(
            Some(&file),
            None,
            BindFallback {
                key: Some("Member"),
                ..BindFallback::default()
            },
        )
        .unwrap();

        assert_eq!(data.section_name(), Some(DEFAULT_NAME));
        assert_eq!(data.key(), Some("Member"));
        assert_eq!(data.description(), Some(NO_DESCRIPTION));
        assert_eq!(data.value(), 0);
        assert_eq!(data.log_source().map(LogSource::name), Some(DEFAULT_NAME));
    }

    #[test]
    fn test_unbound_access_returns_zero_value() {
        let data = ConfigData::new().with_default(5);
        assert_eq!(data.value(), 0);
        data.set_value(7);
        assert!(!data.is_bound());
    }

    #[test]
    fn test_absent_file_is_an_error() {
        let mut data: ConfigData<bool> = ConfigData::new();
        assert!(matches!(
            data.bind(None, None, BindFallback::default()),
            Err(BindError::NoConfigFile)
        ));
        assert!(!data.is_bound());
    }

    #[test]
    fn test_rebinding_same_file_relays_once() {
        let file = ConfigFile::in_memory();
        let mut data = ConfigData::new().with_key("k").with_default(1);
        let binds = Arc::new(AtomicUsize::new(0));
        let changes = Arc::new(AtomicUsize::new(0));

        let bind_counter = Arc::clone(&binds);
        data = data.on_post_bind(move |_| {
            bind_counter.fetch_add(1, Ordering::SeqCst);
        });
        let change_counter = Arc::clone(&changes);
        let _sub = data.on_setting_changed(move |_| {
            change_counter.fetch_add(1, Ordering::SeqCst);
        });

        data.bind(Some(&file), None, BindFallback::default()).unwrap();
        data.bind(Some(&file), None, BindFallback::default()).unwrap();
        data.set_value(2);

        assert_eq!(binds.load(Ordering::SeqCst), 1);
        assert_eq!(changes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_other_file_requires_unbind() {
        let first = ConfigFile::in_memory();
        let second = ConfigFile::in_memory();
        let mut data = ConfigData::new().with_key("k").with_default(1);

        data.bind(Some(&first), None, BindFallback::default()).unwrap();
        assert!(matches!(
            data.bind(Some(&second), None, BindFallback::default()),
            Err(BindError::AlreadyBound { .. })
        ));

        let old = data.unbind().unwrap();
        data.bind(Some(&second), None, BindFallback::default()).unwrap();
        assert!(data.is_bound_to(&second));
        assert!(old.is_bound_to(&first));
    }

    #[test]
    fn test_change_listener_survives_rebind() {
        let first = ConfigFile::in_memory();
        let second = ConfigFile::in_memory();
        let mut data = ConfigData::new().with_key("k").with_default(1);
        let changes = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&changes);
        let _sub = data.on_setting_changed(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        data.bind(Some(&first), None, BindFallback::default()).unwrap();
        let old = data.unbind().unwrap();
        data.bind(Some(&second), None, BindFallback::default()).unwrap();

        old.set_value(10);
        data.set_value(20);
        assert_eq!(changes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_invalid_key_is_store_error() {
        let file = ConfigFile::in_memory();
        let mut data = ConfigData::new().with_key("bad=key").with_default(1);
        assert!(matches!(
            data.bind(Some(&file), None, BindFallback::default()),
            Err(BindError::Store(_))
        ));
        assert!(!data.is_bound());
    }
}
