//! Live handles to individual settings.

use crate::definition::{ConfigDefinition, ConfigDescription};
use crate::error::{ConfigError, ConversionError};
use crate::events::{ChangeSource, Event, SettingChangedEvent, Subscription};
use crate::file::{ConfigFile, FileState};
use crate::utils::{read, write};
use crate::value::SettingValue;
use std::any::Any;
use std::fmt;
use std::sync::{Arc, Weak};

/// Storage behind a bound setting, shared by every handle to it.
pub(crate) struct EntrySlot<T: SettingValue> {
    definition: ConfigDefinition,
    description: ConfigDescription<T>,
    default: T,
    value: std::sync::RwLock<T>,
    changed: Event<SettingChangedEvent>,
    file: Weak<FileState>,
}

impl<T: SettingValue> EntrySlot<T> {
    pub(crate) fn new(
        definition: ConfigDefinition,
        description: ConfigDescription<T>,
        default: T,
        initial: T,
        file: Weak<FileState>,
    ) -> Self {
        Self {
            definition,
            description,
            default,
            value: std::sync::RwLock::new(initial),
            changed: Event::new(),
            file,
        }
    }

    fn clamp(&self, value: T) -> T {
        match &self.description.acceptable_values {
            Some(acceptable) => acceptable.clamp(value),
            None => value,
        }
    }

    /// Stores `value` without notifying anyone. Returns the change, if any.
    fn replace(&self, value: T, source: ChangeSource) -> Option<SettingChangedEvent> {
        let value = self.clamp(value);
        let mut current = write(&self.value);
        if *current == value {
            return None;
        }
        let old_value = current.to_config_string();
        let new_value = value.to_config_string();
        *current = value;
        Some(SettingChangedEvent {
            definition: self.definition.clone(),
            old_value,
            new_value,
            source,
        })
    }
}

/// Type-erased view of an [`EntrySlot`] used by the file for loading,
/// saving and untyped access.
pub(crate) trait ErasedEntry: Send + Sync {
    fn definition(&self) -> &ConfigDefinition;
    fn setting_type(&self) -> &'static str;
    fn description(&self) -> &str;
    fn default_text(&self) -> String;
    fn acceptable_text(&self) -> Option<String>;
    fn serialized_value(&self) -> String;
    fn apply_serialized(
        &self,
        text: &str,
        source: ChangeSource,
    ) -> Result<Option<SettingChangedEvent>, ConversionError>;
    fn reset(&self) -> Option<SettingChangedEvent>;
    fn notify(&self, event: &SettingChangedEvent);
    fn subscribe(&self, listener: Box<dyn Fn(&SettingChangedEvent) + Send + Sync>) -> Subscription;
    fn file(&self) -> Option<Arc<FileState>>;
    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

impl<T: SettingValue> ErasedEntry for EntrySlot<T> {
    fn definition(&self) -> &ConfigDefinition {
        &self.definition
    }

    fn setting_type(&self) -> &'static str {
        T::type_name()
    }

    fn description(&self) -> &str {
        &self.description.description
    }

    fn default_text(&self) -> String {
        self.default.to_config_string()
    }

    fn acceptable_text(&self) -> Option<String> {
        match &self.description.acceptable_values {
            Some(acceptable) => Some(acceptable.describe()),
            None => T::variant_names().map(|names| format!("Acceptable values: {}", names.join(", "))),
        }
    }

    fn serialized_value(&self) -> String {
        read(&self.value).to_config_string()
    }

    fn apply_serialized(
        &self,
        text: &str,
        source: ChangeSource,
    ) -> Result<Option<SettingChangedEvent>, ConversionError> {
        let value = T::from_config_str(text)?;
        Ok(self.replace(value, source))
    }

    fn reset(&self) -> Option<SettingChangedEvent> {
        self.replace(self.default.clone(), ChangeSource::Reset)
    }

    fn notify(&self, event: &SettingChangedEvent) {
        self.changed.emit(event);
    }

    fn subscribe(&self, listener: Box<dyn Fn(&SettingChangedEvent) + Send + Sync>) -> Subscription {
        self.changed.subscribe(listener)
    }

    fn file(&self) -> Option<Arc<FileState>> {
        self.file.upgrade()
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

/// Delivers a change to the entry's listeners, then the file's, then saves
/// if the file asks for it.
fn publish(entry: &dyn ErasedEntry, event: Option<SettingChangedEvent>) {
    let Some(event) = event else {
        return;
    };
    entry.notify(&event);
    if let Some(file) = entry.file() {
        file.setting_changed(&event);
    }
}

/// Typed handle to a setting bound in a [`ConfigFile`].
///
/// Handles are cheap to clone; all clones read and write the same value.
pub struct ConfigEntry<T: SettingValue> {
    slot: Arc<EntrySlot<T>>,
}

impl<T: SettingValue> ConfigEntry<T> {
    pub(crate) fn from_slot(slot: Arc<EntrySlot<T>>) -> Self {
        Self { slot }
    }

    pub fn value(&self) -> T {
        read(&self.slot.value).clone()
    }

    /// Stores a new value, clamped to the acceptable values.
    ///
    /// Listeners are only notified when the stored value actually changes.
    pub fn set_value(&self, value: T) {
        let event = self.slot.replace(value, ChangeSource::Set);
        publish(self.slot.as_ref(), event);
    }

    pub fn default_value(&self) -> &T {
        &self.slot.default
    }

    pub fn reset_to_default(&self) {
        let event = self.slot.reset();
        publish(self.slot.as_ref(), event);
    }

    pub fn definition(&self) -> &ConfigDefinition {
        &self.slot.definition
    }

    pub fn description(&self) -> &ConfigDescription<T> {
        &self.slot.description
    }

    pub fn setting_type(&self) -> &'static str {
        T::type_name()
    }

    pub fn serialized_value(&self) -> String {
        self.slot.serialized_value()
    }

    pub fn set_serialized_value(&self, text: &str) -> Result<(), ConversionError> {
        let event = self.slot.apply_serialized(text, ChangeSource::Set)?;
        publish(self.slot.as_ref(), event);
        Ok(())
    }

    /// Registers a listener for changes of this setting only.
    pub fn on_setting_changed<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&SettingChangedEvent) + Send + Sync + 'static,
    {
        self.slot.changed.subscribe(listener)
    }

    /// The file this setting lives in, if it is still alive.
    pub fn config_file(&self) -> Option<ConfigFile> {
        self.slot.file.upgrade().map(ConfigFile::from_state)
    }

    pub fn is_bound_to(&self, file: &ConfigFile) -> bool {
        file.owns_state(&self.slot.file)
    }

    /// Whether both handles point at the same setting.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.slot, &other.slot)
    }
}

impl<T: SettingValue> Clone for ConfigEntry<T> {
    fn clone(&self) -> Self {
        Self {
            slot: Arc::clone(&self.slot),
        }
    }
}

impl<T: SettingValue> fmt::Debug for ConfigEntry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigEntry")
            .field("definition", &self.slot.definition)
            .field("value", &*read(&self.slot.value))
            .finish()
    }
}

/// Handle to a setting whose value type is not known statically.
#[derive(Clone)]
pub struct UntypedEntry {
    inner: Arc<dyn ErasedEntry>,
}

impl UntypedEntry {
    pub(crate) fn new(inner: Arc<dyn ErasedEntry>) -> Self {
        Self { inner }
    }

    pub fn definition(&self) -> &ConfigDefinition {
        self.inner.definition()
    }

    pub fn setting_type(&self) -> &'static str {
        self.inner.setting_type()
    }

    pub fn description(&self) -> &str {
        self.inner.description()
    }

    pub fn serialized_value(&self) -> String {
        self.inner.serialized_value()
    }

    pub fn default_serialized_value(&self) -> String {
        self.inner.default_text()
    }

    pub fn set_serialized_value(&self, text: &str) -> Result<(), ConfigError> {
        let event = self.inner.apply_serialized(text, ChangeSource::Set)?;
        publish(self.inner.as_ref(), event);
        Ok(())
    }

    pub fn reset_to_default(&self) {
        let event = self.inner.reset();
        publish(self.inner.as_ref(), event);
    }

    pub fn on_setting_changed<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&SettingChangedEvent) + Send + Sync + 'static,
    {
        self.inner.subscribe(Box::new(listener))
    }

    /// Recovers the typed handle, if `T` is the type the setting was bound with.
    pub fn downcast<T: SettingValue>(&self) -> Option<ConfigEntry<T>> {
        Arc::clone(&self.inner)
            .into_any()
            .downcast::<EntrySlot<T>>()
            .ok()
            .map(ConfigEntry::from_slot)
    }
}

impl fmt::Debug for UntypedEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UntypedEntry")
            .field("definition", self.inner.definition())
            .field("type", &self.inner.setting_type())
            .field("value", &self.inner.serialized_value())
            .finish()
    }
}
