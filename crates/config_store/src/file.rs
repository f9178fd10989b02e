//! The settings file: an ordered set of typed entries backed by a file on disk.

use crate::definition::{ConfigDefinition, ConfigDescription};
use crate::entry::{ConfigEntry, EntrySlot, ErasedEntry, UntypedEntry};
use crate::error::ConfigError;
use crate::events::{ChangeSource, ConfigReloadedEvent, Event, SettingChangedEvent, Subscription};
use crate::format;
use crate::utils::{read, write};
use crate::value::SettingValue;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, info, warn};

pub(crate) struct FileState {
    path: Option<PathBuf>,
    owner: Option<String>,
    entries: std::sync::RwLock<BTreeMap<ConfigDefinition, Arc<dyn ErasedEntry>>>,
    orphans: std::sync::RwLock<BTreeMap<ConfigDefinition, String>>,
    save_on_set: AtomicBool,
    setting_changed: Event<SettingChangedEvent>,
    config_reloaded: Event<ConfigReloadedEvent>,
}

impl FileState {
    /// Called by entries after their own listeners have seen a change.
    pub(crate) fn setting_changed(&self, event: &SettingChangedEvent) {
        self.setting_changed.emit(event);
        self.persist_if_enabled();
    }

    fn persist_if_enabled(&self) {
        if self.path.is_none() || !self.save_on_set.load(Ordering::Relaxed) {
            return;
        }
        if let Err(e) = self.save() {
            warn!("Failed to save settings file {:?}: {}", self.path, e);
        }
    }

    fn save(&self) -> Result<(), ConfigError> {
        let path = self.path.as_deref().ok_or(ConfigError::NoPath)?;
        let text = {
            let entries = read(&self.entries);
            let orphans = read(&self.orphans);
            format::render(self.owner.as_deref(), &entries, &orphans)
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, text)?;
        debug!("Saved settings file {}", path.display());
        Ok(())
    }

    fn apply_text(&self, text: &str) -> ConfigReloadedEvent {
        let parsed = format::parse(text);
        let entries = read(&self.entries).clone();

        let mut orphans = BTreeMap::new();
        let mut changes = Vec::new();
        for (definition, value) in parsed {
            match entries.get(&definition) {
                Some(entry) => match entry.apply_serialized(&value, ChangeSource::Reload) {
                    Ok(Some(event)) => changes.push((Arc::clone(entry), event)),
                    Ok(None) => {}
                    Err(e) => {
                        warn!("Setting {} keeps its current value: {}", definition, e);
                        orphans.insert(definition, value);
                    }
                },
                None => {
                    orphans.insert(definition, value);
                }
            }
        }

        let orphaned = orphans.len();
        *write(&self.orphans) = orphans;

        for (entry, event) in &changes {
            entry.notify(event);
            self.setting_changed.emit(event);
        }

        ConfigReloadedEvent {
            path: self.path.clone(),
            changed: changes.len(),
            orphaned,
        }
    }
}

/// Handle to a settings file.
///
/// Clones share the same entries, so a file can be handed to any number of
/// models. Entries are created by [`bind`](Self::bind) and live as long as
/// the file does.
#[derive(Clone)]
pub struct ConfigFile {
    state: Arc<FileState>,
}

impl ConfigFile {
    /// Opens the settings file at `path`, loading it if it exists.
    ///
    /// When the file is missing and `save_on_init` is set, an empty file is
    /// written immediately. Saving after every change is enabled.
    pub fn new(path: impl Into<PathBuf>, save_on_init: bool) -> Result<Self, ConfigError> {
        Self::open(Some(path.into()), None, save_on_init)
    }

    /// Like [`new`](Self::new), naming the owner in the file header.
    pub fn with_owner(
        path: impl Into<PathBuf>,
        save_on_init: bool,
        owner: impl Into<String>,
    ) -> Result<Self, ConfigError> {
        Self::open(Some(path.into()), Some(owner.into()), save_on_init)
    }

    /// A file that is never written to disk.
    pub fn in_memory() -> Self {
        Self::from_state(Arc::new(Self::new_state(None, None)))
    }

    fn new_state(path: Option<PathBuf>, owner: Option<String>) -> FileState {
        FileState {
            save_on_set: AtomicBool::new(path.is_some()),
            path,
            owner,
            entries: std::sync::RwLock::new(BTreeMap::new()),
            orphans: std::sync::RwLock::new(BTreeMap::new()),
            setting_changed: Event::new(),
            config_reloaded: Event::new(),
        }
    }

    fn open(path: Option<PathBuf>, owner: Option<String>, save_on_init: bool) -> Result<Self, ConfigError> {
        let file = Self::from_state(Arc::new(Self::new_state(path, owner)));
        match file.path() {
            Some(path) if path.exists() => file.reload()?,
            Some(path) => {
                if save_on_init {
                    file.save()?;
                    info!("📝 Created settings file {}", path.display());
                }
            }
            None => {}
        }
        Ok(file)
    }

    pub(crate) fn from_state(state: Arc<FileState>) -> Self {
        Self { state }
    }

    pub(crate) fn owns_state(&self, state: &Weak<FileState>) -> bool {
        std::ptr::eq(Arc::as_ptr(&self.state), state.as_ptr())
    }

    pub fn path(&self) -> Option<&Path> {
        self.state.path.as_deref()
    }

    pub fn owner(&self) -> Option<&str> {
        self.state.owner.as_deref()
    }

    pub fn save_on_set(&self) -> bool {
        self.state.save_on_set.load(Ordering::Relaxed)
    }

    pub fn set_save_on_set(&self, enabled: bool) {
        self.state.save_on_set.store(enabled, Ordering::Relaxed);
    }

    /// Creates the setting if it does not exist yet and returns a handle to it.
    ///
    /// Binding the same definition again returns the existing setting; the
    /// new default and description are ignored. Binding it with a different
    /// value type fails with [`ConfigError::TypeMismatch`]. A value read from
    /// disk before the setting was bound is adopted here.
    pub fn bind<T: SettingValue>(
        &self,
        section: &str,
        key: &str,
        default: T,
        description: ConfigDescription<T>,
    ) -> Result<ConfigEntry<T>, ConfigError> {
        let definition = ConfigDefinition::new(section, key)?;

        let entry = {
            let mut entries = write(&self.state.entries);
            if let Some(existing) = entries.get(&definition) {
                let existing = UntypedEntry::new(Arc::clone(existing));
                return existing.downcast::<T>().ok_or_else(|| ConfigError::TypeMismatch {
                    definition,
                    existing: existing.setting_type(),
                    requested: T::type_name(),
                });
            }

            let clamp = |value: T| match &description.acceptable_values {
                Some(acceptable) => acceptable.clamp(value),
                None => value,
            };
            let default = clamp(default);
            let initial = match self.adopt_orphan::<T>(&definition) {
                Some(stored) => clamp(stored),
                None => default.clone(),
            };

            let slot = Arc::new(EntrySlot::new(
                definition.clone(),
                description,
                default,
                initial,
                Arc::downgrade(&self.state),
            ));
            let erased: Arc<dyn ErasedEntry> = slot.clone();
            entries.insert(definition.clone(), erased);
            ConfigEntry::from_slot(slot)
        };

        debug!("Bound setting {} ({})", definition, T::type_name());
        self.state.persist_if_enabled();
        Ok(entry)
    }

    /// Takes the text read from disk for `definition`, if it parses as `T`.
    /// Text that does not parse stays orphaned.
    fn adopt_orphan<T: SettingValue>(&self, definition: &ConfigDefinition) -> Option<T> {
        let mut orphans = write(&self.state.orphans);
        let text = orphans.get(definition)?;
        match T::from_config_str(text) {
            Ok(value) => {
                orphans.remove(definition);
                Some(value)
            }
            Err(e) => {
                warn!("Stored value for {} is not a valid {}: {}", definition, T::type_name(), e);
                None
            }
        }
    }

    /// Typed handle to an existing setting.
    pub fn get<T: SettingValue>(&self, section: &str, key: &str) -> Option<ConfigEntry<T>> {
        let definition = ConfigDefinition::new(section, key).ok()?;
        self.get_untyped(&definition)?.downcast()
    }

    pub fn get_untyped(&self, definition: &ConfigDefinition) -> Option<UntypedEntry> {
        read(&self.state.entries)
            .get(definition)
            .map(|entry| UntypedEntry::new(Arc::clone(entry)))
    }

    pub fn contains_key(&self, definition: &ConfigDefinition) -> bool {
        read(&self.state.entries).contains_key(definition)
    }

    pub fn keys(&self) -> Vec<ConfigDefinition> {
        read(&self.state.entries).keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        read(&self.state.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        read(&self.state.entries).is_empty()
    }

    /// Removes a setting. Existing handles keep working but are no longer saved.
    pub fn remove(&self, definition: &ConfigDefinition) -> bool {
        let removed = write(&self.state.entries).remove(definition).is_some();
        if removed {
            debug!("Removed setting {}", definition);
            self.state.persist_if_enabled();
        }
        removed
    }

    pub fn clear(&self) {
        write(&self.state.entries).clear();
        self.state.persist_if_enabled();
    }

    /// Values read at the last reload that no bound setting could take.
    pub fn orphaned_entries(&self) -> BTreeMap<ConfigDefinition, String> {
        read(&self.state.orphans).clone()
    }

    /// Registers a listener for changes of any setting in this file.
    pub fn on_setting_changed<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&SettingChangedEvent) + Send + Sync + 'static,
    {
        self.state.setting_changed.subscribe(listener)
    }

    /// Registers a listener called once after every reload.
    pub fn on_config_reloaded<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&ConfigReloadedEvent) + Send + Sync + 'static,
    {
        self.state.config_reloaded.subscribe(listener)
    }

    /// Re-reads the file from disk.
    ///
    /// Bound settings take the stored values, firing one change notification
    /// per setting whose value changed. Everything else becomes an orphan.
    /// Reloading never writes the file.
    pub fn reload(&self) -> Result<(), ConfigError> {
        let path = self.path().ok_or(ConfigError::NoPath)?;
        let text = std::fs::read_to_string(path)?;
        self.reload_from_str(&text);
        Ok(())
    }

    /// Same as [`reload`](Self::reload), reading from `text` instead of disk.
    pub fn reload_from_str(&self, text: &str) {
        let event = self.state.apply_text(text);
        info!(
            "🔄 Reloaded settings {}: {} changed, {} orphaned",
            self, event.changed, event.orphaned
        );
        self.state.config_reloaded.emit(&event);
    }

    pub fn save(&self) -> Result<(), ConfigError> {
        self.state.save()
    }

    /// Renders the file as it would be saved.
    pub fn to_config_string(&self) -> String {
        let entries = read(&self.state.entries);
        let orphans = read(&self.state.orphans);
        format::render(self.owner(), &entries, &orphans)
    }

    /// Whether both handles refer to the same file.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.state, &other.state)
    }

    /// A handle that does not keep the file alive, for use inside listeners
    /// registered on the file itself.
    pub fn downgrade(&self) -> WeakConfigFile {
        WeakConfigFile {
            state: Arc::downgrade(&self.state),
        }
    }
}

impl fmt::Debug for ConfigFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigFile")
            .field("path", &self.state.path)
            .field("owner", &self.state.owner)
            .field("entries", &self.len())
            .finish()
    }
}

impl fmt::Display for ConfigFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.path() {
            Some(path) => write!(f, "{}", path.display()),
            None => f.write_str("<in-memory>"),
        }
    }
}

/// Non-owning counterpart of [`ConfigFile`].
#[derive(Clone, Debug)]
pub struct WeakConfigFile {
    state: Weak<FileState>,
}

impl WeakConfigFile {
    pub fn upgrade(&self) -> Option<ConfigFile> {
        self.state.upgrade().map(ConfigFile::from_state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::AcceptableValues;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;

    #[test]
    fn test_bind_is_idempotent() {
        let file = ConfigFile::in_memory();
        let first = file.bind("General", "Speed", 1, ConfigDescription::new("a")).unwrap();
        let second = file.bind("General", "Speed", 2, ConfigDescription::new("b")).unwrap();

        assert!(first.ptr_eq(&second));
        assert_eq!(second.value(), 1);
        assert_eq!(second.description().description, "a");
        assert_eq!(file.len(), 1);
    }

    #[test]
    fn test_bind_with_other_type_fails() {
        let file = ConfigFile::in_memory();
        file.bind("General", "Speed", 1i32, ConfigDescription::default()).unwrap();
        let err = file
            .bind("General", "Speed", "fast".to_string(), ConfigDescription::default())
            .unwrap_err();
        assert!(matches!(err, ConfigError::TypeMismatch { existing: "i32", requested: "String", .. }));
    }

    #[test]
    fn test_orphans_are_adopted_on_bind() {
        let file = ConfigFile::in_memory();
        file.reload_from_str("[General]\nSpeed = 7\nUnknown = x\n");
        assert_eq!(file.orphaned_entries().len(), 2);

        let speed = file.bind("General", "Speed", 1, ConfigDescription::default()).unwrap();
        assert_eq!(speed.value(), 7);
        assert_eq!(file.orphaned_entries().len(), 1);
    }

    #[test]
    fn test_unparsable_orphan_stays_orphaned() {
        let file = ConfigFile::in_memory();
        file.reload_from_str("[General]\nSpeed = fast\n");
        let speed = file.bind("General", "Speed", 1, ConfigDescription::default()).unwrap();
        assert_eq!(speed.value(), 1);
        assert_eq!(file.orphaned_entries().len(), 1);
    }

    #[test]
    fn test_reload_fires_per_change_then_reloaded() {
        let file = ConfigFile::in_memory();
        let a = file.bind("S", "a", 1, ConfigDescription::default()).unwrap();
        let _b = file.bind("S", "b", 2, ConfigDescription::default()).unwrap();

        let log = Arc::new(Mutex::new(Vec::new()));
        let changed_log = Arc::clone(&log);
        let _changed = file.on_setting_changed(move |e| {
            changed_log.lock().unwrap().push(format!("changed {}", e.definition.key));
        });
        let reloaded_log = Arc::clone(&log);
        let _reloaded = file.on_config_reloaded(move |e| {
            reloaded_log.lock().unwrap().push(format!("reloaded {} {}", e.changed, e.orphaned));
        });

        file.reload_from_str("[S]\na = 5\nb = 2\nc = 9\n");
        assert_eq!(a.value(), 5);
        assert_eq!(*log.lock().unwrap(), vec!["changed a", "reloaded 1 1"]);
    }

    #[test]
    fn test_bad_value_on_reload_becomes_orphan() {
        let file = ConfigFile::in_memory();
        let a = file.bind("S", "a", 1, ConfigDescription::default()).unwrap();
        file.reload_from_str("[S]\na = nope\n");
        assert_eq!(a.value(), 1);
        assert!(file.orphaned_entries().contains_key(a.definition()));
        assert!(!file.to_config_string().contains("nope"));
    }

    #[test]
    fn test_in_memory_has_no_path() {
        let file = ConfigFile::in_memory();
        assert!(!file.save_on_set());
        assert!(matches!(file.save(), Err(ConfigError::NoPath)));
        assert!(matches!(file.reload(), Err(ConfigError::NoPath)));
        assert_eq!(file.to_string(), "<in-memory>");
    }

    #[test]
    fn test_render_describes_entries() {
        let file = ConfigFile::in_memory();
        file.bind(
            "General",
            "Speed",
            10,
            ConfigDescription::new("How fast\nin m/s").with_acceptable_values(Some(AcceptableValues::range(0, 100))),
        )
        .unwrap();

        assert_eq!(
            file.to_config_string(),
            "[General]\n\n## How fast\n## in m/s\n# Setting type: i32\n# Default value: 10\n# Acceptable value range: From 0 to 100\nSpeed = 10\n"
        );
    }

    #[test]
    fn test_weak_handle_does_not_keep_file_alive() {
        let file = ConfigFile::in_memory();
        let weak = file.downgrade();
        assert!(weak.upgrade().is_some());
        drop(file);
        assert!(weak.upgrade().is_none());
    }

    #[test]
    fn test_remove_stops_tracking() {
        let file = ConfigFile::in_memory();
        let entry = file.bind("S", "a", 1, ConfigDescription::default()).unwrap();
        let count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&count);
        let _sub = file.on_setting_changed(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert!(file.remove(entry.definition()));
        assert!(!file.contains_key(entry.definition()));
        assert!(file.get::<i32>("S", "a").is_none());
        entry.set_value(3);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
