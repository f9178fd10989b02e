//! Attribute-driven models.
//!
//! Members are plain [`ModelEntry`] fields. Their description, default and
//! key are declared next to them at registration time with
//! [`EntryAttributes`], and [`ConfigFileModel`] turns each declaration into a
//! store bind. Customisation happens through a [`FileModelHooks`] object.

use crate::data::{DEFAULT_NAME, NO_DESCRIPTION};
use crate::log_source::{self, LogSource};
use crate::member::panic_to_error;
use crate::report::{BindReport, MemberReport, MemberStatus};
use config_store::utils::lock;
use config_store::{
    AcceptableValues, ConfigDefinition, ConfigDescription, ConfigEntry, ConfigFile, ConfigReloadedEvent,
    RawValue, SettingChangedEvent, SettingValue, Subscription, UntypedEntry, WeakConfigFile,
};
use std::any::Any;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, TryLockError};

/// Metadata declared for one member.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntryAttributes {
    pub description: Option<String>,
    /// Converted to the member's setting type at bind time.
    pub default_value: Option<RawValue>,
    /// Replaces the member name as the key.
    pub key: Option<String>,
}

impl EntryAttributes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn default_value(mut self, value: impl Into<RawValue>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }
}

/// A member of an attribute-driven model.
pub struct ModelEntry<T: SettingValue> {
    entry: Option<ConfigEntry<T>>,
    acceptable_values: Option<AcceptableValues<T>>,
    tags: Vec<serde_json::Value>,
    /// Kept from the last bind so unbound access is reported to the same source.
    log: Option<LogSource>,
}

impl<T: SettingValue> ModelEntry<T> {
    pub fn new() -> Self {
        Self {
            entry: None,
            acceptable_values: None,
            tags: Vec::new(),
            log: None,
        }
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

    pub fn entry(&self) -> Option<&ConfigEntry<T>> {
        self.entry.as_ref()
    }

    pub fn log_source(&self) -> Option<&LogSource> {
        self.log.as_ref()
    }

    pub fn is_bound(&self) -> bool {
        self.entry.is_some()
    }

    /// The bound value, or the zero value with an error when unbound.
    pub fn value(&self) -> T {
        match &self.entry {
            Some(entry) => entry.value(),
            None => {
                self.log_or_default()
                    .error("ModelEntry::value | Entry is not bound, returning the zero value");
                T::default()
            }
        }
    }

    pub fn set_value(&self, value: T) {
        match &self.entry {
            Some(entry) => entry.set_value(value),
            None => self
                .log_or_default()
                .error("ModelEntry::set_value | Entry is not bound, value dropped"),
        }
    }

    fn log_or_default(&self) -> LogSource {
        self.log.clone().unwrap_or_default()
    }
}

impl<T: SettingValue> Default for ModelEntry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: SettingValue> fmt::Debug for ModelEntry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelEntry")
            .field("entry", &self.entry)
            .field("log", &self.log)
            .finish()
    }
}

/// A type whose fields are [`ModelEntry`] members.
pub trait FileModel: 'static {
    /// Section used when the caller gives none.
    fn section_name(&self) -> Option<&str> {
        None
    }

    fn register<'a>(&'a mut self, entries: &mut EntryRegistry<'a>);
}

/// What a pre-bind hook sees and may change before one member is bound.
pub struct PreBindContext<'a> {
    pub member: &'a str,
    pub section: String,
    pub key: String,
    pub description: String,
    /// The file to bind to.
    pub file: ConfigFile,
    /// Set to false to skip the standard bind (and the post-bind hook).
    pub use_standard_binding: bool,
    default_value: &'a mut dyn Any,
    setting_type: &'static str,
}

impl PreBindContext<'_> {
    pub fn setting_type(&self) -> &'static str {
        self.setting_type
    }

    /// The resolved default, if `T` is the member's setting type.
    pub fn default_value<T: SettingValue>(&self) -> Option<&T> {
        self.default_value.downcast_ref()
    }

    pub fn default_value_mut<T: SettingValue>(&mut self) -> Option<&mut T> {
        self.default_value.downcast_mut()
    }
}

/// What a post-bind hook sees after one member is bound.
pub struct PostBindContext<'a> {
    pub member: &'a str,
    pub file: &'a ConfigFile,
    pub entry: UntypedEntry,
}

/// A bound member whose stored value could not be read at the last reload.
pub struct OrphanContext<'a> {
    pub file: &'a ConfigFile,
    pub member: &'a str,
    pub definition: &'a ConfigDefinition,
    pub stored_value: &'a str,
    pub entry: &'a UntypedEntry,
}

/// Customisation points of a [`ConfigFileModel`]. Every hook defaults to
/// doing nothing.
///
/// Store notifications reach the hooks from inside the store's listeners. A
/// notification raised while a hook is already running (for example a hook
/// that sets a value) is not delivered to the hooks again.
#[allow(unused_variables)]
pub trait FileModelHooks: Send {
    /// Runs on every bind, before the file is checked. May rename the section.
    fn on_model_create(&mut self, file: Option<&ConfigFile>, section_name: &mut String) {}

    fn pre_bind(&mut self, ctx: &mut PreBindContext<'_>) {}

    fn post_bind(&mut self, ctx: &PostBindContext<'_>) {}

    fn on_config_reloaded(&mut self, file: &ConfigFile, event: &ConfigReloadedEvent) {}

    fn on_setting_changed(&mut self, file: &ConfigFile, event: &SettingChangedEvent) {}

    /// Called once per model member left orphaned by a reload.
    fn on_orphaned_entry(&mut self, orphan: &OrphanContext<'_>) {}

    /// Called after [`ConfigFileModel::change_config_file`] moved every member.
    fn on_config_file_migration(&mut self, old: &ConfigFile, new: &ConfigFile) {}
}

/// Hooks that do nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoHooks;

impl FileModelHooks for NoHooks {}

type SharedHooks = Arc<Mutex<Box<dyn FileModelHooks>>>;

/// Locks the hooks unless they are already running higher up the stack.
fn try_hooks(hooks: &Mutex<Box<dyn FileModelHooks>>) -> Option<MutexGuard<'_, Box<dyn FileModelHooks>>> {
    match hooks.try_lock() {
        Ok(guard) => Some(guard),
        Err(TryLockError::Poisoned(poisoned)) => Some(poisoned.into_inner()),
        Err(TryLockError::WouldBlock) => None,
    }
}

struct BindPass<'p> {
    file: &'p ConfigFile,
    section: &'p str,
    log: &'p LogSource,
    hooks: &'p Mutex<Box<dyn FileModelHooks>>,
}

#[derive(Clone)]
struct BoundMember {
    name: String,
    entry: UntypedEntry,
}

trait AttributedMember {
    fn name(&self) -> &str;
    fn bind(&mut self, pass: &BindPass<'_>) -> (MemberReport, Option<UntypedEntry>);
    fn unbind(&mut self);
}

struct Attributed<'a, T: SettingValue> {
    name: String,
    field: &'a mut ModelEntry<T>,
    attributes: EntryAttributes,
}

impl<T: SettingValue> Attributed<'_, T> {
    fn resolve_default(&self, log: &LogSource) -> T {
        match &self.attributes.default_value {
            Some(raw) => match T::from_raw(raw) {
                Ok(value) => value,
                Err(e) => {
                    log.error(&format!(
                        "ConfigFileModel::bind | Default for {} cannot be used as {}: {}. Using {:?}",
                        self.name,
                        T::type_name(),
                        e,
                        T::default()
                    ));
                    T::default()
                }
            },
            None => {
                log.warn(&format!(
                    "ConfigFileModel::bind | No default value declared for {}, using {:?}",
                    self.name,
                    T::default()
                ));
                T::default()
            }
        }
    }

    fn report(&self, definitions: Vec<ConfigDefinition>, status: MemberStatus) -> MemberReport {
        MemberReport {
            name: self.name.clone(),
            definitions,
            status,
        }
    }
}

impl<T: SettingValue> AttributedMember for Attributed<'_, T> {
    fn name(&self) -> &str {
        &self.name
    }

    fn bind(&mut self, pass: &BindPass<'_>) -> (MemberReport, Option<UntypedEntry>) {
        let description = match &self.attributes.description {
            Some(description) => description.clone(),
            None => {
                pass.log.warn(&format!(
                    "ConfigFileModel::bind | No description declared for {}, using '{NO_DESCRIPTION}'",
                    self.name
                ));
                NO_DESCRIPTION.to_string()
            }
        };
        let mut default_value = self.resolve_default(pass.log);
        let key = self.attributes.key.clone().unwrap_or_else(|| self.name.clone());

        let mut ctx = PreBindContext {
            member: &self.name,
            section: pass.section.to_string(),
            key,
            description,
            file: pass.file.clone(),
            use_standard_binding: true,
            default_value: &mut default_value,
            setting_type: T::type_name(),
        };
        lock(pass.hooks).pre_bind(&mut ctx);
        let PreBindContext {
            section,
            key,
            description,
            file,
            use_standard_binding,
            ..
        } = ctx;

        if !use_standard_binding {
            pass.log.debug(&format!("ConfigFileModel::bind | {} opted out of standard binding", self.name));
            return (self.report(Vec::new(), MemberStatus::Skipped), None);
        }

        let config_description = ConfigDescription::new(description)
            .with_acceptable_values(self.field.acceptable_values.clone())
            .with_tags(self.field.tags.clone());
        let entry = match file.bind(&section, &key, default_value, config_description) {
            Ok(entry) => entry,
            Err(e) => {
                pass.log.error(&format!(
                    "ConfigFileModel::bind | Failed to bind {} as [{}] {}: {}",
                    self.name, section, key, e
                ));
                return (self.report(Vec::new(), MemberStatus::Failed(e.to_string())), None);
            }
        };

        let unchanged = self.field.entry.as_ref().is_some_and(|old| old.ptr_eq(&entry));
        let definition = entry.definition().clone();
        self.field.entry = Some(entry);
        self.field.log = Some(pass.log.clone());
        let untyped = file.get_untyped(&definition);

        if let Some(untyped) = &untyped {
            lock(pass.hooks).post_bind(&PostBindContext {
                member: &self.name,
                file: &file,
                entry: untyped.clone(),
            });
        }

        let status = if unchanged {
            MemberStatus::Unchanged
        } else {
            MemberStatus::Bound
        };
        (self.report(vec![definition], status), untyped)
    }

    fn unbind(&mut self) {
        self.field.entry = None;
    }
}

/// The members of a [`FileModel`], in registration order.
#[derive(Default)]
pub struct EntryRegistry<'a> {
    members: Vec<Box<dyn AttributedMember + 'a>>,
}

impl<'a> EntryRegistry<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entry<T: SettingValue>(
        &mut self,
        name: impl Into<String>,
        field: &'a mut ModelEntry<T>,
        attributes: EntryAttributes,
    ) -> &mut Self {
        self.members.push(Box::new(Attributed {
            name: name.into(),
            field,
            attributes,
        }));
        self
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.members.iter().map(|m| m.name()).collect()
    }
}

struct FileSubscriptions {
    file: WeakConfigFile,
    _reloaded: Subscription,
    _changed: Subscription,
}

/// Binds a [`FileModel`] to a [`ConfigFile`] and forwards store
/// notifications to its hooks.
pub struct ConfigFileModel<M: FileModel> {
    model: M,
    section_name: Option<String>,
    log: Option<LogSource>,
    file: Option<ConfigFile>,
    hooks: SharedHooks,
    bound: Arc<Mutex<Vec<BoundMember>>>,
    subscriptions: Option<FileSubscriptions>,
    last_report: Option<BindReport>,
}

impl<M: FileModel> ConfigFileModel<M> {
    pub fn new(model: M) -> Self {
        Self::with_hooks(model, NoHooks)
    }

    pub fn with_hooks(model: M, hooks: impl FileModelHooks + 'static) -> Self {
        Self {
            model,
            section_name: None,
            log: None,
            file: None,
            hooks: Arc::new(Mutex::new(Box::new(hooks))),
            bound: Arc::new(Mutex::new(Vec::new())),
            subscriptions: None,
            last_report: None,
        }
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn model_mut(&mut self) -> &mut M {
        &mut self.model
    }

    /// The section resolved by the last bind.
    pub fn section_name(&self) -> Option<&str> {
        self.section_name.as_deref()
    }

    pub fn log_source(&self) -> Option<&LogSource> {
        self.log.as_ref()
    }

    pub fn config_file(&self) -> Option<&ConfigFile> {
        self.file.as_ref()
    }

    pub fn last_report(&self) -> Option<&BindReport> {
        self.last_report.as_ref()
    }

    /// Gives `f` exclusive access to the hooks object.
    pub fn with_hooks_mut<R>(&self, f: impl FnOnce(&mut dyn FileModelHooks) -> R) -> R {
        f(lock(&self.hooks).as_mut())
    }

    /// Registered member names.
    pub fn members(&mut self) -> Vec<String> {
        let mut registry = EntryRegistry::new();
        self.model.register(&mut registry);
        registry.names().into_iter().map(str::to_string).collect()
    }

    /// Binds every registered member to `file`.
    ///
    /// The section is `section` if given, else the model's own, else
    /// `"default"`; the `on_model_create` hook may still rename it.
    pub fn bind(&mut self, file: Option<&ConfigFile>, section: Option<&str>, log: Option<&LogSource>) -> BindReport {
        let log = match log.or(self.log.as_ref()) {
            Some(log) => log.clone(),
            None => log_source::resolve(None, "ConfigFileModel::bind"),
        };
        self.log = Some(log.clone());

        let mut section_name = section
            .or_else(|| self.model.section_name())
            .unwrap_or(DEFAULT_NAME)
            .to_string();
        lock(&self.hooks).on_model_create(file, &mut section_name);

        let Some(file) = file else {
            let message = format!(
                "Unable to bind model {}, no settings file given",
                std::any::type_name::<M>()
            );
            log.error(&message);
            let report = BindReport::aborted(message);
            self.last_report = Some(report.clone());
            return report;
        };

        self.section_name = Some(section_name.clone());
        self.file = Some(file.clone());

        let pass = BindPass {
            file,
            section: &section_name,
            log: &log,
            hooks: &self.hooks,
        };
        let mut registry = EntryRegistry::new();
        self.model.register(&mut registry);

        let mut members = Vec::with_capacity(registry.len());
        let mut bound = Vec::with_capacity(registry.len());
        for member in registry.members.iter_mut() {
            let (report, entry) = match catch_unwind(AssertUnwindSafe(|| member.bind(&pass))) {
                Ok(outcome) => outcome,
                Err(panic_info) => {
                    let error = panic_to_error(panic_info);
                    log.error(&format!("ConfigFileModel::bind | {} failed: {}", member.name(), error));
                    let report = MemberReport {
                        name: member.name().to_string(),
                        definitions: Vec::new(),
                        status: MemberStatus::Failed(error.to_string()),
                    };
                    (report, None)
                }
            };
            if let Some(entry) = entry {
                bound.push(BoundMember {
                    name: report.name.clone(),
                    entry,
                });
            }
            members.push(report);
        }
        drop(registry);

        *lock(&self.bound) = bound;
        self.subscribe(file, &log);

        let report = BindReport { aborted: None, members };
        log.debug(&format!("Bound model {}: {}", std::any::type_name::<M>(), report));
        self.last_report = Some(report.clone());
        report
    }

    /// Moves every member to `new_file`, then runs the migration hook.
    pub fn change_config_file(&mut self, new_file: &ConfigFile) -> BindReport {
        let old_file = self.file.take();

        let mut registry = EntryRegistry::new();
        self.model.register(&mut registry);
        for member in registry.members.iter_mut() {
            member.unbind();
        }
        drop(registry);
        lock(&self.bound).clear();

        let section = self.section_name.clone();
        let log = self.log.clone();
        let report = self.bind(Some(new_file), section.as_deref(), log.as_ref());

        if let Some(old_file) = old_file {
            lock(&self.hooks).on_config_file_migration(&old_file, new_file);
        }
        report
    }

    /// Subscribes to `file` unless this model already listens to it.
    fn subscribe(&mut self, file: &ConfigFile, log: &LogSource) {
        let already = self
            .subscriptions
            .as_ref()
            .and_then(|subs| subs.file.upgrade())
            .is_some_and(|current| current.ptr_eq(file));
        if already {
            return;
        }

        let reloaded = {
            let hooks = Arc::clone(&self.hooks);
            let bound = Arc::clone(&self.bound);
            let weak = file.downgrade();
            let log = log.clone();
            file.on_config_reloaded(move |event| {
                let Some(file) = weak.upgrade() else {
                    return;
                };
                let Some(mut hooks) = try_hooks(&hooks) else {
                    log.debug("ConfigFileModel | Hooks busy, reload notification not delivered");
                    return;
                };
                hooks.on_config_reloaded(&file, event);

                let orphans = file.orphaned_entries();
                let bound = lock(&bound).clone();
                for member in &bound {
                    let definition = member.entry.definition();
                    if let Some(stored_value) = orphans.get(definition) {
                        log.warn(&format!(
                            "ConfigFileModel | {} has an unreadable stored value '{}'",
                            definition, stored_value
                        ));
                        hooks.on_orphaned_entry(&OrphanContext {
                            file: &file,
                            member: &member.name,
                            definition,
                            stored_value,
                            entry: &member.entry,
                        });
                    }
                }
            })
        };

        let changed = {
            let hooks = Arc::clone(&self.hooks);
            let weak = file.downgrade();
            file.on_setting_changed(move |event| {
                let Some(file) = weak.upgrade() else {
                    return;
                };
                if let Some(mut hooks) = try_hooks(&hooks) {
                    hooks.on_setting_changed(&file, event);
                }
            })
        };

        self.subscriptions = Some(FileSubscriptions {
            file: file.downgrade(),
            _reloaded: reloaded,
            _changed: changed,
        });
    }
}

impl<M: FileModel + Default> Default for ConfigFileModel<M> {
    fn default() -> Self {
        Self::new(M::default())
    }
}

impl<M: FileModel> Deref for ConfigFileModel<M> {
    type Target = M;

    fn deref(&self) -> &M {
        &self.model
    }
}

impl<M: FileModel> DerefMut for ConfigFileModel<M> {
    fn deref_mut(&mut self) -> &mut M {
        &mut self.model
    }
}

impl<M: FileModel + fmt::Debug> fmt::Debug for ConfigFileModel<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigFileModel")
            .field("model", &self.model)
            .field("section_name", &self.section_name)
            .field("file", &self.file)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Small {
        count: ModelEntry<i32>,
        label: ModelEntry<String>,
    }

    impl FileModel for Small {
        fn section_name(&self) -> Option<&str> {
            Some("Small")
        }

        fn register<'a>(&'a mut self, entries: &mut EntryRegistry<'a>) {
            entries
                .entry("Count", &mut self.count, EntryAttributes::new().description("c").default_value(3))
                .entry("Label", &mut self.label, EntryAttributes::new().key("Name"));
        }
    }

    #[test]
    fn test_declared_metadata_is_used() {
        let file = ConfigFile::in_memory();
        let mut model = ConfigFileModel::<Small>::default();
        let report = model.bind(Some(&file), None, None);

        assert!(report.is_success());
        let count = model.count.entry().unwrap();
        assert_eq!(count.definition().to_string(), "[Small] Count");
        assert_eq!(count.description().description, "c");
        assert_eq!(model.count.value(), 3);

        let label = model.label.entry().unwrap();
        assert_eq!(label.definition().key, "Name");
        assert_eq!(label.description().description, NO_DESCRIPTION);
        assert_eq!(model.label.value(), "");
    }

    #[test]
    fn test_section_override_and_create_hook() {
        struct Rename;
        impl FileModelHooks for Rename {
            fn on_model_create(&mut self, _file: Option<&ConfigFile>, section_name: &mut String) {
                section_name.push_str("_v2");
            }
        }

        let file = ConfigFile::in_memory();
        let mut model = ConfigFileModel::with_hooks(Small::default(), Rename);
        model.bind(Some(&file), Some("Custom"), None);
        assert_eq!(model.section_name(), Some("Custom_v2"));
        assert!(file.get::<i32>("Custom_v2", "Count").is_some());
    }

    #[test]
    fn test_missing_file_binds_nothing() {
        let mut model = ConfigFileModel::<Small>::default();
        let report = model.bind(None, None, None);
        assert!(report.is_aborted());
        assert!(!model.count.is_bound());
        assert_eq!(model.count.value(), 0);
    }

    #[test]
    fn test_unbound_access_reports_to_entry_log_source() {
        let unbound = ModelEntry::<i32>::new().with_log_source(LogSource::new("early"));
        assert_eq!(unbound.log_source().map(LogSource::name), Some("early"));
        unbound.set_value(4);
        assert_eq!(unbound.value(), 0);

        let file = ConfigFile::in_memory();
        let log = LogSource::new("small");
        let mut model = ConfigFileModel::<Small>::default();
        model.bind(Some(&file), None, Some(&log));
        assert_eq!(model.count.log_source().map(LogSource::name), Some("small"));
        assert_eq!(model.label.log_source(), Some(&log));
    }

    #[test]
    fn test_rebind_same_file_is_unchanged() {
        let file = ConfigFile::in_memory();
        let mut model = ConfigFileModel::<Small>::default();
        model.bind(Some(&file), None, None);
        let again = model.bind(Some(&file), None, None);
        assert_eq!(again.count(&MemberStatus::Unchanged), 2);
    }
}
