use crate::data::{BindFallback, ConfigData, DEFAULT_NAME};
use crate::error::BindError;
use crate::log_source::{self, LogSource};
use crate::member::{BindableMember, MemberBinding, MemberBound, ProfileSwitch};
use config_store::{AcceptableValues, ConfigFile, Event, SettingChangedEvent, SettingValue, Subscription};
use std::fmt;

/// Payload of an array's per-element bind notifications.
#[derive(Debug, Clone)]
pub struct ArrayBindEvent {
    pub file: ConfigFile,
    pub index: usize,
}

/// A fixed number of settings sharing one declaration, stored under the keys
/// `{key}_0`, `{key}_1`, ...
pub struct ConfigArray<T: SettingValue> {
    elements: Vec<ConfigData<T>>,
    section_name: Option<String>,
    key: Option<String>,
    description: Option<String>,
    default_value: Option<T>,
    acceptable_values: Option<AcceptableValues<T>>,
    tags: Vec<serde_json::Value>,
    log: Option<LogSource>,
    setting_changed: Event<SettingChangedEvent>,
    pre_bind: Event<ArrayBindEvent>,
    post_bind: Event<ArrayBindEvent>,
    _relays: Vec<Subscription>,
}

impl<T: SettingValue> ConfigArray<T> {
    pub fn new(size: usize) -> Self {
        let setting_changed = Event::new();
        let pre_bind = Event::new();
        let post_bind = Event::new();
        let mut relays = Vec::with_capacity(size * 3);
        let elements = (0..size)
            .map(|index| {
                let element = ConfigData::new();
                let changed = setting_changed.clone();
                relays.push(element.on_setting_changed(move |event| {
                    changed.emit(event);
                }));
                let pre = pre_bind.clone();
                relays.push(element.subscribe_pre_bind(move |ctx| {
                    pre.emit(&ArrayBindEvent {
                        file: ctx.file.clone(),
                        index,
                    });
                }));
                let post = post_bind.clone();
                relays.push(element.subscribe_post_bind(move |event| {
                    post.emit(&ArrayBindEvent {
                        file: event.file.clone(),
                        index,
                    });
                }));
                element
            })
            .collect();

        Self {
            elements,
            section_name: None,
            key: None,
            description: None,
            default_value: None,
            acceptable_values: None,
            tags: Vec::new(),
            log: None,
            setting_changed,
            pre_bind,
            post_bind,
            _relays: relays,
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

    /// Listener run before each element is bound.
    pub fn on_pre_bind<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&ArrayBindEvent) + Send + Sync + 'static,
    {
        self.pre_bind.subscribe(listener)
    }

    /// Listener run after each element is bound.
    pub fn on_post_bind<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&ArrayBindEvent) + Send + Sync + 'static,
    {
        self.post_bind.subscribe(listener)
    }

    /// Listener for changes of any element.
    pub fn on_setting_changed<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&SettingChangedEvent) + Send + Sync + 'static,
    {
        self.setting_changed.subscribe(listener)
    }

    /// Binds every element. The array's own section and key win over the
    /// fallbacks; the first element error is returned after all elements
    /// have been tried.
    pub fn bind(
        &mut self,
        file: Option<&ConfigFile>,
        log: Option<&LogSource>,
        fallback: BindFallback<'_, T>,
    ) -> Result<&mut Self, BindError> {
        self.bind_elements(file, log, fallback, None)?;
        Ok(self)
    }

    fn bind_elements(
        &mut self,
        file: Option<&ConfigFile>,
        log: Option<&LogSource>,
        fallback: BindFallback<'_, T>,
        switch: Option<ProfileSwitch>,
    ) -> Result<MemberBound, BindError> {
        let log = match log.or(self.log.as_ref()) {
            Some(log) => log.clone(),
            None => log_source::resolve(None, "ConfigArray::bind"),
        };
        self.log = Some(log.clone());

        let Some(file) = file else {
            log.error("ConfigArray::bind | No settings file given, aborting");
            return Err(BindError::NoConfigFile);
        };

        if self.section_name.is_none() {
            self.section_name = fallback.section.map(str::to_string);
        }
        if self.key.is_none() {
            self.key = Some(match fallback.key {
                Some(key) => key.to_string(),
                None => {
                    log.warn(&format!("ConfigArray::bind | No key given, using '{DEFAULT_NAME}'"));
                    DEFAULT_NAME.to_string()
                }
            });
        }
        if self.description.is_none() {
            self.description = fallback.description.map(str::to_string);
        }
        if self.default_value.is_none() {
            self.default_value = fallback.default_value;
        }
        let key = self.key.clone().unwrap_or_else(|| DEFAULT_NAME.to_string());

        let mut first_error = None;
        let mut bound = MemberBound {
            definitions: Vec::with_capacity(self.elements.len()),
            newly_bound: false,
        };
        for (index, element) in self.elements.iter_mut().enumerate() {
            let previous = match switch {
                Some(_) if !element.is_bound_to(file) => element.unbind().map(|entry| entry.value()),
                _ => None,
            };
            bound.newly_bound |= !element.is_bound_to(file);

            element.set_declaration(
                self.section_name.clone(),
                format!("{key}_{index}"),
                self.description.clone(),
                self.default_value.clone(),
                self.acceptable_values.clone(),
                self.tags.clone(),
            );
            match element.bind(Some(file), Some(&log), BindFallback::default()) {
                Ok(element) => {
                    if let (Some(ProfileSwitch::CarryValues), Some(previous)) = (switch, previous) {
                        element.set_value(previous);
                    }
                    bound.definitions.extend(element.definition().cloned());
                }
                Err(e) => {
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(bound),
        }
    }

    pub fn unbind(&mut self) {
        for element in &mut self.elements {
            element.unbind();
        }
    }

    pub fn get(&self, index: usize) -> Option<&ConfigData<T>> {
        self.elements.get(index)
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ConfigData<T>> {
        self.elements.iter()
    }

    pub fn values(&self) -> Vec<T> {
        self.elements.iter().map(ConfigData::value).collect()
    }

    pub fn section_name(&self) -> Option<&str> {
        self.section_name.as_deref()
    }

    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }
}

impl<T: SettingValue> std::ops::Index<usize> for ConfigArray<T> {
    type Output = ConfigData<T>;

    fn index(&self, index: usize) -> &ConfigData<T> {
        &self.elements[index]
    }
}

impl<T: SettingValue> Default for ConfigArray<T> {
    fn default() -> Self {
        Self::new(0)
    }
}

impl<T: SettingValue> BindableMember for ConfigArray<T> {
    fn bind_member(&mut self, binding: &MemberBinding<'_>) -> Result<MemberBound, BindError> {
        self.bind_elements(
            Some(binding.file),
            Some(binding.log),
            BindFallback {
                section: binding.section,
                key: Some(binding.name),
                ..BindFallback::default()
            },
            None,
        )
    }

    fn unbind_member(&mut self) {
        self.unbind();
    }

    fn switch_member(&mut self, binding: &MemberBinding<'_>, switch: ProfileSwitch) -> Result<MemberBound, BindError> {
        self.bind_elements(
            Some(binding.file),
            Some(binding.log),
            BindFallback {
                section: binding.section,
                key: Some(binding.name),
                ..BindFallback::default()
            },
            Some(switch),
        )
    }
}

impl<T: SettingValue> fmt::Debug for ConfigArray<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigArray")
            .field("section_name", &self.section_name)
            .field("key", &self.key)
            .field("elements", &self.elements)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_elements_use_indexed_keys() {
        let file = ConfigFile::in_memory();
        let mut array = ConfigArray::new(3).with_section("Arrays").with_key("Slot").with_default(5u8);
        array.bind(Some(&file), None, BindFallback::default()).unwrap();

        assert_eq!(array.len(), 3);
        assert_eq!(file.keys().iter().map(|d| d.key.as_str()).collect::<Vec<_>>(), vec!["Slot_0", "Slot_1", "Slot_2"]);
        assert_eq!(array.values(), vec![5, 5, 5]);
        array[1].set_value(9);
        assert_eq!(file.get::<u8>("Arrays", "Slot_1").map(|e| e.value()), Some(9));
    }

    #[test]
    fn test_own_declaration_wins_over_fallback() {
        let file = ConfigFile::in_memory();
        let mut array = ConfigArray::new(1).with_key("Own").with_default(1);
        array
            .bind(
                Some(&file),
                None,
                BindFallback {
                    section: Some("Fallback"),
                    key: Some("Other"),
                    description: Some("desc"),
                    default_value: Some(2),
                },
            )
            .unwrap();

        let definition = array[0].definition().unwrap();
        assert_eq!(definition.to_string(), "[Fallback] Own_0");
        assert_eq!(array[0].value(), 1);
        assert_eq!(array[0].description(), Some("desc"));
    }

    #[test]
    fn test_events_are_relayed_per_element() {
        let file = ConfigFile::in_memory();
        let mut array = ConfigArray::new(2).with_key("K").with_default(0i64);
        let binds = Arc::new(AtomicUsize::new(0));
        let changes = Arc::new(AtomicUsize::new(0));

        let bind_counter = Arc::clone(&binds);
        let _post = array.on_post_bind(move |_| {
            bind_counter.fetch_add(1, Ordering::SeqCst);
        });
        let change_counter = Arc::clone(&changes);
        let _changed = array.on_setting_changed(move |_| {
            change_counter.fetch_add(1, Ordering::SeqCst);
        });

        array.bind(Some(&file), None, BindFallback::default()).unwrap();
        array.bind(Some(&file), None, BindFallback::default()).unwrap();
        array[0].set_value(1);
        array[1].set_value(2);

        assert_eq!(binds.load(Ordering::SeqCst), 2);
        assert_eq!(changes.load(Ordering::SeqCst), 2);
    }
}
