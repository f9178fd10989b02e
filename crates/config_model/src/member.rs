//! Members of a declarative model and how a model lists them.

use crate::data::{BindFallback, ConfigData};
use crate::error::BindError;
use crate::log_source::LogSource;
use crate::report::{MemberReport, MemberStatus};
use config_store::utils::lock;
use config_store::{ConfigDefinition, ConfigFile, SettingValue};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Mutex;

/// Everything a member needs to bind itself.
#[derive(Debug, Clone, Copy)]
pub struct MemberBinding<'a> {
    pub file: &'a ConfigFile,
    pub log: &'a LogSource,
    /// The model's section, used when the member has none of its own.
    pub section: Option<&'a str>,
    /// The registered member name, used when the member has no key.
    pub name: &'a str,
}

/// Result of a successful member bind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberBound {
    pub definitions: Vec<ConfigDefinition>,
    /// False when the member was already bound to the same file.
    pub newly_bound: bool,
}

/// How [`ConfigDataModel::set_config_file`](crate::ConfigDataModel::set_config_file)
/// treats current values when moving to another file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProfileSwitch {
    /// Take whatever the new file holds (or the defaults).
    #[default]
    Rebind,
    /// Write each member's current value into the new file.
    CarryValues,
}

/// A model member that knows how to bind itself to a settings file.
pub trait BindableMember {
    fn bind_member(&mut self, binding: &MemberBinding<'_>) -> Result<MemberBound, BindError>;

    fn unbind_member(&mut self);

    /// Unbinds from the current file and binds to `binding.file`.
    fn switch_member(&mut self, binding: &MemberBinding<'_>, switch: ProfileSwitch) -> Result<MemberBound, BindError>;
}

impl<T: SettingValue> BindableMember for ConfigData<T> {
    fn bind_member(&mut self, binding: &MemberBinding<'_>) -> Result<MemberBound, BindError> {
        let newly_bound = !self.is_bound_to(binding.file);
        self.bind(
            Some(binding.file),
            Some(binding.log),
            BindFallback {
                section: binding.section,
                key: Some(binding.name),
                ..BindFallback::default()
            },
        )?;
        Ok(MemberBound {
            definitions: self.definition().cloned().into_iter().collect(),
            newly_bound,
        })
    }

    fn unbind_member(&mut self) {
        self.unbind();
    }

    fn switch_member(&mut self, binding: &MemberBinding<'_>, switch: ProfileSwitch) -> Result<MemberBound, BindError> {
        if self.is_bound_to(binding.file) {
            return self.bind_member(binding);
        }
        let previous = self.unbind().map(|entry| entry.value());
        let bound = self.bind_member(binding)?;
        if let (ProfileSwitch::CarryValues, Some(previous)) = (switch, previous) {
            self.set_value(previous);
        }
        Ok(bound)
    }
}

/// An empty slot is an uninitialized member: it is filled with a default,
/// unbound wrapper and reported as an error.
impl<M: BindableMember + Default> BindableMember for Option<M> {
    fn bind_member(&mut self, binding: &MemberBinding<'_>) -> Result<MemberBound, BindError> {
        match self {
            Some(member) => member.bind_member(binding),
            None => {
                *self = Some(M::default());
                Err(BindError::Uninitialized {
                    member: binding.name.to_string(),
                })
            }
        }
    }

    fn unbind_member(&mut self) {
        if let Some(member) = self {
            member.unbind_member();
        }
    }

    fn switch_member(&mut self, binding: &MemberBinding<'_>, switch: ProfileSwitch) -> Result<MemberBound, BindError> {
        match self {
            Some(member) => member.switch_member(binding, switch),
            None => self.bind_member(binding),
        }
    }
}

/// A member shared by every instance of a model, such as one held in a
/// `static`. Binding it from any instance binds it for all of them.
pub trait SharedMember: Sync {
    fn with_member(&self, f: &mut dyn FnMut(&mut dyn BindableMember));
}

impl<M: BindableMember + Send> SharedMember for Mutex<M> {
    fn with_member(&self, f: &mut dyn FnMut(&mut dyn BindableMember)) {
        f(&mut *lock(self));
    }
}

/// The members a model exposes for binding, in registration order.
#[derive(Default)]
pub struct MemberRegistry<'a> {
    instance: Vec<(String, &'a mut dyn BindableMember)>,
    shared: Vec<(String, &'a dyn SharedMember)>,
}

impl<'a> MemberRegistry<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn member<B: BindableMember + 'a>(&mut self, name: impl Into<String>, member: &'a mut B) -> &mut Self {
        let member: &'a mut dyn BindableMember = member;
        self.instance.push((name.into(), member));
        self
    }

    pub fn shared<S: SharedMember + 'a>(&mut self, name: impl Into<String>, member: &'a S) -> &mut Self {
        let member: &'a dyn SharedMember = member;
        self.shared.push((name.into(), member));
        self
    }

    pub fn len(&self) -> usize {
        self.instance.len() + self.shared.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn names(&self) -> Vec<&str> {
        self.instance
            .iter()
            .map(|(name, _)| name.as_str())
            .chain(self.shared.iter().map(|(name, _)| name.as_str()))
            .collect()
    }

    /// Runs `op` on every member, instance members first, and reports each outcome.
    pub(crate) fn bind_all<F>(&mut self, log: &LogSource, mut op: F) -> Vec<MemberReport>
    where
        F: FnMut(&str, &mut dyn BindableMember) -> Result<MemberBound, BindError>,
    {
        let mut reports = Vec::with_capacity(self.len());
        for (name, member) in self.instance.iter_mut() {
            let outcome = guarded(|| op(name.as_str(), &mut **member));
            reports.push(report(log, name, outcome));
        }
        for (name, member) in &self.shared {
            let mut outcome = None;
            member.with_member(&mut |member| {
                outcome = Some(guarded(|| op(name.as_str(), member)));
            });
            let outcome = outcome.unwrap_or_else(|| Err(BindError::Panicked("shared member was not visited".into())));
            reports.push(report(log, name, outcome));
        }
        reports
    }

    pub(crate) fn unbind_all(&mut self) {
        for (_, member) in self.instance.iter_mut() {
            member.unbind_member();
        }
        for (_, member) in &self.shared {
            member.with_member(&mut |member| member.unbind_member());
        }
    }
}

fn guarded<F>(op: F) -> Result<MemberBound, BindError>
where
    F: FnOnce() -> Result<MemberBound, BindError>,
{
    match catch_unwind(AssertUnwindSafe(op)) {
        Ok(result) => result,
        Err(panic_info) => Err(panic_to_error(panic_info)),
    }
}

pub(crate) fn panic_to_error(panic_info: Box<dyn std::any::Any + Send>) -> BindError {
    let message = if let Some(s) = panic_info.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic_info.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    };
    BindError::Panicked(message)
}

fn report(log: &LogSource, name: &str, outcome: Result<MemberBound, BindError>) -> MemberReport {
    match outcome {
        Ok(bound) => MemberReport {
            name: name.to_string(),
            definitions: bound.definitions,
            status: if bound.newly_bound {
                MemberStatus::Bound
            } else {
                MemberStatus::Unchanged
            },
        },
        Err(BindError::Uninitialized { member }) => {
            log.error(&format!(
                "ConfigDataModel::bind_model | Member {member} was not initialized in set_defaults, using an unbound default"
            ));
            MemberReport {
                name: name.to_string(),
                definitions: Vec::new(),
                status: MemberStatus::Uninitialized,
            }
        }
        Err(e) => {
            log.error(&format!("ConfigDataModel::bind_model | Member {name} failed to bind: {e}"));
            MemberReport {
                name: name.to_string(),
                definitions: Vec::new(),
                status: MemberStatus::Failed(e.to_string()),
            }
        }
    }
}
