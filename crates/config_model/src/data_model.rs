//! Declarative models: a set of [`ConfigData`](crate::ConfigData) members
//! bound together under one section.

use crate::log_source::{self, LogSource};
use crate::member::{BindableMember, MemberBinding, MemberRegistry, ProfileSwitch};
use crate::report::{BindReport, MemberStatus};
use config_store::{ConfigFile, Event, Subscription};
use std::fmt;
use std::ops::{Deref, DerefMut};

/// Settings a model's hooks may adjust before members are bound.
#[derive(Debug, Clone, Default)]
pub struct ModelContext {
    pub section_name: Option<String>,
    pub log: Option<LogSource>,
}

/// A type whose members are [`BindableMember`]s.
///
/// ```
/// use config_model::{ConfigData, DataModel, MemberRegistry, ModelContext};
///
/// #[derive(Default)]
/// struct Audio {
///     volume: ConfigData<f32>,
///     muted: ConfigData<bool>,
/// }
///
/// impl DataModel for Audio {
///     fn register<'a>(&'a mut self, members: &mut MemberRegistry<'a>) {
///         members.member("Volume", &mut self.volume).member("Muted", &mut self.muted);
///     }
///
///     fn set_defaults(&mut self, ctx: &mut ModelContext) {
///         ctx.section_name = Some("Audio".into());
///         self.volume = ConfigData::new().with_default(0.8).with_range(0.0, 1.0);
///     }
/// }
/// ```
pub trait DataModel: 'static {
    fn register<'a>(&'a mut self, members: &mut MemberRegistry<'a>);

    /// Runs once per model instance, before the first bind.
    fn set_defaults(&mut self, _ctx: &mut ModelContext) {}

    /// Runs on every bind, before the file is checked.
    fn on_model_create(&mut self, _file: Option<&ConfigFile>, _ctx: &mut ModelContext) {}
}

/// Binds a [`DataModel`] to a [`ConfigFile`] and keeps track of where it is bound.
pub struct ConfigDataModel<M: DataModel> {
    model: M,
    section_name: Option<String>,
    log: Option<LogSource>,
    file: Option<ConfigFile>,
    defaults_set: bool,
    last_report: Option<BindReport>,
    pre_bind: Event<ConfigDataModel<M>>,
    post_bind: Event<ConfigDataModel<M>>,
}

#[derive(Clone, Copy)]
enum Pass {
    Bind,
    Switch(ProfileSwitch),
}

impl<M: DataModel> ConfigDataModel<M> {
    pub fn new(model: M) -> Self {
        Self {
            model,
            section_name: None,
            log: None,
            file: None,
            defaults_set: false,
            last_report: None,
            pre_bind: Event::new(),
            post_bind: Event::new(),
        }
    }

    pub fn with_section(mut self, section: impl Into<String>) -> Self {
        self.section_name = Some(section.into());
        self
    }

    pub fn with_log_source(mut self, log: LogSource) -> Self {
        self.log = Some(log);
        self
    }

    /// Listener run once before the members are bound, on every bind.
    pub fn on_pre_bind<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&ConfigDataModel<M>) + Send + Sync + 'static,
    {
        self.pre_bind.subscribe(listener)
    }

    /// Listener run once after the members are bound, on every bind.
    pub fn on_post_bind<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&ConfigDataModel<M>) + Send + Sync + 'static,
    {
        self.post_bind.subscribe(listener)
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn model_mut(&mut self) -> &mut M {
        &mut self.model
    }

    pub fn into_inner(self) -> M {
        self.model
    }

    pub fn section_name(&self) -> Option<&str> {
        self.section_name.as_deref()
    }

    pub fn log_source(&self) -> Option<&LogSource> {
        self.log.as_ref()
    }

    pub fn config_file(&self) -> Option<&ConfigFile> {
        self.file.as_ref()
    }

    pub fn defaults_set(&self) -> bool {
        self.defaults_set
    }

    pub fn last_report(&self) -> Option<&BindReport> {
        self.last_report.as_ref()
    }

    /// Registered member names, instance members first.
    pub fn members(&mut self) -> Vec<String> {
        let mut registry = MemberRegistry::new();
        self.model.register(&mut registry);
        registry.names().into_iter().map(str::to_string).collect()
    }

    /// Binds every member to `file`.
    ///
    /// `set_defaults` runs first if it has not yet; `section` and `log` then
    /// replace the model's current values when given.
    /// Members that carry their own section or key keep them; the others use
    /// the model's section and their registered name.
    pub fn bind_model(
        &mut self,
        file: Option<&ConfigFile>,
        section: Option<&str>,
        log: Option<&LogSource>,
    ) -> BindReport {
        self.init();
        if let Some(section) = section {
            self.section_name = Some(section.to_string());
        }
        if let Some(log) = log {
            self.log = Some(log.clone());
        }
        self.run(file, Pass::Bind)
    }

    /// Moves every member to `file`, for switching between profiles.
    ///
    /// Each member is unbound from its current file first, so the model ends
    /// up reading and writing `file` only.
    pub fn set_config_file(&mut self, file: &ConfigFile, switch: ProfileSwitch) -> BindReport {
        self.init();
        if self.log.is_none() {
            self.log = Some(log_source::resolve(None, "ConfigDataModel::set_config_file"));
        }
        if self.section_name.is_none() {
            if let Some(log) = &self.log {
                log.warn(&format!(
                    "ConfigDataModel::set_config_file | Section name is not set, using '{}'",
                    crate::data::DEFAULT_NAME
                ));
            }
            self.section_name = Some(crate::data::DEFAULT_NAME.to_string());
        }
        self.run(Some(file), Pass::Switch(switch))
    }

    /// Unbinds every member, leaving the model detached from any file.
    pub fn unbind_model(&mut self) {
        let mut registry = MemberRegistry::new();
        self.model.register(&mut registry);
        registry.unbind_all();
        self.file = None;
    }

    fn init(&mut self) {
        if self.defaults_set {
            return;
        }
        let mut ctx = self.context();
        self.model.set_defaults(&mut ctx);
        self.apply_context(ctx);
        self.defaults_set = true;
    }

    fn context(&self) -> ModelContext {
        ModelContext {
            section_name: self.section_name.clone(),
            log: self.log.clone(),
        }
    }

    fn apply_context(&mut self, ctx: ModelContext) {
        self.section_name = ctx.section_name;
        self.log = ctx.log;
    }

    fn run(&mut self, file: Option<&ConfigFile>, pass: Pass) -> BindReport {
        let mut ctx = self.context();
        self.model.on_model_create(file, &mut ctx);
        self.apply_context(ctx);

        let Some(file) = file else {
            let message = format!(
                "Unable to bind model {}, no settings file given",
                std::any::type_name::<M>()
            );
            self.log.clone().unwrap_or_default().error(&message);
            let report = BindReport::aborted(message);
            self.last_report = Some(report.clone());
            return report;
        };

        if let (Pass::Bind, Some(current)) = (pass, &self.file) {
            if !current.ptr_eq(file) {
                let message = format!(
                    "Model {} is already bound to {current}, use set_config_file to move it to {file}",
                    std::any::type_name::<M>()
                );
                self.log.clone().unwrap_or_default().error(&message);
                let report = BindReport::aborted(message);
                self.last_report = Some(report.clone());
                return report;
            }
        }

        self.pre_bind.clone().emit(self);

        let log = match &self.log {
            Some(log) => log.clone(),
            None => log_source::resolve(None, "ConfigDataModel::bind_model"),
        };
        let section = self.section_name.clone();

        let mut registry = MemberRegistry::new();
        self.model.register(&mut registry);
        let members = registry.bind_all(&log, |name, member: &mut dyn BindableMember| {
            let binding = MemberBinding {
                file,
                log: &log,
                section: section.as_deref(),
                name,
            };
            match pass {
                Pass::Bind => member.bind_member(&binding),
                Pass::Switch(switch) => member.switch_member(&binding, switch),
            }
        });
        drop(registry);

        let attached = members.is_empty()
            || members
                .iter()
                .any(|m| matches!(m.status, MemberStatus::Bound | MemberStatus::Unchanged));
        if attached {
            self.file = Some(file.clone());
        } else if let Pass::Switch(_) = pass {
            self.file = None;
        }

        let report = BindReport { aborted: None, members };
        log.debug(&format!("Bound model {}: {}", std::any::type_name::<M>(), report));
        self.last_report = Some(report.clone());

        self.post_bind.clone().emit(self);
        report
    }
}

impl<M: DataModel + Default> Default for ConfigDataModel<M> {
    fn default() -> Self {
        Self::new(M::default())
    }
}

impl<M: DataModel> Deref for ConfigDataModel<M> {
    type Target = M;

    fn deref(&self) -> &M {
        &self.model
    }
}

impl<M: DataModel> DerefMut for ConfigDataModel<M> {
    fn deref_mut(&mut self) -> &mut M {
        &mut self.model
    }
}

impl<M: DataModel + fmt::Debug> fmt::Debug for ConfigDataModel<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigDataModel")
            .field("model", &self.model)
            .field("section_name", &self.section_name)
            .field("file", &self.file)
            .field("defaults_set", &self.defaults_set)
            .finish()
    }
}
