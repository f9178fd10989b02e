//! Models exercised by the tester.
//!
//! Each one covers a different way of declaring settings: plain wrappers
//! with constraints, wrappers declared in `set_defaults` with bind
//! listeners, process-wide statics, and an attribute-driven model with
//! deliberately mismatched defaults.

use config_model::{
    ConfigData, DataModel, EntryAttributes, EntryRegistry, FileModel, FileModelHooks, LogSource, MemberRegistry,
    ModelContext, ModelEntry, OrphanContext, PostBindContext, PreBindContext,
};
use config_store::{setting_enum, ConfigFile, ConfigReloadedEvent, SettingChangedEvent};
use once_cell::sync::Lazy;
use std::sync::Mutex;

/// Declarative example: a plain wrapper, a constrained wrapper with its own
/// key and a member left without any declaration.
#[derive(Debug, Default)]
pub struct ExampleModel {
    pub config_option1: ConfigData<f32>,
    pub config_option2: ConfigData<f32>,
    pub config_option3: ConfigData<i32>,
}

impl DataModel for ExampleModel {
    fn register<'a>(&'a mut self, members: &mut MemberRegistry<'a>) {
        members
            .member("ConfigOption1", &mut self.config_option1)
            .member("ConfigOption2", &mut self.config_option2)
            .member("ConfigOption3", &mut self.config_option3);
    }

    fn set_defaults(&mut self, ctx: &mut ModelContext) {
        ctx.section_name = Some("Example Section".to_string());
        self.config_option1 = ConfigData::new().with_default(100.0).with_description("Hello");
        self.config_option2 = ConfigData::new()
            .with_key("Config_Variable_Name")
            .with_default(10.0)
            .with_description("I'm running out of flavor text")
            .with_range(0.0, 50.0)
            .on_pre_bind(|ctx| ctx.log.debug(&format!("ConfigOption2 binding to {}", ctx.file)))
            .on_post_bind(|event| event.log.debug(&format!("ConfigOption2 bound as {}", event.entry.definition())));
    }
}

/// Declarative test model. `config_option2` is declared later, after the
/// model has been bound, to show how an uninitialized member behaves.
#[derive(Debug, Default)]
pub struct CdTestModel {
    pub config_option1: ConfigData<f32>,
    pub config_option2: Option<ConfigData<f32>>,
    pub config_option3: ConfigData<f32>,
}

impl DataModel for CdTestModel {
    fn register<'a>(&'a mut self, members: &mut MemberRegistry<'a>) {
        members
            .member("ConfigOption1", &mut self.config_option1)
            .member("ConfigOption2", &mut self.config_option2)
            .member("ConfigOption3", &mut self.config_option3);
    }

    fn set_defaults(&mut self, ctx: &mut ModelContext) {
        ctx.section_name = Some("Default".to_string());
        if let Some(log) = &ctx.log {
            log.warn("CdTestModel::set_defaults | started");
        }

        self.config_option1 = ConfigData::new()
            .with_default(10.0)
            .with_description("This is a config variable")
            .with_range(0.0, 100.0)
            .on_pre_bind(|ctx| ctx.log.warn("Pre bind called for ConfigOption1"))
            .on_post_bind(|event| {
                event.log.warn(&format!(
                    "Test model loaded: {} value is {} post-bind",
                    event.entry.definition().key,
                    event.entry.value()
                ))
            });
        self.config_option3 = ConfigData::new()
            .with_default(10.0)
            .with_description("This is config variable#3")
            .with_range(0.0, 100.0);
    }

    fn on_model_create(&mut self, _file: Option<&ConfigFile>, ctx: &mut ModelContext) {
        ctx.section_name = Some("wololoo".to_string());
        if let Some(log) = &ctx.log {
            log.warn("CdTestModel::on_model_create | was run");
        }
    }
}

pub static STATIC_VAR1: Lazy<Mutex<ConfigData<f32>>> =
    Lazy::new(|| Mutex::new(ConfigData::new().with_key("var1").with_default(1.0).with_description("Testing static fields")));

pub static STATIC_VAR2: Lazy<Mutex<ConfigData<String>>> = Lazy::new(|| {
    Mutex::new(
        ConfigData::new()
            .with_key("var2")
            .with_default("henlo".to_string())
            .with_description("Testing static fields"),
    )
});

/// A model whose only members are process-wide statics.
#[derive(Debug, Default)]
pub struct CdTestStaticModel;

impl DataModel for CdTestStaticModel {
    fn register<'a>(&'a mut self, members: &mut MemberRegistry<'a>) {
        members.shared("var1", &*STATIC_VAR1).shared("var2", &*STATIC_VAR2);
    }

    fn set_defaults(&mut self, ctx: &mut ModelContext) {
        ctx.section_name = Some("Static".to_string());
    }
}

setting_enum! {
    pub enum TestEnum {
        IndexA = -1,
        #[default]
        IndexB = 0,
        IndexC = 1,
        IndexD = 2,
    }
}

pub const TEST_MODEL_SECTION: &str = "This_Is_An_Example_Test_Section";
pub const RENAMED_TEST_SECTION: &str = "Example_Section";

/// Attribute-driven test model, including members whose declared default
/// does not match their type.
#[derive(Debug, Default)]
pub struct ConfigModelTestModel {
    pub model_name: ModelEntry<String>,
    pub model_value1: ModelEntry<i32>,
    pub model_value2: ModelEntry<f32>,
    pub model_value3: ModelEntry<i32>,
    pub model_value4: ModelEntry<i32>,
    pub model_value5: ModelEntry<TestEnum>,
    pub model_value6: ModelEntry<String>,
    pub model_value7: ModelEntry<i32>,
    pub model_value8: ModelEntry<TestEnum>,
}

impl FileModel for ConfigModelTestModel {
    fn section_name(&self) -> Option<&str> {
        Some(TEST_MODEL_SECTION)
    }

    fn register<'a>(&'a mut self, entries: &mut EntryRegistry<'a>) {
        entries
            .entry(
                "ModelName",
                &mut self.model_name,
                EntryAttributes::new().description("This is the model's name").default_value("Model A"),
            )
            .entry(
                "ModelValue1",
                &mut self.model_value1,
                EntryAttributes::new().description("This is the model's first value").default_value(10),
            )
            .entry(
                "ModelValue2",
                &mut self.model_value2,
                EntryAttributes::new()
                    .description("This is the model's second value, with a custom key.")
                    .key("CustomKey_ModelValue2")
                    .default_value(5.0f32),
            )
            .entry("ModelValue3", &mut self.model_value3, EntryAttributes::new().default_value(2))
            .entry("ModelValue4", &mut self.model_value4, EntryAttributes::new().description("Hello"))
            .entry(
                "ModelValue5",
                &mut self.model_value5,
                EntryAttributes::new().description("This is an Enum").default_value(TestEnum::IndexA),
            )
            .entry(
                "ModelValue6",
                &mut self.model_value6,
                EntryAttributes::new().description("This is text with a numeric default").default_value(20),
            )
            .entry(
                "ModelValue7",
                &mut self.model_value7,
                EntryAttributes::new()
                    .description("This is primitive type with the wrong default value type")
                    .default_value(1.5f32),
            )
            .entry(
                "ModelValue8",
                &mut self.model_value8,
                EntryAttributes::new()
                    .description("This is an Enum with a bad default value")
                    .default_value(2000),
            );
    }
}

/// Hooks of [`ConfigModelTestModel`]. They log what the model sees and
/// rename the declared section when no explicit section was given.
#[derive(Debug, Clone)]
pub struct TestModelHooks {
    log: LogSource,
}

impl TestModelHooks {
    pub fn new(log: LogSource) -> Self {
        Self { log }
    }
}

impl FileModelHooks for TestModelHooks {
    fn on_model_create(&mut self, _file: Option<&ConfigFile>, section_name: &mut String) {
        if section_name == TEST_MODEL_SECTION {
            *section_name = RENAMED_TEST_SECTION.to_string();
        }
    }

    fn pre_bind(&mut self, ctx: &mut PreBindContext<'_>) {
        self.log.trace(&format!("pre-bind {} as [{}] {}", ctx.member, ctx.section, ctx.key));
    }

    fn post_bind(&mut self, ctx: &PostBindContext<'_>) {
        self.log
            .trace(&format!("post-bind {} = {}", ctx.entry.definition(), ctx.entry.serialized_value()));
    }

    fn on_config_reloaded(&mut self, file: &ConfigFile, event: &ConfigReloadedEvent) {
        self.log.info(&format!(
            "{file} reloaded: {} changed, {} orphaned",
            event.changed, event.orphaned
        ));
    }

    fn on_setting_changed(&mut self, _file: &ConfigFile, event: &SettingChangedEvent) {
        self.log.debug(&format!(
            "{} changed from {} to {}",
            event.definition, event.old_value, event.new_value
        ));
    }

    fn on_orphaned_entry(&mut self, orphan: &OrphanContext<'_>) {
        self.log.warn(&format!(
            "{} holds '{}', which is not a valid {}; keeping {}",
            orphan.definition,
            orphan.stored_value,
            orphan.entry.setting_type(),
            orphan.entry.serialized_value()
        ));
    }

    fn on_config_file_migration(&mut self, old: &ConfigFile, new: &ConfigFile) {
        self.log.info(&format!("moved from {old} to {new}"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config_model::{ConfigDataModel, ConfigFileExt, ConfigFileModel, MemberStatus};

    #[test]
    fn test_example_model_defaults() {
        let file = ConfigFile::in_memory();
        let model: ConfigDataModel<ExampleModel> = file.bind_data_model(None, None);

        assert_eq!(model.section_name(), Some("Example Section"));
        assert_eq!(model.config_option1.value(), 100.0);
        assert_eq!(model.config_option2.definition().unwrap().key, "Config_Variable_Name");
        assert_eq!(model.config_option3.value(), 0);
        model.config_option2.set_value(80.0);
        assert_eq!(model.config_option2.value(), 50.0);
    }

    #[test]
    fn test_cd_model_section_is_renamed_on_create() {
        let file = ConfigFile::in_memory();
        let model: ConfigDataModel<CdTestModel> = file.bind_data_model(None, None);

        assert_eq!(model.section_name(), Some("wololoo"));
        assert!(file.get::<f32>("wololoo", "ConfigOption1").is_some());
        let report = model.last_report().unwrap();
        assert_eq!(report.member("ConfigOption2").map(|m| &m.status), Some(&MemberStatus::Uninitialized));
        assert!(model.config_option2.as_ref().is_some_and(|data| !data.is_bound()));
    }

    #[test]
    fn test_test_model_conversions() {
        let file = ConfigFile::in_memory();
        let log = LogSource::new("test");
        let mut model = ConfigFileModel::with_hooks(ConfigModelTestModel::default(), TestModelHooks::new(log.clone()));
        model.bind(Some(&file), None, Some(&log));

        assert_eq!(model.section_name(), Some(RENAMED_TEST_SECTION));
        assert_eq!(model.model_name.value(), "Model A");
        assert_eq!(model.model_value2.entry().unwrap().definition().key, "CustomKey_ModelValue2");
        assert_eq!(model.model_value4.value(), 0);
        assert_eq!(model.model_value5.value(), TestEnum::IndexA);
        assert_eq!(model.model_value6.value(), "20");
        assert_eq!(model.model_value7.value(), 2);
        assert_eq!(model.model_value8.value(), TestEnum::IndexB);
    }

    #[test]
    fn test_explicit_section_is_kept() {
        let file = ConfigFile::in_memory();
        let mut model = ConfigFileModel::with_hooks(
            ConfigModelTestModel::default(),
            TestModelHooks::new(LogSource::default()),
        );
        model.bind(Some(&file), Some("TestSection"), None);

        assert_eq!(model.section_name(), Some("TestSection"));
        assert!(file.get::<i32>("TestSection", "ModelValue1").is_some());
    }
}
