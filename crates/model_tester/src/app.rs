//! Main application logic for the model tester.
//!
//! `Application` loads the tester configuration, opens the settings files
//! and runs each model check against them in turn.

use crate::{
    cli::CliArgs,
    config::TesterConfig,
    logging::display_banner,
    models::{CdTestModel, CdTestStaticModel, ConfigModelTestModel, ExampleModel, TestModelHooks, STATIC_VAR1, STATIC_VAR2},
};
use anyhow::Context;
use config_model::{ConfigData, ConfigDataModel, ConfigFileExt, ConfigFileModel, LogSource, ProfileSwitch};
use config_store::{utils::lock, ConfigDescription, ConfigFile};
use tracing::{info, warn};

/// Owns the settings files the checks bind to.
pub struct Application {
    config: TesterConfig,
    store: ConfigFile,
    profile: ConfigFile,
    log: LogSource,
}

impl Application {
    /// Loads configuration, applies CLI overrides, validates the result and
    /// opens both settings files.
    pub fn new(args: CliArgs) -> anyhow::Result<Self> {
        info!("🔧 Loading configuration from: {}", args.config_path.display());
        let mut config = TesterConfig::load_from_file(&args.config_path)?;

        if let Some(store_path) = args.store_path {
            config.store.path = store_path;
        }
        if let Some(profile_path) = args.profile_path {
            config.store.profile_path = profile_path;
        }
        if let Some(log_level) = args.log_level {
            config.logging.level = log_level;
        }
        if args.json_logs {
            config.logging.json_format = true;
        }
        if args.in_memory {
            config.store.in_memory = true;
        }

        config
            .validate()
            .map_err(|e| anyhow::anyhow!("Configuration validation failed: {e}"))?;
        info!("✅ Configuration loaded and validated successfully");

        display_banner();

        let (store, profile) = Self::open_stores(&config)?;
        info!("📂 Settings: {} | Profile: {}", store, profile);

        Ok(Self {
            log: LogSource::new(config.store.owner.as_str()),
            config,
            store,
            profile,
        })
    }

    fn open_stores(config: &TesterConfig) -> anyhow::Result<(ConfigFile, ConfigFile)> {
        if config.store.in_memory {
            return Ok((ConfigFile::in_memory(), ConfigFile::in_memory()));
        }

        let open = |path: &std::path::Path| -> anyhow::Result<ConfigFile> {
            let file = ConfigFile::with_owner(path, true, config.store.owner.as_str())
                .with_context(|| format!("opening settings file {}", path.display()))?;
            file.set_save_on_set(config.store.save_on_set);
            Ok(file)
        };
        Ok((open(&config.store.path)?, open(&config.store.profile_path)?))
    }

    pub fn store(&self) -> &ConfigFile {
        &self.store
    }

    /// Runs every check. Binding problems are logged by the models; only
    /// failures of the tester itself are returned.
    pub fn run(self) -> anyhow::Result<()> {
        info!("🌟 Starting config model checks");

        self.log.warn("ConfigModelTests: With Logger");
        self.check_file_model(Some(&self.log));
        self.log.warn("ConfigModelTests: Without Logger");
        self.check_file_model(None);

        self.check_data_models()?;
        self.check_example_model()?;

        if self.store.path().is_some() {
            self.store.reload().context("reloading settings file")?;
        }

        info!(
            "✅ Checks finished: {} settings in {}, {} in {}",
            self.store.len(),
            self.store,
            self.profile.len(),
            self.profile
        );
        Ok(())
    }

    fn check_file_model(&self, log: Option<&LogSource>) {
        let hooks_log = log.cloned().unwrap_or_default();

        let mut last = None;
        for section in &self.config.models.file_model_sections {
            let mut model =
                ConfigFileModel::with_hooks(ConfigModelTestModel::default(), TestModelHooks::new(hooks_log.clone()));
            let report = model.bind(Some(&self.store), Some(section.as_str()), log);
            if !report.is_success() {
                warn!("⚠️ ConfigModelTestModel in [{}]: {}", section, report);
            }
            last = Some(model);
        }

        let mut renamed =
            ConfigFileModel::with_hooks(ConfigModelTestModel::default(), TestModelHooks::new(hooks_log.clone()));
        renamed.bind(Some(&self.store), None, log);
        hooks_log.info(&format!(
            "ConfigModelTest: declared section renamed to {}",
            renamed.section_name().unwrap_or_default()
        ));

        let Some(cmt) = last else {
            return;
        };
        hooks_log.info(&format!(
            "ConfigModelTest: model type = {}",
            std::any::type_name::<ConfigModelTestModel>()
        ));
        hooks_log.info(&format!("ConfigModelTest: ModelName = {}", cmt.model_name.value()));
        hooks_log.info(&format!("ConfigModelTest: ModelValue1 = {}", cmt.model_value1.value()));
        hooks_log.info(&format!("ConfigModelTest: ModelValue2 = {}", cmt.model_value2.value()));
        hooks_log.info(&format!("ConfigModelTest: ModelValue3 = {}", cmt.model_value3.value()));
        hooks_log.info(&format!("ConfigModelTest: ModelValue4 = {}", cmt.model_value4.value()));
        hooks_log.info(&format!("ConfigModelTest: ModelValue5 = {:?}", cmt.model_value5.value()));
        hooks_log.info(&format!("ConfigModelTest: ModelValue6 = {}", cmt.model_value6.value()));
        hooks_log.info(&format!("ConfigModelTest: ModelValue7 = {}", cmt.model_value7.value()));
        hooks_log.info(&format!("ConfigModelTest: ModelValue8 = {:?}", cmt.model_value8.value()));
    }

    fn check_data_models(&self) -> anyhow::Result<()> {
        let log = &self.log;

        let mut model = ConfigDataModel::new(CdTestModel::default()).with_log_source(log.clone());
        model.bind_model(Some(&self.store), None, None);
        log.info("CDM Tests: model init completed.");
        log.info(&format!("CDM Tests: model.ConfigOption1={}", model.config_option1.value()));
        model.config_option1.set_value(20.0);
        log.info(&format!("CDM Tests: model.ConfigOption1={}", model.config_option1.value()));

        let pre_init = model.config_option2.as_ref().map(ConfigData::value).unwrap_or_default();
        log.info(&format!("CDM Tests Pre-Init: model.ConfigOption2={pre_init}"));
        let section = model.section_name().unwrap_or_default().to_string();
        model.config_option2 = Some(
            ConfigData::new()
                .with_key("ConfigOption2")
                .with_default(10.0)
                .with_description("hello")
                .with_section(section)
                .into_bound(&self.store, Some(log))?,
        );
        let post_init = model.config_option2.as_ref().map(ConfigData::value).unwrap_or_default();
        log.info(&format!("CDM Tests Post-Init: model.ConfigOption2={post_init}"));

        let models = &self.config.models;
        let array = self.store.bind_array(
            Some(log),
            models.array_size,
            &models.array_section,
            "testArray",
            "description",
            10i32,
        );
        if let Some(element) = array.get(3) {
            log.info(&format!("Array test, index: 3 | value={}", element.value()));
        }

        self.store
            .bind("standardInitTest", "test1", false, ConfigDescription::default())
            .context("binding standardInitTest")?;

        let _statics: ConfigDataModel<CdTestStaticModel> = self.store.bind_data_model(Some(log), None);
        log.info(&format!("CDM Tests Post-Init: STATIC var1={}", lock(&STATIC_VAR1).value()));
        log.info(&format!("CDM Tests Post-Init: STATIC var2={}", lock(&STATIC_VAR2).value()));
        Ok(())
    }

    fn check_example_model(&self) -> anyhow::Result<()> {
        let log = &self.log;

        let section = self.config.models.example_section.as_deref();
        let mut model: ConfigDataModel<ExampleModel> = self.store.bind_data_model(Some(log), section);
        log.info("ExamplePlugin: model init completed.");
        log.info(&format!("ExamplePlugin: model.ConfigOption1={}", model.config_option1.value()));
        model.config_option2.set_value(20.0);
        log.info(&format!("ExamplePlugin: model.ConfigOption2={}", model.config_option2.value()));

        let section = model.section_name().unwrap_or_default().to_string();
        let post_log = log.clone();
        model.config_option3 = ConfigData::new()
            .with_key("ConfigOption3")
            .with_default(10)
            .with_description("hello")
            .with_section(section)
            .on_post_bind(move |_| post_log.info("ExamplePlugin: ConfigOption3 is now bound!"));
        model.config_option3.bind(Some(&self.store), Some(log), Default::default())?;

        let changed_log = log.clone();
        let _changes = model
            .config_option3
            .on_setting_changed(move |_| changed_log.info("ExamplePlugin: ConfigOption3 got changed!"));

        if let Some(entry) = model.config_option3.entry() {
            entry.set_value(1);
        }
        log.info(&format!("ExamplePlugin: model.ConfigOption3={}", model.config_option3.value()));

        let report = model.set_config_file(&self.profile, ProfileSwitch::CarryValues);
        if report.is_success() {
            log.info(&format!(
                "ExamplePlugin: switched to {} with ConfigOption3={}",
                self.profile,
                model.config_option3.value()
            ));
        } else {
            log.warn(&format!("ExamplePlugin: profile switch incomplete: {report}"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn args(dir: &TempDir) -> CliArgs {
        CliArgs {
            config_path: dir.path().join("tester.toml"),
            store_path: Some(dir.path().join("plugin.cfg")),
            profile_path: Some(dir.path().join("profile2.cfg")),
            log_level: Some("debug".to_string()),
            json_logs: false,
            in_memory: false,
        }
    }

    #[test]
    fn test_run_writes_both_files() {
        let dir = TempDir::new().unwrap();
        let app = Application::new(args(&dir)).unwrap();
        app.run().unwrap();

        let plugin = std::fs::read_to_string(dir.path().join("plugin.cfg")).unwrap();
        assert!(plugin.starts_with("## Settings file was created by plugin model_tester"));
        assert!(plugin.contains("[TestSection2]"));
        assert!(plugin.contains("[Example_Section]"));
        assert!(plugin.contains("[wololoo]"));
        assert!(plugin.contains("ConfigOption1 = 20"));
        assert!(plugin.contains("testArray_19 = 10"));
        assert!(plugin.contains("# Acceptable values: IndexA, IndexB, IndexC, IndexD"));

        let profile = std::fs::read_to_string(dir.path().join("profile2.cfg")).unwrap();
        assert!(profile.contains("[Example Section]"));
        assert!(profile.contains("ConfigOption3 = 1"));
        assert!(profile.contains("Config_Variable_Name = 20"));
    }

    #[test]
    fn test_in_memory_run_touches_no_settings_file() {
        let dir = TempDir::new().unwrap();
        let mut args = args(&dir);
        args.in_memory = true;

        let app = Application::new(args).unwrap();
        let store = app.store().clone();
        app.run().unwrap();

        assert!(!dir.path().join("plugin.cfg").exists());
        assert!(store.get::<bool>("standardInitTest", "test1").is_some());
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let dir = TempDir::new().unwrap();
        let mut args = args(&dir);
        args.log_level = Some("chatty".to_string());
        assert!(Application::new(args).is_err());

        let mut args = self::args(&dir);
        args.profile_path = args.store_path.clone();
        assert!(Application::new(args).is_err());
    }
}
