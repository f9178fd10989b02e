use config_model::{
    ConfigFileExt, ConfigFileModel, EntryAttributes, EntryRegistry, FileModel, FileModelHooks, MemberStatus,
    ModelEntry, OrphanContext, PostBindContext, PreBindContext, NO_DESCRIPTION,
};
use config_store::{setting_enum, AcceptableValues, ConfigFile, ConfigReloadedEvent, SettingChangedEvent};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

setting_enum! {
    pub enum TestEnum {
        IndexA = -1,
        #[default]
        IndexB = 0,
        IndexC = 1,
        IndexD = 2,
    }
}

struct Mismatched {
    rounded: ModelEntry<i32>,
    bad_text: ModelEntry<i32>,
    from_int: ModelEntry<f32>,
    enum_ok: ModelEntry<TestEnum>,
    enum_bad: ModelEntry<TestEnum>,
    text: ModelEntry<String>,
    clamped: ModelEntry<u8>,
}

impl Default for Mismatched {
    fn default() -> Self {
        Self {
            rounded: ModelEntry::new(),
            bad_text: ModelEntry::new(),
            from_int: ModelEntry::new(),
            enum_ok: ModelEntry::new(),
            enum_bad: ModelEntry::new(),
            text: ModelEntry::new(),
            clamped: ModelEntry::new().with_acceptable_values(Some(AcceptableValues::range(0, 10))),
        }
    }
}

impl FileModel for Mismatched {
    fn section_name(&self) -> Option<&str> {
        Some("Mismatched")
    }

    fn register<'a>(&'a mut self, entries: &mut EntryRegistry<'a>) {
        entries
            .entry("Rounded", &mut self.rounded, EntryAttributes::new().description("d").default_value(1.7))
            .entry("BadText", &mut self.bad_text, EntryAttributes::new().description("d").default_value("abc"))
            .entry("FromInt", &mut self.from_int, EntryAttributes::new().description("d").default_value(10))
            .entry("EnumOk", &mut self.enum_ok, EntryAttributes::new().description("d").default_value(2))
            .entry("EnumBad", &mut self.enum_bad, EntryAttributes::new().description("d").default_value(2000))
            .entry("Text", &mut self.text, EntryAttributes::new().default_value(20))
            .entry("Clamped", &mut self.clamped, EntryAttributes::new().description("d").default_value(50));
    }
}

#[test]
fn test_default_conversions() {
    let file = ConfigFile::in_memory();
    let model: ConfigFileModel<Mismatched> = file.bind_file_model(None, None);

    assert_eq!(model.rounded.value(), 2);
    assert_eq!(model.bad_text.value(), 0);
    assert_eq!(model.from_int.value(), 10.0);
    assert_eq!(model.enum_ok.value(), TestEnum::IndexD);
    assert_eq!(model.enum_bad.value(), TestEnum::IndexB);
    assert_eq!(model.text.value(), "20");
    assert_eq!(model.text.entry().unwrap().description().description, NO_DESCRIPTION);
    assert_eq!(model.clamped.value(), 10);
    assert!(model.last_report().is_some_and(|r| r.is_success()));
}

#[derive(Default)]
struct Tracked {
    speed: ModelEntry<i32>,
    name: ModelEntry<String>,
}

impl FileModel for Tracked {
    fn section_name(&self) -> Option<&str> {
        Some("Tracked")
    }

    fn register<'a>(&'a mut self, entries: &mut EntryRegistry<'a>) {
        entries
            .entry("Speed", &mut self.speed, EntryAttributes::new().description("Speed").default_value(5))
            .entry("Name", &mut self.name, EntryAttributes::new().description("Name").default_value("anon"));
    }
}

#[derive(Clone, Default)]
struct Recorder {
    calls: Arc<Mutex<Vec<String>>>,
}

impl Recorder {
    fn push(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.calls.lock().unwrap())
    }
}

impl FileModelHooks for Recorder {
    fn pre_bind(&mut self, ctx: &mut PreBindContext<'_>) {
        self.push(format!("pre {}", ctx.member));
    }

    fn post_bind(&mut self, ctx: &PostBindContext<'_>) {
        self.push(format!("post {}", ctx.entry.definition()));
    }

    fn on_config_reloaded(&mut self, _file: &ConfigFile, event: &ConfigReloadedEvent) {
        self.push(format!("reloaded {}", event.orphaned));
    }

    fn on_setting_changed(&mut self, _file: &ConfigFile, event: &SettingChangedEvent) {
        self.push(format!("changed {} -> {}", event.definition.key, event.new_value));
    }

    fn on_orphaned_entry(&mut self, orphan: &OrphanContext<'_>) {
        self.push(format!("orphan {} '{}' {}", orphan.member, orphan.stored_value, orphan.entry.setting_type()));
    }

    fn on_config_file_migration(&mut self, old: &ConfigFile, new: &ConfigFile) {
        self.push(format!("migrated {} -> {}", old.len(), new.len()));
    }
}

#[test]
fn test_hooks_run_around_each_member() {
    let recorder = Recorder::default();
    let file = ConfigFile::in_memory();
    let mut model = ConfigFileModel::with_hooks(Tracked::default(), recorder.clone());
    model.bind(Some(&file), None, None);

    assert_eq!(
        recorder.take(),
        vec!["pre Speed", "post [Tracked] Speed", "pre Name", "post [Tracked] Name"]
    );

    model.speed.set_value(8);
    assert_eq!(recorder.take(), vec!["changed Speed -> 8"]);
}

#[test]
fn test_orphan_hook_only_for_model_members() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("orphans.cfg");
    let file = ConfigFile::new(&path, true).unwrap();
    let recorder = Recorder::default();
    let mut model = ConfigFileModel::with_hooks(Tracked::default(), recorder.clone());
    model.bind(Some(&file), None, None);
    recorder.take();

    std::fs::write(
        &path,
        "[Tracked]\nSpeed = fast\nName = bob\nUnrelated = 1\n\n[Other]\nThing = 2\n",
    )
    .unwrap();
    file.reload().unwrap();

    assert_eq!(model.speed.value(), 5);
    assert_eq!(model.name.value(), "bob");
    assert_eq!(
        recorder.take(),
        vec!["changed Name -> bob", "reloaded 3", "orphan Speed 'fast' i32"]
    );
}

#[test]
fn test_subscribes_once_per_file() {
    let recorder = Recorder::default();
    let file = ConfigFile::in_memory();
    let mut model = ConfigFileModel::with_hooks(Tracked::default(), recorder.clone());
    model.bind(Some(&file), None, None);
    model.bind(Some(&file), None, None);
    recorder.take();

    file.reload_from_str("[Tracked]\nSpeed = 6\n");
    assert_eq!(recorder.take(), vec!["changed Speed -> 6", "reloaded 0"]);
}

struct Redirect {
    target: ConfigFile,
}

impl FileModelHooks for Redirect {
    fn pre_bind(&mut self, ctx: &mut PreBindContext<'_>) {
        match ctx.member {
            "Speed" => {
                ctx.section = "Moved".to_string();
                ctx.key = "Velocity".to_string();
                ctx.description = "rewritten".to_string();
                if let Some(default) = ctx.default_value_mut::<i32>() {
                    *default = 99;
                }
                ctx.file = self.target.clone();
            }
            _ => {
                assert!(ctx.default_value::<i32>().is_none());
                assert_eq!(ctx.setting_type(), "String");
                ctx.use_standard_binding = false;
            }
        }
    }

    fn post_bind(&mut self, ctx: &PostBindContext<'_>) {
        assert_eq!(ctx.member, "Speed");
    }
}

#[test]
fn test_pre_bind_hook_overrides() {
    let file = ConfigFile::in_memory();
    let target = ConfigFile::in_memory();
    let mut model = ConfigFileModel::with_hooks(
        Tracked::default(),
        Redirect {
            target: target.clone(),
        },
    );
    let report = model.bind(Some(&file), None, None);

    assert_eq!(report.member("Name").map(|m| &m.status), Some(&MemberStatus::Skipped));
    assert!(!model.name.is_bound());
    assert!(file.is_empty());

    let speed = target.get::<i32>("Moved", "Velocity").unwrap();
    assert_eq!(speed.value(), 99);
    assert_eq!(speed.description().description, "rewritten");
    assert_eq!(model.speed.value(), 99);
}

#[test]
fn test_change_config_file_moves_members() {
    let recorder = Recorder::default();
    let first = ConfigFile::in_memory();
    let second = ConfigFile::in_memory();
    second.reload_from_str("[Tracked]\nSpeed = 12\n");

    let mut model = ConfigFileModel::with_hooks(Tracked::default(), recorder.clone());
    model.bind(Some(&first), None, None);
    model.change_config_file(&second);
    recorder.take();

    assert_eq!(model.speed.value(), 12);
    assert!(model.config_file().is_some_and(|f| f.ptr_eq(&second)));

    first.get::<i32>("Tracked", "Speed").unwrap().set_value(1);
    assert!(recorder.take().is_empty());
    model.speed.set_value(13);
    assert_eq!(recorder.take(), vec!["changed Speed -> 13"]);
}

#[test]
fn test_migration_hook_sees_both_files() {
    let recorder = Recorder::default();
    let first = ConfigFile::in_memory();
    let second = ConfigFile::in_memory();
    let mut model = ConfigFileModel::with_hooks(Tracked::default(), recorder.clone());
    model.bind(Some(&first), None, None);
    recorder.take();

    model.change_config_file(&second);
    let calls = recorder.take();
    assert_eq!(calls.last().map(String::as_str), Some("migrated 2 -> 2"));
}

struct Faulty;

impl FileModelHooks for Faulty {
    fn pre_bind(&mut self, ctx: &mut PreBindContext<'_>) {
        if ctx.member == "Speed" {
            panic!("no speed today");
        }
    }
}

#[test]
fn test_panicking_hook_fails_only_its_member() {
    let file = ConfigFile::in_memory();
    let mut model = ConfigFileModel::with_hooks(Tracked::default(), Faulty);
    let report = model.bind(Some(&file), None, None);

    assert!(matches!(
        report.member("Speed").map(|m| &m.status),
        Some(MemberStatus::Failed(message)) if message.contains("no speed today")
    ));
    assert!(!model.speed.is_bound());
    assert_eq!(model.name.value(), "anon");
}
