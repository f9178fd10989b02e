use config_store::{
    setting_enum, AcceptableValues, ChangeSource, ConfigDescription, ConfigFile, SettingValue,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

setting_enum! {
    pub enum Quality {
        Low = 0,
        #[default]
        Medium = 1,
        High = 2,
    }
}

#[test]
fn test_value_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("plugin.cfg");

    {
        let file = ConfigFile::new(&path, true).unwrap();
        let speed = file.bind("General", "Speed", 10, ConfigDescription::new("d")).unwrap();
        speed.set_value(20);
    }

    let file = ConfigFile::new(&path, true).unwrap();
    assert_eq!(file.orphaned_entries().len(), 1);
    let speed = file.bind("General", "Speed", 10, ConfigDescription::new("d")).unwrap();
    assert_eq!(speed.value(), 20);
    assert!(file.orphaned_entries().is_empty());
}

#[test]
fn test_padded_string_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("plugin.cfg");
    let padded = "  two leading, one trailing ".to_string();

    {
        let file = ConfigFile::new(&path, true).unwrap();
        let name = file
            .bind("General", "Name", String::new(), ConfigDescription::new("d"))
            .unwrap();
        name.set_value(padded.clone());
    }

    let file = ConfigFile::new(&path, true).unwrap();
    let name = file
        .bind("General", "Name", String::new(), ConfigDescription::new("d"))
        .unwrap();
    assert_eq!(name.value(), padded);
}

#[test]
fn test_save_on_init_creates_file_with_header() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("owned.cfg");

    let file = ConfigFile::with_owner(&path, true, "Model Tester").unwrap();
    assert!(path.exists());
    assert_eq!(file.owner(), Some("Model Tester"));

    let text = std::fs::read_to_string(&path).unwrap();
    assert!(text.starts_with("## Settings file was created by plugin Model Tester"));
}

#[test]
fn test_without_save_on_init_nothing_is_written() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("lazy.cfg");

    let file = ConfigFile::new(&path, false).unwrap();
    assert!(!path.exists());
    file.set_save_on_set(false);
    file.bind("General", "Flag", true, ConfigDescription::default()).unwrap();
    assert!(!path.exists());

    file.save().unwrap();
    assert!(path.exists());
}

#[test]
fn test_external_edit_and_reload() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("edit.cfg");
    let file = ConfigFile::new(&path, true).unwrap();

    let speed = file.bind("General", "Speed", 10, ConfigDescription::new("d")).unwrap();
    assert_eq!(speed.value(), 10);
    speed.set_value(20);
    assert!(std::fs::read_to_string(&path).unwrap().contains("Speed = 20"));

    let changes = Arc::new(Mutex::new(Vec::new()));
    let seen = Arc::clone(&changes);
    let _sub = speed.on_setting_changed(move |event| {
        seen.lock().unwrap().push((event.old_value.clone(), event.new_value.clone(), event.source));
    });

    let edited = std::fs::read_to_string(&path).unwrap().replace("Speed = 20", "Speed = 30");
    std::fs::write(&path, edited).unwrap();
    file.reload().unwrap();

    assert_eq!(speed.value(), 30);
    assert_eq!(
        *changes.lock().unwrap(),
        vec![("20".to_string(), "30".to_string(), ChangeSource::Reload)]
    );
}

#[test]
fn test_reload_does_not_save() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("reload.cfg");
    let file = ConfigFile::new(&path, true).unwrap();
    file.bind("General", "Speed", 10, ConfigDescription::default()).unwrap();

    std::fs::write(&path, "[General]\nSpeed = 11\nExtra = keep me\n").unwrap();
    file.reload().unwrap();

    let text = std::fs::read_to_string(&path).unwrap();
    assert_eq!(text, "[General]\nSpeed = 11\nExtra = keep me\n");
}

#[test]
fn test_orphans_are_written_back() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("orphans.cfg");
    std::fs::write(&path, "[Old]\nLegacy = 5\n").unwrap();

    let file = ConfigFile::new(&path, true).unwrap();
    file.bind("General", "Speed", 1, ConfigDescription::default()).unwrap();

    let text = std::fs::read_to_string(&path).unwrap();
    assert!(text.contains("[Old]\n\nLegacy = 5"));
    assert!(text.contains("Speed = 1"));
}

#[test]
fn test_enum_setting_on_disk() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("enum.cfg");
    let file = ConfigFile::new(&path, true).unwrap();

    let quality = file
        .bind("Video", "Quality", Quality::default(), ConfigDescription::new("Render quality"))
        .unwrap();
    quality.set_value(Quality::High);

    let text = std::fs::read_to_string(&path).unwrap();
    assert!(text.contains("# Setting type: Quality"));
    assert!(text.contains("# Acceptable values: Low, Medium, High"));
    assert!(text.contains("Quality = High"));

    std::fs::write(&path, text.replace("Quality = High", "Quality = 0")).unwrap();
    file.reload().unwrap();
    assert_eq!(quality.value(), Quality::Low);
    assert_eq!(Quality::variant_names().map(|names| names.len()), Some(3));
}

#[test]
fn test_file_level_listener_sees_every_entry() {
    let file = ConfigFile::in_memory();
    let a = file
        .bind("S", "a", 0.5f32, ConfigDescription::default().with_acceptable_values(Some(AcceptableValues::range(0.0, 1.0))))
        .unwrap();
    let b = file.bind("S", "b", 'x', ConfigDescription::default()).unwrap();

    let count = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&count);
    let sub = file.on_setting_changed(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    a.set_value(4.0);
    assert_eq!(a.value(), 1.0);
    b.set_value('y');
    drop(sub);
    b.set_value('z');

    assert_eq!(count.load(Ordering::SeqCst), 2);
}
