mod support;

use std::fs;

use std::sync::Arc;

use listkeep::config::{Config, CONFIG_FILE_NAME};
use listkeep::error::{Error, ErrorCategory};
use listkeep::remote::MemoryStore;
use listkeep::sort::{SortDirection, SortField};
use listkeep::TaskStore;

#[test]
fn config_defaults_when_missing() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = Config::load_from_dir(dir.path());

    assert_eq!(config.transitions.newly_created_ms, 500);
    assert_eq!(config.transitions.disappear_ms, 500);
    assert_eq!(config.transitions.reappear_ms, 1500);
    assert_eq!(config.transitions.moved_ms, 1400);
    assert_eq!(config.transitions.recent_gain_ms, 4000);
    assert_eq!(config.rewards.min_amount, 10);
    assert_eq!(config.rewards.max_amount, 25);
    assert!(!config.view.show_completed);
    assert_eq!(config.view.sort_field, SortField::Smart);
}

#[test]
fn config_overrides_from_toml() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let config_path = dir.path().join(CONFIG_FILE_NAME);
    let toml = r#"
[transitions]
newly_created_ms = 100
moved_ms = 2000

[rewards]
level_base = 50

[view]
sort_field = "done_date"
sort_direction = "desc"
"#;
    fs::write(&config_path, toml)?;

    let config = Config::load_from_dir(dir.path());
    assert_eq!(config.transitions.newly_created_ms, 100);
    assert_eq!(config.transitions.moved_ms, 2000);
    assert_eq!(config.transitions.disappear_ms, 500);
    assert_eq!(config.rewards.level_base, 50);
    assert_eq!(config.view.sort_field, SortField::DoneDate);
    assert_eq!(config.view.sort_direction, SortDirection::Desc);
    Ok(())
}

#[test]
fn invalid_config_falls_back_to_defaults() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    fs::write(
        dir.path().join(CONFIG_FILE_NAME),
        "[rewards]\nmin_amount = 40\nmax_amount = 5\n",
    )?;

    let config = Config::load_from_dir(dir.path());
    assert_eq!(config.rewards.min_amount, 10);
    assert!(Config::load(&dir.path().join(CONFIG_FILE_NAME)).is_err());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn transition_delays_come_from_config() {
    let mut config = Config::default();
    config.transitions.newly_created_ms = 50;
    config.view.sort_field = SortField::Title;
    let list = support::TestList::with_config(config);
    let task = list.add("Quick").await;

    assert_eq!(list.store.sort().field, SortField::Title);
    assert!(list.store.animations().is_newly_created(&task.id));
    support::wait_ms(51).await;
    assert!(!list.store.animations().is_newly_created(&task.id));
}

#[test]
fn store_rejects_inverted_reward_range_built_in_code() {
    let mut config = Config::default();
    config.rewards.min_amount = 30;
    config.rewards.max_amount = 20;

    let remote = Arc::new(MemoryStore::new());
    let err = match TaskStore::new(remote.clone(), support::scope(), config) {
        Ok(_) => panic!("inverted range accepted"),
        Err(err) => err,
    };
    assert!(matches!(err, Error::InvalidConfig(_)));
    assert_eq!(err.category(), ErrorCategory::Validation);
    assert_eq!(remote.write_count(), 0);
}

#[test]
fn store_accepts_single_value_reward_range() {
    let mut config = Config::default();
    config.rewards.min_amount = 20;
    config.rewards.max_amount = 20;

    let remote = Arc::new(MemoryStore::new());
    assert!(TaskStore::new(remote, support::scope(), config).is_ok());
}
