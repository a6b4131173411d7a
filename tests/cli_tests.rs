use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn feedbot_cmd(temp_dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("feedbot").unwrap();
    cmd.current_dir(temp_dir.path())
        .env("FEEDER_DB_PATH", temp_dir.path().join("test.db"))
        .env_remove("TELEGRAM_BOT_TOKEN")
        .env_remove("TELEGRAM_TARGETS")
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_help_lists_commands() {
    let temp_dir = TempDir::new().unwrap();

    feedbot_cmd(&temp_dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("add"))
        .stdout(predicate::str::contains("status"))
        .stdout(predicate::str::contains("check"))
        .stdout(predicate::str::contains("run"));
}

#[test]
fn test_help_shows_dry_run_flag() {
    let temp_dir = TempDir::new().unwrap();

    feedbot_cmd(&temp_dir)
        .arg("run")
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--dry-run"));
}

#[test]
fn test_list_without_feeds() {
    let temp_dir = TempDir::new().unwrap();

    feedbot_cmd(&temp_dir)
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("No feeds configured."));
}

#[test]
fn test_added_feed_is_listed() {
    let temp_dir = TempDir::new().unwrap();

    feedbot_cmd(&temp_dir)
        .args(["add", "PMA Brazilo", "https://pma.brazilo.org/na-rede/feed", "--no-validate"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Feed added successfully!"));

    feedbot_cmd(&temp_dir)
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("PMA Brazilo"))
        .stdout(predicate::str::contains("https://pma.brazilo.org/na-rede/feed"));
}

#[test]
fn test_add_rejects_invalid_url() {
    let temp_dir = TempDir::new().unwrap();

    feedbot_cmd(&temp_dir)
        .args(["add", "Broken", "not-a-url", "--no-validate"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid feed URL"));
}

#[test]
fn test_remove_unknown_feed_fails() {
    let temp_dir = TempDir::new().unwrap();

    feedbot_cmd(&temp_dir)
        .args(["remove", "Nowhere"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Feed not found"));
}

#[test]
fn test_status_on_fresh_database() {
    let temp_dir = TempDir::new().unwrap();

    feedbot_cmd(&temp_dir)
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("Processed links: 0"))
        .stdout(predicate::str::contains("Feeds: 0"))
        .stdout(predicate::str::contains("Interval: 300s"));
}

#[test]
fn test_status_as_json() {
    let temp_dir = TempDir::new().unwrap();

    feedbot_cmd(&temp_dir)
        .args(["status", "--json"])
        .env("FEEDER_CHECK_INTERVAL_SECS", "120")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"seen_count\": 0"))
        .stdout(predicate::str::contains("\"interval_seconds\": 120"));
}

#[test]
fn test_invalid_interval_is_config_error() {
    let temp_dir = TempDir::new().unwrap();

    feedbot_cmd(&temp_dir)
        .arg("status")
        .env("FEEDER_CHECK_INTERVAL_SECS", "0")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Configuration error"));
}

#[test]
fn test_dry_run_check_without_feeds() {
    let temp_dir = TempDir::new().unwrap();

    feedbot_cmd(&temp_dir)
        .args(["check", "--dry-run"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No feeds configured"));
}

#[test]
fn test_check_without_token_fails() {
    let temp_dir = TempDir::new().unwrap();

    feedbot_cmd(&temp_dir)
        .arg("check")
        .assert()
        .failure()
        .stderr(predicate::str::contains("TELEGRAM_BOT_TOKEN"));
}

#[test]
fn test_run_without_targets_fails() {
    let temp_dir = TempDir::new().unwrap();

    feedbot_cmd(&temp_dir)
        .arg("run")
        .env("TELEGRAM_BOT_TOKEN", "123456:test-token")
        .assert()
        .failure()
        .stderr(predicate::str::contains("TELEGRAM_TARGETS"));
}

mod dry_run_cycle {
    use super::*;
    use feedbot::storage::{SqliteStateStore, SqliteStorage, StateStore};

    #[test]
    fn test_unreachable_feed_does_not_fail_the_cycle() {
        let temp_dir = TempDir::new().unwrap();

        feedbot_cmd(&temp_dir)
            .args(["add", "Offline", "http://127.0.0.1:9/feed.xml", "--no-validate"])
            .assert()
            .success();

        feedbot_cmd(&temp_dir)
            .args(["check", "--dry-run"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Fetching feeds..."))
            .stdout(predicate::str::contains("Polled 1 feeds (1 failed)"));
    }

    #[test]
    fn test_dry_run_leaves_state_untouched() {
        let temp_dir = TempDir::new().unwrap();

        feedbot_cmd(&temp_dir)
            .args(["add", "Offline", "http://127.0.0.1:9/feed.xml", "--no-validate"])
            .assert()
            .success();

        feedbot_cmd(&temp_dir)
            .args(["check", "--dry-run"])
            .assert()
            .success();

        let storage = SqliteStorage::new(temp_dir.path().join("test.db")).unwrap();
        let store = SqliteStateStore::new(storage);
        assert!(store.load_watermark().unwrap().is_none());
        assert!(store.load_seen_links().unwrap().is_empty());
    }
}
