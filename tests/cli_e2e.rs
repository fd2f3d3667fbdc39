//! End-to-end CLI tests for the chunky binary.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

mod support;
use support::mount_file;
use support::payload;
use support::socket_guard::start_mock_server_or_skip;

/// Binary with an isolated config location so a user config never leaks in.
fn chunky(config_home: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("chunky").unwrap();
    cmd.env("XDG_CONFIG_HOME", config_home.path())
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_binary_help_displays_usage() {
    let home = TempDir::new().unwrap();
    chunky(&home)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("download"));
}

#[test]
fn test_download_help_lists_options() {
    let home = TempDir::new().unwrap();
    chunky(&home)
        .args(["download", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--url"))
        .stdout(predicate::str::contains("--parallelism"))
        .stdout(predicate::str::contains("--retries"));
}

#[test]
fn test_binary_version_displays_version() {
    let home = TempDir::new().unwrap();
    chunky(&home)
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("chunky"));
}

#[test]
fn test_download_without_url_fails() {
    let home = TempDir::new().unwrap();
    chunky(&home)
        .arg("download")
        .assert()
        .failure()
        .stderr(predicate::str::contains("--url"));
}

#[test]
fn test_invalid_parallelism_is_rejected() {
    let home = TempDir::new().unwrap();
    chunky(&home)
        .args(["download", "-u", "https://example.com/f.bin", "-p", "0"])
        .assert()
        .failure();
}

#[test]
fn test_invalid_config_file_fails_before_download() {
    let home = TempDir::new().unwrap();
    let config = home.path().join("bad.toml");
    std::fs::write(&config, "workers = 3\n").unwrap();

    chunky(&home)
        .args(["download", "-u", "https://example.com/f.bin", "--config"])
        .arg(&config)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("config"));
}

#[test]
fn test_url_without_file_name_fails_with_exit_code_one() {
    let home = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    chunky(&home)
        .args(["-q", "download", "-u", "https://example.com/dir/", "-d"])
        .arg(out.path())
        .assert()
        .code(1)
        .stdout(predicate::str::is_empty());
    assert_eq!(std::fs::read_dir(out.path()).unwrap().count(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_download_prints_final_path() {
    let Some(mock_server) = start_mock_server_or_skip().await else {
        return;
    };
    let body = payload(20_000);
    mount_file(&mock_server, "/data/archive.tar", &body).await;

    let home = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    let url = format!("{}/data/archive.tar", mock_server.uri());
    let mut cmd = chunky(&home);
    cmd.args(["-q", "download", "-u", url.as_str(), "-p", "3", "-s", "4096", "-d"])
        .arg(out.path());

    let expected = out.path().join("archive.tar");
    let printed = expected.display().to_string();
    tokio::task::spawn_blocking(move || {
        cmd.assert()
            .success()
            .stdout(predicate::str::contains(printed));
    })
    .await
    .unwrap();

    assert_eq!(std::fs::read(expected).unwrap(), body);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_directory_from_config_file_is_used() {
    let Some(mock_server) = start_mock_server_or_skip().await else {
        return;
    };
    let body = payload(3000);
    mount_file(&mock_server, "/cfg.bin", &body).await;

    let home = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    let config_dir = home.path().join("chunky");
    std::fs::create_dir_all(&config_dir).unwrap();
    std::fs::write(
        config_dir.join("config.toml"),
        format!(
            "directory = {:?}\nchunk_size = 1000\n",
            out.path().display().to_string()
        ),
    )
    .unwrap();

    let url = format!("{}/cfg.bin", mock_server.uri());
    let mut cmd = chunky(&home);
    cmd.args(["-q", "download", "-u", url.as_str()]);

    tokio::task::spawn_blocking(move || {
        cmd.assert().success();
    })
    .await
    .unwrap();

    assert_eq!(std::fs::read(out.path().join("cfg.bin")).unwrap(), body);
}
