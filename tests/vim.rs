//! End-to-end tests against a real `vim` binary.
//!
//! Every test opens its own session and returns early when no `vim` is
//! installed on the host, so the suite stays green on minimal machines.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use vimpilot::core::process::ProcessError;
use vimpilot::core::session::SessionError;
use vimpilot::{Error, Mode, SessionConfig, Vim};

fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn config() -> SessionConfig {
    // LANG=C keeps the banner and messages in English regardless of the
    // host locale.
    let mut env: HashMap<String, String> = std::env::vars().collect();
    env.insert("LANG".to_string(), "C".to_string());
    SessionConfig::default()
        .with_env(env)
        .with_timeout(Duration::from_millis(250))
}

/// Open a session, or `None` when vim is not installed.
fn open_vim() -> Option<Vim> {
    init_tracing();
    match vimpilot::open(config()) {
        Ok(mut vim) => {
            // Give a slow cold start extra room to finish the banner.
            vim.wait(Some(Duration::from_secs(2))).expect("startup drain failed");
            Some(vim)
        }
        Err(Error::Session(SessionError::Process(ProcessError::ExecutableNotFound {
            ..
        }))) => None,
        Err(e) => panic!("failed to open vim: {e}"),
    }
}

fn fixture_plugin_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join("spam")
}

#[test]
fn test_open_shows_banner() {
    let Some(mut vim) = open_vim() else { return };
    let display = vim.display();
    assert!(display.contains("VIM - Vi IMproved"), "banner missing:\n{display}");
    vim.close().unwrap();
}

#[test]
fn test_display_lines_shape() {
    let Some(mut vim) = open_vim() else { return };
    let lines = vim.display_lines();
    assert_eq!(lines.len(), 24);
    assert!(lines.iter().all(|line| line.len() == 80));
    vim.close().unwrap();
}

#[test]
fn test_send_keys_insert() {
    let Some(mut vim) = open_vim() else { return };
    vim.send_keys("ispam\x1b").unwrap();
    assert!(vim.display_lines()[0].contains("spam"));
    vim.close().unwrap();
}

#[test]
fn test_set_mode_sequences() {
    let Some(mut vim) = open_vim() else { return };
    vim.set_mode(Mode::Insert).unwrap();
    vim.send_keys("spam").unwrap();
    vim.set_mode(Mode::Normal).unwrap();
    assert_eq!(vim.display_lines()[0].trim(), "spam");
    vim.set_mode(Mode::Visual).unwrap();
    vim.send_keys("0yP").unwrap();
    assert_eq!(vim.display_lines()[0].trim(), "spamspam");
    // Remaining modes must at least transition without complaint.
    vim.set_mode(Mode::Command).unwrap();
    vim.set_mode(Mode::VisualBlock).unwrap();
    vim.set_mode(Mode::Normal).unwrap();
    vim.close().unwrap();
}

#[test]
fn test_command_captures_output() {
    let Some(mut vim) = open_vim() else { return };
    assert_eq!(vim.command("echo \"ham\"").unwrap(), "ham");
    assert_eq!(vim.command("echo \"egg\"").unwrap(), "egg");
    vim.close().unwrap();
}

#[test]
fn test_command_quiet_then_echo() {
    let Some(mut vim) = open_vim() else { return };
    vim.command_quiet("let g:spam = \"ham\"").unwrap();
    assert_eq!(vim.echo("g:spam").unwrap(), "ham");
    vim.close().unwrap();
}

#[test]
fn test_runtimepath_view() {
    let Some(mut vim) = open_vim() else { return };
    let rtp = vim.runtimepath().unwrap();
    assert!(!rtp.is_empty());
    rtp.push("/usr/local/share/vimfiles").unwrap();
    assert!(rtp.contains("/usr/local/share/vimfiles"));
    // The editor must have accepted the pushed value.
    let raw = vim.command("set runtimepath").unwrap();
    assert!(raw.contains("/usr/local/share/vimfiles"), "remote value: {raw}");
    vim.close().unwrap();
}

#[test]
fn test_install_plugin() {
    let Some(mut vim) = open_vim() else { return };
    let dir = fixture_plugin_dir();
    vim.install_plugin(&dir, Some("plugin/spam.vim")).unwrap();
    assert!(vim.runtimepath().unwrap().contains(&dir.to_string_lossy()));
    assert_eq!(vim.command("Spam").unwrap(), "spam");
    vim.close().unwrap();
}

#[test]
fn test_screen_resize() {
    let Some(mut vim) = open_vim() else { return };
    vim.set_screen_size(32, 120).unwrap();
    assert_eq!(vim.screen_size(), (32, 120));
    vim.wait(Some(Duration::from_secs(1))).unwrap();
    let lines = vim.display_lines();
    assert_eq!(lines.len(), 32);
    assert!(lines.iter().all(|line| line.len() == 120));
    vim.close().unwrap();
}

#[test]
fn test_close_is_idempotent() {
    let Some(mut vim) = open_vim() else { return };
    assert!(vim.is_alive());
    vim.close().unwrap();
    assert!(!vim.is_alive());
    vim.close().unwrap();
    assert!(!vim.is_alive());
}

#[test]
fn test_accessors() {
    let Some(mut vim) = open_vim() else { return };
    assert!(vim.executable().is_absolute());
    assert!(vim.args().contains(&"-u".to_string()));
    assert_eq!(vim.encoding().to_lowercase(), "utf-8");
    assert_eq!(vim.timeout(), Duration::from_millis(250));
    vim.set_timeout(Duration::from_secs(10));
    assert_eq!(vim.timeout(), Duration::from_secs(10));
    vim.close().unwrap();
}

#[test]
fn test_drop_closes_session() {
    let Some(vim) = open_vim() else { return };
    drop(vim);
    // Nothing to assert beyond not hanging; the drop path terminates
    // and reaps the child.
}
