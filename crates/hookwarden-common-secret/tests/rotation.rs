//! Secret rotation as seen by long-lived readers.

use hookwarden_common_secret::{signature, SecretAgent};
use std::fs;
use std::sync::Arc;
use std::time::Duration;
use tempfile::tempdir;

#[test]
fn test_token_generator_follows_rotation() {
    let dir = tempdir().unwrap();
    let hmac_path = dir.path().join("hmac");
    fs::write(&hmac_path, "first").unwrap();

    let agent = SecretAgent::start([&hmac_path]).unwrap();
    let generator = agent.token_generator(&hmac_path);

    let body = br#"{"action":"opened"}"#;
    let old_signature = signature::sign(b"first", body);
    assert!(generator.verify(body, &old_signature));

    fs::write(&hmac_path, "second").unwrap();
    assert!(agent.refresh());

    let new_signature = signature::sign(b"second", body);
    assert!(generator.verify(body, &new_signature));
    assert!(!generator.verify(body, &old_signature));
}

#[test]
fn test_snapshot_taken_before_rotation_is_stable() {
    let dir = tempdir().unwrap();
    let token_path = dir.path().join("oauth");
    let hmac_path = dir.path().join("hmac");
    fs::write(&token_path, "token-1").unwrap();
    fs::write(&hmac_path, "hmac-1").unwrap();

    let agent = SecretAgent::start([&token_path, &hmac_path]).unwrap();
    let before = agent.snapshot();

    fs::write(&token_path, "token-2").unwrap();
    fs::write(&hmac_path, "hmac-2").unwrap();
    agent.refresh();

    assert_eq!(before.get(&token_path).unwrap().expose(), b"token-1");
    assert_eq!(before.get(&hmac_path).unwrap().expose(), b"hmac-1");

    let after = agent.snapshot();
    assert_eq!(after.get(&token_path).unwrap().expose(), b"token-2");
    assert_eq!(after.get(&hmac_path).unwrap().expose(), b"hmac-2");
}

#[test]
fn test_partial_failure_only_keeps_failed_path() {
    let dir = tempdir().unwrap();
    let token_path = dir.path().join("oauth");
    let hmac_path = dir.path().join("hmac");
    fs::write(&token_path, "token-1").unwrap();
    fs::write(&hmac_path, "hmac-1").unwrap();

    let agent = SecretAgent::start([&token_path, &hmac_path]).unwrap();

    fs::remove_file(&token_path).unwrap();
    fs::write(&hmac_path, "hmac-2").unwrap();
    assert!(agent.refresh());

    assert_eq!(agent.get_secret(&token_path).unwrap().expose(), b"token-1");
    assert_eq!(agent.get_secret(&hmac_path).unwrap().expose(), b"hmac-2");
}

#[tokio::test]
async fn test_background_refresh_picks_up_new_content() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("oauth");
    fs::write(&path, "before").unwrap();

    let agent = Arc::new(SecretAgent::start([&path]).unwrap());
    let task = agent.spawn_refresh(Duration::from_millis(20));

    fs::write(&path, "after").unwrap();

    let mut rotated = false;
    for _ in 0..100 {
        if agent.get_secret(&path).unwrap().expose() == b"after" {
            rotated = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    task.abort();

    assert!(rotated, "background refresh never observed the new value");
}
