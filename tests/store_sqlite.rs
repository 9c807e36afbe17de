//! Integration tests for the SQLite store: handle editing and settings layering.
//!
//! Each test creates its own in-memory SQLite database for isolation.

use toptweets::config::Config;
use toptweets::storage::{
    add_handle, remove_handle, Database, HandleChange, Settings, SettingsUpdate, Store,
};

async fn test_db() -> Database {
    Database::open(":memory:").await.unwrap()
}

#[tokio::test]
async fn test_handle_list_lifecycle() {
    let db = test_db().await;

    assert_eq!(
        add_handle(&db, " @Jack ").await.unwrap(),
        HandleChange::Applied("jack".into())
    );
    add_handle(&db, "naval").await.unwrap();
    add_handle(&db, "paulg").await.unwrap();
    assert_eq!(
        add_handle(&db, "NAVAL").await.unwrap(),
        HandleChange::Unchanged("naval".into())
    );
    assert_eq!(db.get_handles().await.unwrap(), vec!["paulg", "naval", "jack"]);

    remove_handle(&db, "naval").await.unwrap();
    assert_eq!(db.get_handles().await.unwrap(), vec!["paulg", "jack"]);
}

#[tokio::test]
async fn test_file_backed_store_survives_reopen() {
    let dir = std::env::temp_dir().join("toptweets_store_test_reopen");
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("toptweets.db");
    std::fs::remove_file(&path).ok();
    let path_str = path.to_str().unwrap();

    {
        let db = Database::open(path_str).await.unwrap();
        add_handle(&db, "jack").await.unwrap();
        db.set_settings(&Settings {
            top_n: 3,
            ..Settings::default()
        })
        .await
        .unwrap();
    }

    let db = Database::open(path_str).await.unwrap();
    assert_eq!(db.get_handles().await.unwrap(), vec!["jack"]);
    assert_eq!(db.get_settings().await.unwrap().top_n, 3);

    std::fs::remove_dir_all(&dir).ok();
}

#[tokio::test]
async fn test_config_seeds_settings_until_overridden() {
    let config = Config {
        source_base: "https://mirror.example".into(),
        top_n: 5,
        ..Config::default()
    };
    let db = test_db().await.with_defaults(config.settings_defaults());

    let seeded = db.get_settings().await.unwrap();
    assert_eq!(seeded.source_base, "https://mirror.example");
    assert_eq!(seeded.top_n, 5);
    assert_eq!(seeded.per_handle_limit, 8);

    db.set_settings(&Settings {
        top_n: 20,
        ..seeded
    })
    .await
    .unwrap();
    assert_eq!(db.get_settings().await.unwrap().top_n, 20);

    db.reset_settings().await.unwrap();
    assert_eq!(db.get_settings().await.unwrap().top_n, 5);
}

#[tokio::test]
async fn test_changing_one_setting_leaves_the_others_on_config() {
    let db = test_db().await.with_defaults(Config::default().settings_defaults());
    db.update_settings(&SettingsUpdate {
        top_n: Some(3),
        ..SettingsUpdate::default()
    })
    .await
    .unwrap();

    // Reopened after the user edits config.toml
    let edited = Config {
        source_base: "https://mirror.example".into(),
        per_handle_limit: 4,
        top_n: 9,
        ..Config::default()
    };
    let db = db.with_defaults(edited.settings_defaults());
    let settings = db.get_settings().await.unwrap();
    assert_eq!(settings.top_n, 3);
    assert_eq!(settings.source_base, "https://mirror.example");
    assert_eq!(settings.per_handle_limit, 4);
}
