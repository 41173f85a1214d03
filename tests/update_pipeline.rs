use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tempfile::TempDir;

use claat_update::contract::{
    AssetMap, Codelab, Collaborators, MockAssetRetriever, MockClientFactory, MockOutputWriter,
    MockSourceFetcher, ParsedCodelab, SourceKind, Step,
};
use claat_update::error::{MetaError, UpdateError};
use claat_update::meta::{read_meta, Meta, META_FILENAME};
use claat_update::update::{update_codelab, UpdateOptions};
use claat_update::writer::FsOutputWriter;

fn modified() -> DateTime<Utc> {
    "2024-05-01T12:00:00Z".parse().unwrap()
}

fn parsed(id: &str, kind: SourceKind) -> ParsedCodelab {
    ParsedCodelab {
        codelab: Codelab {
            meta: Meta {
                id: id.to_string(),
                title: format!("Codelab {id}"),
                ..Default::default()
            },
            steps: vec![Step {
                title: "Setup".into(),
                body: "![a](https://cdn.test/a.png)".into(),
                images: vec!["https://cdn.test/a.png".into()],
            }],
        },
        modified: modified(),
        kind,
    }
}

/// Creates `base/<id>/codelab.json` (+ the given asset files) and returns the dir.
fn stored_codelab(base: &Path, id: &str, assets: &[&str]) -> PathBuf {
    let dir = base.join(id);
    fs::create_dir_all(dir.join("img")).unwrap();
    fs::write(
        dir.join(META_FILENAME),
        format!(r#"{{"id":"{id}","source":"doc-{id}","prefix":"https://stored","mainga":"UA-stored"}}"#),
    )
    .unwrap();
    for asset in assets {
        fs::write(dir.join("img").join(asset), *asset).unwrap();
    }
    dir
}

/// Asset retriever that writes `a.png` into the asset dir, like a real slurp would.
fn writing_assets() -> MockAssetRetriever {
    let mut assets = MockAssetRetriever::new();
    assets.expect_slurp().returning(|_, _, dir, _| {
        fs::create_dir_all(dir).unwrap();
        fs::write(dir.join("a.png"), "a").unwrap();
        Ok(AssetMap::from([(
            "a.png".to_string(),
            "https://cdn.test/a.png".to_string(),
        )]))
    });
    assets
}

fn fetcher_returning(id: &'static str, kind: SourceKind) -> MockSourceFetcher {
    let mut fetcher = MockSourceFetcher::new();
    fetcher
        .expect_fetch()
        .returning(move |_| Ok(parsed(id, kind)));
    fetcher
}

fn no_clients() -> MockClientFactory {
    let mut clients = MockClientFactory::new();
    clients.expect_new_client().never();
    clients
}

fn deps(
    fetcher: MockSourceFetcher,
    clients: MockClientFactory,
    assets: MockAssetRetriever,
) -> Collaborators {
    Collaborators {
        fetcher: Arc::new(fetcher),
        clients: Arc::new(clients),
        assets: Arc::new(assets),
        writer: Arc::new(FsOutputWriter),
    }
}

fn listing(dir: &Path) -> BTreeSet<String> {
    fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect()
}

#[tokio::test]
async fn orphaned_assets_are_removed_when_the_id_is_unchanged() {
    let out = TempDir::new().unwrap();
    let dir = stored_codelab(out.path(), "intro", &["a.png", "b.png"]);
    let deps = deps(
        fetcher_returning("intro", SourceKind::Markdown),
        no_clients(),
        writing_assets(),
    );

    let meta = update_codelab(&dir, &UpdateOptions::default(), &deps)
        .await
        .expect("update");

    assert_eq!(meta.id, "intro");
    assert_eq!(listing(&dir.join("img")), BTreeSet::from(["a.png".to_string()]));
    assert!(dir.join("index.html").exists());
}

#[tokio::test]
async fn second_update_of_an_unchanged_source_deletes_nothing() {
    let out = TempDir::new().unwrap();
    let dir = stored_codelab(out.path(), "intro", &["stale.png"]);
    let deps = deps(
        fetcher_returning("intro", SourceKind::Markdown),
        no_clients(),
        writing_assets(),
    );

    update_codelab(&dir, &UpdateOptions::default(), &deps).await.unwrap();
    let after_first = listing(&dir.join("img"));
    update_codelab(&dir, &UpdateOptions::default(), &deps).await.unwrap();

    assert_eq!(after_first, BTreeSet::from(["a.png".to_string()]));
    assert_eq!(listing(&dir.join("img")), after_first);
}

#[tokio::test]
async fn changed_id_moves_the_codelab_and_removes_the_old_directory() {
    let out = TempDir::new().unwrap();
    let old = stored_codelab(out.path(), "old-id", &["a.png", "b.png"]);
    let deps = deps(
        fetcher_returning("new-id", SourceKind::Markdown),
        no_clients(),
        writing_assets(),
    );

    let meta = update_codelab(&old, &UpdateOptions::default(), &deps)
        .await
        .expect("update");

    let new = out.path().join("new-id");
    assert_eq!(meta.id, "new-id");
    assert!(!old.exists(), "old directory must be removed");
    assert!(new.join("index.html").exists());
    assert!(new.join("img").join("a.png").exists());

    let record = read_meta(&new.join(META_FILENAME)).await.unwrap();
    assert_eq!(record.meta.id, "new-id");
    assert_eq!(record.context.source, "doc-old-id");
    assert_eq!(record.context.updated, Some(modified()));
}

#[tokio::test]
async fn overrides_and_update_time_are_written_to_the_record() {
    let out = TempDir::new().unwrap();
    let dir = stored_codelab(out.path(), "intro", &[]);
    let deps = deps(
        fetcher_returning("intro", SourceKind::Markdown),
        no_clients(),
        writing_assets(),
    );
    let options = UpdateOptions {
        prefix: Some("https://cli.prefix".into()),
        global_ga: Some("UA-global".into()),
    };

    update_codelab(&dir, &options, &deps).await.unwrap();

    let record = read_meta(&dir.join(META_FILENAME)).await.unwrap();
    assert_eq!(record.context.prefix, "https://cli.prefix");
    assert_eq!(record.context.main_ga, "UA-global");
    assert_eq!(record.context.format, "html");
    assert_eq!(record.context.updated, Some(modified()));
}

#[tokio::test]
async fn fetch_failure_leaves_the_directory_untouched() {
    let out = TempDir::new().unwrap();
    let dir = stored_codelab(out.path(), "intro", &["a.png", "b.png"]);
    let before = listing(&dir.join("img"));
    let record_before = fs::read_to_string(dir.join(META_FILENAME)).unwrap();

    let mut fetcher = MockSourceFetcher::new();
    fetcher
        .expect_fetch()
        .returning(|_| Err("upstream rate limited".into()));
    let mut assets = MockAssetRetriever::new();
    assets.expect_slurp().never();
    let deps = deps(fetcher, no_clients(), assets);

    let err = update_codelab(&dir, &UpdateOptions::default(), &deps)
        .await
        .unwrap_err();

    assert!(matches!(err, UpdateError::Fetch { .. }), "got {err:?}");
    assert!(err.to_string().contains("doc-intro"));
    assert_eq!(listing(&dir.join("img")), before);
    assert_eq!(fs::read_to_string(dir.join(META_FILENAME)).unwrap(), record_before);
}

#[tokio::test]
async fn malformed_record_fails_before_fetching() {
    let out = TempDir::new().unwrap();
    let dir = out.path().join("broken");
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join(META_FILENAME), "{ nope").unwrap();

    let mut fetcher = MockSourceFetcher::new();
    fetcher.expect_fetch().never();
    let deps = deps(fetcher, no_clients(), MockAssetRetriever::new());

    let err = update_codelab(&dir, &UpdateOptions::default(), &deps)
        .await
        .unwrap_err();
    assert!(
        matches!(err, UpdateError::Meta(MetaError::Decode { .. })),
        "got {err:?}"
    );
}

#[tokio::test]
async fn google_doc_sources_get_an_authenticated_client() {
    let out = TempDir::new().unwrap();
    let dir = stored_codelab(out.path(), "intro", &[]);

    let mut clients = MockClientFactory::new();
    clients
        .expect_new_client()
        .times(1)
        .returning(|| Ok(reqwest::Client::new()));
    let mut assets = MockAssetRetriever::new();
    assets
        .expect_slurp()
        .withf(|client, source, _, _| client.is_some() && source.to_string() == "doc-intro")
        .times(1)
        .returning(|_, _, _, _| Ok(AssetMap::new()));
    let deps = deps(
        fetcher_returning("intro", SourceKind::GoogleDoc),
        clients,
        assets,
    );

    update_codelab(&dir, &UpdateOptions::default(), &deps)
        .await
        .expect("update");
}

#[tokio::test]
async fn client_construction_failure_aborts_before_assets() {
    let out = TempDir::new().unwrap();
    let dir = stored_codelab(out.path(), "intro", &["a.png"]);

    let mut clients = MockClientFactory::new();
    clients
        .expect_new_client()
        .returning(|| Err("no token".into()));
    let mut assets = MockAssetRetriever::new();
    assets.expect_slurp().never();
    let deps = deps(
        fetcher_returning("intro", SourceKind::GoogleDoc),
        clients,
        assets,
    );

    let err = update_codelab(&dir, &UpdateOptions::default(), &deps)
        .await
        .unwrap_err();
    assert!(matches!(err, UpdateError::Client(_)), "got {err:?}");
    assert!(!dir.join("index.html").exists());
}

#[tokio::test]
async fn write_failure_keeps_the_old_directory() {
    let out = TempDir::new().unwrap();
    let old = stored_codelab(out.path(), "old-id", &["a.png"]);

    let mut writer = MockOutputWriter::new();
    writer
        .expect_write()
        .returning(|_, _, _| Err("disk full".into()));
    let deps = Collaborators {
        fetcher: Arc::new(fetcher_returning("new-id", SourceKind::Markdown)),
        clients: Arc::new(no_clients()),
        assets: Arc::new(writing_assets()),
        writer: Arc::new(writer),
    };

    let err = update_codelab(&old, &UpdateOptions::default(), &deps)
        .await
        .unwrap_err();
    assert!(matches!(err, UpdateError::Write { .. }), "got {err:?}");
    assert!(old.join(META_FILENAME).exists());
    assert!(old.join("img").join("a.png").exists());
}

#[tokio::test]
async fn parsed_id_that_escapes_the_workspace_is_rejected() {
    let out = TempDir::new().unwrap();
    let dir = stored_codelab(out.path(), "intro", &["a.png"]);

    let mut assets = MockAssetRetriever::new();
    assets.expect_slurp().never();
    let mut writer = MockOutputWriter::new();
    writer.expect_write().never();
    let deps = Collaborators {
        fetcher: Arc::new(fetcher_returning("..", SourceKind::Markdown)),
        clients: Arc::new(no_clients()),
        assets: Arc::new(assets),
        writer: Arc::new(writer),
    };

    let err = update_codelab(&dir, &UpdateOptions::default(), &deps)
        .await
        .unwrap_err();
    assert!(matches!(err, UpdateError::InvalidId(ref id) if id == ".."), "got {err:?}");
    assert!(dir.join("img").join("a.png").exists());
}

#[tokio::test]
async fn unreadable_asset_dir_fails_cleanup_after_the_write() {
    let out = TempDir::new().unwrap();
    let dir = stored_codelab(out.path(), "intro", &[]);
    fs::remove_dir(dir.join("img")).unwrap();
    fs::write(dir.join("img"), "not a directory").unwrap();

    let mut assets = MockAssetRetriever::new();
    assets
        .expect_slurp()
        .times(1)
        .returning(|_, _, _, _| Ok(AssetMap::new()));
    let deps = deps(
        fetcher_returning("intro", SourceKind::Markdown),
        no_clients(),
        assets,
    );

    let err = update_codelab(&dir, &UpdateOptions::default(), &deps)
        .await
        .unwrap_err();
    assert!(
        matches!(err, UpdateError::Cleanup { ref path, .. } if path == &dir.join("img")),
        "got {err:?}"
    );

    assert!(dir.join("index.html").exists());
    let record = read_meta(&dir.join(META_FILENAME)).await.expect("record");
    assert_eq!(record.context.updated, Some(modified()));
    assert_eq!(record.meta.title, "Codelab intro");
}
