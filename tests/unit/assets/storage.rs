use super::*;

fn temp_dir(name: &str) -> PathBuf {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    std::env::temp_dir().join(format!(
        "routereel_storage_{name}_{}_{nanos}",
        std::process::id()
    ))
}

#[tokio::test]
async fn memory_put_replaces_existing_entry() {
    let s = MemoryStorage::new();
    s.put("u", b"one", 10).await.unwrap();
    let meta = s.put("u", b"three", 20).await.unwrap();

    assert_eq!(meta.size_bytes, 5);
    assert_eq!(s.lookup("u").await.unwrap(), Some(meta));
    assert_eq!(s.read("u").await.unwrap().as_deref(), Some(&b"three"[..]));
    assert_eq!(s.entries().await.unwrap().len(), 1);

    assert!(s.delete("u").await.unwrap());
    assert!(!s.delete("u").await.unwrap());
    assert_eq!(s.lookup("u").await.unwrap(), None);
}

#[test]
fn file_names_are_stable_and_distinct() {
    assert_eq!(file_name_for("https://a"), file_name_for("https://a"));
    assert_ne!(file_name_for("https://a"), file_name_for("https://b"));
    assert!(file_name_for("x").ends_with(".bin"));
    assert_eq!(file_name_for("x").len(), 16 + 4);
}

#[tokio::test]
async fn disk_entries_survive_reopen() {
    let root = temp_dir("reopen");
    {
        let s = DiskStorage::open(&root).await.unwrap();
        s.put("https://img/1", b"alpha", 100).await.unwrap();
        s.put("https://img/2", b"beta", 200).await.unwrap();
        s.flush().await.unwrap();
    }

    let s = DiskStorage::open(&root).await.unwrap();
    let mut entries = s.entries().await.unwrap();
    entries.sort_by_key(|e| e.stored_at_ms);
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].key, "https://img/1");
    assert_eq!(entries[1].size_bytes, 4);
    assert_eq!(
        s.read("https://img/2").await.unwrap().as_deref(),
        Some(&b"beta"[..])
    );
    assert!(std::path::Path::new(&s.handle_for("https://img/1")).exists());

    let _ = std::fs::remove_dir_all(&root);
}

#[tokio::test]
async fn disk_drops_entries_with_missing_payload() {
    let root = temp_dir("orphan");
    {
        let s = DiskStorage::open(&root).await.unwrap();
        s.put("k", b"payload", 1).await.unwrap();
    }
    std::fs::remove_file(root.join(file_name_for("k"))).unwrap();

    let s = DiskStorage::open(&root).await.unwrap();
    assert_eq!(s.lookup("k").await.unwrap(), None);

    let _ = std::fs::remove_dir_all(&root);
}

#[tokio::test]
async fn disk_lookup_misses_when_payload_removed_underneath() {
    let root = temp_dir("vanished");
    let s = DiskStorage::open(&root).await.unwrap();
    s.put("k", b"payload", 1).await.unwrap();
    s.put("other", b"payload", 2).await.unwrap();
    std::fs::remove_file(root.join(file_name_for("k"))).unwrap();

    assert_eq!(s.lookup("k").await.unwrap(), None);
    let keys: Vec<_> = s.entries().await.unwrap().into_iter().map(|e| e.key).collect();
    assert_eq!(keys, vec!["other".to_string()]);
    assert!(s.lookup("other").await.unwrap().is_some());

    let _ = std::fs::remove_dir_all(&root);
}

#[tokio::test]
async fn disk_corrupt_index_starts_empty() {
    let root = temp_dir("corrupt");
    std::fs::create_dir_all(&root).unwrap();
    std::fs::write(root.join("index.json"), b"{not json").unwrap();

    let s = DiskStorage::open(&root).await.unwrap();
    assert!(s.entries().await.unwrap().is_empty());
    s.put("k", b"v", 1).await.unwrap();
    assert!(s.lookup("k").await.unwrap().is_some());

    let _ = std::fs::remove_dir_all(&root);
}

#[tokio::test]
async fn disk_delete_and_clear_remove_files() {
    let root = temp_dir("clear");
    let s = DiskStorage::open(&root).await.unwrap();
    s.put("a", b"1", 1).await.unwrap();
    s.put("b", b"22", 2).await.unwrap();

    assert!(s.delete("a").await.unwrap());
    assert!(!root.join(file_name_for("a")).exists());
    assert!(root.join(file_name_for("b")).exists());

    s.clear().await.unwrap();
    assert!(s.entries().await.unwrap().is_empty());
    assert!(!root.join(file_name_for("b")).exists());

    let reopened = DiskStorage::open(&root).await.unwrap();
    assert!(reopened.entries().await.unwrap().is_empty());

    let _ = std::fs::remove_dir_all(&root);
}
