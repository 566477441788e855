//! Races between independent writers and readers of the same key.

use fsdocs_store::*;
use serde_json::json;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tempfile::TempDir;

const WRITERS: usize = 16;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_racing_writers_of_same_version_have_one_winner() {
    let temp = TempDir::new().unwrap();
    let store = Store::builder().root(temp.path()).connect().await.unwrap();
    let barrier = Arc::new(tokio::sync::Barrier::new(WRITERS));

    let tasks: Vec<_> = (0..WRITERS)
        .map(|i| {
            let (store, barrier) = (store.clone(), barrier.clone());
            tokio::spawn(async move {
                let mut d = Document::try_from(json!({ "writer": i })).unwrap();
                barrier.wait().await;
                store.put("contended", &mut d).await
            })
        })
        .collect();

    let mut committed = 0;
    for task in tasks {
        if task.await.unwrap().expect("conflicts must not surface as errors") {
            committed += 1;
        }
    }

    assert_eq!(committed, 1);
    assert_eq!(store.history("contended").await.unwrap(), vec![1]);

    let dir = store.resolve("contended").unwrap();
    let leftovers: Vec<_> = std::fs::read_dir(&dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|name| name != "1.json" && name != "current.json")
        .collect();
    assert!(leftovers.is_empty(), "no staged files or locks may remain: {leftovers:?}");
}

#[test]
fn test_racing_blocking_writers_have_one_winner() {
    let temp = TempDir::new().unwrap();
    let store = Store::builder().root(temp.path()).connect_blocking().unwrap();

    let mut seed = Document::try_from(json!({ "seed": true })).unwrap();
    assert!(store.put_blocking("threads", &mut seed).unwrap());

    let barrier = Arc::new(std::sync::Barrier::new(WRITERS));
    let handles: Vec<_> = (0..WRITERS)
        .map(|i| {
            let (store, barrier, mut d) = (store.clone(), barrier.clone(), seed.clone());
            std::thread::spawn(move || {
                d.insert("writer", i);
                barrier.wait();
                store.put_blocking("threads", &mut d)
            })
        })
        .collect();

    let committed = handles.into_iter().map(|h| h.join().unwrap().unwrap()).filter(|&ok| ok);
    assert_eq!(committed.count(), 1);
    assert_eq!(store.history_blocking("threads").unwrap(), vec![1, 2]);
}

#[test]
fn test_independent_handles_coordinate_through_filesystem() {
    let temp = TempDir::new().unwrap();
    let first = Store::builder().root(temp.path()).connect_blocking().unwrap();
    let second = Store::builder().root(temp.path()).connect_blocking().unwrap();

    let mut a = Document::try_from(json!({ "from": "first" })).unwrap();
    let mut b = Document::try_from(json!({ "from": "second" })).unwrap();
    assert!(first.put_blocking("shared", &mut a).unwrap());
    assert!(!second.put_blocking("shared", &mut b).unwrap());

    let mut fresh = second.get_blocking("shared").unwrap().unwrap();
    fresh.insert("from", "second");
    assert!(second.put_blocking("shared", &mut fresh).unwrap());
    assert_eq!(first.get_blocking("shared").unwrap().unwrap()["from"], "second");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_readers_never_observe_partial_documents() {
    let temp = TempDir::new().unwrap();
    let store = Store::builder().root(temp.path()).connect().await.unwrap();

    let payload = "x".repeat(64 * 1024);
    let mut d = Document::try_from(json!({ "step": 0, "payload": payload.clone() })).unwrap();
    assert!(store.put("visible", &mut d).await.unwrap());

    let done = Arc::new(AtomicBool::new(false));
    let reader = {
        let (store, done, payload) = (store.clone(), done.clone(), payload.clone());
        tokio::spawn(async move {
            let mut reads = 0_u64;
            let mut last_step = 0;
            loop {
                let current = store.get("visible").await.unwrap().expect("never absent");
                let step = current["step"].as_u64().unwrap();
                assert!(step >= last_step, "current must never move backwards");
                assert_eq!(current["payload"], payload.as_str());
                assert_eq!(current.version(), Some(step + 1));
                last_step = step;
                reads += 1;
                if done.load(Ordering::Acquire) {
                    break;
                }
            }
            reads
        })
    };

    for step in 1..=50_u64 {
        d.insert("step", step);
        assert!(store.put("visible", &mut d).await.unwrap());
    }
    done.store(true, Ordering::Release);

    assert!(reader.await.unwrap() > 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_distinct_keys_do_not_contend() {
    let temp = TempDir::new().unwrap();
    let store = Store::builder().root(temp.path()).prefix_length(1).connect().await.unwrap();

    let tasks: Vec<_> = (0..WRITERS)
        .map(|i| {
            let store = store.clone();
            tokio::spawn(async move {
                let mut d = Document::try_from(json!({ "i": i })).unwrap();
                store.put(&format!("key-{i}"), &mut d).await
            })
        })
        .collect();

    for task in tasks {
        assert!(task.await.unwrap().unwrap());
    }
    for i in 0..WRITERS {
        let d = store.get(&format!("key-{i}")).await.unwrap().unwrap();
        assert_eq!(d["i"], json!(i));
    }
}
