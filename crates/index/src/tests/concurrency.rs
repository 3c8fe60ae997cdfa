//! Readers and writers sharing one engine across threads.

use super::toy_corpus;
use crate::config::EngineConfig;
use crate::manager::IndexManager;
use crate::types::{Document, FindOptions};
use std::sync::Arc;
use std::thread;

#[test]
fn test_concurrent_queries_during_mutation() {
    let manager = Arc::new(IndexManager::new(EngineConfig::default()));
    manager.train(Some(toy_corpus()), Some("lsi")).unwrap();
    manager.index(Some(toy_corpus())).unwrap();

    let writer = {
        let manager = Arc::clone(&manager);
        thread::spawn(move || {
            for round in 0..20 {
                let id = format!("extra_{}", round);
                manager
                    .index(Some(vec![Document::new(id.clone(), "graph minors survey")]))
                    .unwrap();
                if round % 5 == 4 {
                    manager.optimize();
                }
                manager.delete([id]);
            }
        })
    };

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let manager = Arc::clone(&manager);
            thread::spawn(move || {
                for _ in 0..50 {
                    let results = manager
                        .find_similar(
                            "en__8",
                            FindOptions::default().with_min_score(f32::NEG_INFINITY),
                        )
                        .unwrap();

                    // Each read sees either the base corpus or base plus one extra
                    assert!(results.len() == 9 || results.len() == 10);
                    assert!(results
                        .windows(2)
                        .all(|w| w[0].score >= w[1].score));

                    let status = manager.status();
                    assert!(status.documents_indexed >= 9);
                }
            })
        })
        .collect();

    writer.join().unwrap();
    for reader in readers {
        reader.join().unwrap();
    }

    assert_eq!(manager.status().documents_indexed, 9);
}

#[test]
fn test_status_during_buffering() {
    let manager = Arc::new(IndexManager::new(EngineConfig::default()));

    let handles: Vec<_> = (0..4)
        .map(|t| {
            let manager = Arc::clone(&manager);
            thread::spawn(move || {
                for i in 0..10 {
                    manager.buffer(vec![Document::new(
                        format!("t{}_{}", t, i),
                        "user interface",
                    )]);
                    let _ = manager.status();
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(manager.status().documents_buffered, 40);
}
