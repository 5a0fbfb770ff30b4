use std::sync::Arc;

use blockseek::cluster::memory::PeerBehaviour;
use blockseek::FetchError;

use crate::support::{add_file, fixture, read_to_end};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn many_readers_share_one_model() {
    let fx = fixture(|_| {});
    let data = Arc::new(add_file(&fx.directory, "shared.bin", 2048, 128, &["p1", "p2", "p3"]));
    fx.directory.set_behaviour(
        "p2",
        PeerBehaviour::Fail(FetchError::Unreachable("offline".into())),
    );

    let mut handles = Vec::new();
    for i in 0..8 {
        let access = fx.access.clone();
        let data = data.clone();
        handles.push(tokio::spawn(async move {
            let mut reader = access.open("sync://docs/shared.bin").await.unwrap();
            let read = read_to_end(&mut reader, 100 + i * 37).await;
            assert_eq!(read, *data);
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let stats = fx.access.peer_stats();
    let successes: u64 = stats.iter().map(|s| s.successes).sum();
    assert!(successes >= 8 * 16);
    let p2 = stats.iter().find(|s| s.peer == "p2");
    assert!(p2.map(|s| s.successes == 0).unwrap_or(true));
}
