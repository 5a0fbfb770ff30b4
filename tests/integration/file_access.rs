use std::io::SeekFrom;
use std::time::Duration;

use blockseek::cluster::memory::PeerBehaviour;
use blockseek::cluster::PeerRef;
use blockseek::{ApiError, FetchError};
use tokio_util::sync::CancellationToken;

use crate::support::{add_file, fixture, read_to_end, FOLDER};

#[tokio::test]
async fn open_by_virtual_path_and_read_whole_file() {
    let fx = fixture(|_| {});
    let data = add_file(&fx.directory, "a/b.txt", 1000, 64, &["p1"]);

    let mut reader = fx.access.open("sync://docs/a/b.txt").await.unwrap();
    assert_eq!(reader.len(), 1000);
    assert_eq!(reader.folder_id(), FOLDER);
    assert_eq!(reader.path(), "a/b.txt");

    let read = read_to_end(&mut reader, 100).await;
    assert_eq!(read, data);
}

#[tokio::test]
async fn normalized_virtual_paths_reach_the_same_file() {
    let fx = fixture(|_| {});
    let data = add_file(&fx.directory, "a/b.txt", 10, 4, &["p1"]);

    let mut reader = fx.access.open("sync://docs/a/./x/..//b.txt").await.unwrap();
    assert_eq!(read_to_end(&mut reader, 3).await, data);
}

#[tokio::test]
async fn traversal_and_unknown_targets_are_rejected() {
    let fx = fixture(|_| {});
    assert!(matches!(
        fx.access.open("sync://docs/../other").await,
        Err(ApiError::PathTraversal(_))
    ));
    assert!(matches!(
        fx.access.open("sync://docs/a/../../secret").await,
        Err(ApiError::PathTraversal(_))
    ));
    assert!(matches!(
        fx.access.open("sync://music/x").await,
        Err(ApiError::FolderNotFound(_))
    ));
    assert!(matches!(
        fx.access.open("sync://docs/never-synced.bin").await,
        Err(ApiError::NotFound { .. })
    ));
    assert!(matches!(
        fx.access.open("no-scheme/docs/x").await,
        Err(ApiError::InvalidPath(_))
    ));
}

#[tokio::test]
async fn virtual_path_round_trip_through_local_path() {
    let fx = fixture(|config| config.scheme = "media".to_string());
    let resolved = fx.access.resolve("media://docs/films/a.mkv").unwrap();
    let root = &fx.access.resolver().registry().get(FOLDER).unwrap().root;
    assert!(resolved.local.starts_with(root));
    assert_eq!(
        fx.access.virtual_path_for(&resolved.local).unwrap(),
        "media://docs/films/a.mkv"
    );
}

#[tokio::test]
async fn random_access_matches_source_bytes() {
    let fx = fixture(|_| {});
    let data = add_file(&fx.directory, "big.bin", 4096 + 17, 512, &["p1", "p2"]);
    let mut reader = fx.access.open("sync://docs/big.bin").await.unwrap();
    let cancel = CancellationToken::new();

    for (start, len) in [(0u64, 1usize), (511, 2), (1000, 1600), (4100, 100), (4112, 5)] {
        reader.seek(SeekFrom::Start(start)).unwrap();
        let mut buf = vec![0u8; len];
        let n = reader.read(&mut buf, &cancel).await.unwrap();
        let end = (start as usize + len).min(data.len());
        assert_eq!(n, end - start as usize);
        assert_eq!(buf[..n], data[start as usize..end]);
    }
}

#[tokio::test]
async fn failed_read_resumes_from_advanced_offset() {
    let fx = fixture(|_| {});
    let data = add_file(&fx.directory, "f.bin", 40, 10, &["p1"]);
    fx.directory
        .set_holders(FOLDER, "f.bin", 2, vec![PeerRef::new("flaky")]);
    fx.directory.set_behaviour(
        "flaky",
        PeerBehaviour::Fail(FetchError::Transport("reset".into())),
    );

    let mut reader = fx.access.open("sync://docs/f.bin").await.unwrap();
    let cancel = CancellationToken::new();
    let mut buf = vec![0u8; 40];

    let err = reader.read(&mut buf, &cancel).await.unwrap_err();
    assert_eq!(err.copied, 20);
    assert!(matches!(
        err.source,
        ApiError::AllPeersFailed { block_index: 2, attempts: 1 }
    ));
    let mut assembled = buf[..20].to_vec();

    fx.directory.set_behaviour("flaky", PeerBehaviour::Serve);
    assembled.extend(read_to_end(&mut reader, 40).await);
    assert_eq!(assembled, data);
}

#[tokio::test]
async fn configured_timeout_skips_stuck_peer() {
    let fx = fixture(|config| config.fetch.timeout_ms = Some(25));
    let data = add_file(&fx.directory, "v.bin", 8, 8, &["stuck", "ok"]);
    fx.directory.set_behaviour("stuck", PeerBehaviour::Hang);

    let mut reader = fx.access.open("sync://docs/v.bin").await.unwrap();
    assert_eq!(read_to_end(&mut reader, 8).await, data);

    let stats = fx.access.peer_stats();
    let stuck = stats.iter().find(|s| s.peer == "stuck").unwrap();
    assert_eq!(stuck.errors, 1);
    assert_eq!(stuck.successes, 0);
}

#[tokio::test]
async fn slow_peer_loses_priority_after_being_measured() {
    let fx = fixture(|_| {});
    let data = add_file(&fx.directory, "s.bin", 60, 10, &["slow", "fast"]);
    fx.directory
        .set_behaviour("slow", PeerBehaviour::Delay(Duration::from_millis(30)));

    let mut reader = fx.access.open("sync://docs/s.bin").await.unwrap();
    assert_eq!(read_to_end(&mut reader, 10).await, data);

    let peers: Vec<String> = fx
        .directory
        .fetches()
        .into_iter()
        .map(|f| f.peer)
        .collect();
    // Both start unseen, so the directory's order decides the first block.
    assert_eq!(peers[0], "slow");
    assert!(peers[1..].iter().all(|p| p == "fast"));
}
