use std::sync::Arc;

use blockseek::cluster::memory::MemoryDirectory;
use blockseek::cluster::PeerRef;
use blockseek::config::{CoreConfig, FolderConfig};
use blockseek::reader::BlockReader;
use blockseek::FileAccess;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

pub const FOLDER: &str = "docs";

pub struct Fixture {
    pub access: FileAccess,
    pub directory: Arc<MemoryDirectory>,
    pub _root: TempDir,
}

pub fn fixture(configure: impl FnOnce(&mut CoreConfig)) -> Fixture {
    let root = TempDir::new().unwrap();
    let mut config = CoreConfig::default();
    config.folders.push(FolderConfig {
        id: FOLDER.to_string(),
        path: root.path().to_path_buf(),
    });
    configure(&mut config);

    let directory = Arc::new(MemoryDirectory::new());
    let access = FileAccess::from_config(&config, directory.clone()).unwrap();
    Fixture {
        access,
        directory,
        _root: root,
    }
}

pub fn patterned(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 7 % 256) as u8).collect()
}

/// Store a file in uniform blocks held by `peers` and return its bytes.
pub fn add_file(directory: &MemoryDirectory, path: &str, len: usize, block_size: u32, peers: &[&str]) -> Vec<u8> {
    let data = patterned(len);
    directory
        .insert_uniform(FOLDER, path, data.clone(), block_size)
        .unwrap();
    directory.set_all_holders(FOLDER, path, peers.iter().map(|p| PeerRef::new(*p)).collect());
    data
}

/// Read from the current offset to end of file in `chunk`-sized reads.
pub async fn read_to_end(reader: &mut BlockReader, chunk: usize) -> Vec<u8> {
    let cancel = CancellationToken::new();
    let mut out = Vec::new();
    let mut buf = vec![0u8; chunk];
    loop {
        let n = reader.read(&mut buf, &cancel).await.unwrap();
        if n == 0 {
            return out;
        }
        out.extend_from_slice(&buf[..n]);
    }
}
