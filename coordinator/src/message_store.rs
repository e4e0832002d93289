//! Filesystem-backed storage for uploaded message payloads, keyed by order
//! `uuid`. Grounded on `original_source/server/orders.py::sha256_checksum`
//! and `order_helpers.py::delete_message_file`.

use sha2::Digest;
use sha2::Sha256;
use std::io;
use std::path::Path;
use std::path::PathBuf;

const SHA256_BLOCK_SIZE: usize = 65536;

#[derive(Debug, Clone)]
pub struct MessageStore {
    root: PathBuf,
}

impl MessageStore {
    pub fn new(root: impl Into<PathBuf>) -> io::Result<MessageStore> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(MessageStore { root })
    }

    fn path_for(&self, uuid: &str) -> PathBuf {
        self.root.join(uuid)
    }

    pub fn write(&self, uuid: &str, bytes: &[u8]) -> io::Result<u64> {
        std::fs::write(self.path_for(uuid), bytes)?;
        Ok(bytes.len() as u64)
    }

    pub fn read(&self, uuid: &str) -> io::Result<Vec<u8>> {
        std::fs::read(self.path_for(uuid))
    }

    pub fn path(&self, uuid: &str) -> PathBuf {
        self.path_for(uuid)
    }

    pub fn exists(&self, uuid: &str) -> bool {
        self.path_for(uuid).exists()
    }

    pub fn delete(&self, uuid: &str) -> io::Result<()> {
        let path = self.path_for(uuid);
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        Ok(())
    }

    pub fn size(&self, uuid: &str) -> io::Result<u64> {
        Ok(std::fs::metadata(self.path_for(uuid))?.len())
    }

    /// Hex-encoded SHA-256 digest of the stored payload.
    pub fn sha256_digest(&self, uuid: &str) -> io::Result<String> {
        sha256_checksum(&self.path_for(uuid))
    }
}

fn sha256_checksum(path: &Path) -> io::Result<String> {
    use std::io::Read;

    let mut file = std::fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; SHA256_BLOCK_SIZE];
    loop {
        let read = file.read(&mut buf)?;
        if read == 0 {
            break;
        }
        hasher.update(&buf[..read]);
    }
    Ok(hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_read_delete_round_trip() {
        let dir = std::env::temp_dir().join(format!("queue-commons-test-{}", std::process::id()));
        let store = MessageStore::new(&dir).unwrap();
        store.write("order-1", b"hello satellite").unwrap();
        assert!(store.exists("order-1"));
        assert_eq!(store.read("order-1").unwrap(), b"hello satellite");
        store.delete("order-1").unwrap();
        assert!(!store.exists("order-1"));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn digest_is_stable_sha256() {
        let dir = std::env::temp_dir().join(format!("queue-commons-test-digest-{}", std::process::id()));
        let store = MessageStore::new(&dir).unwrap();
        store.write("order-2", b"abc").unwrap();
        let digest = store.sha256_digest("order-2").unwrap();
        assert_eq!(
            digest,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        std::fs::remove_dir_all(&dir).ok();
    }
}
