/// Content fingerprints for the duplicate detector.
///
/// Both passes use BLAKE3: the partial hash over a short prefix to reject
/// most same-size files cheaply, the full hash streamed over the whole file
/// to confirm the rest.
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

pub type Digest = blake3::Hash;

/// Hash the first `prefix_len` bytes of `path` (or the whole file if shorter).
pub fn partial_hash(path: &Path, prefix_len: usize) -> io::Result<Digest> {
    let file = File::open(path)?;
    let mut buf = Vec::with_capacity(prefix_len);
    file.take(prefix_len as u64).read_to_end(&mut buf)?;
    Ok(blake3::hash(&buf))
}

/// Stream the entire file through BLAKE3.
pub fn full_hash(path: &Path) -> io::Result<Digest> {
    let mut file = File::open(path)?;
    let mut hasher = blake3::Hasher::new();
    io::copy(&mut file, &mut hasher)?;
    Ok(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn partial_hash_ignores_bytes_past_the_prefix() {
        let tmp = TempDir::new().unwrap();
        let a = tmp.path().join("a");
        let b = tmp.path().join("b");
        let mut content = vec![7u8; 4096];
        std::fs::write(&a, &content).unwrap();
        content[4095] = 8;
        std::fs::write(&b, &content).unwrap();

        assert_eq!(partial_hash(&a, 1024).unwrap(), partial_hash(&b, 1024).unwrap());
        assert_ne!(full_hash(&a).unwrap(), full_hash(&b).unwrap());
    }

    #[test]
    fn full_hash_matches_one_shot_hash() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("f");
        let content: Vec<u8> = (0..200_000u32).map(|i| (i % 251) as u8).collect();
        std::fs::write(&path, &content).unwrap();
        assert_eq!(full_hash(&path).unwrap(), blake3::hash(&content));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let tmp = TempDir::new().unwrap();
        assert!(partial_hash(&tmp.path().join("nope"), 16).is_err());
        assert!(full_hash(&tmp.path().join("nope")).is_err());
    }
}
