use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use tracing::debug;
use crate::error::NacAbeError;

pub fn read_file(path: &Path) -> Result<String, NacAbeError> {
    let mut file = File::open(path)
        .map_err(|why| NacAbeError::encoding(&format!("couldn't open {}: {}", path.display(), why)))?;
    let mut s = String::new();
    file.read_to_string(&mut s)?;
    Ok(s)
}

pub fn read_to_vec(path: &Path) -> Result<Vec<u8>, NacAbeError> {
    let mut file = File::open(path)
        .map_err(|why| NacAbeError::encoding(&format!("couldn't open {}: {}", path.display(), why)))?;
    let mut data: Vec<u8> = Vec::new();
    let bytes = file.read_to_end(&mut data)?;
    debug!(path = %path.display(), bytes, "read file");
    Ok(data)
}

pub fn write_from_vec(path: &Path, data: &[u8]) -> Result<(), NacAbeError> {
    let mut file = File::create(path)
        .map_err(|why| NacAbeError::encoding(&format!("couldn't create {}: {}", path.display(), why)))?;
    file.write_all(data)?;
    debug!(path = %path.display(), bytes = data.len(), "wrote file");
    Ok(())
}

pub fn write_file(path: &Path, content: String) -> Result<(), NacAbeError> {
    write_from_vec(path, content.as_bytes())
}

/// The payload line of a key file framed by a header and a footer line.
pub fn read_raw(raw: &str) -> Result<String, NacAbeError> {
    raw.lines()
        .nth(1)
        .map(|middle| middle.trim().to_string())
        .ok_or_else(|| NacAbeError::encoding("key file has no payload line"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn framed_file_round_trip() {
        let path = std::env::temp_dir().join(format!("nacabe-file-{}.key", std::process::id()));
        write_file(&path, "-----BEGIN PK-----\nabcdef\n-----END PK-----".to_string()).unwrap();
        assert_eq!(read_raw(&read_file(&path).unwrap()).unwrap(), "abcdef");
        write_from_vec(&path, &[1, 2, 3]).unwrap();
        assert_eq!(read_to_vec(&path).unwrap(), vec![1, 2, 3]);
        std::fs::remove_file(&path).unwrap();
        assert!(read_file(&path).is_err());
        assert!(read_raw("only a header").is_err());
    }
}
