//! Owner-only key files shared by the signing and MAC keys.

use std::io::Write;
use std::path::Path;

use zeroize::Zeroizing;

use crate::error::{CryptoError, CryptoResult};

fn io_err(e: &std::io::Error) -> CryptoError {
    CryptoError::IoError(e.to_string())
}

/// Read a 32-byte secret from `path`, or create the file with the secret
/// produced by `generate`.
///
/// - Parent directories are created as needed.
/// - On Unix the file is created with `O_CREAT | O_EXCL` and mode 0o600, so
///   there is no world-readable window and no race with a concurrent writer.
/// - Symlinks are refused on the read path.
/// - Read buffers are zeroized on drop.
pub(crate) fn load_or_create(
    path: &Path,
    generate: impl FnOnce() -> Zeroizing<[u8; 32]>,
) -> CryptoResult<Zeroizing<[u8; 32]>> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| io_err(&e))?;
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        match std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .mode(0o600)
            .open(path)
        {
            Ok(mut file) => {
                let secret = generate();
                file.write_all(secret.as_ref()).map_err(|e| io_err(&e))?;
                return Ok(secret);
            },
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {},
            Err(e) => return Err(io_err(&e)),
        }
    }

    #[cfg(not(unix))]
    if !path.exists() {
        let secret = generate();
        let mut file = std::fs::File::create(path).map_err(|e| io_err(&e))?;
        file.write_all(secret.as_ref()).map_err(|e| io_err(&e))?;
        return Ok(secret);
    }

    let meta = std::fs::symlink_metadata(path).map_err(|e| io_err(&e))?;
    if meta.file_type().is_symlink() {
        return Err(CryptoError::IoError(
            "refusing to read key file: path is a symlink".into(),
        ));
    }

    let bytes = Zeroizing::new(std::fs::read(path).map_err(|e| io_err(&e))?);
    if bytes.len() != 32 {
        return Err(CryptoError::InvalidKeyLength {
            expected: 32,
            actual: bytes.len(),
        });
    }
    let mut secret = Zeroizing::new([0u8; 32]);
    secret.copy_from_slice(&bytes);
    Ok(secret)
}
