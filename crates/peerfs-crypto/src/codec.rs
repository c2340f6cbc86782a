//! Streaming staging codec.
//!
//! Publishing turns a file into a staging blob: the file is gzip-compressed
//! and the compressed stream is encrypted with AES-256-CTR. The key is
//! [`derive_key`] of the password and the IV is the content tag. Downloading
//! applies the exact inverse.
//!
//! Both directions stream in fixed chunks and never hold the whole file in
//! memory. CTR mode keeps ciphertext and plaintext the same length, so the
//! staging blob is exactly as long as the compressed stream.

use crate::hash::derive_key;
use crate::tag::Tag;
use crate::{CryptoError, IV_SIZE, KEY_SIZE};
use aes::Aes256;
use async_compression::tokio::bufread::GzipEncoder;
use async_compression::tokio::write::GzipDecoder;
use ctr::Ctr128BE;
use ctr::cipher::{KeyIvInit, StreamCipher};
use std::io::ErrorKind;
use std::path::Path;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufReader};
use tracing::debug;

type Aes256Ctr = Ctr128BE<Aes256>;

/// Streaming chunk size
const CHUNK_SIZE: usize = 64 * 1024;

fn new_cipher(password: &str, tag: &Tag) -> Result<Aes256Ctr, CryptoError> {
    let key = derive_key(password);
    let iv = tag.as_bytes();
    if iv.len() != IV_SIZE {
        return Err(CryptoError::InvalidTagLength {
            expected: IV_SIZE,
            actual: iv.len(),
        });
    }
    Aes256Ctr::new_from_slices(key.as_bytes(), iv).map_err(|_| CryptoError::InvalidKeyLength {
        expected: KEY_SIZE,
        actual: key.as_bytes().len(),
    })
}

/// Compress `input` with gzip, encrypt it with AES-256-CTR and write the
/// result to `output`.
///
/// `output` is created or truncated. The returned future resolves only after
/// the output has been flushed and synced to disk.
///
/// # Errors
///
/// Returns [`CryptoError::Read`] if the input cannot be opened or read, and
/// [`CryptoError::Write`] if the output cannot be written or synced.
pub async fn compress_and_encrypt(
    input: &Path,
    output: &Path,
    password: &str,
    tag: &Tag,
) -> Result<(), CryptoError> {
    let mut cipher = new_cipher(password, tag)?;

    let source = File::open(input).await.map_err(CryptoError::Read)?;
    let mut encoder = GzipEncoder::new(BufReader::new(source));
    let mut sink = File::create(output).await.map_err(CryptoError::Write)?;

    let mut buf = vec![0u8; CHUNK_SIZE];
    let mut total = 0u64;
    loop {
        let n = encoder.read(&mut buf).await.map_err(CryptoError::Read)?;
        if n == 0 {
            break;
        }
        cipher.apply_keystream(&mut buf[..n]);
        sink.write_all(&buf[..n]).await.map_err(CryptoError::Write)?;
        total += n as u64;
    }

    sink.flush().await.map_err(CryptoError::Write)?;
    sink.sync_all().await.map_err(CryptoError::Write)?;

    debug!(
        input = %input.display(),
        output = %output.display(),
        bytes = total,
        "Staged file"
    );
    Ok(())
}

/// Decrypt `input` with AES-256-CTR, decompress it with gzip and write the
/// plaintext to `output`.
///
/// # Errors
///
/// Returns [`CryptoError::CorruptStream`] if the decrypted data is not a
/// complete gzip stream. This is what a wrong password or tag looks like.
/// I/O failures map to [`CryptoError::Read`] and [`CryptoError::Write`].
pub async fn decrypt_and_decompress(
    input: &Path,
    output: &Path,
    password: &str,
    tag: &Tag,
) -> Result<(), CryptoError> {
    let mut cipher = new_cipher(password, tag)?;

    let mut source = File::open(input).await.map_err(CryptoError::Read)?;
    let sink = File::create(output).await.map_err(CryptoError::Write)?;
    let mut decoder = GzipDecoder::new(sink);

    let mut buf = vec![0u8; CHUNK_SIZE];
    let mut total = 0u64;
    loop {
        let n = source.read(&mut buf).await.map_err(CryptoError::Read)?;
        if n == 0 {
            break;
        }
        cipher.apply_keystream(&mut buf[..n]);
        decoder.write_all(&buf[..n]).await.map_err(classify)?;
        total += n as u64;
    }

    decoder.shutdown().await.map_err(classify)?;
    decoder
        .into_inner()
        .sync_all()
        .await
        .map_err(CryptoError::Write)?;

    debug!(
        input = %input.display(),
        output = %output.display(),
        bytes = total,
        "Restored file"
    );
    Ok(())
}

// The decoder reports malformed or truncated gzip data through the same
// io::Error channel as failures of the file underneath it.
fn classify(err: std::io::Error) -> CryptoError {
    match err.kind() {
        ErrorKind::InvalidData | ErrorKind::InvalidInput | ErrorKind::UnexpectedEof => {
            CryptoError::CorruptStream(err)
        }
        _ => CryptoError::Write(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn pattern(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i * 7 + i / 13) as u8).collect()
    }

    async fn round_trip(data: &[u8]) -> Vec<u8> {
        let dir = TempDir::new().unwrap();
        let plain = dir.path().join("plain");
        let staged = dir.path().join("staged");
        let restored = dir.path().join("restored");
        tokio::fs::write(&plain, data).await.unwrap();

        let tag = Tag::generate().unwrap();
        compress_and_encrypt(&plain, &staged, "hunter2", &tag)
            .await
            .unwrap();
        decrypt_and_decompress(&staged, &restored, "hunter2", &tag)
            .await
            .unwrap();

        tokio::fs::read(&restored).await.unwrap()
    }

    #[tokio::test]
    async fn test_round_trip_boundary_lengths() {
        for len in [0usize, 1, 255, 256, 257] {
            let data = pattern(len);
            assert_eq!(round_trip(&data).await, data, "length {len}");
        }
    }

    #[tokio::test]
    async fn test_round_trip_multi_chunk() {
        let data = pattern(CHUNK_SIZE * 3 + 17);
        assert_eq!(round_trip(&data).await, data);
    }

    #[tokio::test]
    async fn test_staged_bytes_are_not_plain_gzip() {
        let dir = TempDir::new().unwrap();
        let plain = dir.path().join("plain");
        let staged = dir.path().join("staged");
        tokio::fs::write(&plain, b"hello swarm").await.unwrap();

        let tag = Tag::from_bytes([7u8; 16]);
        compress_and_encrypt(&plain, &staged, "pw", &tag)
            .await
            .unwrap();

        let bytes = tokio::fs::read(&staged).await.unwrap();
        assert!(!bytes.is_empty());
        assert_ne!(&bytes[..2], &[0x1f, 0x8b]);
    }

    #[tokio::test]
    async fn test_wrong_password_fails() {
        let dir = TempDir::new().unwrap();
        let plain = dir.path().join("plain");
        let staged = dir.path().join("staged");
        let restored = dir.path().join("restored");
        tokio::fs::write(&plain, pattern(1000)).await.unwrap();

        let tag = Tag::generate().unwrap();
        compress_and_encrypt(&plain, &staged, "right", &tag)
            .await
            .unwrap();

        let result = decrypt_and_decompress(&staged, &restored, "wrong", &tag).await;
        assert!(matches!(result, Err(CryptoError::CorruptStream(_))));
    }

    #[tokio::test]
    async fn test_truncated_stream_fails() {
        let dir = TempDir::new().unwrap();
        let plain = dir.path().join("plain");
        let staged = dir.path().join("staged");
        let restored = dir.path().join("restored");
        tokio::fs::write(&plain, pattern(4096)).await.unwrap();

        let tag = Tag::generate().unwrap();
        compress_and_encrypt(&plain, &staged, "pw", &tag)
            .await
            .unwrap();

        let bytes = tokio::fs::read(&staged).await.unwrap();
        tokio::fs::write(&staged, &bytes[..bytes.len() / 2])
            .await
            .unwrap();

        let result = decrypt_and_decompress(&staged, &restored, "pw", &tag).await;
        assert!(matches!(result, Err(CryptoError::CorruptStream(_))));
    }

    #[tokio::test]
    async fn test_missing_input_is_read_error() {
        let dir = TempDir::new().unwrap();
        let tag = Tag::generate().unwrap();
        let result = compress_and_encrypt(
            &dir.path().join("does-not-exist"),
            &dir.path().join("out"),
            "pw",
            &tag,
        )
        .await;
        assert!(matches!(result, Err(CryptoError::Read(_))));
    }
}
