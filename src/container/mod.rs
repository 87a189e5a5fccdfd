use std::io::{self, Read, Write};

use byteorder::{ByteOrder, LittleEndian};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use thiserror::Error;

use crate::config;
use crate::crypto::{self, CryptoError, Key};

#[derive(Error, Debug)]
pub enum ContainerError {
    #[error("malformed container: {0}")]
    Malformed(String),
    #[error("authentication failed: wrong password or corrupted data")]
    Authentication,
    #[error("encryption failed")]
    Encryption,
    #[error("field of {0} bytes does not fit in a container (limit 4 GiB)")]
    FieldTooLarge(usize),
    #[error("compression failed: {0}")]
    Compression(#[from] io::Error),
}

/// The logical container record, before compression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub tag: [u8; config::TAG_SIZE],
    pub ciphertext: Vec<u8>,
    pub filename: String,
}

/// A successfully authenticated and decrypted container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Opened {
    pub data: Vec<u8>,
    pub filename: String,
}

/// Encrypt `data`, record it with `filename`, and gzip the serialized record.
///
/// The filename is bound to the ciphertext as associated data.
pub fn build(data: &[u8], filename: &str, key: &Key) -> Result<Vec<u8>, ContainerError> {
    let (tag, ciphertext) =
        crypto::encrypt(key, filename.as_bytes(), data).map_err(|_| ContainerError::Encryption)?;

    let record = Record {
        tag,
        ciphertext,
        filename: filename.to_string(),
    };

    compress(&serialize_record(&record)?)
}

/// Inverse of [`build`]: decompress, parse, then authenticate and decrypt.
///
/// Bytes after the gzip trailer (the last frame's zero padding) are ignored.
pub fn open(blob: &[u8], key: &Key) -> Result<Opened, ContainerError> {
    let serialized = decompress(blob)?;
    let record = deserialize_record(&serialized)?;

    let data = crypto::decrypt(
        key,
        record.filename.as_bytes(),
        &record.tag,
        &record.ciphertext,
    )
    .map_err(|e| match e {
        CryptoError::Authentication => ContainerError::Authentication,
        other => ContainerError::Malformed(other.to_string()),
    })?;

    Ok(Opened {
        data,
        filename: record.filename,
    })
}

/// Serialize a record: `magic | version | (id u8, len u32 LE, value)*`.
///
/// Fails with [`ContainerError::FieldTooLarge`] when a field is longer than a
/// `u32` length can describe.
pub fn serialize_record(record: &Record) -> Result<Vec<u8>, ContainerError> {
    let capacity = config::MAGIC.len()
        + 1
        + 3 * config::FIELD_HEADER_SIZE
        + record.tag.len()
        + record.ciphertext.len()
        + record.filename.len();

    let mut out = Vec::with_capacity(capacity);
    out.extend_from_slice(config::MAGIC);
    out.push(config::CONTAINER_VERSION);
    write_field(&mut out, config::FIELD_TAG, &record.tag)?;
    write_field(&mut out, config::FIELD_CIPHERTEXT, &record.ciphertext)?;
    write_field(&mut out, config::FIELD_FILENAME, record.filename.as_bytes())?;
    Ok(out)
}

fn write_field(out: &mut Vec<u8>, id: u8, value: &[u8]) -> Result<(), ContainerError> {
    let mut header = [0u8; config::FIELD_HEADER_SIZE];
    header[0] = id;
    LittleEndian::write_u32(&mut header[1..], field_len(value.len())?);
    out.extend_from_slice(&header);
    out.extend_from_slice(value);
    Ok(())
}

fn field_len(len: usize) -> Result<u32, ContainerError> {
    u32::try_from(len).map_err(|_| ContainerError::FieldTooLarge(len))
}

/// Parse a serialized record. Every field must appear exactly once; unknown ids are skipped.
pub fn deserialize_record(data: &[u8]) -> Result<Record, ContainerError> {
    let preamble = config::MAGIC.len() + 1;
    if data.len() < preamble {
        return Err(malformed(format!(
            "record too short: need {} bytes, have {}",
            preamble,
            data.len()
        )));
    }
    if &data[..config::MAGIC.len()] != config::MAGIC {
        return Err(malformed("invalid magic"));
    }
    let version = data[config::MAGIC.len()];
    if version != config::CONTAINER_VERSION {
        return Err(malformed(format!("unsupported version: {}", version)));
    }

    let mut tag: Option<&[u8]> = None;
    let mut ciphertext: Option<&[u8]> = None;
    let mut filename: Option<&[u8]> = None;

    let mut offset = preamble;
    while offset < data.len() {
        if data.len() - offset < config::FIELD_HEADER_SIZE {
            return Err(malformed(format!("truncated field header at offset {}", offset)));
        }
        let id = data[offset];
        let len = LittleEndian::read_u32(&data[offset + 1..]) as usize;
        let start = offset + config::FIELD_HEADER_SIZE;
        if data.len() - start < len {
            return Err(malformed(format!(
                "field {} needs {} bytes, have {}",
                id,
                len,
                data.len() - start
            )));
        }
        let value = &data[start..start + len];

        let slot = match id {
            config::FIELD_TAG => &mut tag,
            config::FIELD_CIPHERTEXT => &mut ciphertext,
            config::FIELD_FILENAME => &mut filename,
            _ => {
                offset = start + len;
                continue;
            }
        };
        if slot.replace(value).is_some() {
            return Err(malformed(format!("duplicate field {}", id)));
        }
        offset = start + len;
    }

    let tag = tag.ok_or_else(|| malformed("missing tag"))?;
    if tag.len() != config::TAG_SIZE {
        let reason = format!("tag must be {} bytes, got {}", config::TAG_SIZE, tag.len());
        return Err(malformed(reason));
    }
    let mut tag_bytes = [0u8; config::TAG_SIZE];
    tag_bytes.copy_from_slice(tag);

    let ciphertext = ciphertext.ok_or_else(|| malformed("missing ciphertext"))?;
    let filename = filename.ok_or_else(|| malformed("missing filename"))?;
    let filename =
        std::str::from_utf8(filename).map_err(|_| malformed("filename is not valid UTF-8"))?;

    Ok(Record {
        tag: tag_bytes,
        ciphertext: ciphertext.to_vec(),
        filename: filename.to_string(),
    })
}

fn malformed(reason: impl Into<String>) -> ContainerError {
    ContainerError::Malformed(reason.into())
}

fn compress(data: &[u8]) -> Result<Vec<u8>, ContainerError> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

/// Decode a single gzip member; anything after its trailer is left unread.
fn decompress(data: &[u8]) -> Result<Vec<u8>, ContainerError> {
    let mut decoder = GzDecoder::new(data);
    let mut out = Vec::new();
    decoder
        .read_to_end(&mut out)
        .map_err(|e| malformed(format!("decompression failed: {}", e)))?;
    Ok(out)
}
