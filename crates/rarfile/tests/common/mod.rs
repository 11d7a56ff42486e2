#![allow(dead_code)]

use rarfile::{ArchiveError, Fallback, FallbackMode, FileData, OpenOptions};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

pub const RAR4_SIGNATURE: &[u8] = b"Rar!\x1a\x07\x00";
pub const RAR5_SIGNATURE: &[u8] = b"Rar!\x1a\x07\x01\x00";

pub const FILE_HEADER: u8 = 0x74;
pub const ENCRYPTED: u16 = 0x0004;
const LONG_BLOCK: u16 = 0x8000;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("debug")),
        )
        .with_test_writer()
        .try_init();
}

pub fn setup_test_dir() -> TempDir {
    TempDir::new().expect("Failed to create temp dir")
}

fn with_header_crc(mut block: Vec<u8>, head_size: usize) -> Vec<u8> {
    let crc = (crc32fast::hash(&block[2..head_size]) & 0xFFFF) as u16;
    block[..2].copy_from_slice(&crc.to_le_bytes());
    block
}

/// A stored (method 0x30) RAR 2.9 file block: header followed by data.
pub fn file_block(name: &str, data: &[u8], flags: u16) -> Vec<u8> {
    let name = name.replace('/', "\\");
    let head_size = 32 + name.len();
    let mut block = vec![0, 0, FILE_HEADER];
    block.extend_from_slice(&(flags | LONG_BLOCK).to_le_bytes());
    block.extend_from_slice(&(head_size as u16).to_le_bytes());
    block.extend_from_slice(&(data.len() as u32).to_le_bytes()); // packed size
    block.extend_from_slice(&(data.len() as u32).to_le_bytes()); // unpacked size
    block.push(2); // host OS
    block.extend_from_slice(&crc32fast::hash(data).to_le_bytes());
    block.extend_from_slice(&0u32.to_le_bytes()); // mtime
    block.push(29); // unpack version
    block.push(0x30); // method
    block.extend_from_slice(&(name.len() as u16).to_le_bytes());
    block.extend_from_slice(&0x20u32.to_le_bytes()); // attributes
    block.extend_from_slice(name.as_bytes());
    let mut block = with_header_crc(block, head_size);
    block.extend_from_slice(data);
    block
}

/// A method 0x33 block declaring `unpacked_size` over a few filler bytes.
pub fn compressed_block(name: &str, unpacked_size: u32) -> Vec<u8> {
    let mut block = file_block(name, &[0u8; 16], 0);
    let head_size = 32 + name.len();
    block[11..15].copy_from_slice(&unpacked_size.to_le_bytes());
    block[25] = 0x33;
    let header = with_header_crc(block[..head_size].to_vec(), head_size);
    block[..head_size].copy_from_slice(&header);
    block
}

/// Path of a file under `tests/fixtures`.
pub fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

/// A file block whose stored data no longer matches its CRC32.
pub fn corrupt_data_block(name: &str, data: &[u8]) -> Vec<u8> {
    let mut block = file_block(name, data, 0);
    let last = block.len() - 1;
    block[last] ^= 0x01;
    block
}

/// A file block whose header CRC16 is wrong.
pub fn corrupt_header_block(name: &str, data: &[u8]) -> Vec<u8> {
    let mut block = file_block(name, data, 0);
    block[0] ^= 0xFF;
    block
}

/// Wrap blocks in a signature, archive header and end-of-archive block.
pub fn rar4_archive(blocks: &[Vec<u8>]) -> Vec<u8> {
    let mut out = RAR4_SIGNATURE.to_vec();
    out.extend(with_header_crc(
        vec![0, 0, 0x73, 0, 0, 13, 0, 0, 0, 0, 0, 0, 0],
        13,
    ));
    for block in blocks {
        out.extend_from_slice(block);
    }
    out.extend(with_header_crc(vec![0, 0, 0x7B, 0, 0x40, 7, 0], 7));
    out
}

/// A stored archive holding `files` in order.
pub fn stored_archive(files: &[(&str, &[u8])]) -> Vec<u8> {
    let blocks: Vec<_> = files
        .iter()
        .map(|(name, data)| file_block(name, data, 0))
        .collect();
    rar4_archive(&blocks)
}

pub fn rar5_archive() -> Vec<u8> {
    let mut out = RAR5_SIGNATURE.to_vec();
    out.extend_from_slice(&[0; 64]);
    out
}

pub fn write_archive(dir: &TempDir, name: &str, bytes: &[u8]) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, bytes).expect("Failed to write archive");
    path
}

/// Counters shared between a test and the fallback engines it hands out.
#[derive(Default, Clone)]
pub struct FallbackStats {
    pub created: Arc<AtomicUsize>,
    pub listed: Arc<AtomicUsize>,
    pub extracted: Arc<Mutex<Vec<String>>>,
}

impl FallbackStats {
    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    pub fn listed(&self) -> usize {
        self.listed.load(Ordering::SeqCst)
    }

    pub fn extracted(&self) -> Vec<String> {
        self.extracted.lock().unwrap().clone()
    }
}

/// In-memory fallback engine serving a fixed set of entries.
pub struct MockFallback {
    files: Vec<(String, Vec<u8>)>,
    stats: FallbackStats,
}

impl Fallback for MockFallback {
    fn list_names(&mut self, visit: &mut dyn FnMut(String)) -> rarfile::Result<()> {
        self.stats.listed.fetch_add(1, Ordering::SeqCst);
        for (name, _) in &self.files {
            visit(name.clone());
        }
        Ok(())
    }

    fn extract(&mut self, name: &str) -> rarfile::Result<FileData> {
        self.stats.extracted.lock().unwrap().push(name.to_string());
        let (_, data) = self
            .files
            .iter()
            .find(|(candidate, _)| candidate.eq_ignore_ascii_case(name))
            .ok_or_else(|| ArchiveError::EntryNotFound(name.to_string()))?;
        FileData::from_vec(data.clone())
    }
}

/// Options whose fallback serves `files` and records its use in the returned stats.
pub fn mock_options(files: &[(&str, &[u8])]) -> (OpenOptions, FallbackStats) {
    let files: Vec<(String, Vec<u8>)> = files
        .iter()
        .map(|(name, data)| (name.to_string(), data.to_vec()))
        .collect();
    let stats = FallbackStats::default();
    let shared = stats.clone();
    let factory = move |_: &Path| -> Box<dyn Fallback> {
        shared.created.fetch_add(1, Ordering::SeqCst);
        Box::new(MockFallback {
            files: files.clone(),
            stats: shared.clone(),
        })
    };
    let options = OpenOptions {
        fallback: FallbackMode::custom(factory),
        ..OpenOptions::default()
    };
    (options, stats)
}

pub fn disabled_options() -> OpenOptions {
    OpenOptions {
        fallback: FallbackMode::Disabled,
        ..OpenOptions::default()
    }
}
