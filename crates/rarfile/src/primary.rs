//! Primary decoder: a streaming reader for RAR 1.5-4.x archives.
//!
//! Header layouts are parsed with `rar-stream`'s parsers and compressed data
//! is decoded with its `Rar29Decoder`. The decoder walks headers strictly in
//! stream order but can be repositioned at any file header offset it has
//! reported before, which is what makes random access possible.

use crate::error::{ArchiveError, Result};
use crate::names;
use crc32fast::Hasher;
use rar_stream::parsing::file_header::{FileHeader, FILE_HEADER_TYPE};
use rar_stream::parsing::marker_header::{RAR4_SIGNATURE, RAR5_SIGNATURE};
use rar_stream::parsing::{ArchiveHeaderParser, FileHeaderParser};
use rar_stream::{CompressionMethod, Rar29Decoder, RarError};
use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::ops::RangeInclusive;
use std::path::Path;
use tracing::trace;

const BASE_HEADER_SIZE: u64 = 7;
const ARCHIVE_HEADER_TYPE: u8 = 0x73;
const END_ARCHIVE_TYPE: u8 = 0x7B;
const LONG_BLOCK: u16 = 0x8000;

/// Unpack versions handled by `Rar29Decoder`.
const UNPACK_VERSIONS: RangeInclusive<u8> = 29..=36;

/// Size of `Rar29Decoder`'s sliding window. Output is read back from the
/// window once decoding ends, so larger entries cannot be recovered.
const DECODER_WINDOW: u64 = 0x20_0000;

/// A seekable byte source the primary decoder can read from.
pub trait ReadSeek: Read + Seek + Send {}

impl<T: Read + Seek + Send> ReadSeek for T {}

/// Sequential RAR header reader with seek-and-resume support.
pub struct PrimaryDecoder {
    reader: BufReader<Box<dyn ReadSeek>>,
    length: u64,
    next_header: u64,
    header_position: u64,
    current: Option<CurrentEntry>,
    block: Vec<u8>,
    block_size: usize,
}

/// Per-entry read state, dropped whenever the decoder moves to another header.
struct CurrentEntry {
    header: FileHeader,
    data_offset: u64,
    /// Packed bytes consumed (stored) or unpacked bytes handed out (compressed)
    read: u64,
    produced: u64,
    unpacked: Option<Vec<u8>>,
    hasher: Hasher,
    finished: bool,
}

impl CurrentEntry {
    fn new(header: FileHeader, data_offset: u64) -> Self {
        Self {
            header,
            data_offset,
            read: 0,
            produced: 0,
            unpacked: None,
            hasher: Hasher::new(),
            finished: false,
        }
    }

    fn verify(&self) -> Result<()> {
        if self.produced != self.header.unpacked_size {
            return Err(ArchiveError::SizeMismatch {
                expected: self.header.unpacked_size,
                actual: self.produced,
            });
        }
        let actual = self.hasher.clone().finalize();
        if actual != self.header.file_crc {
            return Err(ArchiveError::DataChecksum {
                expected: self.header.file_crc,
                actual,
            });
        }
        Ok(())
    }
}

impl PrimaryDecoder {
    /// Open an archive file.
    pub fn open(path: &Path, buffer_size: usize, block_size: usize) -> Result<Self> {
        let file = File::open(path)?;
        Self::new(Box::new(file), buffer_size, block_size)
    }

    /// Open an archive from an arbitrary seekable stream.
    pub fn from_reader(
        reader: Box<dyn ReadSeek>,
        buffer_size: usize,
        block_size: usize,
    ) -> Result<Self> {
        Self::new(reader, buffer_size, block_size)
    }

    fn new(inner: Box<dyn ReadSeek>, buffer_size: usize, block_size: usize) -> Result<Self> {
        let mut reader = BufReader::with_capacity(buffer_size.max(1), inner);
        let length = reader.seek(SeekFrom::End(0))?;
        reader.seek(SeekFrom::Start(0))?;

        let mut signature = Vec::with_capacity(RAR5_SIGNATURE.len());
        (&mut reader)
            .take(RAR5_SIGNATURE.len() as u64)
            .read_to_end(&mut signature)?;
        if signature == RAR5_SIGNATURE {
            return Err(ArchiveError::Unsupported("RAR5 archive".to_string()));
        }
        if !signature.starts_with(&RAR4_SIGNATURE) {
            return Err(RarError::InvalidSignature.into());
        }

        let archive_offset = RAR4_SIGNATURE.len() as u64;
        let mut buf = [0u8; ArchiveHeaderParser::HEADER_SIZE];
        read_exact_at(&mut reader, archive_offset, &mut buf)?;
        let archive = ArchiveHeaderParser::parse(&buf)?;
        if archive.header_type != ARCHIVE_HEADER_TYPE {
            return Err(RarError::InvalidHeaderType(archive.header_type).into());
        }
        if archive.is_block_encoded {
            return Err(ArchiveError::Unsupported("encrypted headers".to_string()));
        }

        Ok(Self {
            reader,
            length,
            next_header: archive_offset + u64::from(archive.size),
            header_position: 0,
            current: None,
            block: Vec::new(),
            block_size: block_size.max(1),
        })
    }

    /// Advance to the next file header and return the entry name.
    ///
    /// Returns `Ok(None)` at the end-of-archive block or at the physical end
    /// of the stream. Any unread data of the previous entry is skipped.
    pub fn next_header(&mut self) -> Result<Option<String>> {
        self.current = None;
        loop {
            let offset = self.next_header;
            if offset >= self.length {
                return Ok(None);
            }
            if offset + BASE_HEADER_SIZE > self.length {
                return Err(ArchiveError::Truncated { offset });
            }

            let mut base = [0u8; BASE_HEADER_SIZE as usize];
            read_exact_at(&mut self.reader, offset, &mut base)?;
            let header_type = base[2];
            let flags = u16::from_le_bytes([base[3], base[4]]);
            let head_size = u16::from_le_bytes([base[5], base[6]]);
            if u64::from(head_size) < BASE_HEADER_SIZE {
                return Err(RarError::InvalidHeader.into());
            }

            match header_type {
                END_ARCHIVE_TYPE => return Ok(None),
                FILE_HEADER_TYPE => return self.read_file_header(offset, head_size).map(Some),
                _ => {
                    let mut block_len = u64::from(head_size);
                    if flags & LONG_BLOCK != 0 {
                        if block_len < BASE_HEADER_SIZE + 4 {
                            return Err(RarError::InvalidHeader.into());
                        }
                        let mut add_size = [0u8; 4];
                        read_exact_at(&mut self.reader, offset + BASE_HEADER_SIZE, &mut add_size)?;
                        block_len += u64::from(u32::from_le_bytes(add_size));
                    }
                    if offset + block_len > self.length {
                        return Err(ArchiveError::Truncated { offset });
                    }
                    trace!(offset, header_type, block_len, "skipping block");
                    self.next_header = offset + block_len;
                }
            }
        }
    }

    fn read_file_header(&mut self, offset: u64, head_size: u16) -> Result<String> {
        let mut buf = vec![0u8; usize::from(head_size)];
        read_exact_at(&mut self.reader, offset, &mut buf)?;

        let stored_crc = u16::from_le_bytes([buf[0], buf[1]]);
        if (crc32fast::hash(&buf[2..]) & 0xFFFF) as u16 != stored_crc {
            return Err(ArchiveError::HeaderChecksum { offset });
        }

        let header = FileHeaderParser::parse(&buf)?;
        let name_start = if header.has_high_size { 40 } else { 32 };
        let raw_name = buf
            .get(name_start..name_start + usize::from(header.name_size))
            .ok_or(ArchiveError::Format(RarError::InvalidHeader))?;
        let name = names::decode_file_name(raw_name, header.has_special_name);

        let data_offset = offset + u64::from(head_size);
        let data_end = data_offset
            .checked_add(header.packed_size)
            .filter(|&end| end <= self.length)
            .ok_or(ArchiveError::Truncated { offset })?;

        self.header_position = offset;
        self.next_header = data_end;
        self.current = Some(CurrentEntry::new(header, data_offset));
        Ok(name)
    }

    /// Stream offset of the file header most recently read.
    pub fn header_position(&self) -> u64 {
        self.header_position
    }

    /// Move the underlying stream to `offset`.
    pub fn seek(&mut self, offset: u64) -> Result<()> {
        if offset >= self.length {
            return Err(ArchiveError::InvalidOffset {
                offset,
                length: self.length,
            });
        }
        self.reader.seek(SeekFrom::Start(offset))?;
        Ok(())
    }

    /// Treat the current stream position as the start of a header.
    ///
    /// Must follow [`seek`](Self::seek); drops all cached entry state.
    pub fn reset_header_state(&mut self) -> Result<()> {
        self.current = None;
        self.next_header = self.reader.stream_position()?;
        Ok(())
    }

    /// Return the next block of the current entry's decompressed data.
    ///
    /// `Ok(None)` marks the end of the entry, after its size and CRC32 have
    /// been verified.
    pub fn read_data_block(&mut self) -> Result<Option<&[u8]>> {
        let entry = self.current.as_mut().ok_or(ArchiveError::NoCurrentEntry)?;
        if entry.finished {
            return Ok(None);
        }

        let header = &entry.header;
        if header.is_encrypted {
            return Err(ArchiveError::Unsupported("encrypted entry".to_string()));
        }
        if header.continues_from_previous || header.continues_in_next {
            return Err(ArchiveError::Unsupported("entry spans volumes".to_string()));
        }
        let method = CompressionMethod::from_u8(header.method).ok_or_else(|| {
            ArchiveError::Unsupported(format!("compression method {:#04x}", header.method))
        })?;

        self.block.clear();
        if method == CompressionMethod::Store {
            let remaining = entry.header.packed_size - entry.read;
            let len = remaining.min(self.block_size as u64) as usize;
            if len > 0 {
                self.block.resize(len, 0);
                read_exact_at(&mut self.reader, entry.data_offset + entry.read, &mut self.block)?;
                entry.read += len as u64;
            }
        } else {
            let unpacked = match entry.unpacked.take() {
                Some(unpacked) => unpacked,
                None => decompress_entry(&mut self.reader, &entry.header, entry.data_offset)?,
            };
            let start = entry.read as usize;
            let end = start.saturating_add(self.block_size).min(unpacked.len());
            self.block.extend_from_slice(&unpacked[start..end]);
            entry.read = end as u64;
            entry.unpacked = Some(unpacked);
        }

        if self.block.is_empty() {
            entry.finished = true;
            entry.verify()?;
            return Ok(None);
        }
        entry.hasher.update(&self.block);
        entry.produced += self.block.len() as u64;
        Ok(Some(&self.block))
    }
}

fn decompress_entry(
    reader: &mut BufReader<Box<dyn ReadSeek>>,
    header: &FileHeader,
    data_offset: u64,
) -> Result<Vec<u8>> {
    if header.has_info_from_previous {
        return Err(ArchiveError::Unsupported("solid entry".to_string()));
    }
    if !UNPACK_VERSIONS.contains(&header.version) {
        return Err(ArchiveError::Unsupported(format!(
            "unpack version {}",
            header.version
        )));
    }
    if header.unpacked_size > DECODER_WINDOW {
        return Err(ArchiveError::Unsupported(format!(
            "compressed entry of {} bytes exceeds the {} byte window",
            header.unpacked_size, DECODER_WINDOW
        )));
    }

    let packed_len = usize::try_from(header.packed_size).map_err(|_| ArchiveError::SizeOutOfRange)?;
    let mut packed = Vec::new();
    packed.try_reserve_exact(packed_len)?;
    packed.resize(packed_len, 0);
    read_exact_at(reader, data_offset, &mut packed)?;

    Ok(Rar29Decoder::new().decompress(&packed, header.unpacked_size)?)
}

fn read_exact_at<R: Read + Seek>(reader: &mut R, offset: u64, buf: &mut [u8]) -> Result<()> {
    reader.seek(SeekFrom::Start(offset))?;
    reader.read_exact(buf).map_err(|e| {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            ArchiveError::Truncated { offset }
        } else {
            ArchiveError::Io(e)
        }
    })
}
