/*
    FluxFox
    https://github.com/dbalsom/fluxfox

    Copyright 2024 Daniel Balsom

    Permission is hereby granted, free of charge, to any person obtaining a
    copy of this software and associated documentation files (the “Software”),
    to deal in the Software without restriction, including without limitation
    the rights to use, copy, modify, merge, publish, distribute, sublicense,
    and/or sell copies of the Software, and to permit persons to whom the
    Software is furnished to do so, subject to the following conditions:

    The above copyright notice and this permission notice shall be included in
    all copies or substantial portions of the Software.

    THE SOFTWARE IS PROVIDED “AS IS”, WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
    IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
    FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
    AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
    LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING
    FROM, OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER
    DEALINGS IN THE SOFTWARE.

    --------------------------------------------------------------------------
*/

//! # sacdfs
//!
//! sacdfs is a Rust library that presents the contents of a SACD (Super Audio CD) ISO image as
//! a read/write virtual filesystem whose leaves are standard Sony DSF audio files.
//!
//! A host FUSE or WinFSP driver issues path lookups, directory enumerations, and ranged byte
//! reads against a [`vfs::VfsContext`]; sacdfs synthesizes each DSF file on demand from the
//! compressed (DST) or raw DSD streams inside the ISO and injects a generated ID3v2 tag at the
//! file's tail. Nothing is ever written to disk for the audio region: a [`virtual_file::VirtualFile`]
//! computes the DSF header, de-interleaves and bit-reverses sample data, and decompresses DST
//! frames (optionally across a worker pool, see [`mt_pipeline`]) as the consumer reads.
//!
//! The [`overlay`] module maps an existing host directory onto this virtual view, so that an ISO
//! file `Album.iso` appears as a directory `Album/` browsable as DSF tracks, while everything
//! else in the host directory passes through untouched.
//!
//! Low-level ISO sector parsing, disc-text decoding, and the DST entropy decoder are not part of
//! this crate: they are consumed as the [`disc_reader::DiscReader`] and [`dst::DstDecoder`]
//! traits. [`testutil`] ships minimal, deterministic implementations of both so the core is
//! testable without a real SACD image or DST codec.

pub mod buffer_pool;
pub mod disc_reader;
pub mod dst;
pub mod frame_transform;
pub mod header;
pub mod id3_overlay;
pub mod id3_renderer;
pub mod mt_pipeline;
pub mod overlay;
pub mod path;
pub mod virtual_file;
pub mod vfs;
pub mod worker_pool;

#[cfg(any(test, feature = "testutil"))]
pub mod testutil;

use thiserror::Error;

/// SACD frame size in bytes, per channel. Denoted `F` in the design documents.
pub const SACD_FRAME_SIZE: usize = 4704;
/// DSF block size in bytes, per channel. Denoted `B` in the design documents.
pub const DSF_BLOCK_SIZE: usize = 4096;
/// SACD frames per second.
pub const SACD_FRAMES_PER_SECOND: u32 = 75;
/// Number of consecutive SACD frames after which the frame grid and block grid both realign
/// (`lcm(F, B) / F`).
pub const ALIGNMENT_GROUP_FRAMES: u32 = 128;
/// Number of complete DSF blocks per channel emitted by one alignment group (`lcm(F, B) / B`).
pub const ALIGNMENT_GROUP_BLOCKS: usize = 147;
/// Size in bytes of the synthesized DSF header (DSD chunk + fmt chunk + data chunk header).
pub const DSF_HEADER_SIZE: u64 = 92;

/// Stable numeric error codes, shared with any external (FUSE/WinFSP) caller that cannot observe
/// Rust types across its binding boundary.
pub mod error_code {
    pub const OK: i32 = 0;
    pub const INVALID_PARAMETER: i32 = -1;
    pub const NOT_FOUND: i32 = -2;
    pub const IO: i32 = -3;
    pub const MEMORY: i32 = -4;
    pub const NOT_OPEN: i32 = -5;
    pub const SEEK: i32 = -6;
    pub const READ: i32 = -7;
    pub const FORMAT: i32 = -8;
    pub const DST_DECODE: i32 = -9;
    pub const EOF: i32 = -10;
}

/// The crate-wide error type. Every public fallible operation returns this (or a component-local
/// error that converts into it), matching the one-enum-per-crate-boundary style used throughout
/// the teacher's `DiskImageError`.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("an invalid parameter was supplied: {0}")]
    InvalidParameter(String),
    #[error("the requested area or track could not be found")]
    NotFound,
    #[error("an IO error occurred reading the disc or the sidecar file: {0}")]
    Io(String),
    #[error("a memory allocation failed")]
    Memory,
    #[error("the virtual file is not open")]
    NotOpen,
    #[error("the requested seek position is invalid")]
    Seek,
    #[error("a read from the disc reader failed: {0}")]
    Read(String),
    #[error("malformed data: {0}")]
    Format(String),
    #[error("DST decompression failed: {0}")]
    DstDecode(String),
    #[error("end of file")]
    Eof,
}

impl CoreError {
    /// The stable numeric code (§6.8) corresponding to this error's kind.
    pub fn code(&self) -> i32 {
        match self {
            CoreError::InvalidParameter(_) => error_code::INVALID_PARAMETER,
            CoreError::NotFound => error_code::NOT_FOUND,
            CoreError::Io(_) => error_code::IO,
            CoreError::Memory => error_code::MEMORY,
            CoreError::NotOpen => error_code::NOT_OPEN,
            CoreError::Seek => error_code::SEEK,
            CoreError::Read(_) => error_code::READ,
            CoreError::Format(_) => error_code::FORMAT,
            CoreError::DstDecode(_) => error_code::DST_DECODE,
            CoreError::Eof => error_code::EOF,
        }
    }
}

impl From<std::io::Error> for CoreError {
    fn from(err: std::io::Error) -> Self {
        CoreError::Io(err.to_string())
    }
}

impl From<binrw::Error> for CoreError {
    fn from(err: binrw::Error) -> Self {
        CoreError::Format(err.to_string())
    }
}

pub type CoreResult<T> = Result<T, CoreError>;

/// One of the two audio areas a SACD may carry.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum AudioArea {
    Stereo,
    MultiChannel,
}

impl AudioArea {
    /// The directory name this area is enumerated under (§6.7).
    pub fn dir_name(&self) -> &'static str {
        match self {
            AudioArea::Stereo => "Stereo",
            AudioArea::MultiChannel => "Multi-channel",
        }
    }
}

impl std::fmt::Display for AudioArea {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.dir_name())
    }
}

/// The frame encoding used by all tracks within one area.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FrameFormat {
    RawDsd,
    Dst,
}
