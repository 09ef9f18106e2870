//! The [`DiscReader`] trait is the only interface this crate has onto a SACD ISO. Low-level ISO
//! parsing, sector I/O, area selection, track indexing, and disc text decoding are all deliberately
//! out of scope (§1) and live behind this trait; a real implementation would wrap a disc/sector
//! reader crate, while [`crate::testutil::SyntheticDiscReader`] backs the test suite.

use crate::{AudioArea, CoreResult, FrameFormat};

/// The kind of disc-text field the ID3 renderer (§6.3) may request.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TextKind {
    Title,
    Artist,
    Album,
    Genre,
}

/// One contiguous span of SACD frames belonging to a single track within one area.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TrackInfo {
    pub area: AudioArea,
    /// 1-based track number.
    pub track_number: u8,
    /// Inclusive start frame, in SACD frames (75/sec).
    pub start_frame: u32,
    /// Exclusive end frame.
    pub end_frame: u32,
}

impl TrackInfo {
    /// Number of SACD frames this track spans.
    pub fn frame_length(&self) -> u32 {
        self.end_frame - self.start_frame
    }

    /// Track duration in seconds.
    pub fn duration_secs(&self) -> f64 {
        self.frame_length() as f64 / crate::SACD_FRAMES_PER_SECOND as f64
    }
}

/// One compressed-or-raw frame read from the disc, plus the frame size the reader actually
/// produced (DST frames vary in length; raw DSD frames are always `channel_count * SACD_FRAME_SIZE`).
pub struct FrameRead {
    pub data: Vec<u8>,
}

/// Capability consumed by the core to enumerate a SACD's structure and pull frame data from it.
/// Implementations own whatever sector/ISO state they need; per §3 "Ownership summary", a
/// [`crate::virtual_file::VirtualFile`] holds its own private instance so two tracks can be read
/// concurrently without cross-file coordination.
pub trait DiscReader: Send {
    /// Areas this disc actually carries.
    fn available_areas(&self) -> Vec<AudioArea>;

    /// Select the area that subsequent calls operate against. Implementations should only expect
    /// this to be called once per instance at open time (see the open question in spec.md §9).
    fn select_area(&mut self, area: AudioArea) -> CoreResult<()>;

    /// Number of tracks in the currently selected area.
    fn track_count(&self) -> CoreResult<u8>;

    /// The currently selected area's channel count (1-6).
    fn area_channel_count(&self) -> CoreResult<u16>;

    /// The currently selected area's sample rate in Hz (e.g. 2_822_400 for DSD64).
    fn area_sample_frequency(&self) -> CoreResult<u32>;

    /// The currently selected area's frame format.
    fn area_frame_format(&self) -> CoreResult<FrameFormat>;

    /// The frame-range of one 1-based track in the currently selected area.
    fn track_info(&self, track_number: u8) -> CoreResult<TrackInfo>;

    /// Read one frame (compressed DST payload or raw DSD bytes) at the given absolute frame
    /// number, within whatever area is currently selected.
    fn read_frame(&mut self, frame_number: u32) -> CoreResult<FrameRead>;

    /// A piece of disc or track text used only by the ID3 renderer (§6.3), e.g. track title or
    /// album artist. Returns an empty string if the field is absent, never an error.
    fn text(&self, track_number: Option<u8>, kind: TextKind) -> String;

    /// Sanitized disc/album name, suitable for use as a directory component (§4.6).
    fn album_name(&self) -> String;
}
