//! The header synthesizer (§4.2) produces the fixed 92-byte DSF header for one track and reports
//! the three region offsets `H` (header size), `M` (metadata offset) and `T` (total file size).
//! Layout mirrors the teacher's `binrw`-derived header structs (e.g. its sector/track header
//! readers): one `#[derive(BinWrite)]` struct with explicit `#[bw(magic = ...)]` tags for the
//! fixed ASCII chunk names.

use binrw::BinWrite;
use std::io::Cursor;

use crate::CoreResult;

/// Channel type field in the DSF `fmt ` chunk (offset 48). Defaults to stereo for any channel
/// count the format doesn't have a dedicated code for (§4.2 table, "default to stereo on
/// unknown").
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u32)]
pub enum ChannelType {
    Mono = 1,
    Stereo = 2,
    Channels3 = 3,
    Channels4 = 4,
    Channels5 = 6,
    Channels51 = 7,
}

impl ChannelType {
    pub fn from_channel_count(channel_count: u16) -> Self {
        match channel_count {
            1 => ChannelType::Mono,
            2 => ChannelType::Stereo,
            3 => ChannelType::Channels3,
            4 => ChannelType::Channels4,
            5 => ChannelType::Channels5,
            6 => ChannelType::Channels51,
            _ => ChannelType::Stereo,
        }
    }
}

#[derive(BinWrite)]
#[bw(little)]
struct DsfHeader {
    #[bw(magic = b"DSD ")]
    dsd_chunk_size: u64,
    total_file_size: u64,
    metadata_offset: u64,

    #[bw(magic = b"fmt ")]
    fmt_chunk_size: u64,
    format_version: u32,
    format_id: u32,
    channel_type: u32,
    channel_count: u32,
    sampling_frequency: u32,
    bits_per_sample: u32,
    sample_count: u64,
    block_size_per_channel: u32,
    reserved: u32,

    #[bw(magic = b"data")]
    data_chunk_size: u64,
}

/// Parameters the header synthesizer needs to compute a track's three region offsets and render
/// its header bytes (§4.2 "Inputs").
#[derive(Copy, Clone, Debug)]
pub struct HeaderParams {
    pub channel_count: u16,
    pub sample_rate: u32,
    /// Sample count per channel (i.e. total bits per channel, one bit per DSD sample).
    pub sample_count_per_channel: u64,
    pub audio_data_size: u64,
    pub metadata_size: u64,
}

/// The rendered header plus the three derived region offsets (§4.2 "Derived").
#[derive(Clone, Debug)]
pub struct SynthesizedHeader {
    pub bytes: Vec<u8>,
    /// Header size; always `DSF_HEADER_SIZE`.
    pub header_size: u64,
    /// Start of the metadata region.
    pub metadata_offset: u64,
    /// Total synthetic file size.
    pub total_size: u64,
}

/// Render the 92-byte DSF header described by `params`.
pub fn synthesize(params: HeaderParams) -> CoreResult<SynthesizedHeader> {
    let header_size = crate::DSF_HEADER_SIZE;
    let metadata_offset = header_size + params.audio_data_size;
    let total_size = metadata_offset + params.metadata_size;

    let header = DsfHeader {
        dsd_chunk_size: 28,
        total_file_size: total_size,
        metadata_offset,
        fmt_chunk_size: 52,
        format_version: 1,
        format_id: 0,
        channel_type: ChannelType::from_channel_count(params.channel_count) as u32,
        channel_count: params.channel_count as u32,
        sampling_frequency: params.sample_rate,
        bits_per_sample: 1,
        sample_count: params.sample_count_per_channel,
        block_size_per_channel: crate::DSF_BLOCK_SIZE as u32,
        reserved: 0,
        data_chunk_size: 12 + params.audio_data_size,
    };

    let mut cursor = Cursor::new(Vec::with_capacity(header_size as usize));
    header.write(&mut cursor)?;
    let bytes = cursor.into_inner();
    debug_assert_eq!(bytes.len() as u64, header_size);

    Ok(SynthesizedHeader { bytes, header_size, metadata_offset, total_size })
}

/// Number of complete DSF blocks per channel needed to hold `frame_length` SACD frames
/// (§4.4 step 4, "num_blocks = ceil(frame_length * F / B)").
pub fn audio_block_count(frame_length: u32) -> u64 {
    let total_bytes = frame_length as u64 * crate::SACD_FRAME_SIZE as u64;
    total_bytes.div_ceil(crate::DSF_BLOCK_SIZE as u64)
}

/// Audio region size in bytes for `frame_length` SACD frames across `channel_count` channels.
pub fn audio_data_size(frame_length: u32, channel_count: u16) -> u64 {
    audio_block_count(frame_length) * crate::DSF_BLOCK_SIZE as u64 * channel_count as u64
}
