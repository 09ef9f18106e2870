//! Deterministic test doubles for the two external collaborators this crate never implements
//! (§1 "deliberately out of scope"): a [`DiscReader`] and a [`DstDecoder`]. Neither parses a real
//! SACD ISO or runs the real DST algorithm; they exist only so the core pipeline is testable
//! end-to-end without either.

use crate::disc_reader::{DiscReader, FrameRead, TextKind, TrackInfo};
use crate::dst::DstDecoder;
use crate::id3_renderer::Id3Renderer;
use crate::{AudioArea, CoreError, CoreResult, FrameFormat};

/// A reversible placeholder entropy stage standing in for the real DST codec (§4.12): encode and
/// decode are each other's inverse (byte-wise XOR), so round-tripping through this pair proves
/// the surrounding pipeline plumbs bytes through correctly without needing the real algorithm.
#[derive(Default)]
pub struct SyntheticDstDecoder;

const SYNTHETIC_XOR_KEY: u8 = 0xA5;

impl DstDecoder for SyntheticDstDecoder {
    fn decode(&mut self, compressed: &[u8], channel_count: u16) -> CoreResult<Vec<u8>> {
        let expected = channel_count as usize * crate::SACD_FRAME_SIZE;
        if compressed.len() != expected {
            return Err(CoreError::DstDecode(format!(
                "expected {expected} compressed bytes, got {}",
                compressed.len()
            )));
        }
        Ok(compressed.iter().map(|b| b ^ SYNTHETIC_XOR_KEY).collect())
    }
}

/// Encodes raw decoded frame bytes the way [`SyntheticDstDecoder`] expects to receive them.
pub fn synthetic_dst_encode(decoded: &[u8]) -> Vec<u8> {
    decoded.iter().map(|b| b ^ SYNTHETIC_XOR_KEY).collect()
}

struct SyntheticTrack {
    info: TrackInfo,
    title: String,
}

struct SyntheticAreaState {
    channel_count: u16,
    sample_rate: u32,
    frame_format: FrameFormat,
    tracks: Vec<SyntheticTrack>,
}

/// An in-memory disc with procedurally generated frame content for one or more areas. Frame
/// bytes are a deterministic function of `(area, frame_number)`, so a fresh reader always
/// reproduces the same stream.
pub struct SyntheticDiscReader {
    album: String,
    areas: Vec<(AudioArea, SyntheticAreaState)>,
    selected: usize,
}

impl SyntheticDiscReader {
    /// A two-track stereo-only disc with raw DSD frames; convenient default fixture for tests
    /// that don't exercise DST decoding.
    pub fn stereo_two_tracks() -> Self {
        Self::builder()
            .area(AudioArea::Stereo, 2, 2_822_400, FrameFormat::RawDsd, &[("Track One", 64), ("Track Two", 96)])
            .build()
    }

    /// A stereo disc whose tracks are DST-encoded, for exercising the decode path.
    pub fn stereo_dst_track(frame_length: u32) -> Self {
        Self::builder()
            .area(AudioArea::Stereo, 2, 2_822_400, FrameFormat::Dst, &[("DST Track", frame_length)])
            .build()
    }

    pub fn builder() -> SyntheticDiscReaderBuilder {
        SyntheticDiscReaderBuilder { album: "Synthetic Album".to_string(), areas: Vec::new() }
    }

    fn area_state(&self) -> &SyntheticAreaState {
        &self.areas[self.selected].1
    }

    /// Deterministic raw decoded bytes for one frame (§4.12): independent of whether the area's
    /// frame format is raw or DST, this is the ground truth the frame transformer should see
    /// after any decode step.
    fn raw_frame_bytes(channel_count: u16, frame_number: u32) -> Vec<u8> {
        let len = channel_count as usize * crate::SACD_FRAME_SIZE;
        (0..len)
            .map(|i| (frame_number.wrapping_mul(31).wrapping_add(i as u32) & 0xFF) as u8)
            .collect()
    }
}

pub struct SyntheticDiscReaderBuilder {
    album: String,
    areas: Vec<(AudioArea, SyntheticAreaState)>,
}

impl SyntheticDiscReaderBuilder {
    pub fn area(
        mut self,
        area: AudioArea,
        channel_count: u16,
        sample_rate: u32,
        frame_format: FrameFormat,
        tracks: &[(&str, u32)],
    ) -> Self {
        let mut start_frame = 0u32;
        let tracks = tracks
            .iter()
            .enumerate()
            .map(|(i, (title, frame_length))| {
                let info = TrackInfo {
                    area,
                    track_number: (i + 1) as u8,
                    start_frame,
                    end_frame: start_frame + frame_length,
                };
                start_frame += frame_length;
                SyntheticTrack { info, title: title.to_string() }
            })
            .collect();
        self.areas.push((area, SyntheticAreaState { channel_count, sample_rate, frame_format, tracks }));
        self
    }

    pub fn build(self) -> SyntheticDiscReader {
        SyntheticDiscReader { album: self.album, areas: self.areas, selected: 0 }
    }
}

impl DiscReader for SyntheticDiscReader {
    fn available_areas(&self) -> Vec<AudioArea> {
        self.areas.iter().map(|(a, _)| *a).collect()
    }

    fn select_area(&mut self, area: AudioArea) -> CoreResult<()> {
        self.selected = self
            .areas
            .iter()
            .position(|(a, _)| *a == area)
            .ok_or(CoreError::NotFound)?;
        Ok(())
    }

    fn track_count(&self) -> CoreResult<u8> {
        Ok(self.area_state().tracks.len() as u8)
    }

    fn area_channel_count(&self) -> CoreResult<u16> {
        Ok(self.area_state().channel_count)
    }

    fn area_sample_frequency(&self) -> CoreResult<u32> {
        Ok(self.area_state().sample_rate)
    }

    fn area_frame_format(&self) -> CoreResult<FrameFormat> {
        Ok(self.area_state().frame_format)
    }

    fn track_info(&self, track_number: u8) -> CoreResult<TrackInfo> {
        self.area_state()
            .tracks
            .get(track_number.wrapping_sub(1) as usize)
            .map(|t| t.info)
            .ok_or(CoreError::NotFound)
    }

    fn read_frame(&mut self, frame_number: u32) -> CoreResult<FrameRead> {
        let state = &self.areas[self.selected].1;
        let raw = Self::raw_frame_bytes(state.channel_count, frame_number);
        let data = match state.frame_format {
            FrameFormat::RawDsd => raw,
            FrameFormat::Dst => synthetic_dst_encode(&raw),
        };
        Ok(FrameRead { data })
    }

    fn text(&self, track_number: Option<u8>, kind: TextKind) -> String {
        match (track_number, kind) {
            (Some(n), TextKind::Title) => self
                .area_state()
                .tracks
                .get(n.wrapping_sub(1) as usize)
                .map(|t| t.title.clone())
                .unwrap_or_default(),
            (_, TextKind::Album) => self.album.clone(),
            (_, TextKind::Artist) => "Synthetic Artist".to_string(),
            (_, TextKind::Genre) => "Electronic".to_string(),
            (None, TextKind::Title) => String::new(),
        }
    }

    fn album_name(&self) -> String {
        self.album.clone()
    }
}

/// An [`Id3Renderer`] that emits a tiny deterministic tag without depending on the `id3` crate's
/// frame-writing path, for tests that only care whether the overlay store wires a renderer
/// through correctly.
pub struct SyntheticId3Renderer;

impl Id3Renderer for SyntheticId3Renderer {
    fn render(&self, disc_reader: &dyn DiscReader, track_number: u8) -> CoreResult<Vec<u8>> {
        let title = disc_reader.text(Some(track_number), TextKind::Title);
        Ok(format!("SYNTHETIC-ID3:{track_number}:{title}").into_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn synthetic_dst_round_trips() {
        let mut decoder = SyntheticDstDecoder;
        let raw = SyntheticDiscReader::raw_frame_bytes(2, 7);
        let encoded = synthetic_dst_encode(&raw);
        let decoded = decoder.decode(&encoded, 2).unwrap();
        assert_eq!(decoded, raw);
    }

    #[test]
    fn reader_reports_track_boundaries() {
        let reader = SyntheticDiscReader::stereo_two_tracks();
        let t1 = reader.track_info(1).unwrap();
        let t2 = reader.track_info(2).unwrap();
        assert_eq!(t1.start_frame, 0);
        assert_eq!(t1.end_frame, 64);
        assert_eq!(t2.start_frame, 64);
        assert_eq!(t2.end_frame, 160);
    }
}
