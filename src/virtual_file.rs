//! [`VirtualFile`] (§4.4) is a read/seek handle over one synthesized DSF track. It owns a private
//! disc reader (or hands it off to an [`MtPipeline`]), a [`FrameTransformer`], and a pre-rendered
//! header, and routes every read by position into the header, audio, or metadata region.

use std::sync::Arc;

use crate::disc_reader::DiscReader;
use crate::dst::DstDecoderFactory;
use crate::frame_transform::FrameTransformer;
use crate::header::{self, HeaderParams};
use crate::id3_overlay::OverlayStore;
use crate::id3_renderer::Id3Renderer;
use crate::mt_pipeline::MtPipeline;
use crate::worker_pool::WorkerPool;
use crate::{AudioArea, CoreError, CoreResult, FrameFormat};

enum Audio {
    /// Either raw DSD (decoder_factory is `None`) or single-threaded DST decode (`Some`), each
    /// frame decoded inline on the consumer's own read call.
    Direct { disc_reader: Box<dyn DiscReader>, decoder_factory: Option<Arc<dyn DstDecoderFactory>> },
    Pipelined { pipeline: MtPipeline, eof_reached: bool },
}

/// Dimensions computed at open time (§4.4 "info record").
#[derive(Copy, Clone, Debug)]
pub struct TrackDims {
    pub channel_count: u16,
    pub sample_rate: u32,
    pub frame_format: FrameFormat,
    pub duration_secs: f64,
    pub header_size: u64,
    pub metadata_offset: u64,
    pub total_size: u64,
}

/// A read/seek handle over one track's synthesized DSF stream.
pub struct VirtualFile {
    area: AudioArea,
    track_number: u8,
    dims: TrackDims,
    header_bytes: Vec<u8>,
    start_frame: u32,
    end_frame: u32,
    current_frame: u32,
    position: u64,
    transformer: FrameTransformer,
    seek_skip_bytes: usize,
    audio: Audio,
    pending_metadata_write: Option<Vec<u8>>,
    pending_error: Option<CoreError>,
}

impl VirtualFile {
    /// Open a handle for `track_number` within `area`. `disc_reader` must be a fresh instance;
    /// its area is selected here. `metadata_size` is the caller's current ID3 cache size for this
    /// track (queried from the overlay store before calling, per §4.4 step 5).
    #[allow(clippy::too_many_arguments)]
    pub fn open(
        mut disc_reader: Box<dyn DiscReader>,
        area: AudioArea,
        track_number: u8,
        metadata_size: u64,
        decoder_factory: Arc<dyn DstDecoderFactory>,
        worker_pool: Option<Arc<WorkerPool>>,
    ) -> CoreResult<Self> {
        disc_reader.select_area(area)?;

        let track = disc_reader.track_info(track_number)?;
        let start_frame = track.start_frame;
        let end_frame = track.end_frame;
        let frame_length = track.frame_length();

        let channel_count = disc_reader.area_channel_count()?;
        let sample_rate = disc_reader.area_sample_frequency()?;
        let frame_format = disc_reader.area_frame_format()?;

        let sample_count_per_channel = frame_length as u64 * crate::SACD_FRAME_SIZE as u64 * 8;
        let audio_data_size = header::audio_data_size(frame_length, channel_count);

        let synthesized = header::synthesize(HeaderParams {
            channel_count,
            sample_rate,
            sample_count_per_channel,
            audio_data_size,
            metadata_size,
        })?;

        let transformer = FrameTransformer::new(channel_count as usize);

        let audio = match (frame_format, worker_pool) {
            (FrameFormat::Dst, Some(pool)) => Audio::Pipelined {
                pipeline: MtPipeline::start(
                    disc_reader,
                    decoder_factory,
                    pool,
                    channel_count,
                    start_frame,
                    end_frame,
                ),
                eof_reached: false,
            },
            (FrameFormat::Dst, None) => {
                Audio::Direct { disc_reader, decoder_factory: Some(decoder_factory) }
            }
            (FrameFormat::RawDsd, _) => Audio::Direct { disc_reader, decoder_factory: None },
        };

        log::debug!(
            "opened virtual file: area={area:?} track={track_number} frames=[{start_frame},{end_frame})"
        );

        Ok(VirtualFile {
            area,
            track_number,
            dims: TrackDims {
                channel_count,
                sample_rate,
                frame_format,
                duration_secs: track.duration_secs(),
                header_size: synthesized.header_size,
                metadata_offset: synthesized.metadata_offset,
                total_size: synthesized.total_size,
            },
            header_bytes: synthesized.bytes,
            start_frame,
            end_frame,
            current_frame: start_frame,
            position: 0,
            transformer,
            seek_skip_bytes: 0,
            audio,
            pending_metadata_write: None,
            pending_error: None,
        })
    }

    pub fn info(&self) -> &TrackDims {
        &self.dims
    }

    pub fn tell(&self) -> u64 {
        self.position
    }

    fn audio_exhausted(&self) -> bool {
        match &self.audio {
            Audio::Direct { .. } => self.current_frame >= self.end_frame,
            Audio::Pipelined { eof_reached, .. } => *eof_reached,
        }
    }

    /// Pull the next frame into the transformer from whichever audio source is active.
    fn fetch_next_frame(&mut self) -> CoreResult<()> {
        match &mut self.audio {
            Audio::Direct { disc_reader, decoder_factory } => {
                let frame = disc_reader.read_frame(self.current_frame)?;
                let decoded = match decoder_factory {
                    Some(factory) => factory.decode(&frame.data, self.dims.channel_count)?,
                    None => frame.data,
                };
                self.transformer.push_frame(&decoded);
                self.current_frame += 1;
            }
            Audio::Pipelined { pipeline, eof_reached } => {
                let result = pipeline.next_result_wait();
                if result.is_eof {
                    *eof_reached = true;
                    return Ok(());
                }
                if result.error_code != 0 {
                    return Err(CoreError::DstDecode(format!(
                        "pipeline reported error code {}",
                        result.error_code
                    )));
                }
                self.transformer.push_frame(result.data());
                self.current_frame += 1;
            }
        }
        Ok(())
    }

    /// Fill as much of `buf` as possible from the audio region in a single pass; `0` means the
    /// audio region is exhausted (caller falls through to the metadata region).
    fn fill_audio(&mut self, buf: &mut [u8]) -> CoreResult<usize> {
        loop {
            if self.seek_skip_bytes > 0 && self.transformer.staging_remaining() > 0 {
                let skipped = self.transformer.skip_staging(self.seek_skip_bytes);
                self.seek_skip_bytes -= skipped;
            }
            if self.transformer.staging_remaining() > 0 {
                return Ok(self.transformer.read_staging(buf));
            }
            if self.audio_exhausted() {
                if self.transformer.bytes_buffered() > 0 {
                    self.transformer.flush();
                    continue;
                }
                return Ok(0);
            }
            self.fetch_next_frame()?;
        }
    }

    /// Read up to `buf.len()` bytes starting at the current position, routing each chunk through
    /// the header, audio, or metadata region (§4.4 "Read dispatch").
    pub fn read(
        &mut self,
        buf: &mut [u8],
        overlay: &mut OverlayStore,
        id3_disc_reader: &dyn DiscReader,
        renderer: &dyn Id3Renderer,
    ) -> CoreResult<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        if let Some(err) = self.pending_error.take() {
            return Err(err);
        }

        let mut filled = 0usize;
        while filled < buf.len() && self.position < self.dims.total_size {
            let result = self.read_one_chunk(&mut buf[filled..], overlay, id3_disc_reader, renderer);
            match result {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(err) => {
                    if filled > 0 {
                        self.pending_error = Some(err);
                        break;
                    }
                    return Err(err);
                }
            }
        }
        Ok(filled)
    }

    fn read_one_chunk(
        &mut self,
        buf: &mut [u8],
        overlay: &mut OverlayStore,
        id3_disc_reader: &dyn DiscReader,
        renderer: &dyn Id3Renderer,
    ) -> CoreResult<usize> {
        if self.position < self.dims.header_size {
            let start = self.position as usize;
            let n = (self.header_bytes.len() - start).min(buf.len());
            buf[..n].copy_from_slice(&self.header_bytes[start..start + n]);
            self.position += n as u64;
            Ok(n)
        } else if self.position < self.dims.metadata_offset {
            let n = self.fill_audio(buf)?;
            self.position += n as u64;
            Ok(n)
        } else {
            let tag = overlay.get(self.area, self.track_number, id3_disc_reader, renderer)?;
            let start = (self.position - self.dims.metadata_offset) as usize;
            if start >= tag.len() {
                return Ok(0);
            }
            let n = (tag.len() - start).min(buf.len());
            buf[..n].copy_from_slice(&tag[start..start + n]);
            self.position += n as u64;
            Ok(n)
        }
    }

    /// Seek to absolute position `target` (§4.4 "Seek algorithm").
    pub fn seek(&mut self, target: u64) -> CoreResult<()> {
        if target == self.position {
            return Ok(());
        }
        self.transformer.clear_staging();
        self.seek_skip_bytes = 0;

        let h = self.dims.header_size;
        let m = self.dims.metadata_offset;

        if target < h {
            self.current_frame = self.start_frame;
            self.transformer.reset_accumulators();
        } else if target < m {
            let audio_offset = target - h;
            let output_per_group = crate::ALIGNMENT_GROUP_BLOCKS as u64
                * crate::DSF_BLOCK_SIZE as u64
                * self.dims.channel_count as u64;
            let group = audio_offset / output_per_group;
            let aligned_frame =
                (self.start_frame + crate::ALIGNMENT_GROUP_FRAMES * group as u32).min(self.end_frame);
            let aligned_output_pos = group * output_per_group;
            self.seek_skip_bytes = (audio_offset - aligned_output_pos) as usize;
            self.current_frame = aligned_frame;
            self.transformer.reset_accumulators();
        } else {
            self.current_frame = self.end_frame;
            self.transformer.reset_accumulators();
        }

        self.position = target;

        if let Audio::Pipelined { pipeline, eof_reached } = &mut self.audio {
            pipeline.seek(self.current_frame);
            *eof_reached = self.current_frame >= self.end_frame;
        }

        log::debug!("virtual file seek: track={} target={}", self.track_number, target);
        Ok(())
    }

    /// Buffer a write into the metadata region; bytes entirely before `M` are silently accepted
    /// without effect (§4.7 "writes whose byte range lies entirely before M").
    pub fn write_metadata(&mut self, data: &[u8], position: u64) -> CoreResult<usize> {
        let m = self.dims.metadata_offset;
        if position.saturating_add(data.len() as u64) <= m {
            return Ok(data.len());
        }
        let payload = if position < m { &data[(m - position) as usize..] } else { data };
        self.pending_metadata_write = Some(payload.to_vec());
        Ok(data.len())
    }

    /// Commit any buffered metadata write to the overlay store and persist the sidecar.
    pub fn flush(&mut self, overlay: &mut OverlayStore) -> CoreResult<()> {
        if let Some(data) = self.pending_metadata_write.take() {
            overlay.set_overlay(self.area, self.track_number, &data);
            overlay.save()?;
        }
        Ok(())
    }

    /// Flush pending writes and release all resources. Ownership makes this idempotent by
    /// construction: a closed `VirtualFile` cannot be used or closed again.
    pub fn close(mut self, overlay: &mut OverlayStore) -> CoreResult<()> {
        self.flush(overlay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id3_renderer::DiscTextId3Renderer;
    use crate::testutil::{SyntheticDiscReader, SyntheticDstDecoder};
    use std::marker::PhantomData;

    fn factory() -> Arc<dyn DstDecoderFactory> {
        Arc::new(PhantomData::<SyntheticDstDecoder>)
    }

    fn open_file(reader: SyntheticDiscReader, mt: Option<Arc<WorkerPool>>) -> VirtualFile {
        VirtualFile::open(Box::new(reader), AudioArea::Stereo, 1, 0, factory(), mt).unwrap()
    }

    fn read_all(
        file: &mut VirtualFile,
        overlay: &mut OverlayStore,
        disc_reader: &dyn DiscReader,
        renderer: &dyn Id3Renderer,
    ) -> Vec<u8> {
        let mut out = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let n = file.read(&mut chunk, overlay, disc_reader, renderer).unwrap();
            if n == 0 {
                break;
            }
            out.extend_from_slice(&chunk[..n]);
        }
        out
    }

    #[test]
    fn total_size_matches_header_plus_audio_plus_metadata() {
        let reader = SyntheticDiscReader::stereo_two_tracks();
        let file = open_file(reader, None);
        let dims = file.info();
        assert_eq!(dims.header_size, 92);
        let expected_audio_size = header::audio_data_size(64, dims.channel_count);
        assert_eq!(dims.metadata_offset, dims.header_size + expected_audio_size);
        assert_eq!(dims.total_size, dims.metadata_offset);
    }

    #[test]
    fn raw_dsd_sequential_read_reaches_eof() {
        let tmp = tempfile::tempdir().unwrap();
        let mut overlay = OverlayStore::new(tmp.path().join("a.iso"));
        let reader = SyntheticDiscReader::stereo_two_tracks();
        let id3_reader = SyntheticDiscReader::stereo_two_tracks();
        let renderer = DiscTextId3Renderer;

        let mut file = open_file(reader, None);
        let total = file.info().total_size;
        let data = read_all(&mut file, &mut overlay, &id3_reader, &renderer);
        assert_eq!(data.len() as u64, total);
    }

    #[test]
    fn seek_is_transparent_against_sequential_read() {
        let tmp = tempfile::tempdir().unwrap();
        let mut overlay_a = OverlayStore::new(tmp.path().join("a.iso"));
        let mut overlay_b = OverlayStore::new(tmp.path().join("a.iso"));
        let id3_reader = SyntheticDiscReader::stereo_two_tracks();
        let renderer = DiscTextId3Renderer;

        let mut full = open_file(SyntheticDiscReader::stereo_two_tracks(), None);
        let reference = read_all(&mut full, &mut overlay_a, &id3_reader, &renderer);

        let split_at = reference.len() as u64 / 2;
        let mut file = open_file(SyntheticDiscReader::stereo_two_tracks(), None);
        file.seek(split_at).unwrap();
        let tail = read_all(&mut file, &mut overlay_b, &id3_reader, &renderer);

        assert_eq!(tail, reference[split_at as usize..]);
    }

    #[test]
    fn no_op_seek_to_current_position_is_a_no_op() {
        let reader = SyntheticDiscReader::stereo_two_tracks();
        let mut file = open_file(reader, None);
        assert_eq!(file.tell(), 0);
        file.seek(0).unwrap();
        assert_eq!(file.tell(), 0);
    }

    #[test]
    fn mt_mode_matches_st_mode_byte_for_byte() {
        let tmp = tempfile::tempdir().unwrap();
        let mut overlay_st = OverlayStore::new(tmp.path().join("a.iso"));
        let mut overlay_mt = OverlayStore::new(tmp.path().join("a.iso"));
        let id3_reader = SyntheticDiscReader::stereo_dst_track(300);
        let renderer = DiscTextId3Renderer;

        let mut st_file = VirtualFile::open(
            Box::new(SyntheticDiscReader::stereo_dst_track(300)),
            AudioArea::Stereo,
            1,
            0,
            factory(),
            None,
        )
        .unwrap();
        let st_bytes = read_all(&mut st_file, &mut overlay_st, &id3_reader, &renderer);

        let pool = Arc::new(WorkerPool::new(4));
        let mut mt_file = VirtualFile::open(
            Box::new(SyntheticDiscReader::stereo_dst_track(300)),
            AudioArea::Stereo,
            1,
            0,
            factory(),
            Some(pool),
        )
        .unwrap();
        let mt_bytes = read_all(&mut mt_file, &mut overlay_mt, &id3_reader, &renderer);

        assert_eq!(st_bytes, mt_bytes);
    }

    #[test]
    fn writes_before_metadata_offset_are_silently_accepted() {
        let reader = SyntheticDiscReader::stereo_two_tracks();
        let mut file = open_file(reader, None);
        let n = file.write_metadata(b"ignored", 0).unwrap();
        assert_eq!(n, 7);
        assert!(file.pending_metadata_write.is_none());
    }

    #[test]
    fn metadata_write_is_buffered_until_flush() {
        let tmp = tempfile::tempdir().unwrap();
        let mut overlay = OverlayStore::new(tmp.path().join("a.iso"));
        let reader = SyntheticDiscReader::stereo_two_tracks();
        let mut file = open_file(reader, None);
        let m = file.info().metadata_offset;
        file.write_metadata(b"new-tag", m).unwrap();
        assert!(!overlay.has_unsaved_changes());
        file.flush(&mut overlay).unwrap();
        assert!(!overlay.has_unsaved_changes());
    }
}
