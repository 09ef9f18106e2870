//! Whole-pipeline integration tests: these exercise `VfsContext`/`VirtualFile` end to end over the
//! synthetic disc reader, the way a FUSE or WinFSP driver would drive them, rather than any single
//! module in isolation.

mod common;

use std::sync::Arc;

use common::{open_ctx, read_all};
use sacdfs::disc_reader::DiscReader;
use sacdfs::dst::DstDecoderFactory;
use sacdfs::id3_renderer::Id3Renderer;
use sacdfs::testutil::{SyntheticDiscReader, SyntheticDstDecoder, SyntheticId3Renderer};
use sacdfs::vfs::{VfsConfig, VfsContext};
use sacdfs::AudioArea;

#[test]
fn total_size_matches_region_sizes_and_reads_exactly_that_many_bytes() {
    let mut ctx = open_ctx(0);
    let renderer = SyntheticId3Renderer;
    let id3_reader = SyntheticDiscReader::stereo_dst_track(300);

    let mut file = ctx.open_track(AudioArea::Stereo, 1).unwrap();
    let total = file.info().total_size;
    let header = file.info().header_size;
    let metadata_offset = file.info().metadata_offset;

    let data = read_all(&mut file, &mut ctx, &id3_reader, &renderer);
    assert_eq!(data.len() as u64, total);
    assert_eq!(total, metadata_offset + (total - metadata_offset));
    assert!(header < metadata_offset);
    ctx.flush_track(file).unwrap();
}

#[test]
fn seek_is_transparent_at_every_boundary_offset() {
    let renderer = SyntheticId3Renderer;
    let id3_reader = SyntheticDiscReader::stereo_dst_track(300);

    let mut ctx_full = open_ctx(0);
    let mut full_file = ctx_full.open_track(AudioArea::Stereo, 1).unwrap();
    let whole = read_all(&mut full_file, &mut ctx_full, &id3_reader, &renderer);
    ctx_full.flush_track(full_file).unwrap();

    let total = whole.len() as u64;
    let header = 92u64;
    let output_per_group = 147 * 4096 * 2;
    let probe_positions = [
        0,
        1,
        header - 1,
        header,
        header + 1,
        header + output_per_group as u64,
        header + output_per_group as u64 + 17,
        total / 2,
        total - 1,
    ];

    for &pos in &probe_positions {
        let mut ctx = open_ctx(0);
        let mut file = ctx.open_track(AudioArea::Stereo, 1).unwrap();
        file.seek(pos).unwrap();
        let tail = read_all(&mut file, &mut ctx, &id3_reader, &renderer);
        ctx.flush_track(file).unwrap();

        let mut rebuilt = whole[..pos as usize].to_vec();
        rebuilt.extend_from_slice(&tail);
        assert_eq!(rebuilt, whole, "seek to {pos} broke transparency");
    }
}

#[test]
fn seek_past_eof_clamps_and_returns_zero_bytes() {
    let renderer = SyntheticId3Renderer;
    let id3_reader = SyntheticDiscReader::stereo_dst_track(300);
    let mut ctx = open_ctx(0);
    let mut file = ctx.open_track(AudioArea::Stereo, 1).unwrap();
    let total = file.info().total_size;

    file.seek(total).unwrap();
    let mut buf = [0u8; 16];
    assert_eq!(file.read(&mut buf, ctx.overlay_store_mut(), &id3_reader, &renderer).unwrap(), 0);

    file.seek(total + 1000).unwrap();
    assert_eq!(file.read(&mut buf, ctx.overlay_store_mut(), &id3_reader, &renderer).unwrap(), 0);
    ctx.flush_track(file).unwrap();
}

#[test]
fn one_track_mono_disc_has_exact_total_size() {
    let config = VfsConfig { default_area_visibility: (true, true), worker_threads: 0 };
    let mut ctx = VfsContext::open(
        "/tmp/Mono.iso",
        || {
            Ok(Box::new(
                SyntheticDiscReader::builder()
                    .area(AudioArea::Stereo, 1, 2_822_400, sacdfs::FrameFormat::RawDsd, &[("Solo", 128)])
                    .build(),
            ) as Box<dyn DiscReader>)
        },
        Arc::new(std::marker::PhantomData::<SyntheticDstDecoder>) as Arc<dyn DstDecoderFactory>,
        Arc::new(SyntheticId3Renderer),
        config,
    )
    .unwrap();

    let file = ctx.open_track(AudioArea::Stereo, 1).unwrap();
    let dims = *file.info();
    let header = 92u64;
    let expected_audio = 147 * 4096;
    let renderer = SyntheticId3Renderer;
    let id3_reader = SyntheticDiscReader::builder()
        .area(AudioArea::Stereo, 1, 2_822_400, sacdfs::FrameFormat::RawDsd, &[("Solo", 128)])
        .build();
    let metadata_size = renderer.render(&id3_reader, 1).unwrap().len() as u64;
    assert_eq!(dims.total_size, header + expected_audio as u64 + metadata_size);
    ctx.flush_track(file).unwrap();
}
