//! Shared fixture builders for the integration tests under `tests/`: opening a synthetic-disc
//! `VfsContext` and draining a `VirtualFile` to EOF, the way every end-to-end test needs to.

use std::sync::Arc;

use sacdfs::disc_reader::DiscReader;
use sacdfs::dst::DstDecoderFactory;
use sacdfs::id3_renderer::Id3Renderer;
use sacdfs::testutil::{SyntheticDiscReader, SyntheticDstDecoder, SyntheticId3Renderer};
use sacdfs::vfs::{VfsConfig, VfsContext};
use sacdfs::virtual_file::VirtualFile;
use sacdfs::AudioArea;

#[allow(dead_code)]
pub mod roundtrip;

pub fn open_ctx(
    worker_threads: usize,
) -> VfsContext<impl Fn() -> sacdfs::CoreResult<Box<dyn DiscReader>> + Send + Sync> {
    let config = VfsConfig { default_area_visibility: (true, true), worker_threads };
    VfsContext::open(
        "/tmp/Synthetic Album.iso",
        || Ok(Box::new(SyntheticDiscReader::stereo_dst_track(300)) as Box<dyn DiscReader>),
        Arc::new(std::marker::PhantomData::<SyntheticDstDecoder>) as Arc<dyn DstDecoderFactory>,
        Arc::new(SyntheticId3Renderer),
        config,
    )
    .unwrap()
}

pub fn read_all(
    file: &mut VirtualFile,
    ctx: &mut VfsContext<impl Fn() -> sacdfs::CoreResult<Box<dyn DiscReader>> + Send + Sync>,
    id3_reader: &dyn DiscReader,
    renderer: &dyn Id3Renderer,
) -> Vec<u8> {
    let mut out = Vec::new();
    let mut buf = [0u8; 4096];
    loop {
        let n = file.read(&mut buf, ctx.overlay_store_mut(), id3_reader, renderer).unwrap();
        if n == 0 {
            break;
        }
        out.extend_from_slice(&buf[..n]);
    }
    out
}

#[allow(dead_code)]
pub fn read_track(worker_threads: usize, area: AudioArea, track: u8) -> Vec<u8> {
    let renderer = SyntheticId3Renderer;
    let id3_reader = SyntheticDiscReader::stereo_dst_track(300);
    let mut ctx = open_ctx(worker_threads);
    let mut file = ctx.open_track(area, track).unwrap();
    let data = read_all(&mut file, &mut ctx, &id3_reader, &renderer);
    ctx.flush_track(file).unwrap();
    data
}
