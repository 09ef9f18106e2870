//! ID3 overlay persistence across a full close/reopen cycle, driven through `VfsContext` the way a
//! host filesystem driver would remount the same ISO.

use std::sync::Arc;

use sacdfs::disc_reader::DiscReader;
use sacdfs::dst::DstDecoderFactory;
use sacdfs::id3_renderer::Id3Renderer;
use sacdfs::testutil::{SyntheticDiscReader, SyntheticDstDecoder, SyntheticId3Renderer};
use sacdfs::vfs::{VfsConfig, VfsContext};
use sacdfs::AudioArea;

#[test]
fn overlay_round_trip_survives_reopen() {
    let tmp = tempfile::tempdir().unwrap();
    let iso_path = tmp.path().join("Album.iso");
    let renderer: Arc<dyn Id3Renderer> = Arc::new(SyntheticId3Renderer);
    let decoder_factory: Arc<dyn DstDecoderFactory> =
        Arc::new(std::marker::PhantomData::<SyntheticDstDecoder>);
    let config = VfsConfig { default_area_visibility: (true, true), worker_threads: 0 };

    let mut ctx = VfsContext::open(
        &iso_path,
        || Ok(Box::new(SyntheticDiscReader::stereo_dst_track(300)) as Box<dyn DiscReader>),
        decoder_factory.clone(),
        renderer.clone(),
        config.clone(),
    )
    .unwrap();
    ctx.overlay_store_mut().set_overlay(AudioArea::Stereo, 1, b"TIT2-custom-blob");
    ctx.overlay_store_mut().save().unwrap();
    assert!(iso_path.with_extension("iso.xml").exists() || {
        let mut p = iso_path.clone().into_os_string();
        p.push(".xml");
        std::path::PathBuf::from(p).exists()
    });

    let mut reopened = VfsContext::open(
        &iso_path,
        || Ok(Box::new(SyntheticDiscReader::stereo_dst_track(300)) as Box<dyn DiscReader>),
        decoder_factory,
        renderer,
        config,
    )
    .unwrap();
    reopened.overlay_store_mut().load().unwrap();
    let id3_reader = SyntheticDiscReader::stereo_dst_track(300);
    let tag = reopened
        .overlay_store_mut()
        .get(AudioArea::Stereo, 1, &id3_reader, &SyntheticId3Renderer)
        .unwrap();
    assert_eq!(tag, b"TIT2-custom-blob");
}
