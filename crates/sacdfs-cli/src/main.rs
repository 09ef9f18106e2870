/*
    sacdfs-cli
    https://github.com/dbalsom/sacdfs

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

mod args;

use std::io::Write;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};

use args::{app_params, AppParams, BenchParams, Command, DumpParams, GlobalOptions, Id3Action, Id3Params, TreeParams};
use sacdfs::disc_reader::DiscReader;
use sacdfs::dst::DstDecoderFactory;
use sacdfs::id3_renderer::{DiscTextId3Renderer, Id3Renderer};
use sacdfs::overlay::{DiscReaderFactory, Mount, OverlayConfig, OverlayLayer};
use sacdfs::testutil::{SyntheticDiscReader, SyntheticDstDecoder};
use sacdfs::vfs::VfsConfig;

fn make_reader(synthetic: bool, in_file: &Path) -> Result<Box<dyn DiscReader>> {
    if synthetic {
        Ok(Box::new(SyntheticDiscReader::stereo_two_tracks()))
    } else {
        bail!(
            "real SACD ISO parsing is outside this crate's scope; pass --synthetic for {}",
            in_file.display()
        )
    }
}

/// Mount `in_file` through a fresh overlay layer, honoring `--workers` and `--idle-timeout`
/// (§4.10 ambient configuration).
fn open_mount(in_file: &Path, synthetic: bool, workers: usize, idle_timeout: Duration) -> Result<Arc<Mount>> {
    let iso_path = if in_file.as_os_str().is_empty() {
        PathBuf::from("synthetic-fixture.iso")
    } else {
        in_file.to_path_buf()
    };
    let album_name = iso_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "Album".to_string());
    let reader_path = in_file.to_path_buf();
    let factory: DiscReaderFactory = Box::new(move || {
        make_reader(synthetic, &reader_path).map_err(|e| sacdfs::CoreError::Io(e.to_string()))
    });
    let decoder_factory: Arc<dyn DstDecoderFactory> = Arc::new(PhantomData::<SyntheticDstDecoder>);
    let renderer: Arc<dyn Id3Renderer> = Arc::new(DiscTextId3Renderer);
    let vfs_config = VfsConfig { default_area_visibility: (true, true), worker_threads: workers };
    let layer = OverlayLayer::new(OverlayConfig { mount_idle_timeout: idle_timeout });
    Ok(layer.mount(iso_path, factory, decoder_factory, renderer, PathBuf::from("/"), album_name, vfs_config)?)
}

fn run_tree(global: &GlobalOptions, params: TreeParams) -> Result<()> {
    let mount = open_mount(&params.in_file, params.synthetic, 0, Duration::from_secs(global.idle_timeout_secs))?;
    let ctx = mount.context();
    println!("/{}", ctx.album_name());
    for area in ctx.list_areas() {
        println!("  {area}/");
        for track in ctx.list_tracks(area).context("listing tracks")? {
            println!("    {track}");
        }
    }
    Ok(())
}

fn run_dump(global: &GlobalOptions, params: DumpParams) -> Result<()> {
    let mount = open_mount(
        &params.in_file,
        params.synthetic,
        params.workers,
        Duration::from_secs(global.idle_timeout_secs),
    )?;
    let mut ctx = mount.context();
    let mut file = ctx
        .open_track(params.area, params.track)
        .context("opening virtual track")?;

    let renderer = DiscTextId3Renderer;
    let id3_reader = make_reader(params.synthetic, &params.in_file)?;
    let mut out = std::fs::File::create(&params.out_file).context("creating output file")?;
    let mut buf = [0u8; 65536];
    loop {
        let n = file.read(&mut buf, ctx.overlay_store_mut(), id3_reader.as_ref(), &renderer)?;
        if n == 0 {
            break;
        }
        out.write_all(&buf[..n])?;
    }
    ctx.flush_track(file)?;
    Ok(())
}

fn run_id3(global: &GlobalOptions, params: Id3Params) -> Result<()> {
    let mount = open_mount(&params.in_file, params.synthetic, 0, Duration::from_secs(global.idle_timeout_secs))?;
    let mut ctx = mount.context();
    match params.action {
        Id3Action::Get => {
            let mut file = ctx.open_track(params.area, params.track)?;
            let m = file.info().metadata_offset;
            file.seek(m)?;
            let renderer = DiscTextId3Renderer;
            let id3_reader = make_reader(params.synthetic, &params.in_file)?;
            let mut tag = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                let n = file.read(&mut buf, ctx.overlay_store_mut(), id3_reader.as_ref(), &renderer)?;
                if n == 0 {
                    break;
                }
                tag.extend_from_slice(&buf[..n]);
            }
            println!("{} bytes of ID3v2 tag data", tag.len());
            ctx.flush_track(file)?;
        }
        Id3Action::Set(path) => {
            let bytes = std::fs::read(&path).with_context(|| format!("reading {}", path.display()))?;
            ctx.overlay_store_mut().set_overlay(params.area, params.track, &bytes);
            ctx.overlay_store_mut().save()?;
        }
        Id3Action::Clear => {
            ctx.overlay_store_mut().clear(params.area, params.track);
            ctx.overlay_store_mut().save()?;
        }
    }
    Ok(())
}

/// Read `track` on `mount` to EOF through its `VirtualFile` and return how long that took.
fn read_track_timed(mount: &Mount, area: sacdfs::AudioArea, track: u8, synthetic: bool, in_file: &Path) -> Result<Duration> {
    let mut ctx = mount.context();
    let mut file = ctx.open_track(area, track).context("opening virtual track")?;
    let renderer = DiscTextId3Renderer;
    let id3_reader = make_reader(synthetic, in_file)?;

    let start = Instant::now();
    let mut buf = [0u8; 65536];
    loop {
        let n = file.read(&mut buf, ctx.overlay_store_mut(), id3_reader.as_ref(), &renderer)?;
        if n == 0 {
            break;
        }
    }
    let elapsed = start.elapsed();
    ctx.flush_track(file)?;
    Ok(elapsed)
}

/// Compare a sequential ST-mode read against an MT-mode read of the same synthetic track.
fn run_bench(params: BenchParams) -> Result<()> {
    let idle_timeout = Duration::from_secs(300);
    let track = 1u8;

    let st_mount = open_mount(&params.in_file, params.synthetic, 0, idle_timeout)?;
    let st_elapsed = read_track_timed(&st_mount, params.area, track, params.synthetic, &params.in_file)?;

    let mt_mount = open_mount(&params.in_file, params.synthetic, params.workers, idle_timeout)?;
    let mt_elapsed = read_track_timed(&mt_mount, params.area, track, params.synthetic, &params.in_file)?;

    println!("ST mode (0 workers):       {st_elapsed:?}");
    println!("MT mode ({} workers):      {mt_elapsed:?}", params.workers);
    Ok(())
}

fn main() -> Result<()> {
    let AppParams { global, command } = app_params().run();

    let level = if global.verbose { log::LevelFilter::Debug } else { log::LevelFilter::Info };
    env_logger::Builder::new().filter_level(level).init();

    match command {
        Command::Tree(params) => run_tree(&global, params),
        Command::Dump(params) => run_dump(&global, params),
        Command::Id3(params) => run_id3(&global, params),
        Command::Bench(params) => run_bench(params),
    }
}
