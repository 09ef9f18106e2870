//! [`VfsContext`] (§4.6) is the root object for one opened ISO: it caches per-area dimensions,
//! owns the ID3 overlay store, and factories [`VirtualFile`] handles for individual tracks.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::disc_reader::DiscReader;
use crate::dst::DstDecoderFactory;
use crate::id3_overlay::OverlayStore;
use crate::id3_renderer::Id3Renderer;
use crate::path::{sanitize_component, track_filename};
use crate::virtual_file::VirtualFile;
use crate::worker_pool::WorkerPool;
use crate::{AudioArea, CoreError, CoreResult};

/// Per-context configuration (§4.10 ambient configuration).
#[derive(Clone, Debug)]
pub struct VfsConfig {
    /// `(stereo_visible, multichannel_visible)`; both `true` by default.
    pub default_area_visibility: (bool, bool),
    /// Worker threads for the MT DST pipeline; `0` disables the worker pool (forcing ST mode).
    pub worker_threads: usize,
}

impl Default for VfsConfig {
    fn default() -> Self {
        VfsConfig { default_area_visibility: (true, true), worker_threads: num_cpus::get() }
    }
}

struct AreaState {
    track_count: u8,
    visible: bool,
}

/// One opened ISO: cached area dimensions, the ID3 overlay store, and the shared worker pool
/// backing every DST track's MT pipeline.
pub struct VfsContext<F>
where
    F: Fn() -> CoreResult<Box<dyn DiscReader>> + Send + Sync,
{
    iso_path: PathBuf,
    album_name: String,
    make_disc_reader: F,
    areas: Vec<(AudioArea, AreaState)>,
    overlay: OverlayStore,
    decoder_factory: Arc<dyn DstDecoderFactory>,
    renderer: Arc<dyn Id3Renderer>,
    worker_pool: Option<Arc<WorkerPool>>,
}

impl<F> VfsContext<F>
where
    F: Fn() -> CoreResult<Box<dyn DiscReader>> + Send + Sync,
{
    /// Open a context for the ISO at `iso_path`. `make_disc_reader` mints a fresh, unselected
    /// disc reader instance each time it's called — one per `VirtualFile` plus one here for
    /// enumeration (§4.6 step 1, §4.4 "acquire a fresh disc reader handle").
    pub fn open(
        iso_path: impl Into<PathBuf>,
        make_disc_reader: F,
        decoder_factory: Arc<dyn DstDecoderFactory>,
        renderer: Arc<dyn Id3Renderer>,
        config: VfsConfig,
    ) -> CoreResult<Self> {
        let iso_path = iso_path.into();
        let mut disc_reader = make_disc_reader()?;

        let album_name = sanitize_component(&disc_reader.album_name());

        let mut areas = Vec::new();
        for area in disc_reader.available_areas() {
            disc_reader.select_area(area)?;
            let track_count = disc_reader.track_count()?;
            let visible = match area {
                AudioArea::Stereo => config.default_area_visibility.0,
                AudioArea::MultiChannel => config.default_area_visibility.1,
            };
            areas.push((area, AreaState { track_count, visible }));
        }

        let mut overlay = OverlayStore::new(&iso_path);
        overlay.load()?;

        let worker_pool = if config.worker_threads > 0 {
            Some(Arc::new(WorkerPool::new(config.worker_threads)))
        } else {
            None
        };

        log::debug!(
            "opened VFS context for {}: album=\"{album_name}\" areas={}",
            iso_path.display(),
            areas.len()
        );

        Ok(VfsContext {
            iso_path,
            album_name,
            make_disc_reader,
            areas,
            overlay,
            decoder_factory,
            renderer,
            worker_pool,
        })
    }

    pub fn iso_path(&self) -> &Path {
        &self.iso_path
    }

    pub fn album_name(&self) -> &str {
        &self.album_name
    }

    /// §4.6 "`should_show_area` rule": unavailable areas never show; a hidden area still shows if
    /// the *other* area is unavailable, so a multichannel-only disc never looks empty.
    pub fn should_show_area(&self, area: AudioArea) -> bool {
        let Some((_, state)) = self.areas.iter().find(|(a, _)| *a == area) else {
            return false;
        };
        if state.visible {
            return true;
        }
        let other = match area {
            AudioArea::Stereo => AudioArea::MultiChannel,
            AudioArea::MultiChannel => AudioArea::Stereo,
        };
        !self.areas.iter().any(|(a, _)| *a == other)
    }

    pub fn set_area_visibility(&mut self, area: AudioArea, visible: bool) {
        if let Some((_, state)) = self.areas.iter_mut().find(|(a, _)| *a == area) {
            state.visible = visible;
        }
    }

    fn track_count(&self, area: AudioArea) -> CoreResult<u8> {
        self.areas
            .iter()
            .find(|(a, _)| *a == area)
            .map(|(_, s)| s.track_count)
            .ok_or(CoreError::NotFound)
    }

    /// The visible areas' directory entries under the album directory.
    pub fn list_areas(&self) -> Vec<AudioArea> {
        self.areas
            .iter()
            .map(|(a, _)| *a)
            .filter(|a| self.should_show_area(*a))
            .collect()
    }

    /// Track filenames for one area (§4.6 "Directory traversal"); requires reading disc text for
    /// each track's title, so a disc reader instance is minted for the call.
    pub fn list_tracks(&self, area: AudioArea) -> CoreResult<Vec<String>> {
        let mut reader = (self.make_disc_reader)()?;
        reader.select_area(area)?;
        let track_count = self.track_count(area)?;
        (1..=track_count)
            .map(|n| {
                let title = reader.text(Some(n), crate::disc_reader::TextKind::Title);
                Ok(track_filename(n, &title))
            })
            .collect()
    }

    /// Open a [`VirtualFile`] for `track_number` within `area`.
    pub fn open_track(&mut self, area: AudioArea, track_number: u8) -> CoreResult<VirtualFile> {
        let metadata_size = {
            let mut reader = (self.make_disc_reader)()?;
            reader.select_area(area)?;
            self.overlay
                .get(area, track_number, reader.as_ref(), self.renderer.as_ref())?
                .len() as u64
        };

        let disc_reader = (self.make_disc_reader)()?;
        VirtualFile::open(
            disc_reader,
            area,
            track_number,
            metadata_size,
            self.decoder_factory.clone(),
            self.worker_pool.clone(),
        )
    }

    /// Commit a closed virtual file's buffered metadata write through this context's overlay
    /// store.
    pub fn flush_track(&mut self, file: VirtualFile) -> CoreResult<()> {
        file.close(&mut self.overlay)
    }

    pub fn overlay_store(&self) -> &OverlayStore {
        &self.overlay
    }

    pub fn overlay_store_mut(&mut self) -> &mut OverlayStore {
        &mut self.overlay
    }

    /// Release every ID3 cache entry and persist unsaved changes (§4.6 "Close").
    pub fn close(mut self) -> CoreResult<()> {
        if self.overlay.has_unsaved_changes() {
            self.overlay.save()?;
        }
        log::debug!("closed VFS context for {}", self.iso_path.display());
        Ok(())
    }
}

/// Default idle timeout before the overlay layer's mount table evicts an unreferenced context
/// (§4.7, §4.10 ambient configuration).
pub const DEFAULT_MOUNT_IDLE_TIMEOUT: Duration = Duration::from_secs(300);
