//! The overlay layer (§4.7) maps host-directory paths onto the synthetic VFS tree. Only its
//! in-scope surface is implemented here: the lazily-populated ISO mount table (terminology and
//! the `Arc<Mutex<_>>`-guarded-context shape borrowed from the teacher's
//! `FatFileSystem::mount`), flush-on-idle-eviction, display-name collision disambiguation, and
//! ID3 write routing parsed from a bare virtual path string.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::disc_reader::DiscReader;
use crate::dst::DstDecoderFactory;
use crate::id3_renderer::Id3Renderer;
use crate::path::disambiguate;
use crate::vfs::{VfsConfig, VfsContext};
use crate::{AudioArea, CoreError, CoreResult};

/// Concrete disc-reader factory type stored in the mount table; `VfsContext` is generic purely so
/// call sites with a concrete closure avoid the `Box` indirection, but the mount table needs one
/// uniform type to hold heterogeneous mounts.
pub type DiscReaderFactory = Box<dyn Fn() -> CoreResult<Box<dyn DiscReader>> + Send + Sync>;

/// One lazily-opened VFS context cached by the mount table.
pub struct Mount {
    pub display_name: String,
    pub parent_virtual_path: PathBuf,
    context: Mutex<VfsContext<DiscReaderFactory>>,
    last_access: Mutex<Instant>,
}

impl Mount {
    pub fn touch(&self) {
        *self.last_access.lock().unwrap() = Instant::now();
    }

    fn idle_for(&self) -> Duration {
        self.last_access.lock().unwrap().elapsed()
    }

    pub fn context(&self) -> std::sync::MutexGuard<'_, VfsContext<DiscReaderFactory>> {
        self.touch();
        self.context.lock().unwrap()
    }
}

/// Overlay-layer configuration (§4.10 ambient configuration).
#[derive(Clone, Copy, Debug)]
pub struct OverlayConfig {
    /// How long a mount with zero outstanding references may sit unused before `evict_idle`
    /// closes it.
    pub mount_idle_timeout: Duration,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        OverlayConfig { mount_idle_timeout: Duration::from_secs(300) }
    }
}

/// Process-local table from absolute ISO path to its (possibly not-yet-opened) mount.
pub struct OverlayLayer {
    mounts: Mutex<HashMap<PathBuf, Arc<Mount>>>,
    idle_timeout: Duration,
}

impl OverlayLayer {
    pub fn new(config: OverlayConfig) -> Self {
        OverlayLayer { mounts: Mutex::new(HashMap::new()), idle_timeout: config.mount_idle_timeout }
    }

    /// Return the mount for `iso_path`, opening it on first access.
    pub fn mount(
        &self,
        iso_path: impl AsRef<Path>,
        make_disc_reader: DiscReaderFactory,
        decoder_factory: Arc<dyn DstDecoderFactory>,
        renderer: Arc<dyn Id3Renderer>,
        parent_virtual_path: PathBuf,
        display_name: String,
        vfs_config: VfsConfig,
    ) -> CoreResult<Arc<Mount>> {
        let iso_path = iso_path.as_ref().to_path_buf();
        let mut mounts = self.mounts.lock().unwrap();
        if let Some(mount) = mounts.get(&iso_path) {
            mount.touch();
            return Ok(mount.clone());
        }

        let context =
            VfsContext::open(iso_path.clone(), make_disc_reader, decoder_factory, renderer, vfs_config)?;
        let mount = Arc::new(Mount {
            display_name,
            parent_virtual_path,
            context: Mutex::new(context),
            last_access: Mutex::new(Instant::now()),
        });
        log::debug!("mounted {}", iso_path.display());
        mounts.insert(iso_path, mount.clone());
        Ok(mount)
    }

    /// Persist every mount's unsaved ID3 changes (§4.7 "Flush-all").
    pub fn flush_all(&self) -> CoreResult<()> {
        let mounts = self.mounts.lock().unwrap();
        for (iso_path, mount) in mounts.iter() {
            let mut ctx = mount.context.lock().unwrap();
            if ctx.overlay_store().has_unsaved_changes() {
                ctx.overlay_store_mut().save()?;
                log::debug!("flushed overlay changes for {}", iso_path.display());
            }
        }
        Ok(())
    }

    /// Evict and close mounts idle past the configured timeout with no outstanding references
    /// beyond the table itself.
    pub fn evict_idle(&self) -> CoreResult<()> {
        let mut mounts = self.mounts.lock().unwrap();
        let expired: Vec<PathBuf> = mounts
            .iter()
            .filter(|(_, mount)| {
                Arc::strong_count(mount) == 1 && mount.idle_for() >= self.idle_timeout
            })
            .map(|(path, _)| path.clone())
            .collect();

        for path in expired {
            if let Some(mount) = mounts.remove(&path) {
                if let Ok(mount) = Arc::try_unwrap(mount) {
                    mount.context.into_inner().unwrap().close()?;
                    log::debug!("evicted idle mount {}", path.display());
                }
            }
        }
        Ok(())
    }

    /// Resolve a display name collision against everything already present in `parent`: the
    /// first entry with `base` keeps it, later ones get `" (k)"` suffixes (§4.7 "Collision
    /// resolution").
    pub fn resolve_collision(&self, parent: &Path, base: &str, filename_max: usize) -> String {
        let mounts = self.mounts.lock().unwrap();
        let mut k = 0usize;
        loop {
            let candidate = disambiguate(base, k, filename_max);
            let taken = mounts
                .values()
                .any(|m| m.parent_virtual_path == parent && m.display_name == candidate);
            if !taken {
                return candidate;
            }
            k += 1;
        }
    }

    /// Commit a metadata write that arrives as a bare host-visible path with no live
    /// `VirtualFile` handle (§4.7 "ID3 write routing"): find the mount whose synthesized
    /// directory prefixes `virtual_path`, recover `(area, track_number)` from the remainder via
    /// [`parse_track_path`], and push the bytes through that track's overlay store.
    pub fn write_by_path(&self, virtual_path: &str, data: &[u8], position: u64) -> CoreResult<usize> {
        let full = Path::new(virtual_path);
        let mount = {
            let mounts = self.mounts.lock().unwrap();
            mounts
                .values()
                .find(|m| full.starts_with(m.parent_virtual_path.join(&m.display_name)))
                .cloned()
        }
        .ok_or(CoreError::NotFound)?;

        let prefix = mount.parent_virtual_path.join(&mount.display_name);
        let remainder = full.strip_prefix(&prefix).map_err(|_| CoreError::NotFound)?;
        let (area, track_number) = parse_track_path(&remainder.to_string_lossy())
            .ok_or_else(|| CoreError::InvalidParameter(virtual_path.to_string()))?;

        let mut ctx = mount.context();
        let mut file = ctx.open_track(area, track_number)?;
        let n = file.write_metadata(data, position)?;
        ctx.flush_track(file)?;
        Ok(n)
    }
}

/// Recover `(area, track_number)` from a bare virtual path string, the way the overlay layer must
/// when it only has a host path and no live `VirtualFile` handle (§4.7 "ID3 write routing": scan
/// for `"Multi-channel"`, then `scanf` the filename's leading digits).
fn parse_track_path(virtual_path: &str) -> Option<(AudioArea, u8)> {
    let area = if virtual_path.contains("Multi-channel") {
        AudioArea::MultiChannel
    } else {
        AudioArea::Stereo
    };

    let filename = virtual_path.rsplit('/').next()?;
    let digits: String = filename.chars().take_while(|c| c.is_ascii_digit()).collect();
    let track_number: u8 = digits.parse().ok()?;
    Some((area, track_number))
}
