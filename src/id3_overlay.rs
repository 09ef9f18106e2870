//! The ID3 overlay store (§4.3) is a per-`VfsContext` cache of one ID3v2 tag blob per
//! `(area, track)`. A read of a track's metadata region is serviced from this cache, regenerating
//! it from disc text on first access and persisting client overrides to an XML sidecar next to
//! the ISO (§6.5) — the same "small XML document with base64 blobs" shape the `anni` pack example
//! uses for its own metadata sidecars.

use std::collections::BTreeMap;
use std::io::Write as _;
use std::path::PathBuf;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

use crate::disc_reader::DiscReader;
use crate::id3_renderer::Id3Renderer;
use crate::{AudioArea, CoreError, CoreResult};

#[derive(Clone, Debug, Default)]
struct CacheEntry {
    data: Vec<u8>,
    valid: bool,
    dirty: bool,
    from_xml: bool,
}

/// Key into the overlay cache: one area plus a 1-based track number.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct OverlayKey {
    pub area: AudioArea,
    pub track_number: u8,
}

fn area_order(area: AudioArea) -> u8 {
    match area {
        AudioArea::Stereo => 0,
        AudioArea::MultiChannel => 1,
    }
}

impl PartialOrd for AudioArea {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for AudioArea {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        area_order(*self).cmp(&area_order(*other))
    }
}

fn area_xml_name(area: AudioArea) -> &'static str {
    match area {
        AudioArea::Stereo => "stereo",
        AudioArea::MultiChannel => "multichannel",
    }
}

fn area_from_xml_name(name: &str) -> Option<AudioArea> {
    match name {
        "stereo" => Some(AudioArea::Stereo),
        "multichannel" => Some(AudioArea::MultiChannel),
        _ => None,
    }
}

/// The overlay store for one opened ISO. `iso_path` determines the sidecar's location
/// (`{iso_path}.xml`) and the `iso` attribute written into it.
pub struct OverlayStore {
    iso_path: PathBuf,
    entries: BTreeMap<OverlayKey, CacheEntry>,
}

impl OverlayStore {
    pub fn new(iso_path: impl Into<PathBuf>) -> Self {
        OverlayStore { iso_path: iso_path.into(), entries: BTreeMap::new() }
    }

    fn sidecar_path(&self) -> PathBuf {
        let mut p = self.iso_path.clone().into_os_string();
        p.push(".xml");
        PathBuf::from(p)
    }

    /// Return the tag bytes for `(area, track_number)`, generating them from disc text via
    /// `renderer` on first access.
    pub fn get(
        &mut self,
        area: AudioArea,
        track_number: u8,
        disc_reader: &dyn DiscReader,
        renderer: &dyn Id3Renderer,
    ) -> CoreResult<Vec<u8>> {
        let key = OverlayKey { area, track_number };
        if let Some(entry) = self.entries.get(&key) {
            if entry.valid {
                return Ok(entry.data.clone());
            }
        }

        let rendered = renderer.render(disc_reader, track_number)?;
        if rendered.is_empty() {
            return Err(CoreError::Format("ID3 renderer produced zero bytes".into()));
        }
        self.entries.insert(
            key,
            CacheEntry { data: rendered.clone(), valid: true, dirty: false, from_xml: false },
        );
        Ok(rendered)
    }

    /// Replace the cached tag for `(area, track_number)` with a client-provided blob.
    pub fn set_overlay(&mut self, area: AudioArea, track_number: u8, bytes: &[u8]) {
        let key = OverlayKey { area, track_number };
        self.entries.insert(
            key,
            CacheEntry { data: bytes.to_vec(), valid: true, dirty: true, from_xml: false },
        );
    }

    /// Drop the cached tag; the next `get` regenerates it from disc text.
    pub fn clear(&mut self, area: AudioArea, track_number: u8) {
        let key = OverlayKey { area, track_number };
        self.entries.insert(
            key,
            CacheEntry { data: Vec::new(), valid: false, dirty: true, from_xml: false },
        );
    }

    pub fn has_unsaved_changes(&self) -> bool {
        self.entries.values().any(|e| e.dirty)
    }

    /// Persist dirty/overridden entries to the sidecar, or remove a stale sidecar if nothing
    /// needs saving (§7 "save when no changes exist removes any stale sidecar").
    pub fn save(&mut self) -> CoreResult<()> {
        let path = self.sidecar_path();

        if !self.entries.values().any(|e| e.dirty || e.from_xml) {
            if path.exists() {
                std::fs::remove_file(&path)?;
            }
            log::debug!("no overlay entries to persist, removed stale sidecar {}", path.display());
            return Ok(());
        }

        let xml = self.render_xml()?;
        std::fs::write(&path, xml)?;
        log::debug!("wrote ID3 overlay sidecar {}", path.display());

        for entry in self.entries.values_mut() {
            entry.dirty = false;
            entry.from_xml = true;
        }
        Ok(())
    }

    fn render_xml(&self) -> CoreResult<Vec<u8>> {
        let iso_name = self
            .iso_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let mut buf = Vec::new();
        buf.extend_from_slice(b"<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
        let mut writer = Writer::new_with_indent(&mut buf, b' ', 2);

        let mut root = BytesStart::new("SacdId3Overlay");
        root.push_attribute(("version", "1.0"));
        root.push_attribute(("iso", iso_name.as_str()));
        writer.write_event(Event::Start(root)).map_err(xml_err)?;

        let mut by_area: BTreeMap<AudioArea, Vec<(u8, &CacheEntry)>> = BTreeMap::new();
        for (key, entry) in &self.entries {
            if !(entry.valid || entry.dirty || entry.from_xml) {
                continue;
            }
            by_area.entry(key.area).or_default().push((key.track_number, entry));
        }

        for (area, mut tracks) in by_area {
            tracks.sort_by_key(|(n, _)| *n);
            let mut area_el = BytesStart::new("Area");
            area_el.push_attribute(("type", area_xml_name(area)));
            writer.write_event(Event::Start(area_el)).map_err(xml_err)?;

            for (track_number, entry) in tracks {
                let mut track_el = BytesStart::new("Track");
                track_el.push_attribute(("number", track_number.to_string().as_str()));
                writer.write_event(Event::Start(track_el)).map_err(xml_err)?;

                writer.write_event(Event::Start(BytesStart::new("Id3"))).map_err(xml_err)?;
                let encoded = BASE64.encode(&entry.data);
                writer.write_event(Event::Text(BytesText::new(&encoded))).map_err(xml_err)?;
                writer.write_event(Event::End(BytesEnd::new("Id3"))).map_err(xml_err)?;

                writer.write_event(Event::End(BytesEnd::new("Track"))).map_err(xml_err)?;
            }

            writer.write_event(Event::End(BytesEnd::new("Area"))).map_err(xml_err)?;
        }

        writer.write_event(Event::End(BytesEnd::new("SacdId3Overlay"))).map_err(xml_err)?;
        writer.into_inner().write_all(b"\n")?;
        Ok(buf)
    }

    /// Read the sidecar, if present, merging its entries into the cache. Malformed entries are
    /// skipped; one bad `Track` does not prevent the rest from loading.
    pub fn load(&mut self) -> CoreResult<()> {
        let path = self.sidecar_path();
        if !path.exists() {
            return Ok(());
        }
        let xml = std::fs::read_to_string(&path)?;
        self.load_str(&xml);
        log::debug!("loaded ID3 overlay sidecar {}", path.display());
        Ok(())
    }

    fn load_str(&mut self, xml: &str) {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(true);

        let mut current_area: Option<AudioArea> = None;
        let mut current_track: Option<u8> = None;
        let mut in_id3 = false;
        let mut buf = Vec::new();

        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(e)) => match e.name().as_ref() {
                    b"Area" => {
                        current_area = attr(&e, "type").and_then(|v| area_from_xml_name(&v));
                    }
                    b"Track" => {
                        current_track =
                            attr(&e, "number").and_then(|v| v.parse::<u8>().ok());
                    }
                    b"Id3" => in_id3 = true,
                    _ => {}
                },
                Ok(Event::Text(t)) if in_id3 => {
                    if let (Some(area), Some(track_number)) = (current_area, current_track) {
                        let text = t.unescape().unwrap_or_default().into_owned();
                        match BASE64.decode(text.as_bytes()) {
                            Ok(data) => {
                                self.entries.insert(
                                    OverlayKey { area, track_number },
                                    CacheEntry { data, valid: true, dirty: false, from_xml: true },
                                );
                            }
                            Err(err) => {
                                log::warn!(
                                    "skipping malformed ID3 overlay entry ({:?}, track {}): {err}",
                                    area,
                                    track_number
                                );
                            }
                        }
                    }
                }
                Ok(Event::End(e)) => match e.name().as_ref() {
                    b"Id3" => in_id3 = false,
                    b"Track" => current_track = None,
                    b"Area" => current_area = None,
                    _ => {}
                },
                Ok(Event::Eof) => break,
                Err(err) => {
                    log::warn!("malformed ID3 overlay sidecar, stopping parse early: {err}");
                    break;
                }
                _ => {}
            }
            buf.clear();
        }
    }
}

fn attr(e: &BytesStart, name: &str) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.as_ref() == name.as_bytes())
        .map(|a| String::from_utf8_lossy(&a.value).into_owned())
}

fn xml_err(err: quick_xml::Error) -> CoreError {
    CoreError::Format(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{SyntheticDiscReader, SyntheticId3Renderer};
    use std::path::Path;

    fn store(dir: &Path) -> OverlayStore {
        OverlayStore::new(dir.join("Album.iso"))
    }

    #[test]
    fn get_generates_then_caches() {
        let tmp = tempfile::tempdir().unwrap();
        let mut s = store(tmp.path());
        let reader = SyntheticDiscReader::stereo_two_tracks();
        let renderer = SyntheticId3Renderer;

        let first = s.get(AudioArea::Stereo, 1, &reader, &renderer).unwrap();
        assert!(!first.is_empty());
        let second = s.get(AudioArea::Stereo, 1, &reader, &renderer).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn set_overlay_then_get_returns_latest() {
        let tmp = tempfile::tempdir().unwrap();
        let mut s = store(tmp.path());
        s.set_overlay(AudioArea::Stereo, 1, b"custom-tag");
        let reader = SyntheticDiscReader::stereo_two_tracks();
        let renderer = SyntheticId3Renderer;
        let got = s.get(AudioArea::Stereo, 1, &reader, &renderer).unwrap();
        assert_eq!(got, b"custom-tag");
        assert!(s.has_unsaved_changes());
    }

    #[test]
    fn clear_forces_regeneration() {
        let tmp = tempfile::tempdir().unwrap();
        let mut s = store(tmp.path());
        s.set_overlay(AudioArea::Stereo, 1, b"custom-tag");
        s.clear(AudioArea::Stereo, 1);

        let reader = SyntheticDiscReader::stereo_two_tracks();
        let renderer = SyntheticId3Renderer;
        let got = s.get(AudioArea::Stereo, 1, &reader, &renderer).unwrap();
        assert_ne!(got, b"custom-tag");
    }

    #[test]
    fn save_with_no_changes_removes_stale_sidecar() {
        let tmp = tempfile::tempdir().unwrap();
        let sidecar = tmp.path().join("Album.iso.xml");
        std::fs::write(&sidecar, b"<stale/>").unwrap();

        let mut s = store(tmp.path());
        s.save().unwrap();
        assert!(!sidecar.exists());
    }

    #[test]
    fn save_then_load_round_trips() {
        let tmp = tempfile::tempdir().unwrap();
        let mut s = store(tmp.path());
        s.set_overlay(AudioArea::Stereo, 1, b"tag-one");
        s.set_overlay(AudioArea::MultiChannel, 2, b"tag-two");
        s.save().unwrap();
        assert!(!s.has_unsaved_changes());

        let mut reloaded = store(tmp.path());
        reloaded.load().unwrap();
        let reader = SyntheticDiscReader::stereo_two_tracks();
        let renderer = SyntheticId3Renderer;
        assert_eq!(
            reloaded.get(AudioArea::Stereo, 1, &reader, &renderer).unwrap(),
            b"tag-one"
        );
        assert_eq!(
            reloaded.get(AudioArea::MultiChannel, 2, &reader, &renderer).unwrap(),
            b"tag-two"
        );
    }

    #[test]
    fn malformed_entry_does_not_block_others() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<SacdId3Overlay version="1.0" iso="Album.iso">
  <Area type="stereo">
    <Track number="1">
      <Id3>not-valid-base64!!!</Id3>
    </Track>
    <Track number="2">
      <Id3>aGVsbG8=</Id3>
    </Track>
  </Area>
</SacdId3Overlay>
"#;
        let tmp = tempfile::tempdir().unwrap();
        let mut s = store(tmp.path());
        s.load_str(xml);

        let reader = SyntheticDiscReader::stereo_two_tracks();
        let renderer = SyntheticId3Renderer;
        // Track 1 failed to decode, so it must regenerate rather than return garbage.
        let t1 = s.get(AudioArea::Stereo, 1, &reader, &renderer).unwrap();
        assert_ne!(t1, b"not-valid-base64!!!");
        // Track 2 decoded fine.
        let t2 = s.get(AudioArea::Stereo, 2, &reader, &renderer).unwrap();
        assert_eq!(t2, b"hello");
    }
}
