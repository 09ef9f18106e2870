//! The ID3 renderer (§6.3) turns disc text into an ID3v2 tag. Frame parsing and serialization
//! stay a library concern handled by the `id3` crate (the same one the `anni` example pack reaches
//! for when stamping track metadata) — this module only decides which frames to populate.

use id3::TagLike;

use crate::disc_reader::{DiscReader, TextKind};
use crate::CoreResult;

/// Produces an ID3v2 tag for one track from whatever a [`DiscReader`] reports as disc/track text.
pub trait Id3Renderer: Send + Sync {
    /// Render the tag for `track_number`, using the disc reader's currently selected area. Must
    /// never return an empty `Vec` on success — the overlay store (§4.3) treats that as a
    /// renderer failure.
    fn render(&self, disc_reader: &dyn DiscReader, track_number: u8) -> CoreResult<Vec<u8>>;
}

/// Default renderer: assembles a minimal ID3v2.4 tag (`TIT2`/`TPE1`/`TALB`/`TRCK`) from the disc
/// reader's title, artist, album and track-number text.
#[derive(Default)]
pub struct DiscTextId3Renderer;

impl Id3Renderer for DiscTextId3Renderer {
    fn render(&self, disc_reader: &dyn DiscReader, track_number: u8) -> CoreResult<Vec<u8>> {
        let mut tag = id3::Tag::new();

        let title = disc_reader.text(Some(track_number), TextKind::Title);
        if !title.is_empty() {
            tag.set_title(title);
        }
        let artist = disc_reader.text(Some(track_number), TextKind::Artist);
        if !artist.is_empty() {
            tag.set_artist(artist);
        }
        let album = disc_reader.text(None, TextKind::Album);
        if !album.is_empty() {
            tag.set_album(album);
        } else {
            let fallback = disc_reader.album_name();
            if !fallback.is_empty() {
                tag.set_album(fallback);
            }
        }
        tag.set_track(track_number as u32);

        let mut buf = Vec::new();
        tag.write_to(&mut buf, id3::Version::Id3v24)
            .map_err(|err| crate::CoreError::Format(err.to_string()))?;
        Ok(buf)
    }
}
