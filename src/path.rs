//! Path-sanitization and the VFS path convention (§6.7): `/{album}/{area}/NN. {title}.dsf`.

/// Characters illegal (or awkward) in a filesystem path component on the platforms this crate
/// targets.
const ILLEGAL_CHARS: &[char] = &['/', '\\', ':', '*', '?', '"', '<', '>', '|'];

/// Strip path-illegal characters from a disc/track text field so it can be used as a path
/// component (§4.6 step 2, §6.7).
pub fn sanitize_component(name: &str) -> String {
    let cleaned: String = name.chars().filter(|c| !ILLEGAL_CHARS.contains(c)).collect();
    let trimmed = cleaned.trim();
    if trimmed.is_empty() {
        "Untitled".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Build the track filename `"{NN}. {sanitized_title}.dsf"` (§6.7), `NN` zero-padded to two
/// digits.
pub fn track_filename(track_number: u8, title: &str) -> String {
    format!("{:02}. {}.dsf", track_number, sanitize_component(title))
}

/// Build the full virtual path for one track: `/{album}/{area}/{track filename}`.
pub fn track_path(album: &str, area_dir: &str, track_number: u8, title: &str) -> String {
    format!(
        "/{}/{}/{}",
        sanitize_component(album),
        area_dir,
        track_filename(track_number, title)
    )
}

/// Disambiguate a display name colliding with an existing entry in the same parent directory by
/// appending `" (k)"`, truncating the base name so the result stays within `max_len` bytes
/// (§4.7 "Collision resolution").
pub fn disambiguate(base: &str, k: usize, max_len: usize) -> String {
    if k == 0 {
        return base.to_string();
    }
    let suffix = format!(" ({k})");
    let budget = max_len.saturating_sub(6);
    let mut truncated: String = base.chars().collect();
    while truncated.len() > budget {
        truncated.pop();
    }
    format!("{truncated}{suffix}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_strips_illegal_characters() {
        assert_eq!(sanitize_component("Weird:Name/With*Chars?"), "WeirdNameWithChars");
    }

    #[test]
    fn sanitize_falls_back_on_empty_result() {
        assert_eq!(sanitize_component("///"), "Untitled");
    }

    #[test]
    fn track_filename_pads_to_two_digits() {
        assert_eq!(track_filename(3, "Intro"), "03. Intro.dsf");
        assert_eq!(track_filename(12, "Finale"), "12. Finale.dsf");
    }

    #[test]
    fn disambiguate_appends_suffix_and_truncates() {
        assert_eq!(disambiguate("Album", 0, 40), "Album");
        assert_eq!(disambiguate("Album", 1, 40), "Album (1)");
        let long_base = "x".repeat(50);
        let result = disambiguate(&long_base, 2, 40);
        assert!(result.len() <= 40);
        assert!(result.ends_with(" (2)"));
    }
}
