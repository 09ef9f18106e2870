//! A reusable assertion for "ST-mode and MT-mode reads of the same track must be byte-identical"
//! (§4.5 "ordered regardless of completion order"), shared by every test that spins up a worker
//! pool and wants that guarantee checked.

use sacdfs::AudioArea;

pub fn assert_st_and_mt_identical(area: AudioArea, track: u8, mt_workers: usize) {
    let st_data = super::read_track(0, area, track);
    let mt_data = super::read_track(mt_workers, area, track);
    assert_eq!(st_data, mt_data, "ST and MT reads of area {area:?} track {track} diverged");
}
