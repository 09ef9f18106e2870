//! MT-pipeline-specific end-to-end coverage: a worker pool must never change what a reader sees.

mod common;

use common::roundtrip::assert_st_and_mt_identical;
use sacdfs::AudioArea;

#[test]
fn st_and_mt_modes_produce_byte_identical_output() {
    assert_st_and_mt_identical(AudioArea::Stereo, 1, 4);
}
