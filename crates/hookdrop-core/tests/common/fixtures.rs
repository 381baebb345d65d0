//! Image files on disk for upload tests.

use std::path::Path;

use hookdrop_core::Candidate;
use image::{Rgb, RgbImage};

/// Writes a PNG of `side`x`side` noisy pixels (noise keeps it well above 5 KB).
pub fn noisy_png(dir: &Path, name: &str, side: u32) -> Candidate {
    let mut state: u32 = name
        .bytes()
        .fold(7u32, |acc, b| acc.wrapping_mul(131).wrapping_add(b as u32));
    let img = RgbImage::from_fn(side, side, |_, _| {
        state = state.wrapping_mul(1_103_515_245).wrapping_add(12_345);
        let b = state.to_be_bytes();
        Rgb([b[0], b[1], b[2]])
    });
    let path = dir.join(name);
    img.save(&path).expect("write png");
    Candidate::from_path(path)
}

/// Writes `len` bytes of non-image data.
pub fn junk_file(dir: &Path, name: &str, len: usize) -> Candidate {
    let path = dir.join(name);
    std::fs::write(&path, vec![0x5au8; len]).expect("write junk");
    Candidate::from_path(path)
}
