//! Optional pre-send re-encoding into a scratch directory.

use anyhow::{Context, Result};
use hookdrop_core::Candidate;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::DynamicImage;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tempfile::TempDir;

pub const JPEG_QUALITY: u8 = 85;

/// Output format for a re-encoded copy; always the source's own format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Target {
    Jpeg,
    Png,
}

impl Target {
    fn for_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?;
        if ext.eq_ignore_ascii_case("jpg") || ext.eq_ignore_ascii_case("jpeg") {
            Some(Target::Jpeg)
        } else if ext.eq_ignore_ascii_case("png") {
            Some(Target::Png)
        } else {
            None
        }
    }

    fn extension(self) -> &'static str {
        match self {
            Target::Jpeg => "jpg",
            Target::Png => "png",
        }
    }
}

/// Re-encodes every JPEG/PNG candidate into a fresh temp dir, keeping its
/// format: JPEG at quality 85, PNG with maximum compression. Each copy keeps
/// its original display name; other files and files that fail to decode pass
/// through unchanged. The returned `TempDir` must outlive the upload.
pub fn compress_all(candidates: Vec<Candidate>) -> Result<(TempDir, Vec<Candidate>)> {
    let scratch = tempfile::Builder::new()
        .prefix("hookdrop-")
        .tempdir()
        .context("create scratch dir for compression")?;

    let mut out = Vec::with_capacity(candidates.len());
    for (i, c) in candidates.into_iter().enumerate() {
        let Some(target) = Target::for_path(c.path()) else {
            out.push(c);
            continue;
        };
        let dest = scratch.path().join(format!("{:05}.{}", i, target.extension()));
        match compress_one(c.path(), &dest, target) {
            Ok(()) => out.push(Candidate::new(dest, c.name())),
            Err(e) => {
                tracing::warn!(file = %c, "not compressed: {:#}", e);
                out.push(c);
            }
        }
    }
    Ok((scratch, out))
}

fn compress_one(src: &Path, dest: &Path, target: Target) -> Result<()> {
    let img = image::open(src).with_context(|| format!("decode {}", src.display()))?;
    let mut w = BufWriter::new(File::create(dest)?);
    match target {
        Target::Jpeg => {
            // JPEG has no alpha channel.
            let rgb = DynamicImage::ImageRgb8(img.to_rgb8());
            rgb.write_with_encoder(JpegEncoder::new_with_quality(&mut w, JPEG_QUALITY))?;
        }
        Target::Png => {
            img.write_with_encoder(PngEncoder::new_with_quality(
                &mut w,
                CompressionType::Best,
                FilterType::Adaptive,
            ))?;
        }
    }
    w.flush()?;
    Ok(())
}
