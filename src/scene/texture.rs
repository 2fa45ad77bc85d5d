// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Color frame to texture conversion

use super::TextureResource;
use crate::capture::ColorFrame;
use crate::error::{PipelineError, Result};
use std::io::Cursor;

/// Convert one captured RGBA frame into a mesh-attachable texture.
///
/// Called exactly once per finalize: the result is a single still image,
/// not a live per-update projection. A buffer whose length disagrees with
/// its dimensions counts as an unusable frame, and encoder faults are
/// surfaced the same way so the session can drop back to scanning and
/// retry.
pub fn generate(frame: &ColorFrame) -> Result<TextureResource> {
    let expected = frame.expected_len();
    if frame.pixels.len() != expected {
        return Err(PipelineError::frame_unavailable(format!(
            "color frame is {} bytes, expected {} for {}x{} RGBA",
            frame.pixels.len(),
            expected,
            frame.width,
            frame.height
        )));
    }

    let img: image::RgbaImage =
        image::ImageBuffer::from_raw(frame.width, frame.height, frame.pixels.clone()).ok_or_else(
            || PipelineError::frame_unavailable("color frame buffer does not match its dimensions"),
        )?;

    let mut png = Vec::new();
    img.write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)
        .map_err(|e| PipelineError::frame_unavailable(format!("failed to encode color frame: {e}")))?;

    Ok(TextureResource {
        width: frame.width,
        height: frame.height,
        png,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(width: u32, height: u32) -> ColorFrame {
        ColorFrame::new(width, height, vec![0x7f; (width * height * 4) as usize])
    }

    #[test]
    fn test_generate_produces_png() {
        let texture = generate(&frame(8, 4)).unwrap();
        assert_eq!(texture.width, 8);
        assert_eq!(texture.height, 4);
        // PNG signature
        assert_eq!(&texture.png[0..8], &[0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a]);
    }

    #[test]
    fn test_generate_is_deterministic() {
        let a = generate(&frame(16, 16)).unwrap();
        let b = generate(&frame(16, 16)).unwrap();
        assert_eq!(a.png, b.png);
    }

    #[test]
    fn test_generate_rejects_short_buffer() {
        let bad = ColorFrame::new(8, 8, vec![0; 16]);
        let err = generate(&bad).unwrap_err();
        assert!(matches!(err, PipelineError::FrameUnavailable { .. }));
        assert!(err.to_string().contains("expected 256"));
    }
}
