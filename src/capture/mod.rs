// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Capture module - anchor events, color frames, and the live patch buffer

mod buffer;
mod event;

pub use buffer::AnchorMeshBuffer;
pub use event::{AnchorId, CaptureEvent, ColorFrame, FrameSource, RawSurfacePatch};
