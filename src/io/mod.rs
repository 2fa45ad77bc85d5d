// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! I/O module - container export and temporary file staging

mod export_glb;
mod staging;

pub use export_glb::export as export_glb;
pub use staging::{ExportStaging, ExportedFile};
