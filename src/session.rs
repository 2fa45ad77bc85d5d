// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Scan session - the state machine driving capture, finalize, and export

use crate::capture::{AnchorId, AnchorMeshBuffer, CaptureEvent, ColorFrame, FrameSource, RawSurfacePatch};
use crate::error::{PipelineError, Result};
use crate::io::{export_glb, ExportStaging, ExportedFile};
use crate::scene::{assemble, generate_texture, merge_snapshot, Material, SceneGraph};
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

/// Session lifecycle.
///
/// `Idle → Scanning → Finalizing → Previewing → Exported → {Relocated |
/// Abandoned}`. Cancel is permitted from `Scanning` or `Previewing` and
/// returns to `Idle`. A failed finalize reverts to `Scanning` for retry;
/// once `Previewing` is reached there is no way back to `Scanning`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Scanning,
    Finalizing,
    Previewing,
    Exported,
    Relocated,
    Abandoned,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Scanning => "scanning",
            Self::Finalizing => "finalizing",
            Self::Previewing => "previewing",
            Self::Exported => "exported",
            Self::Relocated => "relocated",
            Self::Abandoned => "abandoned",
        };
        f.write_str(name)
    }
}

/// Presentation-layer seam. Completion of blocking work (texture encode,
/// container serialization, file IO) is signaled through these callbacks
/// from worker threads, never on the caller's thread.
pub trait SessionDelegate: Send + Sync {
    fn preview_ready(&self, graph: &SceneGraph);
    fn export_ready(&self, path: &Path);
    fn export_failed(&self, error: &PipelineError);
    /// Recoverable failure worth telling the user about
    fn alert(&self, message: &str);
}

struct SessionInner {
    state: Mutex<SessionState>,
    buffer: AnchorMeshBuffer,
    frames: Arc<dyn FrameSource>,
    delegate: Arc<dyn SessionDelegate>,
    graph: Mutex<Option<Arc<SceneGraph>>>,
    export: Mutex<Option<ExportedFile>>,
    staging: Mutex<Option<ExportStaging>>,
    export_in_flight: AtomicBool,
}

/// One scanning session from first patch to relocated container.
///
/// One producer (the capture subsystem) feeds `handle_event`; one consumer
/// (the presentation layer) drives `start`/`finalize`/`request_export`/
/// `cancel`/`relocate`. Lock ordering throughout is state, then graph, then
/// export, then staging.
pub struct ScanSession {
    inner: Arc<SessionInner>,
}

impl ScanSession {
    pub fn new(frames: Arc<dyn FrameSource>, delegate: Arc<dyn SessionDelegate>) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                state: Mutex::new(SessionState::Idle),
                buffer: AnchorMeshBuffer::new(),
                frames,
                delegate,
                graph: Mutex::new(None),
                export: Mutex::new(None),
                staging: Mutex::new(None),
                export_in_flight: AtomicBool::new(false),
            }),
        }
    }

    pub fn state(&self) -> SessionState {
        *self.inner.state.lock().unwrap()
    }

    /// Number of surfaces currently buffered
    pub fn surface_count(&self) -> usize {
        self.inner.buffer.len()
    }

    /// The scene built by the last successful finalize, if any
    pub fn preview(&self) -> Option<Arc<SceneGraph>> {
        self.inner.graph.lock().unwrap().clone()
    }

    /// Begin a fresh scan
    pub fn start(&self) -> Result<()> {
        let mut state = self.inner.state.lock().unwrap();
        if *state != SessionState::Idle {
            return Err(PipelineError::InvalidState {
                operation: "start",
                state: *state,
            });
        }
        self.inner.buffer.clear();
        *state = SessionState::Scanning;
        Ok(())
    }

    /// Apply one capture event to the live buffer.
    ///
    /// Events arriving outside `Scanning` are dropped; nothing can reach a
    /// frozen snapshot. The state lock is held across the buffer mutation so
    /// a finalize racing this call either sees the patch in its snapshot or
    /// the event is dropped, never half of each.
    pub fn handle_event(&self, event: CaptureEvent) {
        let state = self.inner.state.lock().unwrap();
        if *state != SessionState::Scanning {
            log::debug!(
                "dropping capture event for anchor {} in state {}",
                event.anchor(),
                *state
            );
            return;
        }

        match event {
            CaptureEvent::SurfaceAdded { anchor, patch }
            | CaptureEvent::SurfaceUpdated { anchor, patch } => {
                self.inner.buffer.accept(anchor, patch);
            }
            CaptureEvent::SurfaceRemoved { anchor } => {
                self.inner.buffer.remove(&anchor);
            }
        }
    }

    /// Freeze the live scan and build the export-ready scene.
    ///
    /// Samples the color feed once; without a frame this fails with
    /// `FrameUnavailable` before anything is frozen, leaving the session in
    /// `Scanning` with the buffer intact. Otherwise the snapshot is taken,
    /// the session enters `Finalizing`, and merge, texture, and assembly run
    /// on a worker thread that reports through the delegate.
    pub fn finalize(&self) -> Result<()> {
        {
            let state = self.inner.state.lock().unwrap();
            if *state != SessionState::Scanning {
                return Err(PipelineError::InvalidState {
                    operation: "finalize",
                    state: *state,
                });
            }
        }

        // Sampled outside the state lock; the feed may block on the camera
        let Some(frame) = self.inner.frames.current_color_frame() else {
            return Err(PipelineError::frame_unavailable(
                "no color frame available from the capture feed",
            ));
        };

        let snapshot;
        {
            let mut state = self.inner.state.lock().unwrap();
            if *state != SessionState::Scanning {
                return Err(PipelineError::InvalidState {
                    operation: "finalize",
                    state: *state,
                });
            }
            *state = SessionState::Finalizing;
            snapshot = self.inner.buffer.snapshot();
        }

        let inner = Arc::clone(&self.inner);
        thread::spawn(move || inner.run_finalize(snapshot, frame));
        Ok(())
    }

    /// Request export of the previewed scene.
    ///
    /// From `Previewing` this kicks off serialization on a worker thread.
    /// From `Exported` it deterministically re-announces the existing
    /// container path. A call racing an in-flight export fails with
    /// `ExportInProgress`.
    pub fn request_export(&self) -> Result<()> {
        let state = self.inner.state.lock().unwrap();
        match *state {
            SessionState::Previewing => {
                if self.inner.export_in_flight.swap(true, Ordering::SeqCst) {
                    return Err(PipelineError::ExportInProgress);
                }
                let graph = self.inner.graph.lock().unwrap().clone();
                drop(state);

                let Some(graph) = graph else {
                    self.inner.export_in_flight.store(false, Ordering::SeqCst);
                    return Err(PipelineError::export_failed("no scene available to export"));
                };

                let inner = Arc::clone(&self.inner);
                thread::spawn(move || inner.run_export(graph));
                Ok(())
            }
            SessionState::Exported => {
                let export = self.inner.export.lock().unwrap();
                let Some(file) = export.as_ref() else {
                    return Err(PipelineError::export_failed("finished export went missing"));
                };
                let path = file.path().to_path_buf();
                drop(export);
                drop(state);

                self.inner.delegate.export_ready(&path);
                Ok(())
            }
            other => Err(PipelineError::InvalidState {
                operation: "request_export",
                state: other,
            }),
        }
    }

    /// Hand the finished container to the relocation sink.
    ///
    /// On success the session stops owning the file and never touches the
    /// destination path again. On failure the temporary file is retained so
    /// the sink can retry.
    pub fn relocate(&self, destination: &Path) -> Result<PathBuf> {
        let mut state = self.inner.state.lock().unwrap();
        if *state != SessionState::Exported {
            return Err(PipelineError::InvalidState {
                operation: "relocate",
                state: *state,
            });
        }

        let mut export = self.inner.export.lock().unwrap();
        let staging = self.inner.staging.lock().unwrap();
        let (Some(file), Some(staging)) = (export.as_ref(), staging.as_ref()) else {
            return Err(PipelineError::relocation_failed(
                "no finished export to relocate",
            ));
        };

        let moved = staging.relocate(file, destination)?;
        *export = None;
        *state = SessionState::Relocated;
        Ok(moved)
    }

    /// Abort the scan and return to `Idle`, discarding all patches, nodes,
    /// and temporary files
    pub fn cancel(&self) -> Result<()> {
        let mut state = self.inner.state.lock().unwrap();
        match *state {
            SessionState::Scanning | SessionState::Previewing => {
                *state = SessionState::Idle;
                self.inner.buffer.clear();
                *self.inner.graph.lock().unwrap() = None;
                *self.inner.export.lock().unwrap() = None;
                if let Some(staging) = self.inner.staging.lock().unwrap().as_ref() {
                    staging.cleanup_stale(None);
                }
                Ok(())
            }
            other => Err(PipelineError::InvalidState {
                operation: "cancel",
                state: other,
            }),
        }
    }

    /// Tear the session down, releasing the staging directory and every
    /// temporary file still in it
    pub fn abandon(&self) {
        let mut state = self.inner.state.lock().unwrap();
        *state = SessionState::Abandoned;
        self.inner.buffer.clear();
        *self.inner.graph.lock().unwrap() = None;
        *self.inner.export.lock().unwrap() = None;
        *self.inner.staging.lock().unwrap() = None;
    }

    /// Remove staged exports other than the one currently owned
    pub fn cleanup_stale_exports(&self) -> usize {
        let export = self.inner.export.lock().unwrap();
        let keep = export.as_ref().map(|file| file.path().to_path_buf());
        drop(export);

        match self.inner.staging.lock().unwrap().as_ref() {
            Some(staging) => staging.cleanup_stale(keep.as_deref()),
            None => 0,
        }
    }
}

impl SessionInner {
    fn run_finalize(&self, snapshot: Vec<(AnchorId, Arc<RawSurfacePatch>)>, frame: ColorFrame) {
        let result = catch_unwind(AssertUnwindSafe(|| build_scene(&snapshot, &frame)))
            .unwrap_or_else(|_| {
                Err(PipelineError::frame_unavailable(
                    "internal fault while building the preview scene",
                ))
            });

        match result {
            Ok((graph, discarded)) => {
                if !discarded.is_empty() {
                    self.delegate.alert(&format!(
                        "{} malformed surface patch(es) were dropped from the scan",
                        discarded.len()
                    ));
                }

                let graph = Arc::new(graph);
                let promoted = {
                    let mut state = self.state.lock().unwrap();
                    if *state == SessionState::Finalizing {
                        *self.graph.lock().unwrap() = Some(Arc::clone(&graph));
                        *state = SessionState::Previewing;
                        true
                    } else {
                        false
                    }
                };

                if promoted {
                    self.delegate.preview_ready(&graph);
                } else {
                    log::debug!("discarding finalize result; session moved on");
                }
            }
            Err(err) => {
                let mut state = self.state.lock().unwrap();
                if *state == SessionState::Finalizing {
                    *state = SessionState::Scanning;
                }
                drop(state);
                self.delegate.alert(&err.to_string());
            }
        }
    }

    fn run_export(&self, graph: Arc<SceneGraph>) {
        let result = catch_unwind(AssertUnwindSafe(|| export_glb(&graph))).unwrap_or_else(|_| {
            Err(PipelineError::export_failed(
                "internal fault while serializing the container",
            ))
        });

        let outcome = result.and_then(|bytes| {
            let mut staging = self.staging.lock().unwrap();
            if staging.is_none() {
                *staging = Some(ExportStaging::new()?);
            }
            staging.as_mut().unwrap().persist(&bytes)
        });

        match outcome {
            Ok(file) => {
                let path = file.path().to_path_buf();
                let promoted = {
                    let mut state = self.state.lock().unwrap();
                    if *state == SessionState::Previewing {
                        *self.export.lock().unwrap() = Some(file);
                        *state = SessionState::Exported;
                        true
                    } else {
                        false
                    }
                };
                self.export_in_flight.store(false, Ordering::SeqCst);

                if promoted {
                    self.delegate.export_ready(&path);
                } else {
                    log::debug!("discarding export finished after cancellation");
                    let _ = std::fs::remove_file(&path);
                }
            }
            Err(err) => {
                self.export_in_flight.store(false, Ordering::SeqCst);
                self.delegate.export_failed(&err);
            }
        }
    }
}

/// Merge the frozen snapshot, sample the texture once, and assemble the
/// export-ready scene
fn build_scene(
    snapshot: &[(AnchorId, Arc<RawSurfacePatch>)],
    frame: &ColorFrame,
) -> Result<(SceneGraph, Vec<(AnchorId, PipelineError)>)> {
    let outcome = merge_snapshot(snapshot);
    let texture = generate_texture(frame)?;
    let material = Material::textured(texture).shared();
    let graph = assemble(outcome.forest, material);
    Ok((graph, outcome.discarded))
}
