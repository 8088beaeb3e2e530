use super::encode::Encoder;
use super::naming::ArtifactNaming;
use super::upload::Uploader;
use super::{Artifact, HandoffOutcome};
use crate::analyzer::{SnapshotAnnotator, SNAPSHOT_TIME_FORMAT};
use crate::error::HandoffError;
use crate::events::{CaptureEvent, EventBus};
use crate::segment::remove_quietly;
use chrono::NaiveDateTime;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info, warn};

/// Collaborators and settings shared by every handoff job
#[derive(Clone)]
pub struct HandoffContext {
    pub encoder: Arc<dyn Encoder>,
    /// `None` when uploading is disabled
    pub uploader: Option<Arc<dyn Uploader>>,
    pub naming: ArtifactNaming,
    pub output_dir: PathBuf,
    /// Renders snapshots off the capture loop
    pub annotator: Arc<SnapshotAnnotator>,
    pub event_bus: EventBus,
}

/// Non-blocking handoff of finished artifacts to encode and upload.
///
/// `submit` only enqueues. A worker task runs every job on its own task, so
/// jobs complete in any order and a slow upload never holds up the capture
/// loop. Conversion targets are picked by the worker before a job starts,
/// so no two jobs ever write the same file.
pub struct HandoffDispatcher {
    sender: Option<mpsc::UnboundedSender<Artifact>>,
    worker: Option<JoinHandle<()>>,
}

impl HandoffDispatcher {
    /// Spawn the worker; in-flight jobs get `drain_timeout` on shutdown
    pub fn start(context: HandoffContext, drain_timeout: Duration) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        let worker = tokio::spawn(handoff_worker(receiver, context, drain_timeout));

        Self {
            sender: Some(sender),
            worker: Some(worker),
        }
    }

    /// Queue an artifact. If the queue is gone the artifact's local file is removed.
    pub fn submit(&self, artifact: Artifact) -> Result<(), HandoffError> {
        let sender = match &self.sender {
            Some(sender) => sender,
            None => {
                discard_unqueued(artifact);
                return Err(HandoffError::QueueClosed);
            }
        };

        debug!("Submitting {}", artifact.describe());
        sender.send(artifact).map_err(|e| {
            discard_unqueued(e.0);
            HandoffError::QueueClosed
        })
    }

    /// Stop accepting work and wait for in-flight jobs
    pub async fn shutdown(&mut self) {
        self.sender.take();

        if let Some(worker) = self.worker.take() {
            if let Err(e) = worker.await {
                error!("Handoff worker failed: {}", e);
            }
        }
    }
}

fn discard_unqueued(artifact: Artifact) {
    warn!("Handoff queue closed, discarding {}", artifact.describe());
    if let Artifact::Segment { segment, .. } = artifact {
        if let Err(e) = std::fs::remove_file(&segment.path) {
            warn!("Failed to remove {}: {}", segment.path.display(), e);
        }
    }
}

async fn handoff_worker(
    mut receiver: mpsc::UnboundedReceiver<Artifact>,
    context: HandoffContext,
    drain_timeout: Duration,
) {
    info!("Handoff worker started");
    let mut jobs = JoinSet::new();
    let mut in_flight: HashSet<PathBuf> = HashSet::new();

    loop {
        tokio::select! {
            artifact = receiver.recv() => match artifact {
                Some(artifact) => {
                    let target = match &artifact {
                        Artifact::Segment { closed_at, .. } => {
                            let target = reserve_target(&context, *closed_at, &in_flight).await;
                            in_flight.insert(target.clone());
                            Some(target)
                        }
                        Artifact::Frame { .. } => None,
                    };

                    let context = context.clone();
                    jobs.spawn(async move {
                        handle_artifact(&context, artifact, target.clone()).await;
                        target
                    });
                }
                None => break,
            },
            Some(joined) = jobs.join_next(), if !jobs.is_empty() => match joined {
                Ok(Some(target)) => {
                    in_flight.remove(&target);
                }
                Ok(None) => {}
                Err(e) => error!("Handoff job panicked: {}", e),
            }
        }
    }

    if !jobs.is_empty() {
        info!("Waiting up to {:?} for {} handoff job(s)", drain_timeout, jobs.len());
        let drained = tokio::time::timeout(drain_timeout, async {
            while let Some(joined) = jobs.join_next().await {
                if let Err(e) = joined {
                    error!("Handoff job panicked: {}", e);
                }
            }
        })
        .await;

        if drained.is_err() {
            warn!("Abandoning {} unfinished handoff job(s)", jobs.len());
            jobs.abort_all();
        }
    }

    info!("Handoff worker stopped");
}

/// Timestamped target unless another job holds it or a file already sits there
async fn reserve_target(
    context: &HandoffContext,
    closed_at: NaiveDateTime,
    in_flight: &HashSet<PathBuf>,
) -> PathBuf {
    let preferred = context.naming.converted_path(&context.output_dir, closed_at);
    if in_flight.contains(&preferred) {
        debug!("{} is being converted, using a unique name", preferred.display());
        return context.naming.unique_path(&context.output_dir);
    }

    match tokio::fs::try_exists(&preferred).await {
        Ok(false) => preferred,
        Ok(true) => {
            debug!("{} already exists, using a unique name", preferred.display());
            context.naming.unique_path(&context.output_dir)
        }
        Err(e) => {
            warn!("Cannot check {}: {}", preferred.display(), e);
            context.naming.unique_path(&context.output_dir)
        }
    }
}

/// Run one artifact through conversion and upload exactly once.
///
/// `target` is the reserved conversion output of a segment; without one the
/// timestamped name is used.
pub(crate) async fn handle_artifact(
    context: &HandoffContext,
    artifact: Artifact,
    target: Option<PathBuf>,
) -> HandoffOutcome {
    let (name, outcome) = match artifact {
        Artifact::Segment {
            segment,
            framerate,
            closed_at,
        } => {
            let target = target
                .unwrap_or_else(|| context.naming.converted_path(&context.output_dir, closed_at));
            let name = target
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| format!("segment-{}", segment.sequence));

            let converted = context
                .encoder
                .convert(&segment.path, &target, &framerate)
                .await;
            remove_quietly(&segment.path).await;

            let outcome = match converted {
                Err(e) => {
                    error!("Discarding segment {}: {}", segment.sequence, e);
                    remove_quietly(&target).await;
                    HandoffOutcome::Discarded
                }
                Ok(()) => match &context.uploader {
                    None => {
                        info!("Upload disabled, keeping {}", target.display());
                        HandoffOutcome::Retained
                    }
                    Some(uploader) => {
                        let destination = context.naming.destination(closed_at, &name);
                        let outcome = match tokio::fs::read(&target).await {
                            Ok(payload) => match uploader.upload(payload, &destination).await {
                                Ok(()) => HandoffOutcome::Uploaded,
                                Err(e) => {
                                    error!("Discarding {}: {}", name, e);
                                    HandoffOutcome::Discarded
                                }
                            },
                            Err(e) => {
                                error!("Failed to read {}: {}", target.display(), e);
                                HandoffOutcome::Discarded
                            }
                        };
                        remove_quietly(&target).await;
                        outcome
                    }
                },
            };
            (name, outcome)
        }
        Artifact::Frame {
            frame,
            analysis,
            captured_at,
        } => {
            let destination = context.naming.snapshot_destination(captured_at);
            let frame_id = frame.id;
            let outcome = match &context.uploader {
                None => {
                    debug!("Upload disabled, dropping snapshot of frame {}", frame_id);
                    HandoffOutcome::Discarded
                }
                Some(uploader) => {
                    let annotator = Arc::clone(&context.annotator);
                    let timestamp = captured_at.format(SNAPSHOT_TIME_FORMAT).to_string();
                    let rendered = tokio::task::spawn_blocking(move || {
                        annotator.render(&frame, &analysis, &timestamp)
                    })
                    .await
                    .map_err(|e| HandoffError::Snapshot {
                        details: format!("Rendering task failed: {}", e),
                    })
                    .and_then(|rendered| rendered);

                    match rendered {
                        Ok(jpeg) => match uploader.upload(jpeg, &destination).await {
                            Ok(()) => HandoffOutcome::Uploaded,
                            Err(e) => {
                                error!("Discarding snapshot of frame {}: {}", frame_id, e);
                                HandoffOutcome::Discarded
                            }
                        },
                        Err(e) => {
                            error!("Dropping snapshot of frame {}: {}", frame_id, e);
                            HandoffOutcome::Discarded
                        }
                    }
                }
            };
            (destination, outcome)
        }
    };

    context
        .event_bus
        .emit(CaptureEvent::ArtifactHandled {
            name,
            outcome,
        })
        .await;
    outcome
}
