//! Track publishing pipeline.
//!
//! ```text
//!  PublishRequest ─► MediaSource::open ─► SampleReader ─► FramePacer ─► LocalTrack ─► Session
//!                                              │
//!                                         exhausted
//!                                              ▼
//!                          TrackHandle::complete ─► on_complete ─► unpublish
//! ```
//!
//! Every published source gets its own pump task. Cancellation (through
//! `shutdown` or the token given to `with_cancel`) is the only way to stop a
//! pump from outside; a pump stops by itself when its source is exhausted or
//! the session closes its track.

use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use tokio::sync::RwLock;
use tokio_util::{sync::CancellationToken, task::TaskTracker};

use crate::{
    error::{BusError, Result},
    kind::MediaKind,
    pacer::{FramePacer, frame_interval},
    sample::SampleSender,
    session::Session,
    source::{MediaSource, SampleReader},
    synthetic::{DEFAULT_DEMO_FPS, SimulcastLayerSet},
    track::{DEFAULT_TRACK_BUFFER, LayerInfo, LocalTrack, TrackHandle, TrackOptions},
};

pub type CompletionCallback = Arc<dyn Fn(&TrackHandle) + Send + Sync>;

/// One track to publish.
#[derive(Clone, Debug, PartialEq)]
pub struct PublishRequest {
    pub source: MediaSource,
    pub kind: MediaKind,
    pub fps: Option<f64>,
}

impl PublishRequest {
    pub fn new(source: MediaSource, kind: MediaKind, fps: Option<f64>) -> Self {
        Self { source, kind, fps }
    }

    /// Kind from the file extension.
    pub fn file(path: impl Into<std::path::PathBuf>, fps: Option<f64>) -> Result<Self> {
        let source = MediaSource::File(path.into());
        let kind = source.infer_kind()?;
        Ok(Self::new(source, kind, fps))
    }

    /// Kind from the keyword in the socket address.
    pub fn socket(addr: impl Into<String>, fps: Option<f64>) -> Result<Self> {
        let source = MediaSource::UnixSocket(addr.into());
        let kind = source.infer_kind()?;
        Ok(Self::new(source, kind, fps))
    }

    /// Kind from an explicit MIME type.
    pub fn stdin(mime: &str, fps: Option<f64>) -> Result<Self> {
        Ok(Self::new(MediaSource::Stdin, MediaKind::from_mime(mime)?, fps))
    }

    /// Synthetic sources have no natural rate, so they fall back to the demo
    /// rate when `fps` does not pace.
    pub fn pacer(&self) -> FramePacer {
        let unpaced = self.fps.and_then(frame_interval).is_none();
        if unpaced && matches!(self.source, MediaSource::Synthetic { .. }) {
            return FramePacer::new(self.kind, Some(DEFAULT_DEMO_FPS));
        }
        FramePacer::new(self.kind, self.fps)
    }
}

enum SourceSlot {
    Opening,
    Active(Arc<TrackHandle>),
}

/// State shared between the publisher and its pumps.
struct PublisherInner {
    session: Arc<dyn Session>,
    cancel: CancellationToken,
    sources: RwLock<HashMap<String, SourceSlot>>,
}

/// Publishes sources as tracks and tears them down on exhaustion or shutdown.
pub struct TrackPublisher {
    inner: Arc<PublisherInner>,
    on_complete: Option<CompletionCallback>,
    tasks: TaskTracker,
    buffer: usize,
    stopping: AtomicBool,
}

impl TrackPublisher {
    pub fn new(session: Arc<dyn Session>) -> Self {
        Self::with_cancel(session, CancellationToken::new())
    }

    /// Publisher stopped by `cancel` as well as by [`TrackPublisher::shutdown`].
    /// Cancelling interrupts pumps and sources that are still opening; call
    /// `shutdown` afterwards to unpublish what is left.
    pub fn with_cancel(session: Arc<dyn Session>, cancel: CancellationToken) -> Self {
        Self {
            inner: Arc::new(PublisherInner {
                session,
                cancel,
                sources: RwLock::new(HashMap::new()),
            }),
            on_complete: None,
            tasks: TaskTracker::new(),
            buffer: DEFAULT_TRACK_BUFFER,
            stopping: AtomicBool::new(false),
        }
    }

    /// Called once per track when its source is exhausted, before the unpublish.
    /// Applies to tracks published after this call.
    pub fn with_on_complete(mut self, callback: CompletionCallback) -> Self {
        self.on_complete = Some(callback);
        self
    }

    /// Samples buffered between a pump and its track.
    pub fn with_buffer(mut self, buffer: usize) -> Self {
        self.buffer = buffer.max(1);
        self
    }

    pub async fn active_tracks(&self) -> Vec<Arc<TrackHandle>> {
        self.inner
            .sources
            .read()
            .await
            .values()
            .filter_map(|slot| match slot {
                SourceSlot::Active(handle) if handle.is_active() => Some(handle.clone()),
                _ => None,
            })
            .collect()
    }

    /// Opens the source, publishes it and starts pumping samples into it.
    /// A source that is still opening when the publisher is cancelled fails
    /// with a publish error.
    pub async fn publish(&self, request: PublishRequest) -> Result<Arc<TrackHandle>> {
        let key = request.source.key();
        self.reserve(&key).await?;

        let opening = async {
            let reader = request.source.open(request.kind).await?;
            let (tx, track) = LocalTrack::new(request.kind, self.buffer);
            let options = TrackOptions::named(request.source.track_name());
            let publication = self.inner.session.publish_track(track, options).await?;
            Ok::<_, BusError>((reader, tx, publication))
        };
        let opened = tokio::select! {
            _ = self.inner.cancel.cancelled() => Err(shutting_down()),
            opened = opening => opened,
        };

        let (reader, tx, publication) = match opened {
            Ok(opened) => opened,
            Err(e) => {
                self.inner.sources.write().await.remove(&key);
                log::warn!("publish {} failed: {}", request.source, e);
                return Err(e);
            }
        };

        let handle = TrackHandle::new(publication, key.clone());
        handle.mark_publishing();
        self.inner
            .sources
            .write()
            .await
            .insert(key, SourceSlot::Active(handle.clone()));

        let pacer = request.pacer();
        log::info!(
            "publishing track: name={} sid={} kind={} pacing={:?}",
            handle.name(),
            handle.sid(),
            handle.kind(),
            pacer.interval()
        );
        self.spawn_pump(handle.clone(), reader, pacer, tx);
        Ok(handle)
    }

    /// Publishes every layer of `set` as one simulcast group, each layer with
    /// its own generator and pacer. Either all layers are published or none.
    pub async fn publish_demo(
        &self,
        set: SimulcastLayerSet,
        fps: Option<f64>,
    ) -> Result<Arc<TrackHandle>> {
        let key = format!("synthetic:group:{}", set.name);
        self.reserve(&key).await?;

        let fps = fps
            .filter(|f| frame_interval(*f).is_some())
            .unwrap_or(DEFAULT_DEMO_FPS);
        let mut tracks = Vec::with_capacity(set.layers.len());
        let mut pumps = Vec::with_capacity(set.layers.len());
        for layer in set.layers {
            log::info!(
                "simulcast layer: quality={} {}x{}",
                layer.quality.as_str(),
                layer.width,
                layer.height
            );
            let (tx, track) = LocalTrack::new(MediaKind::VideoH264, self.buffer);
            tracks.push(track.with_layer(LayerInfo {
                quality: layer.quality,
                width: layer.width,
                height: layer.height,
            }));
            pumps.push((SampleReader::Synthetic(layer.generator), tx));
        }

        let publishing = self
            .inner
            .session
            .publish_simulcast(tracks, TrackOptions::named(set.name.clone()));
        let published = tokio::select! {
            _ = self.inner.cancel.cancelled() => Err(shutting_down()),
            published = publishing => published,
        };
        let publication = match published {
            Ok(publication) => publication,
            Err(e) => {
                self.inner.sources.write().await.remove(&key);
                log::warn!("publish simulcast group {} failed: {}", set.name, e);
                return Err(e);
            }
        };

        let handle = TrackHandle::new(publication, key.clone());
        handle.mark_publishing();
        self.inner
            .sources
            .write()
            .await
            .insert(key, SourceSlot::Active(handle.clone()));

        for (reader, tx) in pumps {
            let pacer = FramePacer::new(MediaKind::VideoH264, Some(fps));
            self.spawn_pump(handle.clone(), reader, pacer, tx);
        }
        Ok(handle)
    }

    /// Stops every pump, unpublishes every active track and waits for the
    /// pumps to release their sources.
    pub async fn shutdown(&self) {
        self.inner.cancel.cancel();
        if self.stopping.swap(true, Ordering::AcqRel) {
            self.tasks.wait().await;
            return;
        }

        let handles: Vec<Arc<TrackHandle>> = self
            .inner
            .sources
            .read()
            .await
            .values()
            .filter_map(|slot| match slot {
                SourceSlot::Active(handle) => Some(handle.clone()),
                SourceSlot::Opening => None,
            })
            .collect();
        for handle in handles {
            unpublish(&self.inner.session, &handle).await;
        }

        self.tasks.close();
        self.tasks.wait().await;
        log::info!("publisher stopped");
    }

    fn spawn_pump(
        &self,
        handle: Arc<TrackHandle>,
        reader: SampleReader,
        pacer: FramePacer,
        tx: SampleSender,
    ) {
        let inner = self.inner.clone();
        let on_complete = self.on_complete.clone();
        self.tasks.spawn(async move {
            pump(inner, handle, reader, pacer, tx, on_complete).await
        });
    }

    async fn reserve(&self, key: &str) -> Result<()> {
        if self.inner.cancel.is_cancelled() {
            return Err(shutting_down());
        }
        let mut sources = self.inner.sources.write().await;
        if sources.contains_key(key) {
            return Err(BusError::publish(format!("source {} is already published", key)));
        }
        sources.insert(key.to_string(), SourceSlot::Opening);
        Ok(())
    }
}

/// read -> pace -> write until exhaustion, track closure or shutdown.
async fn pump(
    inner: Arc<PublisherInner>,
    handle: Arc<TrackHandle>,
    mut reader: SampleReader,
    mut pacer: FramePacer,
    tx: SampleSender,
    on_complete: Option<CompletionCallback>,
) {
    let cancel = inner.cancel.clone();
    let exhausted = loop {
        let next = tokio::select! {
            _ = cancel.cancelled() => break false,
            next = reader.next_sample() => next,
        };
        let mut sample = match next {
            Ok(Some(sample)) => sample,
            Ok(None) => break true,
            Err(e) => {
                log::warn!("track {}: read failed, ending stream: {}", handle.name(), e);
                break true;
            }
        };

        tokio::select! {
            _ = cancel.cancelled() => break false,
            _ = pacer.pace(&mut sample) => {}
        }

        let sent = tokio::select! {
            _ = cancel.cancelled() => break false,
            sent = tx.send(sample) => sent,
        };
        if sent.is_err() {
            log::debug!("track {}: closed by session", handle.name());
            break false;
        }
        handle.record_written();
    };

    // release the source handle and let the session flush what it has
    drop(reader);
    drop(tx);

    if exhausted && handle.complete() {
        log::info!(
            "finished writing {} ({} samples)",
            handle.name(),
            handle.samples_written()
        );
        if let Some(callback) = &on_complete {
            callback(handle.as_ref());
        }
    }
    unpublish(&inner.session, &handle).await;

    let mut sources = inner.sources.write().await;
    if let Some(SourceSlot::Active(current)) = sources.get(handle.source_key()) {
        if Arc::ptr_eq(current, &handle) {
            sources.remove(handle.source_key());
        }
    }
}

fn shutting_down() -> BusError {
    BusError::publish("publisher is shutting down")
}

/// Best-effort and at most once per handle.
async fn unpublish(session: &Arc<dyn Session>, handle: &TrackHandle) {
    if !handle.begin_unpublish() {
        return;
    }
    match session.unpublish_track(handle.sid()).await {
        Ok(()) => log::debug!("unpublished track {} ({})", handle.name(), handle.sid()),
        Err(e) => log::debug!("unpublish {} ignored: {}", handle.sid(), e),
    }
}

#[cfg(test)]
#[path = "publisher_test.rs"]
mod publisher_test;
