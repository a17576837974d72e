//! In-process room.
//!
//! `LocalSession` accepts publications, drains every track's samples and keeps
//! per-track counters. It validates the connect parameters and mints the join
//! token like a remote room would, which makes it the session the CLI runs
//! against and the one the pipeline tests use.

use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use async_trait::async_trait;
use tokio::{sync::RwLock, task::JoinHandle};
use tokio_util::sync::CancellationToken;

use crate::{
    error::{BusError, Result},
    events::{EVENT_CHANNEL_CAPACITY, SessionEvent, SessionEventReceiver, SessionEventSender},
    kind::MediaKind,
    sample::SampleReceiver,
    session::{ConnectInfo, Session},
    token::AccessToken,
    track::{LocalTrack, TrackOptions, TrackPublication},
};

const ALLOWED_SCHEMES: [&str; 4] = ["ws", "wss", "http", "https"];

/// Sample and byte counters for one publication.
#[derive(Debug, Default)]
pub struct TrackStats {
    samples: AtomicU64,
    bytes: AtomicU64,
}

impl TrackStats {
    pub fn samples(&self) -> u64 {
        self.samples.load(Ordering::Relaxed)
    }

    pub fn bytes(&self) -> u64 {
        self.bytes.load(Ordering::Relaxed)
    }
}

struct Publication {
    info: TrackPublication,
    layers: usize,
    cancel: CancellationToken,
    stats: Arc<TrackStats>,
    drains: Vec<JoinHandle<()>>,
}

pub struct LocalSession {
    url: url::Url,
    room_name: String,
    identity: String,
    token: String,
    events: SessionEventSender,
    closed: CancellationToken,
    tracks: RwLock<HashMap<String, Publication>>,
}

impl LocalSession {
    pub async fn connect(info: ConnectInfo) -> Result<Arc<Self>> {
        let url = url::Url::parse(&info.url)
            .map_err(|e| BusError::connection(format!("invalid url {:?}: {}", info.url, e)))?;
        if !ALLOWED_SCHEMES.contains(&url.scheme()) {
            return Err(BusError::connection(format!(
                "unsupported url scheme {} (use ws, wss, http or https)",
                url.scheme()
            )));
        }
        if info.room_name.is_empty() {
            return Err(BusError::connection("room name is required"));
        }
        let token = AccessToken::new(&info.api_key, &info.api_secret)
            .identity(&info.identity)
            .room_join(&info.room_name)
            .to_jwt()?;

        let (events, _) = tokio::sync::broadcast::channel(EVENT_CHANNEL_CAPACITY);
        log::info!(
            "connected to room: room={} identity={} url={}",
            info.room_name,
            info.identity,
            url
        );
        Ok(Arc::new(Self {
            url,
            room_name: info.room_name,
            identity: info.identity,
            token,
            events,
            closed: CancellationToken::new(),
            tracks: RwLock::new(HashMap::new()),
        }))
    }

    pub fn url(&self) -> &url::Url {
        &self.url
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    /// Feeds an event to every subscriber. Never waits on them.
    pub fn emit(&self, event: SessionEvent) {
        if self.events.send(event).is_err() {
            log::trace!("session event dropped: no subscribers");
        }
    }

    pub async fn published(&self) -> Vec<TrackPublication> {
        self.tracks
            .read()
            .await
            .values()
            .map(|p| p.info.clone())
            .collect()
    }

    pub async fn track_stats(&self, sid: &str) -> Option<Arc<TrackStats>> {
        self.tracks.read().await.get(sid).map(|p| p.stats.clone())
    }

    pub async fn layer_count(&self, sid: &str) -> Option<usize> {
        self.tracks.read().await.get(sid).map(|p| p.layers)
    }

    async fn insert(
        &self,
        name: String,
        kind: MediaKind,
        receivers: Vec<SampleReceiver>,
    ) -> Result<TrackPublication> {
        let mut tracks = self.tracks.write().await;
        if self.is_closed() {
            return Err(BusError::publish("session already closed"));
        }
        if !name.is_empty() && tracks.values().any(|p| p.info.name == name) {
            return Err(BusError::publish(format!(
                "track name {} already published",
                name
            )));
        }

        let info = TrackPublication {
            sid: new_sid(),
            name,
            kind,
        };
        let cancel = self.closed.child_token();
        let stats = Arc::new(TrackStats::default());
        let layers = receivers.len();
        let drains = receivers
            .into_iter()
            .map(|rx| tokio::spawn(drain(info.sid.clone(), rx, cancel.clone(), stats.clone())))
            .collect();

        log::info!(
            "published track: sid={} name={} kind={} layers={}",
            info.sid,
            info.name,
            info.kind,
            layers
        );
        tracks.insert(
            info.sid.clone(),
            Publication {
                info: info.clone(),
                layers,
                cancel,
                stats,
                drains,
            },
        );
        Ok(info)
    }
}

#[async_trait]
impl Session for LocalSession {
    fn room_name(&self) -> &str {
        &self.room_name
    }

    async fn publish_track(
        &self,
        track: LocalTrack,
        options: TrackOptions,
    ) -> Result<TrackPublication> {
        self.insert(options.name, track.kind, vec![track.samples])
            .await
    }

    async fn publish_simulcast(
        &self,
        layers: Vec<LocalTrack>,
        options: TrackOptions,
    ) -> Result<TrackPublication> {
        let Some(first) = layers.first() else {
            return Err(BusError::publish("simulcast group has no layers"));
        };
        let kind = first.kind;
        if !kind.is_video() {
            return Err(BusError::publish("simulcast requires a video track"));
        }
        let mut seen = Vec::with_capacity(layers.len());
        for layer in &layers {
            if layer.kind != kind {
                return Err(BusError::publish("simulcast layers must share one codec"));
            }
            let Some(info) = &layer.layer else {
                return Err(BusError::publish("simulcast layer without layer info"));
            };
            if seen.contains(&info.quality) {
                return Err(BusError::publish(format!(
                    "duplicate simulcast layer {}",
                    info.quality.as_str()
                )));
            }
            seen.push(info.quality);
        }

        let receivers = layers.into_iter().map(|l| l.samples).collect();
        self.insert(options.name, kind, receivers).await
    }

    async fn unpublish_track(&self, sid: &str) -> Result<()> {
        if self.is_closed() {
            return Ok(());
        }
        let Some(publication) = self.tracks.write().await.remove(sid) else {
            return Err(BusError::publish(format!("unknown track {}", sid)));
        };
        publication.cancel.cancel();
        for drain in publication.drains {
            let _ = drain.await;
        }
        log::info!(
            "unpublished track: sid={} name={} samples={} bytes={}",
            sid,
            publication.info.name,
            publication.stats.samples(),
            publication.stats.bytes()
        );
        Ok(())
    }

    fn subscribe_events(&self) -> SessionEventReceiver {
        self.events.subscribe()
    }

    async fn disconnect(&self) {
        let mut tracks = self.tracks.write().await;
        if self.closed.is_cancelled() {
            return;
        }
        self.closed.cancel();
        for (_, publication) in tracks.drain() {
            for drain in publication.drains {
                let _ = drain.await;
            }
        }
        log::info!("disconnected from room: room={}", self.room_name);
    }
}

fn new_sid() -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    format!("TR_{}", &id[..12])
}

async fn drain(
    sid: String,
    mut rx: SampleReceiver,
    cancel: CancellationToken,
    stats: Arc<TrackStats>,
) {
    loop {
        // buffered samples of a finished writer are consumed before cancellation
        tokio::select! {
            biased;
            sample = rx.recv() => match sample {
                Some(sample) => {
                    stats.samples.fetch_add(1, Ordering::Relaxed);
                    stats.bytes.fetch_add(sample.size() as u64, Ordering::Relaxed);
                }
                None => break,
            },
            _ = cancel.cancelled() => break,
        }
    }
    log::debug!(
        "track {} drained: samples={} bytes={}",
        sid,
        stats.samples(),
        stats.bytes()
    );
}

#[cfg(test)]
#[path = "local_test.rs"]
mod local_test;
