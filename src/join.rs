//! Joins the room, publishes every configured source and holds the session
//! until cancelled.

use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

use anyhow::Context;
use futures::future::join_all;
use tokio_util::sync::CancellationToken;
use track_bus::{
    BusError, EventRouter, LocalSession, LoggingObserver, PublishRequest, Session,
    SimulcastLayerSet, TrackHandle, TrackPublisher, VideoQuality,
    synthetic::DEFAULT_BASE_HEIGHT,
};

use crate::config::JoinConfig;

/// Publication name of the simulcast demo group.
pub const DEMO_GROUP: &str = "demo";

#[derive(Debug, Default)]
pub struct PublishReport {
    pub published: Vec<Arc<TrackHandle>>,
    pub failed: Vec<(String, BusError)>,
}

impl PublishReport {
    /// Something was requested and nothing made it.
    pub fn all_failed(&self) -> bool {
        self.published.is_empty() && !self.failed.is_empty()
    }
}

/// Resolves the configured files, stdin and sockets into requests. A source
/// whose type cannot be resolved is reported and skipped.
pub fn publish_requests(config: &JoinConfig) -> (Vec<PublishRequest>, Vec<(String, BusError)>) {
    let mut requests = Vec::new();
    let mut failed = Vec::new();

    for path in &config.files {
        match PublishRequest::file(path.clone(), config.fps) {
            Ok(request) => requests.push(request),
            Err(e) => failed.push((path.display().to_string(), e)),
        }
    }
    if let Some(mime) = &config.stdin_mime {
        match PublishRequest::stdin(mime, config.fps) {
            Ok(request) => requests.push(request),
            Err(e) => failed.push(("stdin".to_string(), e)),
        }
    }
    for addr in &config.sockets {
        match PublishRequest::socket(addr.clone(), config.fps) {
            Ok(request) => requests.push(request),
            Err(e) => failed.push((addr.clone(), e)),
        }
    }
    (requests, failed)
}

/// Publishes the demo group and every source concurrently. Failures stay
/// local to their source.
pub async fn publish_all(publisher: &TrackPublisher, config: &JoinConfig) -> PublishReport {
    log::info!("publishing {} sources", config.requested());
    let (requests, failed) = publish_requests(config);
    let mut report = PublishReport {
        published: Vec::new(),
        failed,
    };

    if config.publish_demo {
        let demo = SimulcastLayerSet::new(
            DEMO_GROUP,
            DEFAULT_BASE_HEIGHT,
            VideoQuality::Low,
            VideoQuality::High,
        );
        let published = match demo {
            Ok(set) => publisher.publish_demo(set, config.fps).await,
            Err(e) => Err(e),
        };
        match published {
            Ok(handle) => report.published.push(handle),
            Err(e) => report.failed.push((DEMO_GROUP.to_string(), e)),
        }
    }

    let names: Vec<String> = requests.iter().map(|r| r.source.track_name()).collect();
    let results = join_all(requests.into_iter().map(|r| publisher.publish(r))).await;
    for (name, result) in names.into_iter().zip(results) {
        match result {
            Ok(handle) => report.published.push(handle),
            Err(e) => report.failed.push((name, e)),
        }
    }

    for (name, e) in &report.failed {
        log::error!("could not publish {}: {}", name, e);
    }
    report
}

pub async fn run(config: JoinConfig, cancel: CancellationToken) -> anyhow::Result<()> {
    let session = LocalSession::connect(config.connect.clone())
        .await
        .context("joining room")?;

    let router_cancel = cancel.child_token();
    let router = EventRouter::new()
        .register(Arc::new(LoggingObserver))
        .spawn(session.subscribe_events(), router_cancel.clone());
    let session: Arc<dyn Session> = session;

    let completed = Arc::new(AtomicUsize::new(0));
    let counter = completed.clone();
    // the interrupt reaches pumps and sources still opening through this token
    let on_complete = Arc::new(move |handle: &TrackHandle| {
        counter.fetch_add(1, Ordering::Relaxed);
        log::debug!("track {} ({}) complete", handle.name(), handle.sid());
    });
    let publisher = TrackPublisher::with_cancel(session.clone(), cancel.child_token())
        .with_on_complete(on_complete);

    let report = publish_all(&publisher, &config).await;
    let outcome = if report.all_failed() && !cancel.is_cancelled() {
        Err(anyhow::anyhow!(
            "none of the {} requested sources could be published",
            report.failed.len()
        ))
    } else {
        if report.published.is_empty() {
            log::info!("nothing to publish, listening for room events");
        }
        cancel.cancelled().await;
        Ok(())
    };

    log::info!("leaving room {}", session.room_name());
    publisher.shutdown().await;
    session.disconnect().await;
    router_cancel.cancel();
    if let Err(e) = router.await {
        log::warn!("event router ended abnormally: {}", e);
    }
    log::info!(
        "published {} tracks, {} ran to completion",
        report.published.len(),
        completed.load(Ordering::Relaxed)
    );
    outcome
}

#[cfg(test)]
#[path = "join_test.rs"]
mod join_test;
