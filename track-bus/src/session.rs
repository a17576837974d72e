use async_trait::async_trait;

use crate::{
    error::Result,
    events::SessionEventReceiver,
    track::{LocalTrack, TrackOptions, TrackPublication},
};

/// Everything needed to join a room.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConnectInfo {
    pub url: String,
    pub api_key: String,
    pub api_secret: String,
    pub room_name: String,
    pub identity: String,
}

/// A joined room.
///
/// Shared by every pipeline; implementations serialize concurrent calls
/// internally.
#[async_trait]
pub trait Session: Send + Sync {
    fn room_name(&self) -> &str;

    async fn publish_track(
        &self,
        track: LocalTrack,
        options: TrackOptions,
    ) -> Result<TrackPublication>;

    /// Publishes every layer under one publication, or none of them.
    async fn publish_simulcast(
        &self,
        layers: Vec<LocalTrack>,
        options: TrackOptions,
    ) -> Result<TrackPublication>;

    async fn unpublish_track(&self, sid: &str) -> Result<()>;

    fn subscribe_events(&self) -> SessionEventReceiver;

    async fn disconnect(&self);
}
