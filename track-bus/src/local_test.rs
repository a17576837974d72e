use super::*;
use crate::{
    events::ConnectionQuality,
    sample::Sample,
    synthetic::VideoQuality,
    track::LayerInfo,
};

pub(crate) fn connect_info() -> ConnectInfo {
    ConnectInfo {
        url: "ws://localhost:7880".to_string(),
        api_key: "devkey".to_string(),
        api_secret: "secret".to_string(),
        room_name: "test-room".to_string(),
        identity: "publisher".to_string(),
    }
}

fn layer(quality: VideoQuality, height: u32) -> (crate::sample::SampleSender, LocalTrack) {
    let (tx, track) = LocalTrack::new(MediaKind::VideoH264, 4);
    (
        tx,
        track.with_layer(LayerInfo {
            quality,
            width: height * 16 / 9,
            height,
        }),
    )
}

#[tokio::test]
async fn test_connect_validates_parameters() {
    let session = LocalSession::connect(connect_info()).await.unwrap();
    assert_eq!(session.room_name(), "test-room");
    assert_eq!(session.identity(), "publisher");
    assert!(!session.token().is_empty());

    for url in ["", "localhost:7880", "ftp://host", "not a url"] {
        let info = ConnectInfo {
            url: url.to_string(),
            ..connect_info()
        };
        assert!(
            matches!(LocalSession::connect(info).await, Err(BusError::Connection(_))),
            "{} should be rejected",
            url
        );
    }

    let info = ConnectInfo {
        room_name: String::new(),
        ..connect_info()
    };
    assert!(matches!(LocalSession::connect(info).await, Err(BusError::Connection(_))));

    let info = ConnectInfo {
        api_secret: String::new(),
        ..connect_info()
    };
    assert!(matches!(LocalSession::connect(info).await, Err(BusError::Connection(_))));
}

#[tokio::test]
async fn test_publish_drains_samples() {
    let session = LocalSession::connect(connect_info()).await.unwrap();
    let (tx, track) = LocalTrack::new(MediaKind::AudioOpus, 4);
    let publication = session
        .publish_track(track, TrackOptions::named("mic"))
        .await
        .unwrap();
    assert!(publication.sid.starts_with("TR_"));
    assert_eq!(publication.kind, MediaKind::AudioOpus);

    for i in 0..10u8 {
        tx.send(Sample::new(vec![i; 3], None)).await.unwrap();
    }
    drop(tx);

    let stats = session.track_stats(&publication.sid).await.unwrap();
    for _ in 0..100 {
        if stats.samples() == 10 {
            break;
        }
        tokio::task::yield_now().await;
    }
    assert_eq!(stats.samples(), 10);
    assert_eq!(stats.bytes(), 30);
}

#[tokio::test]
async fn test_name_collision_rejected() {
    let session = LocalSession::connect(connect_info()).await.unwrap();
    let (_tx1, a) = LocalTrack::new(MediaKind::VideoH264, 1);
    let (_tx2, b) = LocalTrack::new(MediaKind::VideoH264, 1);
    session
        .publish_track(a, TrackOptions::named("cam"))
        .await
        .unwrap();
    assert!(matches!(
        session.publish_track(b, TrackOptions::named("cam")).await,
        Err(BusError::Publish(_))
    ));
}

#[tokio::test]
async fn test_unpublish_and_unknown_sid() {
    let session = LocalSession::connect(connect_info()).await.unwrap();
    let (tx, track) = LocalTrack::new(MediaKind::VideoVP8, 1);
    let publication = session
        .publish_track(track, TrackOptions::named("screen"))
        .await
        .unwrap();

    session.unpublish_track(&publication.sid).await.unwrap();
    assert!(session.published().await.is_empty());
    // the drain is gone, so the writer sees a closed track
    assert!(tx.send(Sample::new(vec![1], None)).await.is_err());

    assert!(matches!(
        session.unpublish_track(&publication.sid).await,
        Err(BusError::Publish(_))
    ));

    // the name is free again
    let (_tx, track) = LocalTrack::new(MediaKind::VideoVP8, 1);
    session
        .publish_track(track, TrackOptions::named("screen"))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_closed_session() {
    let session = LocalSession::connect(connect_info()).await.unwrap();
    let (_tx, track) = LocalTrack::new(MediaKind::VideoH264, 1);
    let publication = session
        .publish_track(track, TrackOptions::named("cam"))
        .await
        .unwrap();

    session.disconnect().await;
    assert!(session.is_closed());
    session.disconnect().await;

    // unpublish after teardown is a no-op
    session.unpublish_track(&publication.sid).await.unwrap();

    let (_tx, track) = LocalTrack::new(MediaKind::VideoH264, 1);
    assert!(matches!(
        session.publish_track(track, TrackOptions::named("late")).await,
        Err(BusError::Publish(_))
    ));
}

#[tokio::test]
async fn test_simulcast_group() {
    let session = LocalSession::connect(connect_info()).await.unwrap();
    let layers: Vec<_> = [(VideoQuality::Low, 180), (VideoQuality::Medium, 360), (VideoQuality::High, 720)]
        .into_iter()
        .map(|(q, h)| layer(q, h))
        .collect();
    let (_senders, tracks): (Vec<_>, Vec<_>) = layers.into_iter().unzip();

    let publication = session
        .publish_simulcast(tracks, TrackOptions::named("demo"))
        .await
        .unwrap();
    assert_eq!(session.layer_count(&publication.sid).await, Some(3));
}

#[tokio::test]
async fn test_simulcast_group_is_all_or_nothing() {
    let session = LocalSession::connect(connect_info()).await.unwrap();

    let (_a, low) = layer(VideoQuality::Low, 180);
    let (_b, dup) = layer(VideoQuality::Low, 180);
    assert!(session
        .publish_simulcast(vec![low, dup], TrackOptions::named("demo"))
        .await
        .is_err());

    let (_c, low) = layer(VideoQuality::Low, 180);
    let (_d, bare) = LocalTrack::new(MediaKind::VideoH264, 1);
    assert!(session
        .publish_simulcast(vec![low, bare], TrackOptions::named("demo"))
        .await
        .is_err());

    let (_e, audio) = LocalTrack::new(MediaKind::AudioOpus, 1);
    assert!(session
        .publish_simulcast(vec![audio], TrackOptions::named("demo"))
        .await
        .is_err());

    assert!(session
        .publish_simulcast(Vec::new(), TrackOptions::named("demo"))
        .await
        .is_err());

    assert!(session.published().await.is_empty());
}

#[tokio::test]
async fn test_emit_reaches_subscribers() {
    let session = LocalSession::connect(connect_info()).await.unwrap();
    // no subscribers yet: dropped silently
    session.emit(SessionEvent::RoomMetadataChanged {
        metadata: "ignored".to_string(),
    });

    let mut rx = session.subscribe_events();
    session.emit(SessionEvent::QualityChanged {
        participant: "bob".to_string(),
        quality: ConnectionQuality::Good,
    });
    assert_eq!(
        rx.recv().await.unwrap(),
        SessionEvent::QualityChanged {
            participant: "bob".to_string(),
            quality: ConnectionQuality::Good,
        }
    );
}
