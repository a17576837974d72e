use super::*;

fn handle() -> Arc<TrackHandle> {
    TrackHandle::new(
        TrackPublication {
            sid: "TR_1".to_string(),
            name: "clip.h264".to_string(),
            kind: MediaKind::VideoH264,
        },
        "file:clip.h264",
    )
}

#[test]
fn test_normal_completion_path() {
    let track = handle();
    assert_eq!(track.state(), TrackState::Created);
    assert!(!track.is_active());

    assert!(track.mark_publishing());
    assert!(track.is_active());

    assert!(track.complete());
    assert_eq!(track.state(), TrackState::Completing);
    assert!(track.completion_observed());
    assert!(track.is_active());

    assert!(track.begin_unpublish());
    assert_eq!(track.state(), TrackState::Unpublished);
    assert!(!track.is_active());
}

#[test]
fn test_shutdown_path_skips_completing() {
    let track = handle();
    track.mark_publishing();
    assert!(track.begin_unpublish());
    assert_eq!(track.state(), TrackState::Unpublished);
    // exhaustion after shutdown is not observed
    assert!(!track.complete());
    assert!(!track.completion_observed());
}

#[test]
fn test_unpublish_fires_once() {
    let track = handle();
    track.mark_publishing();
    track.complete();
    assert!(track.begin_unpublish());
    assert!(!track.begin_unpublish());
    assert!(!track.begin_unpublish());
    assert!(!track.mark_publishing());
}

#[test]
fn test_complete_fires_once() {
    let track = handle();
    track.mark_publishing();
    assert!(track.complete());
    assert!(!track.complete());
}

#[test]
fn test_racing_unpublish_has_one_winner() {
    let track = handle();
    track.mark_publishing();

    let winners: usize = std::thread::scope(|s| {
        let handles: Vec<_> = (0..8)
            .map(|_| s.spawn(|| track.begin_unpublish() as usize))
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).sum()
    });
    assert_eq!(winners, 1);
}

#[tokio::test]
async fn test_completed_signal() {
    let track = handle();
    track.mark_publishing();
    let waiter = {
        let track = track.clone();
        tokio::spawn(async move { track.completed().await })
    };
    track.complete();
    waiter.await.unwrap();
}

#[tokio::test]
async fn test_local_track_is_bounded() {
    let (tx, mut track) = LocalTrack::new(MediaKind::AudioOpus, 2);
    tx.send(crate::sample::Sample::new(vec![1], None)).await.unwrap();
    tx.send(crate::sample::Sample::new(vec![2], None)).await.unwrap();
    assert!(tx.try_send(crate::sample::Sample::new(vec![3], None)).is_err());
    assert_eq!(&track.samples.recv().await.unwrap().data[..], &[1]);
    assert!(track.layer.is_none());
}
