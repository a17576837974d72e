use std::io::Write;

use tokio::io::AsyncWriteExt;

use super::*;
use crate::testutil::{h264_slices, ivf_file, ogg_opus_file};

fn temp_media(suffix: &str, data: &[u8]) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
    file.write_all(data).unwrap();
    file.flush().unwrap();
    file
}

async fn count_samples(reader: &mut SampleReader) -> usize {
    let mut n = 0;
    while reader.next_sample().await.unwrap().is_some() {
        n += 1;
    }
    n
}

#[test]
fn test_source_keys_and_names() {
    let file = MediaSource::file("/data/clip.h264");
    assert_eq!(file.key(), "file:/data/clip.h264");
    assert_eq!(file.track_name(), "/data/clip.h264");

    let sock = MediaSource::socket("/tmp/cam-h264.sock");
    assert_eq!(sock.key(), "unix:/tmp/cam-h264.sock");
    assert_eq!(sock.track_name(), "/tmp/cam-h264.sock");

    assert_eq!(MediaSource::Stdin.key(), "stdin");

    let synthetic = MediaSource::Synthetic {
        height: 360,
        quality: VideoQuality::Medium,
    };
    assert_eq!(synthetic.key(), "synthetic:medium:360");
    assert_eq!(synthetic.track_name(), "demo-medium");
}

#[test]
fn test_infer_kind() {
    assert_eq!(
        MediaSource::file("a.ivf").infer_kind().unwrap(),
        MediaKind::VideoVP8
    );
    assert_eq!(
        MediaSource::socket("mic-opus.sock").infer_kind().unwrap(),
        MediaKind::AudioOpus
    );
    assert!(matches!(
        MediaSource::socket("foo.sock").infer_kind(),
        Err(BusError::UnsupportedSourceType(_))
    ));
    assert!(matches!(
        MediaSource::Stdin.infer_kind(),
        Err(BusError::UnsupportedSourceType(_))
    ));
}

#[tokio::test]
async fn test_open_h264_file() {
    let file = temp_media(".h264", &h264_slices(10));
    let source = MediaSource::file(file.path());
    let kind = source.infer_kind().unwrap();

    let mut reader = source.open(kind).await.unwrap();
    assert!(matches!(reader, SampleReader::H264(_)));
    assert_eq!(count_samples(&mut reader).await, 10);
    // reading past EOF keeps reporting exhaustion
    assert!(reader.next_sample().await.unwrap().is_none());
}

#[tokio::test]
async fn test_open_ivf_and_ogg_files() {
    let ivf = temp_media(".ivf", &ivf_file(b"VP80", (1, 30), &[(0, &[1]), (1, &[2])]));
    let mut reader = MediaSource::file(ivf.path())
        .open(MediaKind::VideoVP8)
        .await
        .unwrap();
    assert_eq!(count_samples(&mut reader).await, 2);

    let ogg = temp_media(".ogg", &ogg_opus_file(&[&[0xfc, 1], &[0xfc, 2]], 960));
    let mut reader = MediaSource::file(ogg.path())
        .open(MediaKind::AudioOpus)
        .await
        .unwrap();
    assert_eq!(count_samples(&mut reader).await, 2);
}

#[tokio::test]
async fn test_open_rejects_wrong_container() {
    let ivf = temp_media(".ivf", &ivf_file(b"AV01", (1, 30), &[(0, &[1])]));
    assert!(matches!(
        MediaSource::file(ivf.path()).open(MediaKind::VideoVP8).await,
        Err(BusError::UnsupportedSourceType(_))
    ));
}

#[tokio::test]
async fn test_open_missing_file() {
    let result = MediaSource::file("/nonexistent/dir/clip.h264")
        .open(MediaKind::VideoH264)
        .await;
    assert!(matches!(result, Err(BusError::Publish(_))));
}

#[tokio::test]
async fn test_open_socket_reads_until_peer_closes() {
    let dir = tempfile::tempdir().unwrap();
    let addr = dir.path().join("cam-h264.sock");
    let listener = tokio::net::UnixListener::bind(&addr).unwrap();

    let server = tokio::spawn(async move {
        let (mut conn, _) = listener.accept().await.unwrap();
        conn.write_all(&h264_slices(4)).await.unwrap();
        conn.shutdown().await.unwrap();
    });

    let source = MediaSource::socket(addr.to_string_lossy());
    let kind = source.infer_kind().unwrap();
    assert_eq!(kind, MediaKind::VideoH264);
    let mut reader = source.open(kind).await.unwrap();
    assert_eq!(count_samples(&mut reader).await, 4);
    server.await.unwrap();
}

#[tokio::test]
async fn test_socket_dial_failure_is_connection_error() {
    let dir = tempfile::tempdir().unwrap();
    let addr = dir.path().join("missing-h264.sock");
    let result = MediaSource::socket(addr.to_string_lossy())
        .open(MediaKind::VideoH264)
        .await;
    assert!(matches!(result, Err(BusError::Connection(_))));
}

#[tokio::test]
async fn test_synthetic_never_exhausts() {
    let source = MediaSource::Synthetic {
        height: 180,
        quality: VideoQuality::Low,
    };
    let mut reader = source.open(MediaKind::VideoH264).await.unwrap();
    for _ in 0..(crate::synthetic::PATTERN_LOOP_FRAMES * 2 + 1) {
        assert!(reader.next_sample().await.unwrap().is_some());
    }
}
