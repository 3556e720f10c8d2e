//! End-to-end relay scenarios: fake capture stream -> hub -> TCP -> viewers

use std::io::Cursor;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;
use tokio::sync::oneshot;

use mjpeg_relay::capture::{run_capture, CaptureConfig};
use mjpeg_relay::client::NullDisplay;
use mjpeg_relay::error::{CaptureError, Error};
use mjpeg_relay::protocol::WireFrame;
use mjpeg_relay::recorder::parse_segment_file_name;
use mjpeg_relay::{
    EncodedFrame, FrameHub, RecorderConfig, RecorderRegistry, RelayServer, ServerConfig, SourceId,
    StreamReceiver, Viewer, ViewerConfig,
};

fn blob(body: &[u8]) -> Vec<u8> {
    let mut out = vec![0xFF, 0xD8];
    out.extend_from_slice(body);
    out.extend_from_slice(&[0xFF, 0xD9]);
    out
}

fn jpeg(width: u32, height: u32, shade: u8) -> Vec<u8> {
    let image = image::RgbImage::from_pixel(width, height, image::Rgb([shade, 128, 255 - shade]));
    let mut out = Cursor::new(Vec::new());
    image::DynamicImage::ImageRgb8(image)
        .write_to(&mut out, image::ImageFormat::Jpeg)
        .unwrap();
    out.into_inner()
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(Instant::now() < deadline, "condition not reached");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

/// Relay server on an ephemeral port, fed from `hub`
async fn start_relay(
    hub: Arc<FrameHub>,
) -> (u16, oneshot::Sender<()>, tokio::task::JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let config = ServerConfig::default().keep_alive_interval(Duration::ZERO);
    let server = RelayServer::with_hub(config, hub);
    let (tx, rx) = oneshot::channel::<()>();

    let task = tokio::spawn(async move {
        server
            .serve(listener, async {
                let _ = rx.await;
            })
            .await
            .unwrap();
    });
    (port, tx, task)
}

#[tokio::test]
async fn test_two_viewers_receive_three_blobs_in_order() {
    let hub = Arc::new(FrameHub::new());
    let (port, shutdown, server_task) = start_relay(Arc::clone(&hub)).await;

    let mut viewers = Vec::new();
    for _ in 0..2 {
        let mut receiver = StreamReceiver::for_server("127.0.0.1", port);
        receiver.connect(Duration::from_secs(1)).await.unwrap();
        viewers.push(receiver);
    }
    wait_until(|| hub.subscriber_count() == 2).await;

    // Stand-in for the camera subprocess stdout
    let (mut camera, stdout) = tokio::io::duplex(64 * 1024);
    let capture = {
        let hub = Arc::clone(&hub);
        tokio::spawn(async move { run_capture(stdout, &hub, &CaptureConfig::default()).await })
    };

    let blobs = [blob(b"first"), blob(b"second"), blob(b"third")];

    // Delivery is latest-frame-wins: a session still writing the previous
    // frame when the next one is published skips straight to the newer one.
    // Each blob is therefore only emitted once both viewers have the previous
    // one. Without that pacing the third blob may legitimately reach only one
    // of the sessions.
    camera.write_all(b"boot noise").await.unwrap();
    for expected in &blobs {
        camera.write_all(expected).await.unwrap();
        for viewer in viewers.iter_mut() {
            let frame = viewer.read_frame().await.unwrap().unwrap();
            assert_eq!(frame, WireFrame::Jpeg(EncodedFrame::new(expected.clone())));
        }
    }

    // Camera exits: capture reports the end of stream to its owner
    drop(camera);
    let result = capture.await.unwrap();
    assert!(matches!(result, Err(Error::Capture(CaptureError::StreamEnded))));
    assert_eq!(hub.published_count(), 3);

    // Shutdown closes every session
    shutdown.send(()).unwrap();
    server_task.await.unwrap();
    for viewer in viewers.iter_mut() {
        assert!(viewer.read_frame().await.unwrap().is_none());
    }
}

#[tokio::test]
async fn test_viewer_records_relayed_stream() {
    let dir = tempfile::tempdir().unwrap();
    let hub = Arc::new(FrameHub::new());
    let (port, shutdown, server_task) = start_relay(Arc::clone(&hub)).await;

    let registry = Arc::new(RecorderRegistry::new(
        RecorderConfig::with_storage_root(dir.path()).target_fps(20),
    ));
    let source = SourceId::new("127.0.0.1");
    let recorder = registry.get_or_create(&source).await;

    let viewer = Viewer::connect(
        "127.0.0.1",
        Arc::clone(&recorder),
        Box::new(NullDisplay),
        ViewerConfig::default().stream_port(port),
    )
    .await
    .unwrap();
    let viewer_task = tokio::spawn(viewer.run());
    wait_until(|| hub.subscriber_count() == 1).await;

    // Camera at ~10 fps, recorder paced at 20 fps
    let frames: Vec<_> = (0..3u8).map(|i| jpeg(32, 24, i * 80)).collect();
    let publisher = {
        let hub = Arc::clone(&hub);
        tokio::spawn(async move {
            for i in 0..8 {
                hub.publish(EncodedFrame::new(frames[i % frames.len()].clone()));
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
        })
    };

    wait_until(|| recorder.has_frame()).await;
    assert!(registry
        .apply(&source, mjpeg_relay::control::RecordingCommand::Start)
        .await
        .unwrap());

    publisher.await.unwrap();
    registry.stop_all().await;

    let segment = recorder.last_segment().unwrap();
    assert_eq!((segment.stats.width, segment.stats.height), (32, 24));
    assert!(segment.stats.frames_written > 4);
    // Source slower than the target rate: some writes repeat the latest frame
    assert!(segment.stats.repeated_frames > 0);

    let name = segment.path.file_name().unwrap().to_str().unwrap();
    let (start, end, ext) = parse_segment_file_name(name).unwrap();
    assert!(start < end);
    assert_eq!(ext, "y4m");
    assert_eq!(segment.path.parent().unwrap(), dir.path().join("127.0.0.1").as_path());

    shutdown.send(()).unwrap();
    server_task.await.unwrap();
    let summary = viewer_task.await.unwrap();
    assert_eq!(summary.frames, 8);
}
