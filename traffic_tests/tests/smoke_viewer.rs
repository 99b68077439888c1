use traffic_client::TrafficViewer;
use traffic_shared::{config::ViewerConfig, layout::MapLayout, render::TraceRenderer};
use traffic_tests::FakeSimServer;

/// Smoke test: the viewer renders many frames against a live server without
/// stalling, and keeps syncing in the background.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn viewer_runs_many_frames() -> anyhow::Result<()> {
    let server = FakeSimServer::spawn(vec![
        vec![("Coche-1", 0.0, 0.0)],
        vec![("Coche-1", 1.0, 0.0)],
        vec![("Coche-1", 2.0, 0.0), ("Coche-2", 0.0, 0.0)],
    ])?;
    let cfg = ViewerConfig {
        server_url: server.url(),
        frames_per_cycle: 5,
        ..Default::default()
    };

    let mut viewer = TrafficViewer::connect(&cfg, &MapLayout::builtin()).await?;
    let mut renderer = TraceRenderer::new(10);
    for _ in 0..60 {
        viewer.frame(&mut renderer);
        tokio::time::sleep(std::time::Duration::from_millis(2)).await;
    }
    assert_eq!(viewer.scheduler().frame(), 60);
    assert!(!viewer.mirror.is_empty());
    Ok(())
}
