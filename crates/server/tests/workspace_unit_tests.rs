use bytes::Bytes;
use ffsvc_server::workspace::{stored_path, JobWorkspace};
use ffsvc_server::ServiceError;
use futures::stream;
use proptest::prelude::*;
use std::convert::Infallible;
use std::time::Duration;

fn chunks(parts: &[&'static str]) -> impl futures::Stream<Item = Result<Bytes, Infallible>> {
    stream::iter(
        parts
            .iter()
            .map(|p| Ok(Bytes::from_static(p.as_bytes())))
            .collect::<Vec<_>>(),
    )
}

/// Test that persisted uploads land in the job's input directory under a
/// name derived from the logical and original names
#[tokio::test]
async fn test_persist_writes_all_chunks() {
    let root = tempfile::tempdir().unwrap();
    let ws = JobWorkspace::open(root.path()).unwrap();
    let job = ws.create_job().await.unwrap();

    let asset = ws
        .persist(&job, "0", "clip one.mp4", chunks(&["abc", "def"]))
        .await
        .unwrap();

    assert_eq!(asset.path, job.input_dir.join("0").join("clip one.mp4"));
    assert_eq!(asset.size_bytes, 6);
    assert_eq!(std::fs::read(&asset.path).unwrap(), b"abcdef");
    assert!(asset.path.is_absolute());
}

/// Test that distinct logical names persist concurrently without collision
#[tokio::test]
async fn test_concurrent_persist_distinct_names() {
    let root = tempfile::tempdir().unwrap();
    let ws = JobWorkspace::open(root.path()).unwrap();
    let job = ws.create_job().await.unwrap();

    let (a, b) = tokio::join!(
        ws.persist(&job, "a", "same.mp4", chunks(&["first"])),
        ws.persist(&job, "b", "same.mp4", chunks(&["second"])),
    );
    let (a, b) = (a.unwrap(), b.unwrap());

    assert_ne!(a.path, b.path);
    assert_eq!(std::fs::read(&a.path).unwrap(), b"first");
    assert_eq!(std::fs::read(&b.path).unwrap(), b"second");
}

/// Test that reusing a logical name within one job is rejected
#[tokio::test]
async fn test_duplicate_logical_name_rejected() {
    let root = tempfile::tempdir().unwrap();
    let ws = JobWorkspace::open(root.path()).unwrap();
    let job = ws.create_job().await.unwrap();

    ws.persist(&job, "video", "a.mp4", chunks(&["x"]))
        .await
        .unwrap();
    let second = ws.persist(&job, "video", "a.mp4", chunks(&["y"])).await;
    assert!(matches!(second, Err(ServiceError::InvalidRequest(_))));
}

/// Test that logical names which used to sanitize to the same on-disk name
/// now persist side by side in one job
#[tokio::test]
async fn test_similar_logical_names_do_not_collide() {
    let root = tempfile::tempdir().unwrap();
    let ws = JobWorkspace::open(root.path()).unwrap();
    let job = ws.create_job().await.unwrap();

    let uploads = [
        ("a_b", "c.mp4"),
        ("a", "b_c.mp4"),
        ("vidé", "x.mp4"),
        ("vidè", "x.mp4"),
    ];
    let mut paths = Vec::new();
    for (logical, original) in uploads {
        let asset = ws
            .persist(&job, logical, original, chunks(&[logical]))
            .await
            .unwrap_or_else(|e| panic!("persisting '{}' failed: {}", logical, e));
        assert!(asset.path.starts_with(&job.input_dir));
        assert_eq!(std::fs::read(&asset.path).unwrap(), logical.as_bytes());
        paths.push(asset.path);
    }

    paths.sort();
    paths.dedup();
    assert_eq!(paths.len(), uploads.len());
}

/// Test that an over-long logical name is a client error, not a storage one
#[tokio::test]
async fn test_overlong_logical_name_rejected() {
    let root = tempfile::tempdir().unwrap();
    let ws = JobWorkspace::open(root.path()).unwrap();
    let job = ws.create_job().await.unwrap();

    let name = "é".repeat(100);
    let result = ws.persist(&job, &name, "a.mp4", chunks(&["x"])).await;
    assert!(matches!(result, Err(ServiceError::InvalidRequest(_))));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// For any two distinct logical names, the stored paths differ even when
    /// the original file names are the same
    #[test]
    fn prop_distinct_logical_names_get_distinct_paths(
        a in "[a-z_. é/è-]{0,12}",
        b in "[a-z_. é/è-]{0,12}",
        original in "[a-z_.]{0,8}",
    ) {
        prop_assume!(a != b);
        prop_assert_ne!(stored_path(&a, &original), stored_path(&b, &original));
    }

    /// For any logical name, the stored path is exactly two plain components
    /// and cannot leave the job directory
    #[test]
    fn prop_stored_path_stays_inside_job(
        logical in "\\PC{0,16}",
        original in "\\PC{0,16}",
    ) {
        let path = stored_path(&logical, &original);
        let components: Vec<_> = path.components().collect();
        prop_assert_eq!(components.len(), 2);
        for component in components {
            prop_assert!(matches!(component, std::path::Component::Normal(_)));
        }
    }
}

/// Test that two jobs never share directories
#[tokio::test]
async fn test_jobs_are_isolated() {
    let root = tempfile::tempdir().unwrap();
    let ws = JobWorkspace::open(root.path()).unwrap();
    let a = ws.create_job().await.unwrap();
    let b = ws.create_job().await.unwrap();

    assert_ne!(a.input_dir, b.input_dir);
    assert_ne!(a.output_dir, b.output_dir);
    assert!(a.input_dir.starts_with(ws.input_root()));
    assert!(a.output_dir.starts_with(ws.output_root()));
}

/// Test that an unwritable root surfaces as a storage error
#[tokio::test]
async fn test_create_job_storage_error() {
    let root = tempfile::tempdir().unwrap();
    let ws = JobWorkspace::open(root.path()).unwrap();
    std::fs::remove_dir_all(ws.input_root()).unwrap();

    let result = ws.create_job().await;
    assert!(matches!(result, Err(ServiceError::Storage { .. })));
}

/// Test that the output directory outlives the call and is gone once the
/// delay has elapsed
#[tokio::test(start_paused = true)]
async fn test_delayed_output_cleanup() {
    let root = tempfile::tempdir().unwrap();
    let ws = JobWorkspace::open(root.path()).unwrap();
    let job = ws.create_job().await.unwrap();
    std::fs::write(job.output_file("output.mp4"), b"data").unwrap();

    ws.schedule_delayed_destroy_output(&job, Duration::from_secs(60));
    assert!(job.output_dir.exists());
    assert_eq!(ws.cleanup().pending(), 1);

    tokio::time::advance(Duration::from_secs(30)).await;
    tokio::task::yield_now().await;
    assert!(job.output_dir.exists());

    tokio::time::advance(Duration::from_secs(31)).await;
    ws.cleanup().flush().await;
    assert!(!job.output_dir.exists());
    assert_eq!(ws.cleanup().pending(), 0);
}

/// Test that shutdown runs pending cleanups without waiting out the delay
#[tokio::test]
async fn test_shutdown_runs_pending_cleanups() {
    let root = tempfile::tempdir().unwrap();
    let ws = JobWorkspace::open(root.path()).unwrap();
    let mut jobs = Vec::new();
    for _ in 0..3 {
        jobs.push(ws.create_job().await.unwrap());
    }

    for job in &jobs {
        ws.schedule_delayed_destroy_output(job, Duration::from_secs(3600));
    }

    tokio::time::timeout(Duration::from_secs(5), ws.cleanup().shutdown())
        .await
        .expect("shutdown should not wait for the delay");

    for job in &jobs {
        assert!(!job.output_dir.exists());
        assert!(job.input_dir.exists());
    }
}

/// Test that a zero-delay cleanup removes both directories of an abandoned
/// job off the caller's task
#[tokio::test]
async fn test_zero_delay_cleanup_removes_abandoned_job() {
    let root = tempfile::tempdir().unwrap();
    let ws = JobWorkspace::open(root.path()).unwrap();
    let job = ws.create_job().await.unwrap();
    ws.persist(&job, "0", "a.mp4", chunks(&["x"])).await.unwrap();

    ws.cleanup()
        .schedule(job.id.clone(), job.input_dir.clone(), Duration::ZERO);
    ws.cleanup()
        .schedule(job.id.clone(), job.output_dir.clone(), Duration::ZERO);
    ws.cleanup().flush().await;

    assert!(!job.input_dir.exists());
    assert!(!job.output_dir.exists());
}

/// Test that awaited destroys remove only the directory asked for
#[tokio::test]
async fn test_destroy_input_keeps_output() {
    let root = tempfile::tempdir().unwrap();
    let ws = JobWorkspace::open(root.path()).unwrap();
    let job = ws.create_job().await.unwrap();
    std::fs::write(job.output_file("output.mp4"), b"data").unwrap();

    ws.destroy_input(&job).await;
    assert!(!job.input_dir.exists());
    assert!(job.output_file("output.mp4").exists());

    ws.destroy_output(&job).await;
    assert!(!job.output_dir.exists());
}

/// Test that leftovers from a previous process are purged
#[tokio::test]
async fn test_purge_stale() {
    let root = tempfile::tempdir().unwrap();
    let ws = JobWorkspace::open(root.path()).unwrap();
    let job = ws.create_job().await.unwrap();
    std::fs::create_dir(job.input_dir.join("0")).unwrap();
    std::fs::write(job.input_dir.join("0").join("a.mp4"), b"x").unwrap();

    let reopened = JobWorkspace::open(root.path()).unwrap();
    assert_eq!(reopened.purge_stale().await, 2);
    assert!(!job.input_dir.exists());
    assert!(!job.output_dir.exists());
    assert!(reopened.input_root().is_dir());
}
