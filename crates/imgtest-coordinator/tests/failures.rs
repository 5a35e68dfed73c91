//! Partial provisioning, timeouts and teardown failures

use std::panic::AssertUnwindSafe;
use std::time::Duration;

use futures::FutureExt;
use imgtest_common::ResourceKind;
use imgtest_coordinator::infra::InstanceStatus;
use imgtest_coordinator::orchestrator::{CleanupResult, RemainingResource};
use imgtest_coordinator::{EnvError, Stage, TestEnvironment};
use imgtest_test_utils::{FakeConnector, FakeInfra, Op, environment_spec, image_spec};

fn environment(infra: &FakeInfra) -> TestEnvironment<FakeConnector> {
    TestEnvironment::new(
        FakeConnector::new(infra.clone()),
        image_spec(),
        environment_spec(),
    )
}

fn delete_counts(infra: &FakeInfra) -> [usize; 3] {
    [
        infra.call_count(Op::DeleteInstance),
        infra.call_count(Op::DeleteKeypair),
        infra.call_count(Op::DeleteImage),
    ]
}

#[tokio::test(start_paused = true)]
async fn test_keypair_failure_leaves_nothing_to_clean() {
    let infra = FakeInfra::new().fail(Op::CreateKeypair, "quota exceeded");
    let mut env = environment(&infra);

    let err = env.enter().await.unwrap_err();
    assert!(matches!(
        err,
        EnvError::Stage {
            stage: Stage::CreateKeypair,
            ..
        }
    ));
    assert_eq!(env.state().completed, None);
    assert_eq!(delete_counts(&infra), [0, 0, 0]);
    assert_eq!(infra.call_count(Op::UploadImage), 0);
}

#[tokio::test(start_paused = true)]
async fn test_upload_failure_cleans_up_keypair() {
    let infra = FakeInfra::new().fail(Op::UploadImage, "image file unreadable");
    let mut env = environment(&infra);

    let err = env.enter().await.unwrap_err();
    assert_eq!(err.failed_stage(), Some(Stage::UploadImage));
    assert_eq!(env.state().completed, Some(Stage::CreateKeypair));
    assert_eq!(delete_counts(&infra), [0, 1, 0]);
    assert!(env.state().handles.is_empty());
    assert!(env.private_key_path().is_none(), "Key file wiped");
    assert!(infra.live_resources().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_boot_failure_cleans_up_keypair_and_image() {
    let infra = FakeInfra::new().fail(Op::BootInstance, "no valid host was found");
    let mut env = environment(&infra);

    let err = env.enter().await.unwrap_err();
    assert_eq!(err.failed_stage(), Some(Stage::SpawnInstance));
    assert_eq!(env.state().completed, Some(Stage::UploadImage));
    assert_eq!(delete_counts(&infra), [0, 1, 1]);
    assert!(infra.live_resources().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_polling_build_build_active_sleeps_twice() {
    let infra = FakeInfra::new().with_statuses([
        InstanceStatus::Build,
        InstanceStatus::Build,
        InstanceStatus::Active,
    ]);
    let mut env = environment(&infra);

    let start = tokio::time::Instant::now();
    env.enter().await.unwrap();
    let elapsed = start.elapsed();

    assert_eq!(infra.call_count(Op::GetInstance), 3);
    assert!(elapsed >= Duration::from_secs(6), "elapsed: {elapsed:?}");
    assert!(elapsed < Duration::from_secs(9), "elapsed: {elapsed:?}");
    assert_eq!(env.instance().unwrap().status, InstanceStatus::Active);
    env.exit().await;
}

#[tokio::test(start_paused = true)]
async fn test_polling_build_error_fails_immediately() {
    let infra = FakeInfra::new().with_statuses([InstanceStatus::Build, InstanceStatus::Error]);
    let mut env = environment(&infra);

    let start = tokio::time::Instant::now();
    let err = env.enter().await.unwrap_err();
    let elapsed = start.elapsed();

    match &err {
        EnvError::Instance { status, .. } => assert_eq!(status, "ERROR"),
        other => panic!("expected instance failure, got {other:?}"),
    }
    assert_eq!(infra.call_count(Op::GetInstance), 2);
    assert!(elapsed < Duration::from_secs(6), "elapsed: {elapsed:?}");
    assert_eq!(env.state().completed, Some(Stage::SpawnInstance));
    assert_eq!(delete_counts(&infra), [1, 1, 1]);
    assert!(infra.live_resources().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_deleted_status_is_terminal() {
    let infra = FakeInfra::new().with_statuses([InstanceStatus::Deleted]);
    let mut env = environment(&infra);

    let err = env.enter().await.unwrap_err();
    assert!(matches!(err, EnvError::Instance { .. }));
    assert_eq!(infra.call_count(Op::GetInstance), 1);
}

#[tokio::test(start_paused = true)]
async fn test_upload_hang_times_out_and_cleans_up() {
    let infra = FakeInfra::new().hang(Op::UploadImage);
    let mut env = environment(&infra);

    let start = tokio::time::Instant::now();
    let err = env.enter().await.unwrap_err();

    assert!(matches!(
        err,
        EnvError::Timeout {
            stage: Stage::UploadImage,
            seconds: 360
        }
    ));
    assert!(start.elapsed() >= Duration::from_secs(360));
    assert_eq!(delete_counts(&infra), [0, 1, 0]);
    assert!(env.state().handles.is_empty());
    assert!(infra.live_resources().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_instance_never_active_times_out() {
    let infra = FakeInfra::new().with_statuses([InstanceStatus::Build]);
    let mut env = environment(&infra);

    let err = env.enter().await.unwrap_err();
    assert!(matches!(
        err,
        EnvError::Timeout {
            stage: Stage::WaitActive,
            ..
        }
    ));
    // One immediate poll plus one every 3 s within the 360 s budget
    let polls = infra.call_count(Op::GetInstance);
    assert!((120..=121).contains(&polls), "polls: {polls}");
    assert_eq!(delete_counts(&infra), [1, 1, 1]);
    assert!(infra.live_resources().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_failed_delete_is_reported_then_retried() {
    let infra = FakeInfra::new().fail_once(Op::DeleteInstance, "conflict");
    let mut env = environment(&infra);
    env.enter().await.unwrap();
    let instance_id = env.instance().unwrap().id.clone();

    let first = env.exit().await;
    assert_eq!(
        first.cleanup.result(ResourceKind::Instance),
        CleanupResult::Failed
    );
    assert_eq!(
        first.cleanup.result(ResourceKind::Keypair),
        CleanupResult::Deleted,
        "Later steps still run"
    );
    assert_eq!(
        first.remaining,
        vec![RemainingResource::Leftover {
            kind: ResourceKind::Instance,
            id: instance_id.clone()
        }]
    );

    let second = env.exit().await;
    assert_eq!(
        second.cleanup.result(ResourceKind::Instance),
        CleanupResult::Deleted
    );
    assert!(second.is_clean());
    assert!(!infra.is_live(&instance_id));
}

#[tokio::test(start_paused = true)]
async fn test_hanging_delete_is_bounded_by_cleanup_timeout() {
    let infra = FakeInfra::new().hang(Op::DeleteImage);
    let mut env = environment(&infra);
    env.enter().await.unwrap();

    let start = tokio::time::Instant::now();
    let report = env.exit().await;
    let elapsed = start.elapsed();

    assert!(elapsed >= Duration::from_secs(10));
    assert!(elapsed < Duration::from_secs(11));
    assert_eq!(
        report.cleanup.result(ResourceKind::Image),
        CleanupResult::Failed
    );
    assert_eq!(report.cleanup.deleted_count(), 2);
    assert!(matches!(
        report.remaining.as_slice(),
        [RemainingResource::Leftover {
            kind: ResourceKind::Image,
            ..
        }]
    ));
}

#[tokio::test(start_paused = true)]
async fn test_already_deleted_resource_counts_as_gone() {
    let infra = FakeInfra::new();
    let mut env = environment(&infra);
    env.enter().await.unwrap();
    let keypair_name = env.state().handles.keypair.get().unwrap().name.clone();
    infra.vanish(&keypair_name);

    let report = env.exit().await;
    assert_eq!(
        report.cleanup.result(ResourceKind::Keypair),
        CleanupResult::AlreadyDeleted
    );
    assert!(report.is_clean());
}

#[tokio::test(start_paused = true)]
async fn test_scoped_body_error_still_tears_down() {
    let infra = FakeInfra::new();

    let result: Result<(), anyhow::Error> = environment(&infra)
        .scoped(|_env| async move { Err(anyhow::anyhow!("test suite failed")) }.boxed_local())
        .await;

    assert_eq!(result.unwrap_err().to_string(), "test suite failed");
    assert!(infra.live_resources().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_scoped_provisioning_error_skips_body() {
    let infra = FakeInfra::new().fail(Op::BootInstance, "no valid host");
    let mut body_ran = false;

    let result = environment(&infra)
        .scoped(|_env| {
            body_ran = true;
            async move { Ok::<_, EnvError>(()) }.boxed_local()
        })
        .await;

    assert!(matches!(result, Err(EnvError::Stage { .. })));
    assert!(!body_ran);
    assert!(infra.live_resources().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_scoped_panic_is_reraised_after_cleanup() {
    let infra = FakeInfra::new();

    let outcome = AssertUnwindSafe(environment(&infra).scoped(|env| {
        async move {
            assert_eq!(env.main_ip(), Some("192.0.2.1"), "workload failed");
            Ok::<_, EnvError>(())
        }
        .boxed_local()
    }))
    .catch_unwind()
    .await;

    assert!(outcome.is_err(), "Panic must propagate to the caller");
    assert!(infra.live_resources().is_empty());
    assert_eq!(delete_counts(&infra), [1, 1, 1]);
}
