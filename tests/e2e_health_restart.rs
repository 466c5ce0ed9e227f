use orch_e2e_tests::{kill_matching, sh_builder, TestEnv};
use orchestrator_engine::domain::ports::ProcessControl;
use orchestrator_engine::domain::{
    HealthVerdict, ResourceMonitor, SchedulerConfig, SchedulerLoop, StartOutcome,
};
use orchestrator_engine::infrastructure::LogNotifier;
use orchestrator_engine::{HealthProbe, ServiceStatus};
use std::sync::Arc;
use std::time::Duration;

fn marker_probe(path: &std::path::Path) -> HealthProbe {
    HealthProbe::exec(
        "test",
        vec!["-f".to_string(), path.display().to_string()],
    )
    .with_timeout(2)
}

#[tokio::test]
async fn test_failing_probe_restarts_each_tick() {
    let env = TestEnv::new();
    let marker = env.path("healthy");
    let registry = env.registry(vec![sh_builder("flaky", "sleep 7401")
        .health_probe(marker_probe(&marker))
        .build()
        .unwrap()]);

    let mut supervisor = env.supervisor(Arc::clone(&registry)).await;
    let first_pid = match supervisor.start("flaky").await.unwrap() {
        StartOutcome::Started { pid, .. } => pid,
        other => panic!("unexpected outcome: {:?}", other),
    };

    let config = SchedulerConfig {
        restart_settle: Duration::from_millis(100),
        ..SchedulerConfig::default()
    };
    let monitor = ResourceMonitor::new(env.sampler.clone(), env.probes.clone());
    let mut scheduler = SchedulerLoop::new(supervisor, monitor, Arc::new(LogNotifier), config);

    // Healthy while the marker exists
    std::fs::write(&marker, "ok").unwrap();
    let report = scheduler.health_tick().await.unwrap();
    assert_eq!(report.checked, vec!["flaky"]);
    assert!(report.restarted.is_empty());
    assert!(scheduler
        .supervisor()
        .persistence()
        .service("flaky")
        .last_health()
        .is_some());

    // Every failing tick is one stop + start
    std::fs::remove_file(&marker).unwrap();
    let mut pids = vec![first_pid];
    for _ in 0..3 {
        let report = scheduler.health_tick().await.unwrap();
        assert_eq!(report.restarted, vec!["flaky"]);
        let pid = scheduler
            .supervisor()
            .persistence()
            .service("flaky")
            .pid()
            .unwrap();
        assert!(!pids.contains(&pid));
        pids.push(pid);
        assert_eq!(scheduler.supervisor().status("flaky"), ServiceStatus::Running);
    }

    // Only the latest process is left
    for old in &pids[..3] {
        assert!(!env.processes.is_alive(*old).await);
    }
    assert!(env.processes.is_alive(pids[3]).await);

    scheduler.shutdown().await;
    assert_eq!(scheduler.supervisor().status("flaky"), ServiceStatus::Stopped);
    kill_matching(&env.processes, "sleep 7401").await;
}

#[tokio::test]
async fn test_dead_process_is_detected_by_health_check() {
    let env = TestEnv::new();
    let registry = env.registry(vec![sh_builder("crashy", "sleep 7402").build().unwrap()]);
    let mut supervisor = env.supervisor(Arc::clone(&registry)).await;
    supervisor.start("crashy").await.unwrap();

    kill_matching(&env.processes, "sleep 7402").await;
    tokio::time::sleep(Duration::from_millis(300)).await;

    let verdict = supervisor.health_check("crashy").await.unwrap();
    assert!(matches!(verdict, HealthVerdict::ProcessDead { .. }));
    assert_eq!(supervisor.status("crashy"), ServiceStatus::Unhealthy);

    supervisor.stop("crashy").await;
    assert_eq!(supervisor.status("crashy"), ServiceStatus::Stopped);
}
