use chrono::{DateTime, Utc};
use futures::stream::{FuturesUnordered, StreamExt};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{watch, Semaphore};
use tracing::{debug, error, info};

use crate::config::MonitorConfig;
use crate::console;
use crate::models::{Alert, Endpoint, HealthStatus};
use crate::notify::Notifier;
use crate::probe::Probe;
use crate::registry::EndpointRegistry;
use crate::status_log::StatusLog;
use crate::throttle::AlertThrottle;

/// Source of wall-clock time for alert bookkeeping.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// How [`Monitor::run`] ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// No endpoints were registered; nothing was probed.
    Idle,
    /// The shutdown signal stopped the loop.
    Cancelled,
}

/// Counters for one pass over every endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub checked: usize,
    pub unhealthy: usize,
    pub alerts_sent: usize,
    pub alerts_suppressed: usize,
    pub delivery_failures: usize,
}

pub struct Monitor {
    endpoints: Vec<Endpoint>,
    probe: Arc<dyn Probe>,
    notifiers: Vec<Box<dyn Notifier>>,
    throttle: AlertThrottle,
    status_log: StatusLog,
    clock: Arc<dyn Clock>,
    poll_interval: Duration,
    probe_timeout: Duration,
    concurrency_limiter: Semaphore,
}

impl Monitor {
    pub fn new(
        config: &MonitorConfig,
        registry: EndpointRegistry,
        probe: Arc<dyn Probe>,
        notifiers: Vec<Box<dyn Notifier>>,
    ) -> Self {
        let mut endpoints: Vec<Endpoint> = registry.into_iter().collect();
        endpoints.sort();

        let mut throttle = AlertThrottle::new(config.alert_interval());
        for endpoint in &endpoints {
            throttle.register(endpoint);
        }

        Self {
            endpoints,
            probe,
            notifiers,
            throttle,
            status_log: StatusLog::new(&config.log_file),
            clock: Arc::new(SystemClock),
            poll_interval: config.poll_interval(),
            probe_timeout: config.probe_timeout(),
            concurrency_limiter: Semaphore::new(config.max_concurrency.max(1)),
        }
    }

    /// Runs check cycles until `shutdown` carries `true`.
    ///
    /// Returns immediately with [`RunOutcome::Idle`] when there is nothing
    /// to monitor. A dropped sender never cancels the loop.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) -> RunOutcome {
        if self.endpoints.is_empty() {
            console::failure("No site(s) input to monitor!");
            info!("no endpoints registered, nothing to monitor");
            return RunOutcome::Idle;
        }

        for endpoint in &self.endpoints {
            console::info(&format!("Beginning monitoring of {endpoint}"));
        }
        info!(
            endpoints = self.endpoints.len(),
            poll_interval = ?self.poll_interval,
            channels = self.notifiers.len(),
            "monitoring started"
        );

        loop {
            let started = Instant::now();
            let Some(report) = self.run_cycle(&mut shutdown).await else {
                break;
            };
            debug!(
                checked = report.checked,
                unhealthy = report.unhealthy,
                alerts_sent = report.alerts_sent,
                suppressed = report.alerts_suppressed,
                delivery_failures = report.delivery_failures,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "cycle completed"
            );

            tokio::select! {
                _ = tokio::time::sleep(self.poll_interval) => {}
                _ = cancelled(&mut shutdown) => break,
            }
        }

        console::failure("\n-- Monitoring canceled --");
        info!("monitoring cancelled");
        RunOutcome::Cancelled
    }

    /// Probes every endpoint, then processes the results one by one.
    /// Returns `None` if cancelled part way through.
    async fn run_cycle(&mut self, shutdown: &mut watch::Receiver<bool>) -> Option<CycleReport> {
        let results = tokio::select! {
            results = self.probe_all() => results,
            _ = cancelled(shutdown) => return None,
        };

        let mut report = CycleReport::default();
        for (endpoint, status) in results {
            if *shutdown.borrow() {
                return None;
            }
            self.process_result(&endpoint, status, &mut report).await;
        }
        Some(report)
    }

    async fn probe_all(&self) -> Vec<(Endpoint, HealthStatus)> {
        let mut tasks: FuturesUnordered<_> = self
            .endpoints
            .iter()
            .map(|endpoint| async move {
                let _permit = self.concurrency_limiter.acquire().await.ok();
                let status = self.probe.check(endpoint, self.probe_timeout).await;
                (endpoint.clone(), status)
            })
            .collect();

        let mut results = Vec::with_capacity(self.endpoints.len());
        while let Some(result) = tasks.next().await {
            results.push(result);
        }
        results
    }

    async fn process_result(
        &mut self,
        endpoint: &Endpoint,
        status: HealthStatus,
        report: &mut CycleReport,
    ) {
        report.checked += 1;
        if status.is_healthy() {
            debug!(%endpoint, "healthy");
            return;
        }

        report.unhealthy += 1;
        let now = self.clock.now();
        self.status_log.record(now, endpoint, status).await;

        if !self.throttle.permits(endpoint, now) {
            report.alerts_suppressed += 1;
            debug!(%endpoint, %status, "alert suppressed by cooldown");
            return;
        }

        let alert = Alert {
            endpoint: endpoint.clone(),
            status,
            observed_at: now,
        };
        let mut all_delivered = true;
        for notifier in &self.notifiers {
            match notifier.notify(&alert).await {
                Ok(()) => info!(%endpoint, %status, channel = notifier.channel(), "alert delivered"),
                Err(e) => {
                    all_delivered = false;
                    report.delivery_failures += 1;
                    error!(%endpoint, channel = notifier.channel(), error = %e, "alert delivery failed");
                    console::failure(&format!("Error sending {} alert: {}", notifier.channel(), e));
                }
            }
        }

        // Suppression counts attempts, so a failed delivery still starts the cooldown.
        self.throttle.record_alert_sent(endpoint, self.clock.now());
        report.alerts_sent += 1;
        if all_delivered && !self.notifiers.is_empty() {
            console::success("Successfully sent alerts");
        }
    }
}

/// Resolves once `true` is published on `shutdown`.
async fn cancelled(shutdown: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow_and_update() {
            return;
        }
        if shutdown.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::NotifyError;
    use async_trait::async_trait;
    use chrono::TimeDelta;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Returns a fixed status per endpoint, 200 when unscripted.
    #[derive(Default)]
    struct ScriptedProbe {
        statuses: Mutex<HashMap<String, HealthStatus>>,
        calls: AtomicUsize,
    }

    impl ScriptedProbe {
        fn set(&self, endpoint: &str, status: HealthStatus) {
            self.statuses
                .lock()
                .unwrap()
                .insert(Endpoint::new(endpoint).as_str().to_string(), status);
        }
    }

    #[async_trait]
    impl Probe for ScriptedProbe {
        async fn check(&self, endpoint: &Endpoint, _timeout: Duration) -> HealthStatus {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.statuses
                .lock()
                .unwrap()
                .get(endpoint.as_str())
                .copied()
                .unwrap_or(HealthStatus::Code(200))
        }
    }

    /// Signals shutdown on first use and then never answers.
    struct HangingProbe {
        shutdown: watch::Sender<bool>,
    }

    #[async_trait]
    impl Probe for HangingProbe {
        async fn check(&self, _endpoint: &Endpoint, _timeout: Duration) -> HealthStatus {
            let _ = self.shutdown.send(true);
            std::future::pending().await
        }
    }

    struct RecordingNotifier {
        sent: Arc<Mutex<Vec<Alert>>>,
        fail: bool,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        fn channel(&self) -> &'static str {
            "recording"
        }

        async fn notify(&self, alert: &Alert) -> Result<(), NotifyError> {
            self.sent.lock().unwrap().push(alert.clone());
            if self.fail {
                Err(NotifyError::Transport("connection refused".into()))
            } else {
                Ok(())
            }
        }
    }

    struct ManualClock(Mutex<DateTime<Utc>>);

    impl ManualClock {
        fn at(t: DateTime<Utc>) -> Arc<Self> {
            Arc::new(Self(Mutex::new(t)))
        }

        fn set(&self, t: DateTime<Utc>) {
            *self.0.lock().unwrap() = t;
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> DateTime<Utc> {
            *self.0.lock().unwrap()
        }
    }

    fn t0() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2024-05-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    struct Harness {
        monitor: Monitor,
        probe: Arc<ScriptedProbe>,
        sent: Arc<Mutex<Vec<Alert>>>,
        clock: Arc<ManualClock>,
        log_path: std::path::PathBuf,
        _dir: tempfile::TempDir,
    }

    fn harness(endpoints: &[&str], fail_delivery: bool) -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let log_path = dir.path().join("monitor.log");
        let config = MonitorConfig {
            log_file: log_path.clone(),
            alert_interval_secs: 1800,
            ..MonitorConfig::default()
        };
        let registry = EndpointRegistry::build(
            endpoints.iter().map(|s| s.to_string()),
            Vec::<String>::new(),
        );
        let probe = Arc::new(ScriptedProbe::default());
        let sent = Arc::new(Mutex::new(Vec::new()));
        let notifier = RecordingNotifier {
            sent: Arc::clone(&sent),
            fail: fail_delivery,
        };
        let clock = ManualClock::at(t0());
        let mut monitor = Monitor::new(
            &config,
            registry,
            probe.clone(),
            vec![Box::new(notifier) as Box<dyn Notifier>],
        );
        monitor.clock = clock.clone();

        Harness {
            monitor,
            probe,
            sent,
            clock,
            log_path,
            _dir: dir,
        }
    }

    fn log_lines(path: &std::path::Path) -> Vec<String> {
        std::fs::read_to_string(path)
            .map(|c| c.lines().map(String::from).collect())
            .unwrap_or_default()
    }

    async fn cycle(h: &mut Harness) -> CycleReport {
        let (_tx, mut rx) = watch::channel(false);
        h.monitor.run_cycle(&mut rx).await.expect("cycle not cancelled")
    }

    #[test]
    fn every_endpoint_gets_one_alert_slot() {
        let h = harness(&["a.com", "http://a.com", "b.com"], false);
        assert_eq!(h.monitor.endpoints.len(), 2);
        for endpoint in &h.monitor.endpoints {
            assert_eq!(
                h.monitor.throttle.last_alert(endpoint),
                Some(DateTime::<Utc>::UNIX_EPOCH)
            );
        }
    }

    #[tokio::test]
    async fn healthy_endpoint_is_neither_logged_nor_alerted() {
        let mut h = harness(&["x.com"], false);
        let report = cycle(&mut h).await;

        assert_eq!(report.checked, 1);
        assert_eq!(report.unhealthy, 0);
        assert!(h.sent.lock().unwrap().is_empty());
        assert!(log_lines(&h.log_path).is_empty());
    }

    #[tokio::test]
    async fn repeated_failures_respect_alert_interval() {
        let mut h = harness(&["x.com"], false);
        h.probe.set("x.com", HealthStatus::Code(500));

        let report = cycle(&mut h).await;
        assert_eq!(report.alerts_sent, 1);
        assert_eq!(h.sent.lock().unwrap().len(), 1);

        h.clock.set(t0() + TimeDelta::seconds(30));
        let report = cycle(&mut h).await;
        assert_eq!(report.alerts_sent, 0);
        assert_eq!(report.alerts_suppressed, 1);
        assert_eq!(h.sent.lock().unwrap().len(), 1);

        h.clock.set(t0() + TimeDelta::seconds(1801));
        let report = cycle(&mut h).await;
        assert_eq!(report.alerts_sent, 1);

        let sent = h.sent.lock().unwrap();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[1].endpoint.as_str(), "http://x.com");
        assert_eq!(sent[1].status, HealthStatus::Code(500));

        // Every unhealthy observation is logged, alerted or not.
        let lines = log_lines(&h.log_path);
        assert_eq!(lines.len(), 3);
        assert!(lines.iter().all(|l| l.ends_with("http://x.com STATUS: 500")));
    }

    #[tokio::test]
    async fn unreachable_counts_as_unhealthy() {
        let mut h = harness(&["down.example"], false);
        h.probe.set("down.example", HealthStatus::Unreachable);

        let report = cycle(&mut h).await;
        assert_eq!(report.unhealthy, 1);
        assert_eq!(report.alerts_sent, 1);
        assert!(log_lines(&h.log_path)[0].ends_with("STATUS: unreachable"));
    }

    #[tokio::test]
    async fn failed_delivery_still_starts_cooldown() {
        let mut h = harness(&["x.com"], true);
        h.probe.set("x.com", HealthStatus::Code(503));

        let report = cycle(&mut h).await;
        assert_eq!(report.delivery_failures, 1);
        assert_eq!(report.alerts_sent, 1);
        let endpoint = Endpoint::new("x.com");
        assert_eq!(h.monitor.throttle.last_alert(&endpoint), Some(t0()));

        h.clock.set(t0() + TimeDelta::seconds(60));
        let report = cycle(&mut h).await;
        assert_eq!(report.alerts_suppressed, 1);
        assert_eq!(h.sent.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn later_channels_are_tried_after_one_fails() {
        let mut h = harness(&["x.com"], true);
        let delivered = Arc::new(Mutex::new(Vec::new()));
        h.monitor.notifiers.push(Box::new(RecordingNotifier {
            sent: Arc::clone(&delivered),
            fail: false,
        }));
        h.probe.set("x.com", HealthStatus::Code(500));

        let report = cycle(&mut h).await;
        assert_eq!(h.sent.lock().unwrap().len(), 1);
        assert_eq!(delivered.lock().unwrap().len(), 1);
        assert_eq!(delivered.lock().unwrap()[0].endpoint.as_str(), "http://x.com");
        assert_eq!(report.delivery_failures, 1);
        assert_eq!(report.alerts_sent, 1);
        assert_eq!(
            h.monitor.throttle.last_alert(&Endpoint::new("x.com")),
            Some(t0())
        );
    }

    #[tokio::test]
    async fn one_failing_endpoint_does_not_affect_others() {
        let mut h = harness(&["a.com", "b.com", "c.com"], false);
        h.probe.set("b.com", HealthStatus::Code(404));

        let report = cycle(&mut h).await;
        assert_eq!(report.checked, 3);
        assert_eq!(report.unhealthy, 1);
        let sent = h.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].endpoint.as_str(), "http://b.com");
    }

    #[tokio::test]
    async fn empty_registry_returns_idle_without_probing() {
        let mut h = harness(&[], false);
        let (_tx, rx) = watch::channel(false);

        let outcome = tokio::time::timeout(Duration::from_secs(1), h.monitor.run(rx))
            .await
            .expect("idle monitor must not loop");
        assert_eq!(outcome, RunOutcome::Idle);
        assert_eq!(h.probe.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn cancellation_during_sleep_stops_the_loop() {
        let mut h = harness(&["x.com"], false);
        let (tx, rx) = watch::channel(false);

        let handle = tokio::spawn(async move {
            let outcome = h.monitor.run(rx).await;
            (outcome, h)
        });
        tokio::time::sleep(Duration::from_millis(100)).await;
        tx.send(true).unwrap();

        let (outcome, h) = tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("monitor stops promptly")
            .unwrap();
        assert_eq!(outcome, RunOutcome::Cancelled);
        assert_eq!(h.probe.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn cancellation_abandons_in_flight_probe() {
        let dir = tempfile::tempdir().unwrap();
        let config = MonitorConfig {
            log_file: dir.path().join("monitor.log"),
            ..MonitorConfig::default()
        };
        let (tx, rx) = watch::channel(false);
        let registry = EndpointRegistry::build(vec!["x.com".to_string()], Vec::new());
        let mut monitor = Monitor::new(&config, registry, Arc::new(HangingProbe { shutdown: tx }), Vec::new());

        let outcome = tokio::time::timeout(Duration::from_secs(2), monitor.run(rx))
            .await
            .expect("monitor stops promptly");
        assert_eq!(outcome, RunOutcome::Cancelled);
        assert!(!config.log_file.exists());
    }

    #[tokio::test]
    async fn dropped_sender_does_not_cancel() {
        let (tx, mut rx) = watch::channel(false);
        drop(tx);
        let waited = tokio::time::timeout(Duration::from_millis(50), cancelled(&mut rx)).await;
        assert!(waited.is_err());
    }
}
