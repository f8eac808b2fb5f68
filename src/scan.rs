//! scan.rs — Orquestração de um ciclo de monitoramento
//!
//! Para cada alvo, uma task agregadora dispara os pings de todos os seus
//! destinos (limitados por um semáforo de `max_workers`) e aguarda todos.
//! Só então o orquestrador classifica, alimenta o tracker e grava o novo
//! contador: ele é o único escritor do mapa de alvos.

use crate::alarm::AlarmSink;
use crate::classifier::classify;
use crate::ping::{ProbeError, Prober};
use crate::tracker::{EventTracker, TargetState};
use crate::types::{CycleReport, ProbeResult, Targets, Thresholds, Verdict};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info};

type DestinationResult = (String, Result<ProbeResult, ProbeError>);

pub struct ScanOrchestrator<P: Prober> {
    prober: Arc<P>,
    workers: Arc<Semaphore>,
    tracker: EventTracker,
    thresholds: Thresholds,
    ping_count: u32,
}

impl<P: Prober> ScanOrchestrator<P> {
    pub fn new(prober: Arc<P>, thresholds: Thresholds, ping_count: u32, max_workers: usize) -> Self {
        Self {
            prober,
            workers: Arc::new(Semaphore::new(max_workers)),
            tracker: EventTracker::new(thresholds),
            thresholds,
            ping_count,
        }
    }

    /// Executa um ciclo completo sobre `targets`, atualizando os contadores
    /// no próprio mapa. Retorna só depois que todos os pings terminarem.
    pub async fn run_cycle(&self, targets: &mut Targets, sink: &dyn AlarmSink) -> CycleReport {
        let started = Instant::now();
        let mut report = CycleReport {
            targets: targets.len(),
            ..CycleReport::default()
        };

        let mut pending = JoinSet::new();
        for (hostname, target) in targets.iter() {
            let hostname = hostname.clone();
            let destinations = target.destinations.clone();
            let prober = Arc::clone(&self.prober);
            let workers = Arc::clone(&self.workers);
            let count = self.ping_count;
            pending.spawn(async move {
                let results = probe_target(prober, workers, destinations, count).await;
                (hostname, results)
            });
        }

        while let Some(joined) = pending.join_next().await {
            let (hostname, results) = match joined {
                Ok(done) => done,
                Err(e) => {
                    let message = format!("Probe aggregation task failed: {}", e);
                    error!("{}", message);
                    sink.critical(&message);
                    continue;
                }
            };

            let verdicts: Vec<Verdict> = results
                .iter()
                .map(|(destination, result)| {
                    report.probes += 1;
                    let verdict = classify(destination, result, &self.thresholds);
                    match result {
                        Err(e) => sink.critical(&format!(
                            "Probe failure {} -> {} - error: {}",
                            hostname, destination, e
                        )),
                        Ok(_) if verdict.is_degraded() => sink.warning(&format!(
                            "Degradation on {} -> {}: {}",
                            hostname, destination, verdict.diagnostic
                        )),
                        Ok(_) => {}
                    }
                    verdict
                })
                .collect();

            let degraded = verdicts.iter().filter(|v| v.is_degraded()).count();
            report.degraded_probes += degraded;
            if degraded > 0 {
                report.degraded_targets += 1;
            }

            let Some(target) = targets.get_mut(&hostname) else {
                continue;
            };
            let observation = self.tracker.observe_cycle(&hostname, target.events, &verdicts);
            debug!(
                hostname = %hostname,
                previous = target.events,
                events = observation.events,
                state = ?TargetState::from_events(observation.events),
                degraded,
                "Contador atualizado"
            );
            target.events = observation.events;

            if let Some(alarm) = observation.alarm {
                info!(hostname = %alarm.hostname, destination = %alarm.destination, "Alarme disparado");
                sink.alarm(&alarm);
                report.alarms += 1;
            }
        }

        report.elapsed_ms = started.elapsed().as_millis();
        report
    }
}

/// Pinga todos os destinos de um alvo em paralelo e devolve os resultados
/// na ordem de configuração. Uma task que entra em pânico vira falha de
/// execução apenas do seu destino.
async fn probe_target<P: Prober>(
    prober: Arc<P>,
    workers: Arc<Semaphore>,
    destinations: Vec<String>,
    count: u32,
) -> Vec<DestinationResult> {
    let handles: Vec<(String, JoinHandle<Result<ProbeResult, ProbeError>>)> = destinations
        .into_iter()
        .map(|destination| {
            let prober = Arc::clone(&prober);
            let workers = Arc::clone(&workers);
            let target = destination.clone();
            let handle = tokio::spawn(async move {
                let _permit = workers
                    .acquire_owned()
                    .await
                    .map_err(|e| ProbeError::Aborted(e.to_string()))?;
                prober.probe(&target, count).await
            });
            (destination, handle)
        })
        .collect();

    let mut results = Vec::with_capacity(handles.len());
    for (destination, handle) in handles {
        let result = match handle.await {
            Ok(result) => result,
            Err(e) => Err(ProbeError::Aborted(e.to_string())),
        };
        results.push((destination, result));
    }
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alarm::{MemorySink, Severity};
    use crate::types::Target;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::time::{Duration, sleep};

    #[derive(Clone)]
    enum Script {
        Reply(u32, u32, f64),
        Fail,
        Panic,
    }

    /// Prober roteirizado: cada destino devolve uma sequência de respostas,
    /// uma por ciclo (a última se repete).
    #[derive(Default)]
    struct ScriptedProber {
        scripts: Mutex<HashMap<String, Vec<Script>>>,
        calls: AtomicUsize,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
        delay_ms: u64,
    }

    impl ScriptedProber {
        fn with(scripts: &[(&str, Vec<Script>)]) -> Self {
            Self {
                scripts: Mutex::new(
                    scripts
                        .iter()
                        .map(|(d, s)| (d.to_string(), s.clone()))
                        .collect(),
                ),
                ..Self::default()
            }
        }

        fn next(&self, destination: &str) -> Script {
            let mut scripts = self.scripts.lock().unwrap();
            let script = scripts.get_mut(destination).expect("unscripted destination");
            if script.len() > 1 {
                script.remove(0)
            } else {
                script[0].clone()
            }
        }
    }

    impl Prober for ScriptedProber {
        async fn probe(&self, destination: &str, count: u32) -> Result<ProbeResult, ProbeError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            if self.delay_ms > 0 {
                sleep(Duration::from_millis(self.delay_ms)).await;
            }
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            match self.next(destination) {
                Script::Reply(sent, received, avg_rtt_ms) => {
                    assert_eq!(sent, count);
                    Ok(ProbeResult {
                        sent,
                        received,
                        avg_rtt_ms,
                    })
                }
                Script::Fail => Err(ProbeError::Transport("host unreachable".into())),
                Script::Panic => panic!("transport blew up"),
            }
        }
    }

    fn thresholds() -> Thresholds {
        Thresholds {
            max_lost_packets: 0,
            rtt_threshold_ms: 100.0,
            max_events: 3,
            alert_timeout_secs: 900,
        }
    }

    fn targets(entries: Vec<(&str, Vec<&str>)>) -> Targets {
        entries
            .into_iter()
            .map(|(host, dests)| {
                (
                    host.to_string(),
                    Target {
                        destinations: dests.iter().map(|d| d.to_string()).collect(),
                        events: 0,
                    },
                )
            })
            .collect()
    }

    #[tokio::test]
    async fn persistent_loss_fires_one_alarm_after_three_cycles() {
        let prober = Arc::new(ScriptedProber::with(&[(
            "10.0.0.1",
            vec![Script::Reply(20, 18, 5.0)],
        )]));
        let orchestrator = ScanOrchestrator::new(prober, thresholds(), 20, 10);
        let sink = MemorySink::new();
        let mut state = targets(vec![("R1", vec!["10.0.0.1"])]);

        let mut sequence = Vec::new();
        for _ in 0..3 {
            orchestrator.run_cycle(&mut state, &sink).await;
            sequence.push(state["R1"].events);
        }

        assert_eq!(sequence, vec![1, 2, 0]);
        let alarms: Vec<_> = sink
            .events()
            .into_iter()
            .filter(|(s, m)| *s == Severity::Critical && m.starts_with("ALARM"))
            .collect();
        assert_eq!(alarms.len(), 1);
        assert!(alarms[0].1.contains("R1"));
        assert!(alarms[0].1.contains("10.0.0.1"));
        assert_eq!(sink.count(Severity::Warning), 3);
    }

    #[tokio::test]
    async fn single_degraded_cycle_recovers_without_alarm() {
        let prober = Arc::new(ScriptedProber::with(&[(
            "10.0.0.2",
            vec![
                Script::Reply(20, 20, 5.0),
                Script::Reply(20, 20, 5.0),
                Script::Reply(20, 20, 250.0),
                Script::Reply(20, 20, 5.0),
            ],
        )]));
        let orchestrator = ScanOrchestrator::new(prober, thresholds(), 20, 10);
        let sink = MemorySink::new();
        let mut state = targets(vec![("R2", vec!["10.0.0.2"])]);

        let mut sequence = Vec::new();
        for _ in 0..4 {
            orchestrator.run_cycle(&mut state, &sink).await;
            sequence.push(state["R2"].events);
        }

        assert_eq!(sequence, vec![0, 0, 1, 0]);
        assert_eq!(sink.count(Severity::Critical), 0);
        assert_eq!(sink.count(Severity::Warning), 1);
    }

    #[tokio::test]
    async fn failed_destination_degrades_whole_target() {
        let prober = Arc::new(ScriptedProber::with(&[
            ("10.0.3.1", vec![Script::Reply(20, 20, 5.0)]),
            ("10.0.3.2", vec![Script::Fail]),
            ("10.0.3.3", vec![Script::Reply(20, 20, 5.0)]),
        ]));
        let orchestrator = ScanOrchestrator::new(Arc::clone(&prober), thresholds(), 20, 10);
        let sink = MemorySink::new();
        let mut state = targets(vec![("R3", vec!["10.0.3.1", "10.0.3.2", "10.0.3.3"])]);

        let report = orchestrator.run_cycle(&mut state, &sink).await;

        assert_eq!(state["R3"].events, 1);
        assert_eq!(prober.calls.load(Ordering::SeqCst), 3);
        assert_eq!(report.probes, 3);
        assert_eq!(report.degraded_probes, 1);
        assert_eq!(report.degraded_targets, 1);
        assert_eq!(report.alarms, 0);
        let events = sink.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].0, Severity::Critical);
        assert!(events[0].1.contains("R3 -> 10.0.3.2"));
    }

    #[tokio::test]
    async fn panicking_probe_does_not_block_siblings() {
        let prober = Arc::new(ScriptedProber::with(&[
            ("10.0.4.1", vec![Script::Panic]),
            ("10.0.4.2", vec![Script::Reply(20, 20, 5.0)]),
            ("10.0.5.1", vec![Script::Reply(20, 20, 5.0)]),
        ]));
        let orchestrator = ScanOrchestrator::new(prober, thresholds(), 20, 10);
        let sink = MemorySink::new();
        let mut state = targets(vec![
            ("R4", vec!["10.0.4.1", "10.0.4.2"]),
            ("R5", vec!["10.0.5.1"]),
        ]);
        state.get_mut("R5").unwrap().events = 2;

        let report = orchestrator.run_cycle(&mut state, &sink).await;

        assert_eq!(report.targets, 2);
        assert_eq!(report.probes, 3);
        assert_eq!(state["R4"].events, 1);
        assert_eq!(state["R5"].events, 0);
    }

    #[tokio::test]
    async fn worker_pool_bounds_concurrency() {
        let dests: Vec<String> = (1..=8).map(|i| format!("10.0.6.{i}")).collect();
        let scripts: Vec<(&str, Vec<Script>)> = dests
            .iter()
            .map(|d| (d.as_str(), vec![Script::Reply(20, 20, 1.0)]))
            .collect();
        let mut prober = ScriptedProber::with(&scripts);
        prober.delay_ms = 20;
        let prober = Arc::new(prober);

        let orchestrator = ScanOrchestrator::new(Arc::clone(&prober), thresholds(), 20, 2);
        let sink = MemorySink::new();
        let refs: Vec<&str> = dests.iter().map(String::as_str).collect();
        let mut state = targets(vec![("R6", refs[..4].to_vec()), ("R7", refs[4..].to_vec())]);

        orchestrator.run_cycle(&mut state, &sink).await;

        assert_eq!(prober.calls.load(Ordering::SeqCst), 8);
        let peak = prober.max_in_flight.load(Ordering::SeqCst);
        assert!(peak >= 1 && peak <= 2, "peak in flight = {peak}");
    }

    #[tokio::test]
    async fn target_without_destinations_is_reset() {
        let prober = Arc::new(ScriptedProber::default());
        let orchestrator = ScanOrchestrator::new(Arc::clone(&prober), thresholds(), 20, 10);
        let sink = MemorySink::new();
        let mut state = targets(vec![("R8", vec![])]);
        state.get_mut("R8").unwrap().events = 2;

        orchestrator.run_cycle(&mut state, &sink).await;

        assert_eq!(state["R8"].events, 0);
        assert_eq!(prober.calls.load(Ordering::SeqCst), 0);
        assert!(sink.events().is_empty());
    }
}
