//! Concurrent fan-out of status probes over a registry snapshot

use crate::probe::StatusProbe;
use log::{info, warn};
use shared::{Endpoint, StatusResult};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

pub const DEFAULT_CONCURRENCY: usize = 32;

/// Runs one probe per endpoint with at most `concurrency` in flight
///
/// Results come back in the order of the endpoints passed in, whatever order
/// the probes finish in. A failed, panicked or abandoned probe yields an
/// offline result in its own slot and never disturbs the others.
#[derive(Debug, Clone)]
pub struct ProbeScheduler {
    probe: StatusProbe,
    concurrency: usize,
    batch_deadline: Option<Duration>,
}

impl Default for ProbeScheduler {
    fn default() -> Self {
        Self::new(StatusProbe::default(), DEFAULT_CONCURRENCY)
    }
}

impl ProbeScheduler {
    pub fn new(probe: StatusProbe, concurrency: usize) -> Self {
        Self {
            probe,
            concurrency: concurrency.max(1),
            batch_deadline: None,
        }
    }

    /// Stops waiting after `deadline`; anything still pending is reported
    /// offline and its task is aborted.
    pub fn with_batch_deadline(mut self, deadline: Duration) -> Self {
        self.batch_deadline = Some(deadline);
        self
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    pub fn probe(&self) -> &StatusProbe {
        &self.probe
    }

    /// Probes every endpoint and returns one result per endpoint, index-aligned.
    pub async fn run(&self, endpoints: &[Endpoint]) -> Vec<StatusResult> {
        let start = Instant::now();
        let mut slots: Vec<Option<StatusResult>> = vec![None; endpoints.len()];
        let permits = Arc::new(Semaphore::new(self.concurrency));
        let mut tasks = JoinSet::new();

        for (index, endpoint) in endpoints.iter().enumerate() {
            let permits = Arc::clone(&permits);
            let probe = self.probe;
            let host = endpoint.host.clone();
            let port = endpoint.port;

            tasks.spawn(async move {
                // The semaphore is never closed, so a failed acquire cannot happen
                let _permit = permits.acquire_owned().await.ok();
                (index, probe.query(&host, port).await)
            });
        }

        let collect = async {
            while let Some(joined) = tasks.join_next().await {
                match joined {
                    Ok((index, status)) => slots[index] = Some(status),
                    Err(e) => warn!("Probe task failed: {}", e),
                }
            }
        };

        let completed = match self.batch_deadline {
            Some(deadline) => tokio::time::timeout(deadline, collect).await.is_ok(),
            None => {
                collect.await;
                true
            }
        };

        if !completed {
            warn!(
                "Batch deadline reached with {} probes still pending",
                tasks.len()
            );
            tasks.abort_all();
        }

        let results: Vec<StatusResult> = slots
            .into_iter()
            .map(|slot| slot.unwrap_or_else(StatusResult::offline))
            .collect();

        info!(
            "Probe cycle finished: {}/{} online in {:?}",
            results.iter().filter(|r| r.online).count(),
            results.len(),
            start.elapsed()
        );

        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use responder::Responder;
    use shared::InfoReply;

    async fn online_endpoint(name: &str, delay: Option<Duration>) -> Endpoint {
        let mut responder = Responder::bind("127.0.0.1:0", InfoReply::new(name, 1, 10))
            .await
            .unwrap();
        if let Some(delay) = delay {
            responder = responder.with_delay(delay);
        }
        let port = responder.local_addr().unwrap().port();
        responder.spawn();
        Endpoint::new("127.0.0.1", port, "test")
    }

    fn silent_endpoint(sockets: &mut Vec<std::net::UdpSocket>) -> Endpoint {
        let socket = std::net::UdpSocket::bind("127.0.0.1:0").unwrap();
        let port = socket.local_addr().unwrap().port();
        sockets.push(socket);
        Endpoint::new("127.0.0.1", port, "test")
    }

    #[tokio::test]
    async fn test_empty_snapshot() {
        let results = ProbeScheduler::default().run(&[]).await;
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_results_follow_input_order() {
        // Slower servers first so completion order is the reverse of input order
        let endpoints = vec![
            online_endpoint("slow", Some(Duration::from_millis(300))).await,
            online_endpoint("medium", Some(Duration::from_millis(150))).await,
            online_endpoint("fast", None).await,
        ];

        let results = ProbeScheduler::default().run(&endpoints).await;

        let names: Vec<_> = results
            .iter()
            .map(|r| r.hostname.as_deref().unwrap_or("-"))
            .collect();
        assert_eq!(names, vec!["slow", "medium", "fast"]);
    }

    #[tokio::test]
    async fn test_mixed_outcomes_keep_their_slots() {
        let mut sockets = Vec::new();
        let endpoints = vec![
            silent_endpoint(&mut sockets),
            online_endpoint("alpha", None).await,
            Endpoint::new("not-an-ip", 7777, "test"),
            online_endpoint("beta", None).await,
            silent_endpoint(&mut sockets),
        ];

        let scheduler = ProbeScheduler::new(StatusProbe::new(Duration::from_millis(200)), 4);
        let results = scheduler.run(&endpoints).await;

        let online: Vec<bool> = results.iter().map(|r| r.online).collect();
        assert_eq!(online, vec![false, true, false, true, false]);
        assert_eq!(results[1].hostname.as_deref(), Some("alpha"));
        assert_eq!(results[3].hostname.as_deref(), Some("beta"));
    }

    #[tokio::test]
    async fn test_unreachable_endpoints_probe_in_parallel() {
        let mut sockets = Vec::new();
        let endpoints: Vec<_> = (0..10).map(|_| silent_endpoint(&mut sockets)).collect();
        let timeout = Duration::from_millis(300);

        let start = Instant::now();
        let results = ProbeScheduler::new(StatusProbe::new(timeout), 32)
            .run(&endpoints)
            .await;
        let elapsed = start.elapsed();

        assert_eq!(results.len(), 10);
        assert!(results.iter().all(|r| !r.online));
        // Sequential probing would take ten timeouts
        assert!(elapsed < timeout * 3, "took {:?}", elapsed);
    }

    #[tokio::test]
    async fn test_concurrency_cap_bounds_batch_time() {
        let delay = Duration::from_millis(200);
        let mut endpoints = Vec::new();
        for i in 0..6 {
            endpoints.push(online_endpoint(&format!("server-{}", i), Some(delay)).await);
        }

        let start = Instant::now();
        let results = ProbeScheduler::new(StatusProbe::new(Duration::from_secs(2)), 2)
            .run(&endpoints)
            .await;
        let elapsed = start.elapsed();

        assert!(results.iter().all(|r| r.online));
        // ceil(6 / 2) waves of one delay each
        assert!(elapsed >= delay * 3, "took {:?}", elapsed);
        assert!(elapsed < delay * 6, "took {:?}", elapsed);
    }

    #[tokio::test]
    async fn test_batch_deadline_marks_stragglers_offline() {
        let endpoints = vec![
            online_endpoint("quick", None).await,
            online_endpoint("sluggish", Some(Duration::from_millis(800))).await,
        ];

        let scheduler = ProbeScheduler::new(StatusProbe::new(Duration::from_secs(2)), 8)
            .with_batch_deadline(Duration::from_millis(300));

        let start = Instant::now();
        let results = scheduler.run(&endpoints).await;

        assert!(start.elapsed() < Duration::from_millis(700));
        assert_eq!(results.len(), 2);
        assert!(results[0].online);
        assert!(!results[1].online);
    }

    #[test]
    fn test_zero_concurrency_is_clamped() {
        let scheduler = ProbeScheduler::new(StatusProbe::default(), 0);
        assert_eq!(scheduler.concurrency(), 1);
    }
}
