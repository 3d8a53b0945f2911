// Background path search with per-agent staleness tokens.
//
// `PathWorker` runs searches off the owner's thread. Architecture:
// - `spawn()` starts `worker_threads` threads that share one job queue (an
//   `mpsc::Receiver` behind a `Mutex`) and one results channel. Each thread
//   holds an `Arc<NavMesh>`; the mesh is never mutated after it is shared,
//   so searches take no locks.
// - `request()` assigns a strictly increasing `RequestToken`, records it as
//   the agent's current request, and queues the job. If the agent already
//   had a request in flight, that job's cancel flag is raised; its search
//   stops at the next expansion check.
// - `poll()` drains finished results without blocking, on the owner's
//   thread, and returns only those whose token is still the agent's current
//   one. Anything older is dropped, so an agent never sees a path it has
//   already replaced.
//
// Dropping the worker cancels everything in flight, closes the queue and
// joins the threads.
//
// See also: `pathfinding.rs` for `SearchBudget` and the algorithms,
// `repository.rs` for where the shared mesh comes from.

use crate::config::SearchConfig;
use crate::error::{NavError, NavResult, SearchError};
use crate::nav::NavMesh;
use crate::pathfinding::{PathAlgorithm, SearchBudget, find_path_between};
use crate::types::{AgentId, RequestToken, Vec3};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, warn};

/// A request to move `agent` from `from` to `to`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PathRequest {
    pub agent: AgentId,
    pub from: Vec3,
    pub to: Vec3,
}

/// A finished search, delivered by `PathWorker::poll()`.
#[derive(Clone, Debug, PartialEq)]
pub struct PathResponse {
    pub agent: AgentId,
    pub token: RequestToken,
    /// Waypoints from start to goal, or why there are none.
    pub result: Result<Vec<Vec3>, SearchError>,
}

struct Job {
    agent: AgentId,
    token: RequestToken,
    from: Vec3,
    to: Vec3,
    cancel: Arc<AtomicBool>,
}

struct InFlight {
    token: RequestToken,
    cancel: Arc<AtomicBool>,
}

pub struct PathWorker {
    jobs: Option<Sender<Job>>,
    results: Receiver<PathResponse>,
    threads: Vec<JoinHandle<()>>,
    in_flight: BTreeMap<AgentId, InFlight>,
    next_token: u64,
}

impl PathWorker {
    pub fn spawn(mesh: Arc<NavMesh>, search: &SearchConfig) -> NavResult<Self> {
        if search.worker_threads == 0 {
            return Err(NavError::config("worker_threads must be at least 1"));
        }
        let (job_tx, job_rx) = mpsc::channel::<Job>();
        let (result_tx, result_rx) = mpsc::channel();
        let job_rx = Arc::new(Mutex::new(job_rx));

        let mut threads = Vec::with_capacity(search.worker_threads);
        for i in 0..search.worker_threads {
            let mesh = Arc::clone(&mesh);
            let jobs = Arc::clone(&job_rx);
            let results = result_tx.clone();
            let algorithm = search.algorithm;
            let timeout = search.max_seek_time();
            let handle = thread::Builder::new()
                .name(format!("path-worker-{i}"))
                .spawn(move || worker_loop(&mesh, &jobs, &results, algorithm, timeout))?;
            threads.push(handle);
        }
        debug!(
            mesh = %mesh.name,
            threads = threads.len(),
            algorithm = ?search.algorithm,
            "path worker started"
        );

        Ok(Self {
            jobs: Some(job_tx),
            results: result_rx,
            threads,
            in_flight: BTreeMap::new(),
            next_token: 0,
        })
    }

    /// Queue a search. Supersedes any request still in flight for the same
    /// agent.
    pub fn request(&mut self, request: PathRequest) -> NavResult<RequestToken> {
        self.next_token += 1;
        let token = RequestToken(self.next_token);
        let cancel = Arc::new(AtomicBool::new(false));
        let previous = self.in_flight.insert(
            request.agent,
            InFlight {
                token,
                cancel: Arc::clone(&cancel),
            },
        );
        if let Some(previous) = previous {
            previous.cancel.store(true, Ordering::Relaxed);
            debug!(agent = %request.agent, superseded = previous.token.0, "request superseded");
        }

        let job = Job {
            agent: request.agent,
            token,
            from: request.from,
            to: request.to,
            cancel,
        };
        let sent = self.jobs.as_ref().is_some_and(|tx| tx.send(job).is_ok());
        if !sent {
            self.in_flight.remove(&request.agent);
            return Err(NavError::WorkerStopped);
        }
        Ok(token)
    }

    /// Drop the agent's in-flight request, if any. Returns whether there
    /// was one.
    pub fn cancel(&mut self, agent: AgentId) -> bool {
        match self.in_flight.remove(&agent) {
            Some(flight) => {
                flight.cancel.store(true, Ordering::Relaxed);
                true
            }
            None => false,
        }
    }

    /// Collect finished searches without blocking. Only responses carrying
    /// the agent's current token are returned.
    pub fn poll(&mut self) -> Vec<PathResponse> {
        let mut out = Vec::new();
        while let Ok(response) = self.results.try_recv() {
            let current = self
                .in_flight
                .get(&response.agent)
                .is_some_and(|f| f.token == response.token);
            if current {
                self.in_flight.remove(&response.agent);
                out.push(response);
            } else {
                debug!(agent = %response.agent, token = response.token.0, "discarding stale path");
            }
        }
        out
    }

    /// Requests issued but not yet delivered or cancelled.
    pub fn pending(&self) -> usize {
        self.in_flight.len()
    }
}

impl Drop for PathWorker {
    fn drop(&mut self) {
        for flight in self.in_flight.values() {
            flight.cancel.store(true, Ordering::Relaxed);
        }
        // Closing the queue ends each thread's recv loop.
        drop(self.jobs.take());
        for handle in self.threads.drain(..) {
            if handle.join().is_err() {
                warn!("path worker thread panicked");
            }
        }
    }
}

fn worker_loop(
    mesh: &NavMesh,
    jobs: &Mutex<Receiver<Job>>,
    results: &Sender<PathResponse>,
    algorithm: PathAlgorithm,
    timeout: Option<Duration>,
) {
    loop {
        let job = {
            let Ok(queue) = jobs.lock() else {
                return;
            };
            match queue.recv() {
                Ok(job) => job,
                Err(_) => return,
            }
        };

        let result = if job.cancel.load(Ordering::Relaxed) {
            Err(SearchError::Cancelled)
        } else {
            let budget = SearchBudget::with_timeout(timeout).with_cancel_flag(Arc::clone(&job.cancel));
            find_path_between(mesh, job.from, job.to, &algorithm, &budget)
        };
        match &result {
            Ok(path) => debug!(agent = %job.agent, waypoints = path.len(), "path found"),
            Err(e) => debug!(agent = %job.agent, error = %e, "path search failed"),
        }

        let response = PathResponse {
            agent: job.agent,
            token: job.token,
            result,
        };
        if results.send(response).is_err() {
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pathfinding::tests::grid_mesh;
    use std::time::Instant;

    fn wait_for(worker: &mut PathWorker, count: usize) -> Vec<PathResponse> {
        let deadline = Instant::now() + Duration::from_secs(10);
        let mut got = Vec::new();
        while got.len() < count && Instant::now() < deadline {
            got.extend(worker.poll());
            thread::sleep(Duration::from_millis(1));
        }
        got
    }

    fn request(agent: u32, from: (f32, f32), to: (f32, f32)) -> PathRequest {
        PathRequest {
            agent: AgentId(agent),
            from: Vec3::new(from.0, 0.0, from.1),
            to: Vec3::new(to.0, 0.0, to.1),
        }
    }

    #[test]
    fn delivers_path_to_requesting_agent() {
        let mesh = Arc::new(grid_mesh(6, 6, |_, _| false));
        let mut worker = PathWorker::spawn(mesh, &SearchConfig::default()).unwrap();
        let token = worker.request(request(7, (0.0, 0.0), (5.0, 5.0))).unwrap();
        assert_eq!(worker.pending(), 1);

        let responses = wait_for(&mut worker, 1);
        assert_eq!(responses.len(), 1);
        assert_eq!(responses[0].agent, AgentId(7));
        assert_eq!(responses[0].token, token);
        let path = responses[0].result.as_ref().unwrap();
        assert_eq!(path.first(), Some(&Vec3::new(0.0, 0.0, 0.0)));
        assert_eq!(path.last(), Some(&Vec3::new(5.0, 0.0, 5.0)));
        assert_eq!(worker.pending(), 0);
    }

    #[test]
    fn newer_request_supersedes_older() {
        let mesh = Arc::new(grid_mesh(30, 30, |_, _| false));
        let mut worker = PathWorker::spawn(mesh, &SearchConfig::default()).unwrap();
        let first = worker.request(request(1, (0.0, 0.0), (29.0, 29.0))).unwrap();
        let second = worker.request(request(1, (0.0, 0.0), (3.0, 0.0))).unwrap();
        assert!(second > first);
        assert_eq!(worker.pending(), 1);

        let responses = wait_for(&mut worker, 1);
        assert_eq!(responses.len(), 1);
        assert_eq!(responses[0].token, second);
        assert_eq!(
            responses[0].result.as_ref().unwrap().last(),
            Some(&Vec3::new(3.0, 0.0, 0.0))
        );
        // Nothing further arrives for the superseded request.
        thread::sleep(Duration::from_millis(20));
        assert!(worker.poll().is_empty());
    }

    #[test]
    fn cancelled_request_is_never_delivered() {
        let mesh = Arc::new(grid_mesh(6, 6, |_, _| false));
        let mut worker = PathWorker::spawn(mesh, &SearchConfig::default()).unwrap();
        worker.request(request(1, (0.0, 0.0), (5.0, 5.0))).unwrap();
        assert!(worker.cancel(AgentId(1)));
        assert!(!worker.cancel(AgentId(1)));
        assert_eq!(worker.pending(), 0);

        // Single thread, FIFO queue: agent 2's result arrives after agent 1's.
        worker.request(request(2, (0.0, 0.0), (1.0, 1.0))).unwrap();
        let responses = wait_for(&mut worker, 1);
        assert_eq!(responses.len(), 1);
        assert_eq!(responses[0].agent, AgentId(2));
    }

    #[test]
    fn failures_are_delivered_as_codes() {
        let mesh = Arc::new(grid_mesh(5, 5, |x, _| x == 2));
        let search = SearchConfig {
            algorithm: PathAlgorithm::JumpPoint,
            ..SearchConfig::default()
        };
        let mut worker = PathWorker::spawn(mesh, &search).unwrap();
        worker.request(request(3, (0.0, 0.0), (4.0, 4.0))).unwrap();
        let responses = wait_for(&mut worker, 1);
        assert_eq!(responses[0].result, Err(SearchError::NoPathFound));
    }

    #[test]
    fn many_agents_across_threads() {
        let mesh = Arc::new(grid_mesh(12, 12, |_, _| false));
        let search = SearchConfig {
            worker_threads: 4,
            ..SearchConfig::default()
        };
        let mut worker = PathWorker::spawn(mesh, &search).unwrap();
        for agent in 0..16 {
            let goal = (agent % 12) as f32;
            worker.request(request(agent, (0.0, 0.0), (goal, 11.0))).unwrap();
        }
        let responses = wait_for(&mut worker, 16);
        assert_eq!(responses.len(), 16);
        assert!(responses.iter().all(|r| r.result.is_ok()));
        let agents: std::collections::BTreeSet<_> = responses.iter().map(|r| r.agent).collect();
        assert_eq!(agents.len(), 16);
    }

    #[test]
    fn zero_threads_rejected() {
        let mesh = Arc::new(grid_mesh(2, 2, |_, _| false));
        let search = SearchConfig {
            worker_threads: 0,
            ..SearchConfig::default()
        };
        assert!(PathWorker::spawn(mesh, &search).is_err());
    }
}
