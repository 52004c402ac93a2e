//! Lazy-SMP worker pool (spec.md §4.9, §5).
//!
//! The main thread runs its own [`Worker::iterative_deepening`] on the
//! caller's stack; this module only manages the *helper* threads, each
//! pinned to an independent [`Worker`] clone of the position/history/NNUE
//! state, sharing only the transposition table and a `stop` flag (spec.md
//! §5 "the only shared mutable state is the TT... and a handful of atomic
//! scalars"). Grounded in the teacher's `board/search/smp.rs` thread-per-
//! worker shape, generalized from teacher's spawn-join-once model to a
//! persistent pool with a synchronous command/response handoff per spec.md
//! §9 ("Worker command channels: synchronous, zero-capacity handoff...
//! model as a pair of bounded single-message queues per worker").

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{sync_channel, Receiver, SyncSender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use super::time::Limits;
use super::{is_mate_score, RootResult, SearchParams, Worker};
use crate::nnue::NnueNetwork;
use crate::position::Game;
use crate::tt::TranspositionTable;
use crate::types::Move;

const WORKER_STACK_SIZE: usize = 16 * 1024 * 1024;

enum Command {
    Go {
        game: Box<Game>,
        limits: Limits,
        search_moves: Vec<Move>,
        contempt: i32,
        chess960: bool,
    },
    NewGame,
    Ping,
    Shutdown,
}

enum Response {
    Done(Vec<RootResult>),
    Pong,
}

/// One helper thread's command/response channels. Both channels have
/// capacity 0 (spec.md §9): `send` blocks until the peer is ready to
/// receive, giving a send-then-receive-ack handshake without a separate
/// acknowledgement message.
struct HelperHandle {
    cmd_tx: SyncSender<Command>,
    resp_rx: Receiver<Response>,
    thread: Option<JoinHandle<()>>,
}

impl HelperHandle {
    fn spawn(
        tt: Arc<TranspositionTable>,
        network: Arc<NnueNetwork>,
        params: SearchParams,
        stop: Arc<AtomicBool>,
        worker_id: usize,
    ) -> Self {
        let (cmd_tx, cmd_rx) = sync_channel::<Command>(0);
        let (resp_tx, resp_rx) = sync_channel::<Response>(0);

        let thread = thread::Builder::new()
            .name(format!("heimdall-worker-{worker_id}"))
            .stack_size(WORKER_STACK_SIZE)
            .spawn(move || {
                let mut worker = Worker::new(tt, network, false);
                worker.params = params;
                worker.stop = stop;
                loop {
                    match cmd_rx.recv() {
                        Ok(Command::Go {
                            game,
                            limits,
                            search_moves,
                            contempt,
                            chess960,
                        }) => {
                            worker.set_position(*game);
                            worker.contempt = contempt;
                            worker.chess960 = chess960;
                            let results = worker.iterative_deepening(
                                limits,
                                Instant::now(),
                                Duration::ZERO,
                                1,
                                &search_moves,
                                None,
                            );
                            if resp_tx.send(Response::Done(results)).is_err() {
                                break;
                            }
                        }
                        Ok(Command::NewGame) => worker.new_game(),
                        Ok(Command::Ping) => {
                            if resp_tx.send(Response::Pong).is_err() {
                                break;
                            }
                        }
                        Ok(Command::Shutdown) | Err(_) => break,
                    }
                }
            })
            .expect("failed to spawn search worker thread");

        HelperHandle {
            cmd_tx,
            resp_rx,
            thread: Some(thread),
        }
    }

    fn go(&self, game: Game, limits: Limits, search_moves: Vec<Move>, contempt: i32, chess960: bool) {
        let _ = self.cmd_tx.send(Command::Go {
            game: Box::new(game),
            limits,
            search_moves,
            contempt,
            chess960,
        });
    }

    /// Blocks until the worker's `Go` has produced a result, draining its
    /// response slot (spec.md §4.9: "pings every worker to drain their
    /// response channel").
    fn drain(&self) -> Vec<RootResult> {
        match self.resp_rx.recv() {
            Ok(Response::Done(results)) => results,
            _ => Vec::new(),
        }
    }

    /// Liveness check independent of an in-flight `Go` (spec.md §4.9
    /// "Ping/Pong liveness check").
    fn ping(&self) -> bool {
        self.cmd_tx.send(Command::Ping).is_ok() && matches!(self.resp_rx.recv(), Ok(Response::Pong))
    }

    fn new_game(&self) {
        let _ = self.cmd_tx.send(Command::NewGame);
    }
}

impl Drop for HelperHandle {
    fn drop(&mut self) {
        let _ = self.cmd_tx.send(Command::Shutdown);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

/// Manages the helper threads of a Lazy-SMP search (spec.md §4.9). The
/// pool's own `stop` flag is shared with every helper `Worker`; the main
/// thread's own search loop shares the same flag so one `store` stops all
/// of them (spec.md §5 "the main thread signals stop atomically").
pub struct WorkerPool {
    tt: Arc<TranspositionTable>,
    network: Arc<NnueNetwork>,
    params: SearchParams,
    stop: Arc<AtomicBool>,
    helpers: Vec<HelperHandle>,
}

impl WorkerPool {
    #[must_use]
    pub fn new(tt: Arc<TranspositionTable>, network: Arc<NnueNetwork>, stop: Arc<AtomicBool>) -> Self {
        WorkerPool {
            tt,
            network,
            params: SearchParams::default(),
            stop,
            helpers: Vec::new(),
        }
    }

    #[must_use]
    pub fn helper_count(&self) -> usize {
        self.helpers.len()
    }

    pub fn set_params(&mut self, params: SearchParams) {
        self.params = params;
    }

    /// Ensures exactly `helper_count` helper threads exist, spawning or
    /// shutting down as needed (spec.md §4.9/§5: "`setWorkerCount(N)`
    /// ensures exactly `N` helper threads exist").
    pub fn set_worker_count(&mut self, helper_count: usize) {
        while self.helpers.len() < helper_count {
            let id = self.helpers.len() + 1;
            self.helpers.push(HelperHandle::spawn(
                Arc::clone(&self.tt),
                Arc::clone(&self.network),
                self.params.clone(),
                Arc::clone(&self.stop),
                id,
            ));
        }
        self.helpers.truncate(helper_count);
    }

    /// Starts every helper on an independent clone of `game` (spec.md
    /// §4.9: "execute the same search procedure on an independent clone of
    /// the position, history tables, and accumulators").
    pub fn start(&self, game: &Game, limits: &Limits, search_moves: &[Move], contempt: i32, chess960: bool) {
        self.stop.store(false, Ordering::Relaxed);
        for helper in &self.helpers {
            helper.go(game.clone(), limits.clone(), search_moves.to_vec(), contempt, chess960);
        }
    }

    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::Relaxed);
    }

    /// Drains every helper's final result. Must be called exactly once per
    /// `start` after `request_stop` (or natural completion), or a helper's
    /// response will block its next `Go`.
    pub fn join_results(&self) -> Vec<Vec<RootResult>> {
        self.helpers.iter().map(HelperHandle::drain).collect()
    }

    pub fn new_game(&self) {
        for helper in &self.helpers {
            helper.new_game();
        }
    }

    /// Liveness check over every helper; returns `true` iff all responded.
    pub fn ping_all(&self) -> bool {
        self.helpers.iter().all(HelperHandle::ping)
    }
}

/// Cross-thread result selection (spec.md §4.9):
/// 1. Prefer a strictly deeper completed depth, unless that would replace
///    a closer mate with a non-mate.
/// 2. Among equal depths, prefer higher score; prefer mate scores
///    unconditionally.
#[must_use]
pub fn is_better_root(candidate: &RootResult, current: &RootResult) -> bool {
    if candidate.depth != current.depth {
        if candidate.depth > current.depth {
            return !(is_mate_score(current.score) && !is_mate_score(candidate.score));
        }
        return false;
    }
    let candidate_mate = is_mate_score(candidate.score);
    let current_mate = is_mate_score(current.score);
    if candidate_mate != current_mate {
        return candidate_mate;
    }
    candidate.score > current.score
}

/// Picks the best root move across the main thread's finished multi-PV
/// list and every helper's single-PV result (spec.md §4.5 "the driver
/// selects the best worker's root PV and emits it").
#[must_use]
pub fn select_best<'a>(main: &'a [RootResult], helpers: &'a [Vec<RootResult>]) -> Option<&'a RootResult> {
    let mut best = main.first();
    for result in helpers {
        if let Some(candidate) = result.first() {
            best = Some(match best {
                None => candidate,
                Some(current) => {
                    if is_better_root(candidate, current) {
                        candidate
                    } else {
                        current
                    }
                }
            });
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Move;

    fn result(depth: u32, score: i32) -> RootResult {
        RootResult {
            depth,
            sel_depth: depth,
            score,
            pv: vec![Move::null()],
            nodes: 0,
            bound: None,
        }
    }

    #[test]
    fn deeper_completed_depth_wins() {
        assert!(is_better_root(&result(10, 5), &result(9, 100)));
    }

    #[test]
    fn deeper_non_mate_does_not_replace_closer_mate() {
        let mate = result(9, super::super::mate_in(3));
        let deeper_non_mate = result(10, 50);
        assert!(!is_better_root(&deeper_non_mate, &mate));
    }

    #[test]
    fn equal_depth_prefers_higher_score() {
        assert!(is_better_root(&result(10, 40), &result(10, 10)));
        assert!(!is_better_root(&result(10, 10), &result(10, 40)));
    }

    #[test]
    fn equal_depth_prefers_mate_over_non_mate() {
        let mate = result(10, super::super::mate_in(4));
        let normal = result(10, 900);
        assert!(is_better_root(&mate, &normal));
    }

    #[test]
    fn select_best_picks_across_main_and_helpers() {
        let main = vec![result(10, 20)];
        let helpers = vec![vec![result(12, -500)], vec![result(9, 9999)]];
        let best = select_best(&main, &helpers).unwrap();
        assert_eq!(best.depth, 12);
    }
}
