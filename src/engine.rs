//! Top-level driver-facing glue (spec.md §6). [`Engine`] owns the
//! transposition table, the network, the root game state, the main
//! [`Worker`](crate::search::Worker), and a [`WorkerPool`] of helper
//! threads, and exposes exactly the external surface spec.md §6 lists:
//! board/network/worker/contempt/UCI-mode setters and a blocking,
//! cancellable `go`. A line-oriented UCI loop is out of scope; this module
//! is the thing such a loop would sit on top of.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::Config;
use crate::error::InvalidInput;
use crate::history::HistoryTables;
use crate::nnue::NnueNetwork;
use crate::position::Game;
use crate::search::smp::{select_best, WorkerPool};
use crate::search::{InfoSink, Limits, RootResult, ScoreBound, Worker};
use crate::tt::TranspositionTable;
use crate::types::Move;

/// One root line as returned by [`Engine::go`]: principal variation, score,
/// and the depth at which it was last confirmed.
#[derive(Clone, Debug)]
pub struct Variation {
    pub pv: Vec<Move>,
    pub score: i32,
    pub depth: u32,
    pub bound: Option<ScoreBound>,
}

impl From<&RootResult> for Variation {
    fn from(result: &RootResult) -> Self {
        Variation {
            pv: result.pv.clone(),
            score: result.score,
            depth: result.depth,
            bound: result.bound,
        }
    }
}

fn load_network(eval_file: Option<&str>) -> Result<NnueNetwork, InvalidInput> {
    match eval_file {
        Some(path) => NnueNetwork::load(path)
            .map_err(|e| InvalidInput::InvalidOption(format!("failed to load EvalFile {path:?}: {e}"))),
        #[cfg(feature = "embedded_nnue")]
        None => Ok(NnueNetwork::from_embedded()),
        #[cfg(not(feature = "embedded_nnue"))]
        None => Err(InvalidInput::InvalidOption(
            "no EvalFile set and the embedded_nnue feature is disabled".to_string(),
        )),
    }
}

/// The engine (spec.md §6). Not `Sync`/`Send` across an await point by
/// design: `go` blocks the calling thread for the duration of the search,
/// the same way the main thread of a Lazy-SMP pool always has.
pub struct Engine {
    config: Config,
    tt: Arc<TranspositionTable>,
    network: Arc<NnueNetwork>,
    game: Game,
    main: Worker,
    pool: WorkerPool,
    stop: Arc<AtomicBool>,
    cancelled: Arc<AtomicBool>,
    pondering: Arc<AtomicBool>,
    uci_mode: bool,
}

impl Engine {
    /// Builds an engine with default configuration and the embedded
    /// network. Panics only if the `embedded_nnue` feature was disabled at
    /// build time with no `EvalFile` to fall back on; callers that disable
    /// it should use [`Engine::try_with_config`] instead.
    #[must_use]
    pub fn new() -> Self {
        Self::try_with_config(Config::default()).expect("default engine configuration is valid")
    }

    pub fn try_with_config(config: Config) -> Result<Self, InvalidInput> {
        let network = Arc::new(load_network(config.eval_file.as_deref())?);
        let tt = Arc::new(TranspositionTable::new(config.hash_mb * 1024 * 1024));
        let stop = Arc::new(AtomicBool::new(false));

        let mut main = Worker::new(Arc::clone(&tt), Arc::clone(&network), true);
        main.stop = Arc::clone(&stop);
        main.contempt = config.contempt;
        main.chess960 = config.chess960;

        let mut pool = WorkerPool::new(Arc::clone(&tt), Arc::clone(&network), Arc::clone(&stop));
        pool.set_worker_count(config.threads.saturating_sub(1));

        Ok(Engine {
            config,
            tt,
            network,
            game: Game::startpos(),
            main,
            pool,
            stop,
            cancelled: Arc::new(AtomicBool::new(false)),
            pondering: Arc::new(AtomicBool::new(false)),
            uci_mode: false,
        })
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Replaces the root position (spec.md §6 `set_board_state`).
    pub fn set_board_state(&mut self, game: Game) {
        self.game = game.clone();
        self.main.set_position(game);
    }

    /// Loads a network file, or falls back to the embedded default when
    /// `eval_file` is `None` (spec.md §6 `set_network`). Rebuilds the main
    /// worker and every helper thread, since the accumulator stack and
    /// Finny table are tied to one network's weights.
    pub fn set_network(&mut self, eval_file: Option<&str>) -> Result<(), InvalidInput> {
        let network = Arc::new(load_network(eval_file)?);
        self.config.eval_file = eval_file.map(str::to_string);
        self.network = network;

        let mut main = Worker::new(Arc::clone(&self.tt), Arc::clone(&self.network), true);
        main.stop = Arc::clone(&self.stop);
        main.contempt = self.config.contempt;
        main.chess960 = self.config.chess960;
        main.set_position(self.game.clone());
        self.main = main;

        self.pool = WorkerPool::new(Arc::clone(&self.tt), Arc::clone(&self.network), Arc::clone(&self.stop));
        self.pool.set_worker_count(self.config.threads.saturating_sub(1));
        Ok(())
    }

    /// Ensures exactly `n` total workers (1 main + `n - 1` helpers) (spec.md
    /// §6 `set_worker_count`).
    pub fn set_worker_count(&mut self, n: usize) {
        self.config.threads = n.max(1);
        self.pool.set_worker_count(self.config.threads - 1);
    }

    /// Resizes the transposition table. A fresh table can't share slots
    /// with the old one, so every worker is rebuilt against it.
    pub fn resize_hash(&mut self, mb: usize) {
        self.config.hash_mb = mb;
        self.tt = Arc::new(crate::tt::resize(mb * 1024 * 1024, self.config.threads));
        self.main.tt = Arc::clone(&self.tt);
        self.pool = WorkerPool::new(Arc::clone(&self.tt), Arc::clone(&self.network), Arc::clone(&self.stop));
        self.pool.set_worker_count(self.config.threads.saturating_sub(1));
    }

    pub fn set_contempt(&mut self, cp: i32) {
        self.config.contempt = cp;
        self.main.contempt = cp;
    }

    /// Records whether a driver above this engine is speaking UCI, for
    /// callers that want to branch score-reporting conventions on it
    /// (spec.md §6 `set_uci_mode`). The core search itself doesn't consult
    /// this flag; it's plumbing for the out-of-scope driver.
    pub fn set_uci_mode(&mut self, enabled: bool) {
        self.uci_mode = enabled;
    }

    #[must_use]
    pub fn uci_mode(&self) -> bool {
        self.uci_mode
    }

    /// Validated option entry point (spec.md §6, SPEC_FULL.md §A.3):
    /// `Config::set` is the only thing that accepts or rejects a
    /// `(name, value)` pair; this just wires the accepted value through to
    /// whichever piece of engine state that option actually governs.
    pub fn set_option(&mut self, name: &str, value: &str) -> Result<(), InvalidInput> {
        let mut probe = self.config.clone();
        probe.set(name, value)?;
        match name {
            "Hash" => self.resize_hash(probe.hash_mb),
            "Threads" => self.set_worker_count(probe.threads),
            "Contempt" => self.set_contempt(probe.contempt),
            "EvalFile" => self.set_network(probe.eval_file.as_deref())?,
            "MultiPV" => self.config.multi_pv = probe.multi_pv,
            "MoveOverhead" => self.config.move_overhead_ms = probe.move_overhead_ms,
            "Ponder" => self.config.ponder = probe.ponder,
            "UCI_Chess960" => {
                self.config.chess960 = probe.chess960;
                self.main.chess960 = probe.chess960;
            }
            "NormalizeScore" => self.config.normalize_score = probe.normalize_score,
            "UCI_ShowWDL" => self.config.show_wdl = probe.show_wdl,
            _ => unreachable!("Config::set already rejected unknown option {name:?}"),
        }
        Ok(())
    }

    /// Clears the transposition table and every history table, for a new
    /// game with no relationship to the last one (spec.md §3 "Lifecycles").
    pub fn new_game(&mut self) {
        self.tt.clear(self.config.threads.max(1));
        self.main.history = HistoryTables::new();
        self.pool.new_game();
        self.game = Game::startpos();
        self.main.set_position(self.game.clone());
    }

    pub fn stop_pondering(&mut self) {
        self.pondering.store(false, Ordering::Relaxed);
    }

    /// Aborts an in-flight or pending ponder search without waiting for a
    /// result (spec.md §6 `cancel`).
    pub fn cancel(&mut self) {
        self.cancelled.store(true, Ordering::Relaxed);
        self.pondering.store(false, Ordering::Relaxed);
        self.stop.store(true, Ordering::Relaxed);
    }

    pub fn stop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
    }

    /// Runs a blocking search from the current root position (spec.md §6
    /// `search`). Spawns every helper thread on an independent clone of the
    /// position, then runs the main thread's own iterative deepening on the
    /// calling thread; once the main thread finishes (naturally, via a
    /// limit, or via [`Engine::stop`]/[`Engine::cancel`]), every helper is
    /// stopped and its final result drained and folded into the winner
    /// (spec.md §4.9).
    ///
    /// `silent` suppresses `sink` callbacks without otherwise changing
    /// search behavior. `minimal` truncates the returned list to the single
    /// best line. Returns an empty vector if `ponder` was requested and
    /// [`Engine::cancel`] fired before [`Engine::stop_pondering`] released
    /// it.
    #[allow(clippy::too_many_arguments)]
    pub fn search(
        &mut self,
        limits: Limits,
        search_moves: Vec<Move>,
        silent: bool,
        ponder: bool,
        minimal: bool,
        multi_pv: usize,
        mut sink: Option<&mut dyn InfoSink>,
    ) -> Vec<Variation> {
        self.stop.store(false, Ordering::Relaxed);
        self.cancelled.store(false, Ordering::Relaxed);
        self.tt.new_search();

        if ponder {
            self.pondering.store(true, Ordering::Relaxed);
            while self.pondering.load(Ordering::Relaxed) && !self.cancelled.load(Ordering::Relaxed) {
                std::thread::yield_now();
            }
            if self.cancelled.load(Ordering::Relaxed) {
                return Vec::new();
            }
        }

        let multi_pv = multi_pv.max(1);
        self.main.game = self.game.clone();
        self.main.contempt = self.config.contempt;
        self.main.chess960 = self.config.chess960;

        let start = Instant::now();
        self.pool
            .start(&self.game, &limits, &search_moves, self.config.contempt, self.config.chess960);

        let move_overhead = Duration::from_millis(self.config.move_overhead_ms);
        let results = self.main.iterative_deepening(
            limits,
            start,
            move_overhead,
            multi_pv,
            &search_moves,
            if silent { None } else { sink.as_deref_mut() },
        );

        self.pool.request_stop();
        let helper_results = self.pool.join_results();

        let mut variations: Vec<Variation> = results.iter().map(Variation::from).collect();
        if let Some(winner) = select_best(&results, &helper_results) {
            if let Some(primary) = variations.first_mut() {
                *primary = Variation::from(winner);
            } else {
                variations.push(Variation::from(winner));
            }
        }

        if minimal {
            variations.truncate(1);
        }
        variations
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::position::fen::parse_fen;

    #[test]
    fn finds_mate_in_one() {
        let mut engine = Engine::new();
        let game = Game::new(parse_fen("6k1/5ppp/8/8/8/8/5PPP/4R1K1 w - - 0 1").unwrap());
        engine.set_board_state(game);
        let variations = engine.search(Limits::depth_only(6), Vec::new(), true, false, true, 1, None);
        let best = &variations[0];
        assert_eq!(best.pv[0].to_string(), "e1e8");
        assert!(crate::search::is_mate_score(best.score));
    }

    #[test]
    fn set_option_rejects_unknown_names() {
        let mut engine = Engine::new();
        assert!(engine.set_option("NotAnOption", "1").is_err());
    }

    #[test]
    fn set_option_resizes_hash() {
        let mut engine = Engine::new();
        engine.set_option("Hash", "8").unwrap();
        assert_eq!(engine.config().hash_mb, 8);
    }

    #[test]
    fn cancel_during_ponder_returns_no_variations() {
        let mut engine = Engine::new();
        engine.cancel();
        let variations = engine.search(Limits::depth_only(1), Vec::new(), true, true, true, 1, None);
        assert!(variations.is_empty());
    }
}
