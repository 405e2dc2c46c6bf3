//! Engine manager: owns the position, caches and search state, and exposes
//! the option surface the protocol front-end drives.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::debug;

use crate::board::{ChessParseError, IllegalMoveError, Move, Position};
use crate::cache::{CacheConfig, Caches};
use crate::eval::{EvalParams, Evaluator};
use crate::search::{
    search, ProgressCallback, SearchLimits, SearchParams, SearchResult, SearchState, TimeParams,
};

/// Engine-level options: hash budget, ponder enable, and the tunable
/// parameter bags for time management, search and evaluation.
#[derive(Clone, Debug)]
pub struct EngineOptions {
    pub cache: CacheConfig,
    pub ponder: bool,
    pub time_params: TimeParams,
    pub search_params: SearchParams,
    pub eval_params: EvalParams,
}

impl Default for EngineOptions {
    fn default() -> Self {
        EngineOptions {
            cache: CacheConfig::default(),
            ponder: false,
            time_params: TimeParams::default(),
            search_params: SearchParams::default(),
            eval_params: EvalParams::default(),
        }
    }
}

/// A complete engine instance: one position, one searcher, shared caches.
pub struct Engine {
    position: Position,
    evaluator: Evaluator,
    caches: Caches,
    state: SearchState,
    options: EngineOptions,
    stop: Arc<AtomicBool>,
}

impl Engine {
    #[must_use]
    pub fn new(options: EngineOptions) -> Self {
        let mut state = SearchState::new();
        state.params = options.search_params.clone();
        state.time_params = options.time_params.clone();
        Engine {
            position: Position::new(),
            evaluator: Evaluator::new(options.eval_params.clone()),
            caches: Caches::new(options.cache),
            state,
            options,
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    #[must_use]
    pub fn position(&self) -> &Position {
        &self.position
    }

    /// Replace the game position from a FEN string.
    pub fn set_position(&mut self, fen: &str) -> Result<(), ChessParseError> {
        self.position = fen.parse()?;
        Ok(())
    }

    /// Reset to the standard starting position.
    pub fn reset(&mut self) {
        self.position = Position::new();
    }

    /// Play a coordinate move on the engine's position, running it through
    /// the legality filter first.
    pub fn play_move(&mut self, notation: &str) -> Result<Move, ChessParseError> {
        self.position.play_uci(notation)
    }

    /// Play an already-constructed move, surfacing `IllegalMoveError` when
    /// the filter rejects it.
    pub fn play(&mut self, mv: Move) -> Result<(), IllegalMoveError> {
        self.position.play(mv)
    }

    /// A handle the controlling thread can use to cancel a running search.
    #[must_use]
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    /// Request cancellation of the running search.
    pub fn stop(&self) {
        self.stop.store(true, Ordering::Relaxed);
    }

    /// Run a search over the current position with the given limits,
    /// streaming progress through `progress`.
    pub fn go(
        &mut self,
        mut limits: SearchLimits,
        progress: Option<ProgressCallback>,
    ) -> SearchResult {
        self.stop.store(false, Ordering::Relaxed);
        if limits.ponder && !self.options.ponder {
            limits.ponder = false;
        }
        search(
            &mut self.position,
            &self.evaluator,
            &mut self.caches,
            &mut self.state,
            &limits,
            &self.stop,
            progress,
        )
    }

    /// Wipe all three cache tables.
    pub fn clear_caches(&mut self) {
        debug!("clearing caches");
        self.caches.clear();
    }

    /// Rebuild the caches under a new megabyte budget and share split.
    pub fn resize_caches(&mut self, config: CacheConfig) {
        debug!("resizing caches to {} MB", config.megabytes);
        self.options.cache = config;
        self.caches.resize(config);
    }

    pub fn set_ponder(&mut self, enabled: bool) {
        self.options.ponder = enabled;
    }

    /// Override search parameters (tuning surface).
    pub fn set_search_params(&mut self, params: SearchParams) {
        self.options.search_params = params.clone();
        self.state.params = params;
    }

    /// Override time-management coefficients (tuning surface).
    pub fn set_time_params(&mut self, params: TimeParams) {
        self.options.time_params = params.clone();
        self.state.time_params = params;
    }

    /// Override evaluation parameters (tuning surface).
    pub fn set_eval_params(&mut self, params: EvalParams) {
        self.options.eval_params = params.clone();
        self.evaluator = Evaluator::new(params);
        // cached scores no longer match the new parameters
        self.caches.clear();
    }

    #[must_use]
    pub fn options(&self) -> &EngineOptions {
        &self.options
    }
}

impl Default for Engine {
    fn default() -> Self {
        Engine::new(EngineOptions::default())
    }
}
