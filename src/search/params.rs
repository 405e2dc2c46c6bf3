//! Tunable search and time-management parameters.

/// Search parameters. Defaults are the played values; the tuning driver
/// overrides fields through the engine options surface.
#[derive(Clone, Debug)]
pub struct SearchParams {
    /// Aspiration half-window after the first completed depth.
    pub aspiration_delta: i32,
    /// Null move base reduction in plies.
    pub null_move_reduction: u32,
    /// Minimum nominal depth (plies) for null-move pruning.
    pub null_move_min_depth: u32,
    /// Depth (plies) at and below which a null-move fail-high is verified
    /// with a reduced ordinary search.
    pub null_verify_depth: u32,
    /// Futility margins per nominal remaining depth (frontier, pre-frontier).
    pub futility_margins: [i32; 2],
    /// Razoring margins per nominal remaining depth; wider than futility,
    /// triggering a reduction instead of a skip.
    pub razor_margins: [i32; 2],
    /// Move index after which late-move reductions may apply.
    pub lmr_move_threshold: usize,
    /// Minimum nominal depth (plies) for late-move reductions.
    pub lmr_min_depth: u32,
    /// Minimum nominal depth (plies) for internal iterative deepening.
    pub iid_min_depth: u32,
    /// IID depth reduction in plies.
    pub iid_reduction: u32,
    /// Check extension in half-plies.
    pub check_extension: i32,
    /// Recapture extension in half-plies.
    pub recapture_extension: i32,
    /// Single-reply extension in half-plies.
    pub single_reply_extension: i32,
    /// Mate-threat extension in half-plies.
    pub mate_threat_extension: i32,
    /// Delta-pruning margin in quiescence.
    pub qsearch_delta_margin: i32,
}

impl Default for SearchParams {
    fn default() -> Self {
        SearchParams {
            aspiration_delta: 25,
            null_move_reduction: 2,
            null_move_min_depth: 3,
            null_verify_depth: 6,
            futility_margins: [120, 280],
            razor_margins: [280, 520],
            lmr_move_threshold: 3,
            lmr_min_depth: 3,
            iid_min_depth: 5,
            iid_reduction: 2,
            check_extension: 2,
            recapture_extension: 1,
            single_reply_extension: 2,
            mate_threat_extension: 1,
            qsearch_delta_margin: 180,
        }
    }
}

/// Time-management coefficients.
#[derive(Clone, Debug)]
pub struct TimeParams {
    /// Assumed remaining moves when the clock gives no moves-to-go.
    pub avg_moves_to_go: u32,
    /// Permille of the increment folded into the nominal slice.
    pub increment_permille: u32,
    /// Hard limit as a multiple of the nominal slice.
    pub hard_factor: u32,
    /// Safety margin kept off the clock, in milliseconds.
    pub safety_margin_ms: u64,
    /// Extension multiplier (permille) applied to the soft limit while the
    /// best move or score is unstable.
    pub instability_permille: u32,
    /// Score swing (centipawns) between iterations treated as instability.
    pub instability_swing: i32,
}

impl Default for TimeParams {
    fn default() -> Self {
        TimeParams {
            avg_moves_to_go: 38,
            increment_permille: 600,
            hard_factor: 4,
            safety_margin_ms: 60,
            instability_permille: 1500,
            instability_swing: 35,
        }
    }
}
