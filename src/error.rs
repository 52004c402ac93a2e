//! Error taxonomy (spec.md §7, SPEC_FULL.md §A.2): two public enums, manual
//! `Display`/`Error` impls (matching the teacher's `board/error.rs` style,
//! not `thiserror`).
//!
//! `InvalidInput` is the only error surfaced across the public API boundary
//! (FEN parsing, move parsing, `Config::set`) — never a panic. Programmer
//! errors (`InvariantViolated`) are not part of any `Result`: move
//! generation and `make_move` assert their preconditions instead, per
//! spec.md §7 ("never allocate and never return errors").

use std::fmt;

/// Surfaced to the driver at FEN / UCI-move / configuration boundaries.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InvalidInput {
    InvalidFen(String),
    InvalidMove(String),
    InvalidOption(String),
}

impl fmt::Display for InvalidInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvalidInput::InvalidFen(msg) => write!(f, "invalid FEN: {msg}"),
            InvalidInput::InvalidMove(msg) => write!(f, "invalid move: {msg}"),
            InvalidInput::InvalidOption(msg) => write!(f, "invalid option: {msg}"),
        }
    }
}

impl std::error::Error for InvalidInput {}

impl From<crate::position::fen::FenError> for InvalidInput {
    fn from(e: crate::position::fen::FenError) -> Self {
        InvalidInput::InvalidFen(e.to_string())
    }
}

/// Programmer-error taxonomy (spec.md §7). Never constructed on a `Result`
/// path; named here only so `debug_assert!`/panic messages have a shared
/// vocabulary, and so release-mode `InvariantViolated` sites are searchable.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InvariantViolated {
    CorruptedPosition,
    NullPieceOnMakeMove,
    ImpossibleBitboardState,
}

impl fmt::Display for InvariantViolated {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            InvariantViolated::CorruptedPosition => "corrupted position",
            InvariantViolated::NullPieceOnMakeMove => "make_move source square is empty",
            InvariantViolated::ImpossibleBitboardState => "impossible bitboard state",
        };
        write!(f, "invariant violated: {msg}")
    }
}

impl std::error::Error for InvariantViolated {}
