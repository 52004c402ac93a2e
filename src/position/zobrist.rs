//! Zobrist hashing (spec.md §3): six incrementally-updated keys — full,
//! pawn-only, major (R+Q+K), minor (N+B+K), and per-color nonpawn — computed
//! as XORs over the same per-feature random constants so they stay mutually
//! consistent as pieces move.

use once_cell::sync::Lazy;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::types::{Color, PieceKind, Square};

pub(crate) struct ZobristKeys {
    pub(crate) piece: [[[u64; 64]; 6]; 2],
    pub(crate) side_to_move: u64,
    /// `castling[color][0 = king rook, 1 = queen rook]`.
    pub(crate) castling: [[u64; 2]; 2],
    pub(crate) en_passant_file: [u64; 8],
}

impl ZobristKeys {
    fn new() -> Self {
        // Fixed seed: keys only need to be collision-free and stable within a
        // process, not across builds.
        let mut rng = StdRng::seed_from_u64(0x5EED_C0DE_u64);
        let mut piece = [[[0u64; 64]; 6]; 2];
        for color in &mut piece {
            for kind in color.iter_mut() {
                for sq in kind.iter_mut() {
                    *sq = rng.gen();
                }
            }
        }
        let side_to_move = rng.gen();
        let mut castling = [[0u64; 2]; 2];
        for color in &mut castling {
            for side in color.iter_mut() {
                *side = rng.gen();
            }
        }
        let mut en_passant_file = [0u64; 8];
        for f in &mut en_passant_file {
            *f = rng.gen();
        }
        ZobristKeys {
            piece,
            side_to_move,
            castling,
            en_passant_file,
        }
    }
}

pub(crate) static ZOBRIST: Lazy<ZobristKeys> = Lazy::new(ZobristKeys::new);

#[inline]
pub(crate) fn piece_key(color: Color, kind: PieceKind, sq: Square) -> u64 {
    ZOBRIST.piece[color.index()][kind.index()][sq.index()]
}

#[inline]
pub(crate) fn is_major(kind: PieceKind) -> bool {
    matches!(kind, PieceKind::Rook | PieceKind::Queen | PieceKind::King)
}

#[inline]
pub(crate) fn is_minor(kind: PieceKind) -> bool {
    matches!(kind, PieceKind::Knight | PieceKind::Bishop | PieceKind::King)
}

#[inline]
pub(crate) fn is_nonpawn(kind: PieceKind) -> bool {
    !matches!(kind, PieceKind::Pawn)
}

#[inline]
pub(crate) fn castling_key(color: Color, king_side: bool) -> u64 {
    ZOBRIST.castling[color.index()][usize::from(!king_side)]
}

#[inline]
pub(crate) fn en_passant_key(file: u8) -> u64 {
    ZOBRIST.en_passant_file[file as usize]
}

#[inline]
pub(crate) fn side_to_move_key() -> u64 {
    ZOBRIST.side_to_move
}

/// Recomputes all six keys from scratch. Used by FEN parsing; make/unmake
/// maintain the keys incrementally afterwards via [`toggle_piece`] and
/// friends.
pub(crate) fn full_key(pos: &super::Position) -> u64 {
    let mut key = 0u64;
    for color in [Color::White, Color::Black] {
        for kind in crate::types::PIECE_KINDS {
            for sq in pos.pieces[color.index()][kind.index()].iter() {
                key ^= piece_key(color, kind, sq);
            }
        }
    }
    if pos.side_to_move == Color::Black {
        key ^= side_to_move_key();
    }
    if pos.castling.king_rook[Color::White.index()].is_some() {
        key ^= castling_key(Color::White, true);
    }
    if pos.castling.queen_rook[Color::White.index()].is_some() {
        key ^= castling_key(Color::White, false);
    }
    if pos.castling.king_rook[Color::Black.index()].is_some() {
        key ^= castling_key(Color::Black, true);
    }
    if pos.castling.queen_rook[Color::Black.index()].is_some() {
        key ^= castling_key(Color::Black, false);
    }
    if let Some(ep) = pos.ep_square {
        key ^= en_passant_key(ep.file());
    }
    key
}

pub(crate) fn pawn_key(pos: &super::Position) -> u64 {
    let mut key = 0u64;
    for color in [Color::White, Color::Black] {
        for sq in pos.pieces[color.index()][PieceKind::Pawn.index()].iter() {
            key ^= piece_key(color, PieceKind::Pawn, sq);
        }
    }
    key
}

pub(crate) fn major_key(pos: &super::Position) -> u64 {
    let mut key = 0u64;
    for color in [Color::White, Color::Black] {
        for kind in crate::types::PIECE_KINDS {
            if !is_major(kind) {
                continue;
            }
            for sq in pos.pieces[color.index()][kind.index()].iter() {
                key ^= piece_key(color, kind, sq);
            }
        }
    }
    key
}

pub(crate) fn minor_key(pos: &super::Position) -> u64 {
    let mut key = 0u64;
    for color in [Color::White, Color::Black] {
        for kind in crate::types::PIECE_KINDS {
            if !is_minor(kind) {
                continue;
            }
            for sq in pos.pieces[color.index()][kind.index()].iter() {
                key ^= piece_key(color, kind, sq);
            }
        }
    }
    key
}

pub(crate) fn nonpawn_key(pos: &super::Position, color: Color) -> u64 {
    let mut key = 0u64;
    for kind in crate::types::PIECE_KINDS {
        if !is_nonpawn(kind) {
            continue;
        }
        for sq in pos.pieces[color.index()][kind.index()].iter() {
            key ^= piece_key(color, kind, sq);
        }
    }
    key
}

/// Toggles `piece` on `sq` in every key it contributes to. Call once when
/// placing a piece and once when removing it (XOR is its own inverse).
pub(crate) fn toggle_piece(pos: &mut super::Position, color: Color, kind: PieceKind, sq: Square) {
    let k = piece_key(color, kind, sq);
    pos.key ^= k;
    if kind == PieceKind::Pawn {
        pos.pawn_key ^= k;
    }
    if is_major(kind) {
        pos.major_key ^= k;
    }
    if is_minor(kind) {
        pos.minor_key ^= k;
    }
    if is_nonpawn(kind) {
        pos.nonpawn_key[color.index()] ^= k;
    }
}

pub(crate) fn toggle_side_to_move(pos: &mut super::Position) {
    pos.key ^= side_to_move_key();
}

pub(crate) fn toggle_castling(pos: &mut super::Position, color: Color, king_side: bool) {
    pos.key ^= castling_key(color, king_side);
}

pub(crate) fn toggle_en_passant(pos: &mut super::Position, file: u8) {
    pos.key ^= en_passant_key(file);
}
