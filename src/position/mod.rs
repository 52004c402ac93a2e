//! Position representation and legal move generation (spec.md §3, §4.2).
//!
//! [`Position`] is a value type: `make_move` clones the current position,
//! mutates the clone, and the clone becomes the new top of the [`Game`]
//! stack. This collapses the source engine's "board wraps a stack of
//! positions, each individually mutable" layering (spec.md §9) into a single
//! owned type plus a thin stack wrapper.

pub mod fen;
pub mod make_unmake;
pub mod movegen;
pub mod see;
mod zobrist;

use crate::attacks;
use crate::bitboard::Bitboard;
use crate::types::{Color, Move, MoveList, Piece, PieceKind, Square, MAX_DEPTH};

/// Rook origin squares available for castling, per color
/// (`castlingAvailability[color] = {kingRook, queenRook}`, spec.md §3).
/// Encodes Chess960 rook files directly; standard chess is simply the case
/// where the rook files happen to be `a`/`h`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CastlingRights {
    pub king_rook: [Option<Square>; 2],
    pub queen_rook: [Option<Square>; 2],
}

impl CastlingRights {
    #[must_use]
    pub fn king_side(&self, color: Color) -> Option<Square> {
        self.king_rook[color.index()]
    }

    #[must_use]
    pub fn queen_side(&self, color: Color) -> Option<Square> {
        self.queen_rook[color.index()]
    }

    pub(crate) fn revoke_all(&mut self, color: Color) {
        self.king_rook[color.index()] = None;
        self.queen_rook[color.index()] = None;
    }

    pub(crate) fn revoke_rook(&mut self, sq: Square) {
        for color in [Color::White, Color::Black] {
            if self.king_rook[color.index()] == Some(sq) {
                self.king_rook[color.index()] = None;
            }
            if self.queen_rook[color.index()] == Some(sq) {
                self.queen_rook[color.index()] = None;
            }
        }
    }
}

#[derive(Clone, Debug)]
pub struct Position {
    pub pieces: [[Bitboard; 6]; 2],
    pub occupied: [Bitboard; 2],
    pub all_occupied: Bitboard,
    pub mailbox: [Option<Piece>; 64],

    pub side_to_move: Color,
    pub ep_square: Option<Square>,
    pub halfmove_clock: u16,
    pub fullmove_count: u16,
    pub castling: CastlingRights,

    /// Enemy pieces giving check to `side_to_move`'s king.
    pub checkers: Bitboard,
    /// Friendly pieces pinned along a rank/file.
    pub orthogonal_pins: Bitboard,
    /// Friendly pieces pinned along a diagonal.
    pub diagonal_pins: Bitboard,
    /// Squares attacked by the side *not* to move, computed with our own
    /// king removed from occupancy so sliders see through it (spec.md §4.2:
    /// `isAttackedByEnemyOnOccupancyMinusKing`).
    pub threats: Bitboard,

    pub key: u64,
    pub pawn_key: u64,
    pub major_key: u64,
    pub minor_key: u64,
    pub nonpawn_key: [u64; 2],

    /// Set when this position was reached via a null move; forbids nested
    /// null-move pruning (spec.md §3).
    pub from_null: bool,
}

impl Position {
    #[must_use]
    pub fn empty() -> Self {
        Position {
            pieces: [[Bitboard::EMPTY; 6]; 2],
            occupied: [Bitboard::EMPTY; 2],
            all_occupied: Bitboard::EMPTY,
            mailbox: [None; 64],
            side_to_move: Color::White,
            ep_square: None,
            halfmove_clock: 0,
            fullmove_count: 1,
            castling: CastlingRights::default(),
            checkers: Bitboard::EMPTY,
            orthogonal_pins: Bitboard::EMPTY,
            diagonal_pins: Bitboard::EMPTY,
            threats: Bitboard::EMPTY,
            key: 0,
            pawn_key: 0,
            major_key: 0,
            minor_key: 0,
            nonpawn_key: [0; 2],
            from_null: false,
        }
    }

    #[must_use]
    pub fn startpos() -> Self {
        fen::parse_fen(crate::START_FEN).expect("start FEN is well-formed")
    }

    #[inline]
    #[must_use]
    pub fn piece_at(&self, sq: Square) -> Option<Piece> {
        self.mailbox[sq.index()]
    }

    #[inline]
    #[must_use]
    pub fn king_square(&self, color: Color) -> Square {
        self.pieces[color.index()][PieceKind::King.index()]
            .lsb()
            .expect("exactly one king per color")
    }

    #[inline]
    #[must_use]
    pub fn in_check(&self) -> bool {
        !self.checkers.is_empty()
    }

    pub(crate) fn set_piece(&mut self, sq: Square, piece: Piece) {
        let bb = Bitboard::from_square(sq);
        self.pieces[piece.color.index()][piece.kind.index()] |= bb;
        self.occupied[piece.color.index()] |= bb;
        self.all_occupied |= bb;
        self.mailbox[sq.index()] = Some(piece);
    }

    pub(crate) fn remove_piece(&mut self, sq: Square, piece: Piece) {
        let bb = Bitboard::from_square(sq);
        self.pieces[piece.color.index()][piece.kind.index()] &= !bb;
        self.occupied[piece.color.index()] &= !bb;
        self.all_occupied &= !bb;
        self.mailbox[sq.index()] = None;
    }

    /// All pieces of `by_color` attacking `sq` given `occ`.
    #[must_use]
    pub fn attackers_to(&self, sq: Square, occ: Bitboard, by_color: Color) -> Bitboard {
        let idx = by_color.index();
        let pawns = self.pieces[idx][PieceKind::Pawn.index()];
        let knights = self.pieces[idx][PieceKind::Knight.index()];
        let bishops = self.pieces[idx][PieceKind::Bishop.index()] | self.pieces[idx][PieceKind::Queen.index()];
        let rooks = self.pieces[idx][PieceKind::Rook.index()] | self.pieces[idx][PieceKind::Queen.index()];
        let king = self.pieces[idx][PieceKind::King.index()];

        let mut attackers = attacks::pawn_attacks(by_color.opposite(), sq) & pawns;
        attackers |= attacks::knight_attacks(sq) & knights;
        attackers |= attacks::bishop_attacks(sq, occ) & bishops;
        attackers |= attacks::rook_attacks(sq, occ) & rooks;
        attackers |= attacks::king_attacks(sq) & king;
        attackers
    }

    #[must_use]
    pub fn is_square_attacked(&self, sq: Square, by_color: Color, occ: Bitboard) -> bool {
        !self.attackers_to(sq, occ, by_color).is_empty()
    }

    /// All squares attacked by `by_color` given `occ` (used to build
    /// `threats`). O(pieces), allocation-free.
    #[must_use]
    pub fn attacked_squares(&self, by_color: Color, occ: Bitboard) -> Bitboard {
        let idx = by_color.index();
        let mut out = Bitboard::EMPTY;
        for sq in self.pieces[idx][PieceKind::Pawn.index()].iter() {
            out |= attacks::pawn_attacks(by_color, sq);
        }
        for sq in self.pieces[idx][PieceKind::Knight.index()].iter() {
            out |= attacks::knight_attacks(sq);
        }
        for sq in (self.pieces[idx][PieceKind::Bishop.index()] | self.pieces[idx][PieceKind::Queen.index()]).iter() {
            out |= attacks::bishop_attacks(sq, occ);
        }
        for sq in (self.pieces[idx][PieceKind::Rook.index()] | self.pieces[idx][PieceKind::Queen.index()]).iter() {
            out |= attacks::rook_attacks(sq, occ);
        }
        for sq in self.pieces[idx][PieceKind::King.index()].iter() {
            out |= attacks::king_attacks(sq);
        }
        out
    }

    /// Recomputes `checkers`, `orthogonal_pins`, `diagonal_pins`, `threats`
    /// for the current `side_to_move`. Called after every make/unmake/null
    /// move (spec.md §4.2).
    pub(crate) fn recompute_masks(&mut self) {
        let us = self.side_to_move;
        let them = us.opposite();
        let king_sq = self.king_square(us);

        self.checkers = self.attackers_to(king_sq, self.all_occupied, them);

        self.orthogonal_pins = Bitboard::EMPTY;
        self.diagonal_pins = Bitboard::EMPTY;

        let their_rooks = self.pieces[them.index()][PieceKind::Rook.index()]
            | self.pieces[them.index()][PieceKind::Queen.index()];
        let their_bishops = self.pieces[them.index()][PieceKind::Bishop.index()]
            | self.pieces[them.index()][PieceKind::Queen.index()];

        // A slider x-rays the king through exactly one of our own pieces iff
        // it attacks the king on an empty-of-us board but the real occupancy
        // has exactly one of our pieces between them.
        let pseudo_rook_from_king = attacks::rook_attacks(king_sq, self.occupied[them.index()]);
        for sq in (pseudo_rook_from_king & their_rooks).iter() {
            let between = attacks::ray_between(king_sq, sq) & self.occupied[us.index()];
            if between.popcount() == 1 {
                self.orthogonal_pins |= between;
            }
        }
        let pseudo_bishop_from_king = attacks::bishop_attacks(king_sq, self.occupied[them.index()]);
        for sq in (pseudo_bishop_from_king & their_bishops).iter() {
            let between = attacks::ray_between(king_sq, sq) & self.occupied[us.index()];
            if between.popcount() == 1 {
                self.diagonal_pins |= between;
            }
        }

        let occ_minus_king = self.all_occupied & !Bitboard::from_square(king_sq);
        self.threats = self.attacked_squares(them, occ_minus_king);
    }

    #[must_use]
    pub fn generate_moves(&self) -> MoveList {
        let mut list = MoveList::new();
        movegen::generate(self, &mut list, false);
        list
    }

    #[must_use]
    pub fn generate_captures(&self) -> MoveList {
        let mut list = MoveList::new();
        movegen::generate(self, &mut list, true);
        list
    }

    #[must_use]
    pub fn is_legal(&self, mv: Move) -> bool {
        self.generate_moves().contains(mv)
    }

    #[must_use]
    pub fn is_checkmate(&self) -> bool {
        self.in_check() && self.generate_moves().is_empty()
    }

    #[must_use]
    pub fn is_stalemate(&self) -> bool {
        !self.in_check() && self.generate_moves().is_empty()
    }

    #[must_use]
    pub fn is_insufficient_material(&self) -> bool {
        let white = Color::White.index();
        let black = Color::Black.index();
        let pawns = self.pieces[white][PieceKind::Pawn.index()] | self.pieces[black][PieceKind::Pawn.index()];
        let rooks = self.pieces[white][PieceKind::Rook.index()] | self.pieces[black][PieceKind::Rook.index()];
        let queens = self.pieces[white][PieceKind::Queen.index()] | self.pieces[black][PieceKind::Queen.index()];
        if !pawns.is_empty() || !rooks.is_empty() || !queens.is_empty() {
            return false;
        }
        let knights = (self.pieces[white][PieceKind::Knight.index()] | self.pieces[black][PieceKind::Knight.index()]).popcount();
        let bishops_bb = self.pieces[white][PieceKind::Bishop.index()] | self.pieces[black][PieceKind::Bishop.index()];
        let bishops = bishops_bb.popcount();
        let minors = knights + bishops;
        if minors <= 1 {
            return true;
        }
        if knights == 0 && bishops == 2 {
            const LIGHT: u64 = 0x55AA_55AA_55AA_55AA;
            const DARK: u64 = 0xAA55_AA55_AA55_AA55;
            return (bishops_bb.0 & LIGHT == 0) || (bishops_bb.0 & DARK == 0);
        }
        false
    }
}

impl Default for Position {
    fn default() -> Self {
        Position::startpos()
    }
}

/// Owned game history (spec.md §3 "Game history"): an ordered stack of
/// positions. Only the top is mutable; previous entries serve repetition
/// detection. Depth bounded by `MAX_DEPTH`.
#[derive(Clone)]
pub struct Game {
    stack: Vec<Position>,
}

impl Game {
    #[must_use]
    pub fn new(start: Position) -> Self {
        let mut stack = Vec::with_capacity(MAX_DEPTH + 1);
        stack.push(start);
        Game { stack }
    }

    #[must_use]
    pub fn startpos() -> Self {
        Game::new(Position::startpos())
    }

    #[inline]
    #[must_use]
    pub fn current(&self) -> &Position {
        self.stack.last().expect("game stack is never empty")
    }

    #[inline]
    pub fn current_mut(&mut self) -> &mut Position {
        self.stack.last_mut().expect("game stack is never empty")
    }

    #[inline]
    #[must_use]
    pub fn ply(&self) -> usize {
        self.stack.len() - 1
    }

    pub fn make_move(&mut self, mv: Move) {
        let mut next = self.current().clone();
        make_unmake::make_move(&mut next, mv);
        self.stack.push(next);
    }

    pub fn make_null_move(&mut self) {
        let mut next = self.current().clone();
        make_unmake::make_null_move(&mut next);
        self.stack.push(next);
    }

    pub fn unmake_move(&mut self) {
        self.stack.pop();
        debug_assert!(!self.stack.is_empty(), "unmake popped below game start");
    }

    /// Threefold/twofold repetition against the retained history, scanning
    /// back in steps of two plies (same side to move) as far as the
    /// halfmove clock allows irreversibility (spec.md §8 "Repetition").
    #[must_use]
    pub fn repetition_count(&self) -> u32 {
        let cur = self.current();
        let limit = cur.halfmove_clock as usize;
        let mut count = 1;
        let mut idx = self.stack.len().wrapping_sub(3);
        let mut steps_back = 2usize;
        while steps_back <= limit && idx < self.stack.len() {
            if self.stack[idx].key == cur.key {
                count += 1;
            }
            if idx < 2 {
                break;
            }
            idx -= 2;
            steps_back += 2;
        }
        count
    }

    #[must_use]
    pub fn is_draw(&self) -> bool {
        let cur = self.current();
        cur.halfmove_clock >= 100 || self.repetition_count() >= 3 || cur.is_insufficient_material()
    }

    pub fn reset(&mut self, start: Position) {
        self.stack.clear();
        self.stack.push(start);
    }
}
