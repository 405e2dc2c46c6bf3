//! Coherence of the fast legality filter: `is_legal(m)` holds exactly when
//! the generator emits `m`.

use rand::prelude::*;

use crate::board::{Move, MoveKind, Piece, Position, Square};

fn random_position(rng: &mut StdRng) -> Position {
    let mut pos = Position::new();
    let length = rng.gen_range(0..60);
    for _ in 0..length {
        let moves = pos.all_moves();
        if moves.is_empty() {
            break;
        }
        pos.make(moves[rng.gen_range(0..moves.len())]);
    }
    pos
}

#[test]
fn generated_moves_pass_the_filter() {
    let mut rng = StdRng::seed_from_u64(0xf11e);
    for _ in 0..400 {
        let pos = random_position(&mut rng);
        for &m in &pos.all_moves() {
            assert!(
                pos.is_legal(m),
                "{}: generated move rejected: {m:?}",
                pos.to_fen()
            );
        }
    }
}

#[test]
fn foreign_moves_fail_the_filter() {
    // moves legal in one random position, probed against another: exactly
    // the generator's verdict must come back
    let mut rng = StdRng::seed_from_u64(0xfee1);
    let mut checked = 0usize;
    while checked < 10_000 {
        let donor = random_position(&mut rng);
        let target = random_position(&mut rng);
        let target_moves = target.all_moves();
        for &m in &donor.all_moves() {
            let expected = target_moves.contains(m);
            assert_eq!(
                target.is_legal(m),
                expected,
                "{}: filter disagrees with generator on {m:?}",
                target.to_fen()
            );
            checked += 1;
        }
    }
}

#[test]
fn synthetic_garbage_is_rejected() {
    let mut rng = StdRng::seed_from_u64(0xdead);
    for _ in 0..200 {
        let pos = random_position(&mut rng);
        let legal = pos.all_moves();
        for _ in 0..50 {
            let m = Move::new(
                Square::from_index(rng.gen_range(0..64)),
                Square::from_index(rng.gen_range(0..64)),
                Piece::from_index(rng.gen_range(0..6)),
                if rng.gen_bool(0.3) {
                    Some(Piece::from_index(rng.gen_range(0..5)))
                } else {
                    None
                },
                match rng.gen_range(0..8) {
                    0 => MoveKind::Normal,
                    1 => MoveKind::ShortCastle,
                    2 => MoveKind::LongCastle,
                    3 => MoveKind::EnPassant,
                    4 => MoveKind::PromoteQueen,
                    5 => MoveKind::PromoteRook,
                    6 => MoveKind::PromoteBishop,
                    _ => MoveKind::PromoteKnight,
                },
            );
            assert_eq!(
                pos.is_legal(m),
                legal.contains(m),
                "{}: filter disagrees on synthetic move {m:?}",
                pos.to_fen()
            );
        }
    }
}
