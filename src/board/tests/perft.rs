//! Perft: the move generator must reproduce the standard node counts.

use crate::board::Position;

struct PerftPosition {
    name: &'static str,
    fen: &'static str,
    depths: &'static [(usize, u64)],
}

const FAST_POSITIONS: &[PerftPosition] = &[
    PerftPosition {
        name: "startpos",
        fen: "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1",
        depths: &[(1, 20), (2, 400), (3, 8_902), (4, 197_281), (5, 4_865_609)],
    },
    PerftPosition {
        name: "kiwipete",
        fen: "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1",
        depths: &[(1, 48), (2, 2_039), (3, 97_862), (4, 4_085_603)],
    },
    PerftPosition {
        name: "endgame pins",
        fen: "8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 w - - 0 1",
        depths: &[(1, 14), (2, 191), (3, 2_812), (4, 43_238), (5, 674_624)],
    },
    PerftPosition {
        name: "promotion tangle",
        fen: "r3k2r/Pppp1ppp/1b3nbN/nP6/BBP1P3/q4N2/Pp1P2PP/R2Q1RK1 w kq - 0 1",
        depths: &[(1, 6), (2, 264), (3, 9_467), (4, 422_333)],
    },
    PerftPosition {
        name: "talkchess bug catcher",
        fen: "rnbq1k1r/pp1Pbppp/2p5/8/2B5/8/PPP1NnPP/RNBQK2R w KQ - 1 8",
        depths: &[(1, 44), (2, 1_486), (3, 62_379), (4, 2_103_487)],
    },
    PerftPosition {
        name: "en passant discovered check",
        fen: "8/8/8/KP1pP2r/8/8/8/7k w - d6 0 1",
        depths: &[(1, 7)],
    },
    PerftPosition {
        name: "underpromotions",
        fen: "n1n5/PPPk4/8/8/8/8/4Kppp/5N1N b - - 0 1",
        depths: &[(1, 24), (2, 496), (3, 9_483)],
    },
    PerftPosition {
        name: "castling rights",
        fen: "r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 0 1",
        depths: &[(1, 26), (2, 568), (3, 13_744), (4, 314_346)],
    },
];

#[test]
fn fast_perft_suite() {
    for position in FAST_POSITIONS {
        let mut pos = Position::from_fen(position.fen).expect("valid fen");
        for &(depth, expected) in position.depths {
            let nodes = pos.perft(depth);
            assert_eq!(
                nodes, expected,
                "perft mismatch for '{}' at depth {depth}: expected {expected}, got {nodes}",
                position.name
            );
        }
        pos.validate();
    }
}

// The full reference totals take minutes in a debug build; run with
// `cargo test --release -- --ignored` when touching the move generator.

#[test]
#[ignore]
fn startpos_depth_6() {
    let mut pos = Position::new();
    assert_eq!(pos.perft(6), 119_060_324);
}

#[test]
#[ignore]
fn kiwipete_depth_5() {
    let mut pos =
        Position::from_fen("r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1")
            .expect("valid fen");
    assert_eq!(pos.perft(5), 193_690_690);
}

#[test]
#[ignore]
fn endgame_depth_6() {
    let mut pos = Position::from_fen("8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 w - - 0 1")
        .expect("valid fen");
    assert_eq!(pos.perft(6), 11_030_083);
}

#[test]
#[ignore]
fn promotion_tangle_depth_5() {
    let mut pos = Position::from_fen(
        "r3k2r/Pppp1ppp/1b3nbN/nP6/BBP1P3/q4N2/Pp1P2PP/R2Q1RK1 w kq - 0 1",
    )
    .expect("valid fen");
    assert_eq!(pos.perft(5), 15_833_292);
}
