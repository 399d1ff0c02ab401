//! Tests for chess rules and end-of-game detection.

use strictly_chess::{
    Color, GameState, MoveError, MoveRequest, Outcome, Piece, PieceKind, Position,
};

fn sq(name: &str) -> Position {
    Position::parse(name).expect("valid square")
}

fn mv(from: &str, to: &str) -> MoveRequest {
    MoveRequest::from_to(sq(from), sq(to))
}

fn play(game: &mut GameState, moves: &[(&str, &str)]) {
    for (from, to) in moves {
        game.make_move(&mv(from, to))
            .unwrap_or_else(|e| panic!("{}{} should be legal: {}", from, to, e));
    }
}

fn piece(kind: PieceKind, color: Color, square: &str) -> Piece {
    Piece::new(kind, color, sq(square))
}

#[test]
fn test_turn_alternates() {
    let mut game = GameState::new();
    assert_eq!(game.turn(), Color::White);
    play(&mut game, &[("e2", "e4")]);
    assert_eq!(game.turn(), Color::Black);
    play(&mut game, &[("e7", "e5")]);
    assert_eq!(game.turn(), Color::White);
    assert_eq!(game.history().len(), 2);
}

#[test]
fn test_preconditions() {
    let mut game = GameState::new();
    assert_eq!(
        game.make_move(&mv("e4", "e5")),
        Err(MoveError::InvalidSelection(sq("e4")))
    );
    assert_eq!(
        game.make_move(&mv("e7", "e5")),
        Err(MoveError::WrongTurn(Color::White))
    );
    assert_eq!(game.turn(), Color::White);
    assert!(game.history().is_empty());
}

#[test]
fn test_twenty_opening_moves() {
    let game = GameState::new();
    assert_eq!(game.legal_moves(Color::White).len(), 20);
}

#[test]
fn test_pinned_piece_cannot_move() {
    let mut game = GameState::from_pieces(
        [
            piece(PieceKind::King, Color::White, "e1"),
            piece(PieceKind::Bishop, Color::White, "e2"),
            piece(PieceKind::Rook, Color::Black, "e8"),
            piece(PieceKind::King, Color::Black, "h8"),
        ],
        Color::White,
    )
    .expect("valid setup");

    assert_eq!(game.make_move(&mv("e2", "d3")), Err(MoveError::KingInCheck));
    assert!(game.piece_at(sq("e2")).is_some());
}

#[test]
fn test_capturing_one_checker_leaves_the_other() {
    let mut game = GameState::from_pieces(
        [
            piece(PieceKind::King, Color::White, "e1"),
            piece(PieceKind::Knight, Color::White, "c2"),
            piece(PieceKind::Rook, Color::Black, "e8"),
            piece(PieceKind::Bishop, Color::Black, "b4"),
            piece(PieceKind::King, Color::Black, "h8"),
        ],
        Color::White,
    )
    .expect("valid setup");

    assert!(game.is_in_check(Color::White));
    assert_eq!(game.make_move(&mv("c2", "b4")), Err(MoveError::KingInCheck));
    assert!(game.make_move(&mv("e1", "f2")).is_ok());
}

#[test]
fn test_move_ignoring_check_is_rejected() {
    let mut game = GameState::new();
    play(&mut game, &[("e2", "e4"), ("e7", "e6"), ("d2", "d4"), ("f8", "b4")]);
    assert!(game.is_in_check(Color::White));

    assert_eq!(game.make_move(&mv("a2", "a3")), Err(MoveError::KingInCheck));
    assert_eq!(game.turn(), Color::White);
    play(&mut game, &[("c2", "c3")]);
    assert_eq!(game.turn(), Color::Black);
}

#[test]
fn test_kingside_castle_moves_rook() {
    let mut game = GameState::new();
    play(
        &mut game,
        &[("e2", "e4"), ("e7", "e5"), ("g1", "f3"), ("b8", "c6"), ("f1", "c4"), ("g8", "f6")],
    );
    play(&mut game, &[("e1", "g1")]);

    let rook = game.piece_at(sq("f1")).expect("rook on f1");
    assert_eq!(rook.kind(), PieceKind::Rook);
    assert_eq!(game.king_position(Color::White), sq("g1"));
    assert!(game.piece_at(sq("h1")).is_none());
}

#[test]
fn test_castle_through_check_rejected() {
    let mut game = GameState::from_pieces(
        [
            piece(PieceKind::King, Color::White, "e1"),
            piece(PieceKind::Rook, Color::White, "h1"),
            piece(PieceKind::Rook, Color::Black, "f8"),
            piece(PieceKind::King, Color::Black, "a8"),
        ],
        Color::White,
    )
    .expect("valid setup");

    assert_eq!(
        game.make_move(&mv("e1", "g1")),
        Err(MoveError::CastlingNotAllowed("king passes through check"))
    );
}

#[test]
fn test_castle_after_king_moved_rejected() {
    let mut game = GameState::from_pieces(
        [
            piece(PieceKind::King, Color::White, "e1").with_moved(),
            piece(PieceKind::Rook, Color::White, "h1"),
            piece(PieceKind::King, Color::Black, "a8"),
        ],
        Color::White,
    )
    .expect("valid setup");

    assert_eq!(
        game.make_move(&mv("e1", "g1")),
        Err(MoveError::CastlingNotAllowed("king has moved"))
    );
}

#[test]
fn test_en_passant_only_immediately() {
    let mut game = GameState::new();
    play(&mut game, &[("e2", "e4"), ("a7", "a6"), ("e4", "e5"), ("d7", "d5")]);

    let mut capture_now = game.clone();
    play(&mut capture_now, &[("e5", "d6")]);
    assert!(capture_now.piece_at(sq("d5")).is_none(), "captured pawn removed");

    play(&mut game, &[("h2", "h3"), ("h7", "h6")]);
    assert_eq!(
        game.make_move(&mv("e5", "d6")),
        Err(MoveError::IllegalPattern(PieceKind::Pawn))
    );
}

#[test]
fn test_promotion_requires_kind() {
    let mut game = GameState::from_pieces(
        [
            piece(PieceKind::King, Color::White, "e1"),
            piece(PieceKind::Pawn, Color::White, "a7"),
            piece(PieceKind::King, Color::Black, "h8"),
        ],
        Color::White,
    )
    .expect("valid setup");

    assert_eq!(game.make_move(&mv("a7", "a8")), Err(MoveError::PromotionRequired));
    assert_eq!(
        game.make_move(&mv("a7", "a8").promoting_to(PieceKind::King)),
        Err(MoveError::InvalidPromotion(PieceKind::King))
    );
    game.make_move(&mv("a7", "a8").promoting_to(PieceKind::Queen))
        .expect("promotion is legal");
    let queen = game.piece_at(sq("a8")).expect("queen on a8");
    assert_eq!(queen.kind(), PieceKind::Queen);
}

#[test]
fn test_fools_mate() {
    let mut game = GameState::new();
    play(&mut game, &[("f2", "f3"), ("e7", "e5"), ("g2", "g4"), ("d8", "h4")]);

    assert!(game.is_over());
    assert_eq!(game.result(), Some(Outcome::Winner(Color::Black)));
    assert_eq!(game.make_move(&mv("a2", "a3")), Err(MoveError::GameOver));
}

#[test]
fn test_stalemate_is_draw() {
    let mut game = GameState::from_pieces(
        [
            piece(PieceKind::King, Color::White, "b6"),
            piece(PieceKind::Queen, Color::White, "d6"),
            piece(PieceKind::King, Color::Black, "a8"),
        ],
        Color::White,
    )
    .expect("valid setup");

    play(&mut game, &[("d6", "c7")]);
    assert!(!game.is_in_check(Color::Black));
    assert_eq!(game.result(), Some(Outcome::Draw));
}

#[test]
fn test_threefold_repetition_on_third_occurrence() {
    let shuffle = [("g1", "f3"), ("g8", "f6"), ("f3", "g1"), ("f6", "g8")];
    let mut game = GameState::new();
    assert_eq!(game.repetitions(), 1);

    play(&mut game, &shuffle);
    assert_eq!(game.repetitions(), 2);
    assert!(!game.is_over(), "second occurrence is not a draw");

    play(&mut game, &shuffle[..3]);
    assert!(!game.is_over());
    play(&mut game, &shuffle[3..]);
    assert_eq!(game.repetitions(), 3);
    assert_eq!(game.result(), Some(Outcome::Draw));
}

#[test]
fn test_repetition_counts_distinguish_castling_rights() {
    let mut game = GameState::from_pieces(
        [
            piece(PieceKind::King, Color::White, "e1"),
            piece(PieceKind::Rook, Color::White, "h1"),
            piece(PieceKind::King, Color::Black, "e8"),
        ],
        Color::White,
    )
    .expect("valid setup");
    let start = game.encode().expect("encodable");

    play(&mut game, &[("h1", "h2"), ("e8", "d8"), ("h2", "h1"), ("d8", "e8")]);
    assert_ne!(game.encode().expect("encodable"), start, "rook lost castling rights");
    assert_eq!(game.repetitions(), 1);
}

#[test]
fn test_repetition_after_kings_moved_draws() {
    let mut game = GameState::from_pieces(
        [
            piece(PieceKind::King, Color::White, "e1").with_moved(),
            piece(PieceKind::Rook, Color::White, "h1"),
            piece(PieceKind::King, Color::Black, "e8").with_moved(),
        ],
        Color::White,
    )
    .expect("valid setup");
    let cycle = [("h1", "h2"), ("e8", "d8"), ("h2", "h1"), ("d8", "e8")];

    // The rook moving changes no rights once its king has moved.
    play(&mut game, &cycle);
    assert_eq!(game.repetitions(), 2);
    assert!(!game.is_over());

    play(&mut game, &cycle);
    assert_eq!(game.repetitions(), 3);
    assert_eq!(game.result(), Some(Outcome::Draw));
}

fn en_passant_setup(black_pawn: &str, turn: Color, pinned: bool) -> GameState {
    let mut pieces = vec![
        piece(PieceKind::King, Color::White, "a5"),
        piece(PieceKind::Pawn, Color::White, "e5"),
        piece(PieceKind::King, Color::Black, "h8"),
        piece(PieceKind::Pawn, Color::Black, black_pawn),
    ];
    if pinned {
        pieces.push(piece(PieceKind::Rook, Color::Black, "h5"));
    }
    GameState::from_pieces(pieces, turn).expect("valid setup")
}

#[test]
fn test_illegal_en_passant_does_not_change_position_identity() {
    let mut game = en_passant_setup("d7", Color::Black, true);
    play(&mut game, &[("d7", "d5")]);

    assert!(!game.legal_moves(Color::White).contains(&mv("e5", "d6")));
    let reached = en_passant_setup("d5", Color::White, true);
    assert_eq!(
        game.encode().expect("encodable"),
        reached.encode().expect("encodable")
    );
}

#[test]
fn test_legal_en_passant_changes_position_identity() {
    let mut game = en_passant_setup("d7", Color::Black, false);
    play(&mut game, &[("d7", "d5")]);

    assert!(game.legal_moves(Color::White).contains(&mv("e5", "d6")));
    let reached = en_passant_setup("d5", Color::White, false);
    assert_ne!(
        game.encode().expect("encodable"),
        reached.encode().expect("encodable")
    );
}

#[test]
fn test_prepare_does_not_mutate() {
    let game = GameState::new();
    let prepared = game.prepare(&mv("e2", "e4")).expect("legal");
    assert_eq!(prepared.outcome(), None);
    assert!(game.piece_at(sq("e2")).is_some());
    assert_eq!(game.turn(), Color::White);
}

#[test]
fn test_stale_prepared_move_rejected() {
    let mut game = GameState::new();
    let prepared = game.prepare(&mv("e2", "e4")).expect("legal");
    play(&mut game, &[("d2", "d4")]);
    assert_eq!(game.commit(prepared), Err(MoveError::Stale));
}

#[test]
fn test_only_king_and_material() {
    let game = GameState::from_pieces(
        [
            piece(PieceKind::King, Color::White, "e1"),
            piece(PieceKind::King, Color::Black, "e8"),
            piece(PieceKind::Rook, Color::Black, "a8"),
        ],
        Color::White,
    )
    .expect("valid setup");

    assert!(game.only_king(Color::White));
    assert!(!game.only_king(Color::Black));
    assert_eq!(game.point_advantage(Color::Black), 5);
    assert_eq!(GameState::new().point_advantage(Color::White), 0);
}

#[test]
fn test_conclude_is_monotonic() {
    let mut game = GameState::without_pawns();
    assert!(game.conclude(Outcome::Winner(Color::Black)));
    assert!(!game.conclude(Outcome::Draw));
    assert_eq!(game.result(), Some(Outcome::Winner(Color::Black)));
}
