//! Occupancy-aware path planning.
//!
//! A requested move is classified by its absolute file/rank deltas into
//! straight, diagonal or knight. Straight and diagonal moves drag the
//! piece directly; knight moves route around occupied squares, falling
//! back to travel along square boundaries when no corner path is clear.
//! A capture first drags the captured piece off the board via the
//! nearest edges.
//!
//! Plans are expressed as absolute start positions plus relative legs in
//! half-square units; every leg is later bracketed by the magnet
//! handshake when executed.

use heapless::Vec;

use caissa_protocol::{Move, Square};

use crate::board::Occupancy;
use crate::motion::mapper::{CoordinateMapper, GridPos};

/// Maximum legs in one route (edge travel needs three).
pub const MAX_LEGS: usize = 4;

/// Move shape by absolute deltas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MoveKind {
    /// One axis only
    Straight,
    /// Equal deltas, both axes interpolated together
    Diagonal,
    /// (1,2) or (2,1)
    Knight,
}

/// Errors produced while planning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PlanError {
    /// Deltas match no supported move shape
    UnsupportedShape,
}

/// One relative stroke in half-square units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Leg {
    pub dx_half: i16,
    pub dy_half: i16,
}

impl Leg {
    pub const fn new(dx_half: i16, dy_half: i16) -> Self {
        Self { dx_half, dy_half }
    }

    /// A leg that moves both axes is executed with synchronized
    /// interpolation.
    pub fn is_diagonal(&self) -> bool {
        self.dx_half != 0 && self.dy_half != 0
    }
}

/// An absolute start position and the legs dragged from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    /// Where the magnet engages
    pub start: GridPos,
    pub legs: Vec<Leg, MAX_LEGS>,
}

impl Route {
    fn from_waypoints(points: &[GridPos]) -> Self {
        let mut legs = Vec::new();
        for pair in points.windows(2) {
            let (dx, dy) = pair[0].delta_to(pair[1]);
            if dx != 0 || dy != 0 {
                // Waypoint lists are short by construction.
                let _ = legs.push(Leg::new(dx, dy));
            }
        }
        Self {
            start: points[0],
            legs,
        }
    }

    /// Position of the head after the last leg.
    pub fn end(&self) -> GridPos {
        let mut pos = self.start;
        for leg in &self.legs {
            pos = pos.offset(leg.dx_half, leg.dy_half);
        }
        pos
    }
}

/// A complete plan for one requested move.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovePlan {
    /// Capture-removal route, executed first when the destination is
    /// occupied: from the destination square to an off-board parking
    /// spot via the nearest board edges.
    pub removal: Option<Route>,
    /// The move itself, from source to destination.
    pub main: Route,
}

/// Classify a move by its absolute deltas.
pub fn classify(mv: Move) -> Result<MoveKind, PlanError> {
    match mv.deltas() {
        (0, _) | (_, 0) => Ok(MoveKind::Straight),
        (df, dr) if df == dr => Ok(MoveKind::Diagonal),
        (1, 2) | (2, 1) => Ok(MoveKind::Knight),
        _ => Err(PlanError::UnsupportedShape),
    }
}

/// Occupancy-aware path planner.
#[derive(Debug, Clone, Copy, Default)]
pub struct PathPlanner;

impl PathPlanner {
    /// Plan a move against the current occupancy model.
    ///
    /// The occupancy must reflect the board before the move: the source
    /// square occupied, and the destination occupied only for captures.
    pub fn plan(&self, mv: Move, board: &Occupancy) -> Result<MovePlan, PlanError> {
        let kind = classify(mv)?;

        let removal = if board.get(mv.to) {
            Some(Self::removal_route(mv.to))
        } else {
            None
        };

        let main = match kind {
            MoveKind::Straight | MoveKind::Diagonal => Self::direct_route(mv),
            MoveKind::Knight => Self::knight_route(mv, board),
        };

        Ok(MovePlan { removal, main })
    }

    /// Straight and diagonal moves are a single drag.
    fn direct_route(mv: Move) -> Route {
        let from = CoordinateMapper::square_to_grid(mv.from);
        let to = CoordinateMapper::square_to_grid(mv.to);
        Route::from_waypoints(&[from, to])
    }

    /// Knight routing: corner path when the rectangle is clear, edge
    /// travel otherwise.
    fn knight_route(mv: Move, board: &Occupancy) -> Route {
        let (long_corner, short_corner) = Self::knight_corners(mv);

        // Any occupied square in the spanning rectangle other than
        // source, destination and the two corner cells makes a corner
        // path unsafe regardless of corner status: both L-paths cross
        // the rectangle interior.
        if Self::rectangle_blocked(mv, board) {
            return Self::edge_route(mv);
        }

        // Prefer the longer axis first; it minimizes drag distance on
        // the second stroke.
        for corner in [long_corner, short_corner] {
            if !board.get(corner) {
                let from = CoordinateMapper::square_to_grid(mv.from);
                let via = CoordinateMapper::square_to_grid(corner);
                let to = CoordinateMapper::square_to_grid(mv.to);
                return Route::from_waypoints(&[from, via, to]);
            }
        }

        Self::edge_route(mv)
    }

    /// The two L-path corner squares, longer-axis-first corner first.
    fn knight_corners(mv: Move) -> (Square, Square) {
        let (df, _) = mv.deltas();
        // Corner reached by moving along the file axis first.
        let file_first = Square::new(mv.to.file(), mv.from.rank());
        // Corner reached by moving along the rank axis first.
        let rank_first = Square::new(mv.from.file(), mv.to.rank());
        match (file_first, rank_first) {
            (Some(a), Some(b)) => {
                if df == 2 {
                    (a, b)
                } else {
                    (b, a)
                }
            }
            // Squares derived from two valid squares stay on the board.
            _ => (mv.from, mv.to),
        }
    }

    /// Check the spanning rectangle, excluding source, destination and
    /// the corner cells (those are judged separately).
    fn rectangle_blocked(mv: Move, board: &Occupancy) -> bool {
        let (c1, c2) = Self::knight_corners(mv);
        let min_file = mv.from.file().min(mv.to.file());
        let max_file = mv.from.file().max(mv.to.file());
        let min_rank = mv.from.rank().min(mv.to.rank());
        let max_rank = mv.from.rank().max(mv.to.rank());

        for file in min_file..=max_file {
            for rank in min_rank..=max_rank {
                let Some(square) = Square::new(file, rank) else {
                    continue;
                };
                if square == mv.from || square == mv.to || square == c1 || square == c2 {
                    continue;
                }
                if board.get(square) {
                    return true;
                }
            }
        }
        false
    }

    /// Edge travel: half a square toward the shorter leg onto a square
    /// boundary, the full orthogonal distance along that boundary, then
    /// the closing half-square. The piece only ever crosses square
    /// boundaries, never the interior of another square.
    fn edge_route(mv: Move) -> Route {
        let from = CoordinateMapper::square_to_grid(mv.from);
        let to = CoordinateMapper::square_to_grid(mv.to);
        let (dx, dy) = from.delta_to(to);
        let (df, _) = mv.deltas();

        let points = if df == 1 {
            // File is the shorter leg: slide onto the file boundary.
            let step_x = dx.signum();
            [
                from,
                from.offset(step_x, 0),
                GridPos::new(from.x + step_x, to.y),
                to,
            ]
        } else {
            // Rank is the shorter leg: slide onto the rank boundary.
            let step_y = dy.signum();
            [
                from,
                from.offset(0, step_y),
                GridPos::new(to.x, from.y + step_y),
                to,
            ]
        };
        Route::from_waypoints(&points)
    }

    /// Capture removal: vertically to the closer top/bottom board edge,
    /// along it toward the closer side, and one half-square off the
    /// board.
    fn removal_route(captured: Square) -> Route {
        let start = CoordinateMapper::square_to_grid(captured);

        // Board edges sit at grid 0 and 16 on both axes.
        let edge_y: i16 = if start.y <= 8 { 0 } else { 16 };
        let off_x: i16 = if start.x <= 8 { -1 } else { 17 };

        Route::from_waypoints(&[
            start,
            GridPos::new(start.x, edge_y),
            GridPos::new(off_x, edge_y),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sq(s: &str) -> Square {
        let b = s.as_bytes();
        Square::parse(b[0], b[1]).unwrap()
    }

    fn mv(s: &str) -> Move {
        Move::parse(s).unwrap()
    }

    fn grid(s: &str) -> GridPos {
        CoordinateMapper::square_to_grid(sq(s))
    }

    #[test]
    fn test_classification() {
        assert_eq!(classify(mv("e2-e4")), Ok(MoveKind::Straight));
        assert_eq!(classify(mv("a1-h1")), Ok(MoveKind::Straight));
        assert_eq!(classify(mv("c1-g5")), Ok(MoveKind::Diagonal));
        assert_eq!(classify(mv("g1-f3")), Ok(MoveKind::Knight));
        assert_eq!(classify(mv("b1-c3")), Ok(MoveKind::Knight));
        assert_eq!(classify(mv("a1-b4")), Err(PlanError::UnsupportedShape));
    }

    #[test]
    fn test_straight_move_single_leg() {
        let board = Occupancy::starting_position();
        let plan = PathPlanner.plan(mv("e2-e4"), &board).unwrap();
        assert!(plan.removal.is_none());
        assert_eq!(plan.main.start, grid("e2"));
        assert_eq!(plan.main.legs.as_slice(), &[Leg::new(0, 4)]);
        assert_eq!(plan.main.end(), grid("e4"));
    }

    #[test]
    fn test_diagonal_move_single_interpolated_leg() {
        let mut board = Occupancy::starting_position();
        board.apply_move(mv("d2-d4"));
        board.apply_move(mv("d7-d6"));
        let plan = PathPlanner.plan(mv("c1-g5"), &board).unwrap();
        let legs = plan.main.legs.as_slice();
        assert_eq!(legs.len(), 1);
        assert!(legs[0].is_diagonal());
        // c -> g runs toward the switch side on the mirrored x axis.
        assert_eq!(legs[0], Leg::new(-8, 8));
        assert_eq!(plan.main.end(), grid("g5"));
    }

    #[test]
    fn test_knight_prefers_longer_axis_first() {
        // Empty rectangle: g1-f3 should go rank-first through g3.
        let mut board = Occupancy::empty();
        board.set(sq("g1"));
        let plan = PathPlanner.plan(mv("g1-f3"), &board).unwrap();
        assert_eq!(plan.main.start, grid("g1"));
        assert_eq!(
            plan.main.legs.as_slice(),
            &[Leg::new(0, 4), Leg::new(2, 0)],
            "route must pass through g3"
        );
    }

    #[test]
    fn test_knight_file_long_axis() {
        // b1-d2: file delta 2 is the longer axis, corner is d1.
        let mut board = Occupancy::empty();
        board.set(sq("b1"));
        let plan = PathPlanner.plan(mv("b1-d2"), &board).unwrap();
        let via = grid("d1");
        assert_eq!(plan.main.legs.as_slice().len(), 2);
        assert_eq!(
            plan.main.start.offset(
                plan.main.legs[0].dx_half,
                plan.main.legs[0].dy_half
            ),
            via
        );
    }

    #[test]
    fn test_knight_falls_back_to_free_corner() {
        // g1-f3 with g3 occupied: f1 corner path is the fallback.
        let mut board = Occupancy::empty();
        board.set(sq("g1"));
        board.set(sq("g3"));
        let plan = PathPlanner.plan(mv("g1-f3"), &board).unwrap();
        assert_eq!(
            plan.main.legs.as_slice(),
            &[Leg::new(2, 0), Leg::new(0, 4)],
            "route must pass through f1"
        );
    }

    #[test]
    fn test_knight_blocked_rectangle_forces_edge_travel() {
        // g2 occupied blocks both L-paths even though f1 and g3 are
        // free: the route must stay on square boundaries.
        let mut board = Occupancy::empty();
        board.set(sq("g1"));
        board.set(sq("g2"));
        let plan = PathPlanner.plan(mv("g1-f3"), &board).unwrap();
        assert_eq!(
            plan.main.legs.as_slice(),
            &[Leg::new(1, 0), Leg::new(0, 4), Leg::new(1, 0)]
        );
        assert_eq!(plan.main.end(), grid("f3"));
    }

    #[test]
    fn test_knight_both_corners_occupied_edge_travel() {
        // Both corner cells of b1-c3 (b3 rank-first, c1 file-first)
        // occupied, rectangle otherwise clear.
        let mut board = Occupancy::empty();
        board.set(sq("b1"));
        board.set(sq("b3"));
        board.set(sq("c1"));
        let plan = PathPlanner.plan(mv("b1-c3"), &board).unwrap();
        // Shorter leg is the file: first stroke is half a square on x.
        assert_eq!(plan.main.legs[0].dy_half, 0);
        assert_eq!(plan.main.legs[0].dx_half.abs(), 1);
        assert_eq!(plan.main.legs.len(), 3);
        assert_eq!(plan.main.end(), grid("c3"));
    }

    #[test]
    fn test_capture_removal_precedes_move() {
        let mut board = Occupancy::empty();
        board.set(sq("e4"));
        board.set(sq("d5"));
        let plan = PathPlanner.plan(mv("e4-d5"), &board).unwrap();

        let removal = plan.removal.expect("occupied destination");
        assert_eq!(removal.start, grid("d5"));
        // d5 is on the upper half: route via the top edge; d is on the
        // a-side half of the mirrored axis, so off the board past x=16.
        assert_eq!(removal.end(), GridPos::new(17, 16));

        assert_eq!(plan.main.start, grid("e4"));
        assert_eq!(plan.main.end(), grid("d5"));
    }

    #[test]
    fn test_capture_removal_lower_half_routes_bottom() {
        let mut board = Occupancy::empty();
        board.set(sq("g4"));
        board.set(sq("g3"));
        let plan = PathPlanner.plan(mv("g4-g3"), &board).unwrap();
        let removal = plan.removal.unwrap();
        // g3 is low and on the h-side: bottom edge, off past x=0.
        assert_eq!(removal.end(), GridPos::new(-1, 0));
        assert_eq!(removal.legs.len(), 2);
    }

    #[test]
    fn test_non_capture_has_no_removal() {
        let board = Occupancy::starting_position();
        let plan = PathPlanner.plan(mv("g1-f3"), &board).unwrap();
        assert!(plan.removal.is_none());
    }
}
