use std::cmp::Ordering;

use crate::config::BoxRegion;
use crate::records::{PlayRecord, TrackingFrame};

#[derive(Debug, Clone, PartialEq)]
pub struct SnapFeatures {
    pub snap_frame_id: i64,
    pub line_of_scrimmage: f64,
    /// `None` when fewer than three distinct offensive positions exist or the hull is degenerate.
    pub offense_area: Option<f64>,
    pub defenders_in_box: u32,
}

/// Canonical order for picking "the first" snap record: frame, then player id with the
/// football (no id) ahead of players, then position. Independent of file row order.
fn canonical_order(a: &TrackingFrame, b: &TrackingFrame) -> Ordering {
    a.frame_id
        .cmp(&b.frame_id)
        .then(a.nfl_id.cmp(&b.nfl_id))
        .then(a.x.total_cmp(&b.x))
        .then(a.y.total_cmp(&b.y))
}

pub fn extract(frames: &[TrackingFrame], play: &PlayRecord, region: &BoxRegion) -> Option<SnapFeatures> {
    let anchor = frames
        .iter()
        .filter(|f| f.is_snap())
        .min_by(|a, b| canonical_order(a, b))?;

    let snap_frame_id = anchor.frame_id;
    let line_of_scrimmage = anchor.x;

    let at_snap = || frames.iter().filter(move |f| f.frame_id == snap_frame_id);
    let on_team = |team: Option<&str>| {
        at_snap()
            .filter(move |f| team.is_some() && f.club.as_deref() == team)
            .map(|f| (f.x, f.y))
            .collect::<Vec<_>>()
    };

    let offense = on_team(play.possession_team.as_deref());
    let defense = on_team(play.defensive_team.as_deref());

    let offense_area = if offense.len() > 2 {
        convex_hull_area(&offense)
    } else {
        None
    };

    let defenders_in_box = defense
        .iter()
        .filter(|(x, y)| region.contains(line_of_scrimmage, *x, *y))
        .count() as u32;

    Some(SnapFeatures {
        snap_frame_id,
        line_of_scrimmage,
        offense_area,
        defenders_in_box,
    })
}

fn cross(o: (f64, f64), a: (f64, f64), b: (f64, f64)) -> f64 {
    (a.0 - o.0) * (b.1 - o.1) - (a.1 - o.1) * (b.0 - o.0)
}

pub fn convex_hull_area(points: &[(f64, f64)]) -> Option<f64> {
    if points.iter().any(|(x, y)| !x.is_finite() || !y.is_finite()) {
        return None;
    }

    let mut pts = points.to_vec();
    pts.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.total_cmp(&b.1)));
    pts.dedup();
    if pts.len() < 3 {
        return None;
    }

    let mut hull: Vec<(f64, f64)> = Vec::with_capacity(pts.len() * 2);
    for &p in &pts {
        while hull.len() >= 2 && cross(hull[hull.len() - 2], hull[hull.len() - 1], p) <= 0.0 {
            hull.pop();
        }
        hull.push(p);
    }
    let lower_len = hull.len() + 1;
    for &p in pts.iter().rev().skip(1) {
        while hull.len() >= lower_len && cross(hull[hull.len() - 2], hull[hull.len() - 1], p) <= 0.0
        {
            hull.pop();
        }
        hull.push(p);
    }
    hull.pop();

    if hull.len() < 3 {
        return None;
    }

    let twice_area: f64 = hull
        .iter()
        .zip(hull.iter().cycle().skip(1))
        .map(|(a, b)| a.0 * b.1 - b.0 * a.1)
        .sum();
    let area = twice_area.abs() / 2.0;

    if area > f64::EPSILON { Some(area) } else { None }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::PlayKey;

    fn frame(nfl_id: Option<i64>, frame_id: i64, event: Option<&str>, club: &str, x: f64, y: f64) -> TrackingFrame {
        TrackingFrame {
            key: PlayKey::new(1, 1),
            nfl_id,
            frame_id,
            event: event.map(str::to_string),
            club: Some(club.to_string()),
            x,
            y,
        }
    }

    fn play() -> PlayRecord {
        PlayRecord {
            key: Some(PlayKey::new(1, 1)),
            possession_team: Some("A".to_string()),
            defensive_team: Some("B".to_string()),
            ..Default::default()
        }
    }

    /// Snap at x = 50; offense is a trapezoid with parallel sides 4 and 2 at height 3
    /// (area 9); two defenders inside [49, 57] x [15, 38.3], one outside.
    fn snap_play_frames() -> Vec<TrackingFrame> {
        let snap = Some("ball_snap");
        vec![
            frame(None, 5, snap, "football", 50.0, 26.0),
            frame(Some(1), 5, snap, "A", 46.0, 20.0),
            frame(Some(2), 5, snap, "A", 46.0, 24.0),
            frame(Some(3), 5, snap, "A", 43.0, 21.0),
            frame(Some(4), 5, snap, "A", 43.0, 23.0),
            frame(Some(5), 5, snap, "B", 49.0, 15.0),
            frame(Some(6), 5, snap, "B", 55.0, 30.0),
            frame(Some(7), 5, snap, "B", 60.0, 26.0),
            // pre-snap motion frame, ignored
            frame(Some(1), 4, None, "A", 30.0, 10.0),
            frame(Some(6), 6, None, "B", 80.0, 50.0),
        ]
    }

    #[test]
    fn quadrilateral_offense_and_box_count() {
        let features = extract(&snap_play_frames(), &play(), &BoxRegion::default()).unwrap();
        assert_eq!(features.snap_frame_id, 5);
        assert_eq!(features.line_of_scrimmage, 50.0);
        assert!((features.offense_area.unwrap() - 9.0).abs() < 1e-9);
        assert_eq!(features.defenders_in_box, 2);
    }

    #[test]
    fn box_count_ignores_frame_order() {
        let mut frames = snap_play_frames();
        let expected = extract(&frames, &play(), &BoxRegion::default()).unwrap();
        frames.reverse();
        assert_eq!(extract(&frames, &play(), &BoxRegion::default()).unwrap(), expected);
        frames.rotate_left(3);
        assert_eq!(extract(&frames, &play(), &BoxRegion::default()).unwrap(), expected);
    }

    #[test]
    fn no_snap_event_yields_nothing() {
        let frames: Vec<TrackingFrame> = snap_play_frames()
            .into_iter()
            .map(|mut f| {
                f.event = None;
                f
            })
            .collect();
        assert!(extract(&frames, &play(), &BoxRegion::default()).is_none());
        assert!(extract(&[], &play(), &BoxRegion::default()).is_none());
    }

    #[test]
    fn fewer_than_three_offensive_players_omits_area_only() {
        let snap = Some("ball_snap");
        let frames = vec![
            frame(None, 1, snap, "football", 50.0, 26.0),
            frame(Some(1), 1, snap, "A", 46.0, 20.0),
            frame(Some(2), 1, snap, "A", 46.0, 24.0),
            frame(Some(5), 1, snap, "B", 52.0, 20.0),
        ];
        let features = extract(&frames, &play(), &BoxRegion::default()).unwrap();
        assert_eq!(features.offense_area, None);
        assert_eq!(features.defenders_in_box, 1);
    }

    #[test]
    fn duplicate_positions_count_as_one() {
        let pts = [(0.0, 0.0), (0.0, 0.0), (1.0, 1.0), (1.0, 1.0)];
        assert_eq!(convex_hull_area(&pts), None);
    }

    #[test]
    fn collinear_hull_is_missing() {
        let pts = [(0.0, 0.0), (1.0, 1.0), (2.0, 2.0), (3.0, 3.0)];
        assert_eq!(convex_hull_area(&pts), None);
    }

    #[test]
    fn interior_points_do_not_change_area() {
        let pts = [(0.0, 0.0), (4.0, 0.0), (4.0, 3.0), (0.0, 3.0), (2.0, 1.5), (1.0, 1.0)];
        assert!((convex_hull_area(&pts).unwrap() - 12.0).abs() < 1e-9);
    }

    #[test]
    fn custom_box_region_is_respected() {
        let region = BoxRegion::from_field(30.0, 5.0);
        let features = extract(&snap_play_frames(), &play(), &region).unwrap();
        // y in [5, 25]: only the defender at (49, 15) qualifies
        assert_eq!(features.defenders_in_box, 1);
    }
}
