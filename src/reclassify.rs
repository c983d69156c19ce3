//! Decides which vector paths are table borders or cell fills worth
//! redrawing in white. Everything else is dropped.

use tracing::debug;

use crate::page::PageCommand;
use crate::types::{Color, PathItem, PathItemKind, Point, VectorPath};

/// Stroked paths at least this wide are treated as artwork.
pub const MAX_STRUCTURAL_WIDTH: f32 = 3.0;
pub const MIN_DRAW_WIDTH: f32 = 0.1;
const DEFAULT_WIDTH: f32 = 1.0;

pub fn is_structural(path: &VectorPath) -> bool {
    let width = path.width.unwrap_or(DEFAULT_WIDTH);
    (path.is_stroked() && width < MAX_STRUCTURAL_WIDTH)
        || (path.is_filled() && path.first_kind() == Some(PathItemKind::Rect))
}

fn segments(points: &[Point], color: Color, width: f32) -> impl Iterator<Item = PageCommand> + '_ {
    points.windows(2).map(move |w| PageCommand::Line {
        from: w[0],
        to: w[1],
        color,
        width,
    })
}

/// White redraw commands for `path`, or nothing if it is not structural.
pub fn classify(path: &VectorPath) -> Vec<PageCommand> {
    if !is_structural(path) {
        debug!(
            "Skipping path: stroke={:?}, fill={:?}, width={:?}, type={:?}",
            path.stroke_color,
            path.fill_color,
            path.width,
            path.first_kind()
        );
        return Vec::new();
    }

    let width = path.width.unwrap_or(DEFAULT_WIDTH).max(MIN_DRAW_WIDTH);
    let filled = path.is_filled();
    let mut commands = Vec::new();
    for item in &path.items {
        match item {
            PathItem::Line(from, to) => commands.push(PageCommand::Line {
                from: *from,
                to: *to,
                color: Color::WHITE,
                width,
            }),
            PathItem::Rect(rect) => commands.push(PageCommand::Rect {
                rect: *rect,
                stroke: Color::WHITE,
                fill: filled.then_some(Color::WHITE),
                width,
            }),
            PathItem::Curve(points) | PathItem::Quad(points) => {
                commands.extend(segments(points, Color::WHITE, width))
            }
        }
    }
    debug!(
        "Redrawing path as structural: width={}, type={:?}, {} commands",
        width,
        path.first_kind(),
        commands.len()
    );
    commands
}
