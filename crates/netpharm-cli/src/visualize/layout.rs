//! Deterministic force-directed layout
//!
//! Fruchterman-Reingold starting from evenly spaced points on a circle. No
//! randomness is involved, so a network always gets the same picture.

use std::f64::consts::PI;

/// Default number of relaxation steps
pub const DEFAULT_ITERATIONS: usize = 200;

const MIN_DISTANCE: f64 = 1e-3;

/// Place `n` nodes connected by `edges` (index pairs) in the unit square
pub fn fruchterman_reingold(n: usize, edges: &[(usize, usize)], iterations: usize) -> Vec<(f64, f64)> {
    match n {
        0 => return Vec::new(),
        1 => return vec![(0.5, 0.5)],
        _ => {},
    }

    let mut pos: Vec<(f64, f64)> = (0..n)
        .map(|i| {
            let angle = 2.0 * PI * i as f64 / n as f64;
            (angle.cos(), angle.sin())
        })
        .collect();

    // ideal edge length for an area of 4 (the [-1, 1] square)
    let k = (4.0 / n as f64).sqrt();
    let initial_temperature = 0.2;

    for step in 0..iterations {
        let mut disp = vec![(0.0f64, 0.0f64); n];

        for i in 0..n {
            for j in (i + 1)..n {
                let (dx, dy) = (pos[i].0 - pos[j].0, pos[i].1 - pos[j].1);
                let dist = (dx * dx + dy * dy).sqrt().max(MIN_DISTANCE);
                let force = k * k / dist;
                let (fx, fy) = (dx / dist * force, dy / dist * force);
                disp[i].0 += fx;
                disp[i].1 += fy;
                disp[j].0 -= fx;
                disp[j].1 -= fy;
            }
        }

        for &(a, b) in edges {
            if a >= n || b >= n || a == b {
                continue;
            }
            let (dx, dy) = (pos[a].0 - pos[b].0, pos[a].1 - pos[b].1);
            let dist = (dx * dx + dy * dy).sqrt().max(MIN_DISTANCE);
            let force = dist * dist / k;
            let (fx, fy) = (dx / dist * force, dy / dist * force);
            disp[a].0 -= fx;
            disp[a].1 -= fy;
            disp[b].0 += fx;
            disp[b].1 += fy;
        }

        let temperature = initial_temperature * (1.0 - step as f64 / iterations as f64);
        for (p, d) in pos.iter_mut().zip(&disp) {
            let length = (d.0 * d.0 + d.1 * d.1).sqrt();
            if length > 0.0 {
                let moved = length.min(temperature);
                p.0 = (p.0 + d.0 / length * moved).clamp(-1.0, 1.0);
                p.1 = (p.1 + d.1 / length * moved).clamp(-1.0, 1.0);
            }
        }
    }

    normalize(pos)
}

/// Rescale positions into the unit square, keeping the aspect ratio
fn normalize(pos: Vec<(f64, f64)>) -> Vec<(f64, f64)> {
    let (min_x, max_x, min_y, max_y) = pos.iter().fold(
        (f64::INFINITY, f64::NEG_INFINITY, f64::INFINITY, f64::NEG_INFINITY),
        |(a, b, c, d), &(x, y)| (a.min(x), b.max(x), c.min(y), d.max(y)),
    );
    let span = (max_x - min_x).max(max_y - min_y);
    if !span.is_finite() || span <= 0.0 {
        return pos.into_iter().map(|_| (0.5, 0.5)).collect();
    }

    let (offset_x, offset_y) = ((span - (max_x - min_x)) / 2.0, (span - (max_y - min_y)) / 2.0);
    pos.into_iter()
        .map(|(x, y)| ((x - min_x + offset_x) / span, (y - min_y + offset_y) / span))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_is_deterministic_and_bounded() {
        let edges = vec![(0, 1), (1, 2), (2, 0), (2, 3)];
        let first = fruchterman_reingold(5, &edges, DEFAULT_ITERATIONS);
        let second = fruchterman_reingold(5, &edges, DEFAULT_ITERATIONS);
        assert_eq!(first, second);
        assert!(first
            .iter()
            .all(|&(x, y)| (0.0..=1.0).contains(&x) && (0.0..=1.0).contains(&y)));
    }

    #[test]
    fn test_connected_nodes_end_up_closer() {
        let pos = fruchterman_reingold(4, &[(0, 1)], DEFAULT_ITERATIONS);
        let dist = |a: usize, b: usize| ((pos[a].0 - pos[b].0).powi(2) + (pos[a].1 - pos[b].1).powi(2)).sqrt();
        assert!(dist(0, 1) < dist(2, 3));
    }

    #[test]
    fn test_trivial_sizes() {
        assert!(fruchterman_reingold(0, &[], 10).is_empty());
        assert_eq!(fruchterman_reingold(1, &[], 10), vec![(0.5, 0.5)]);
    }
}
