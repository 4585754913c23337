//! Edge-function triangle rasterization.

use crate::coords::Viewport;
use crate::vertex::PrimitiveTopology;

/// A covered pixel of one triangle.
#[derive(Debug, Copy, Clone)]
pub(crate) struct Coverage {
    pub x: u32,
    pub y: u32,
    /// Perspective-correct barycentric weights.
    pub weights: [f32; 3],
    /// Window-space position: pixel center, depth, 1/w.
    pub coord: [f32; 4],
}

/// Splits an index stream into triangles.
pub(crate) fn assemble(topology: PrimitiveTopology, indices: &[u32]) -> Vec<[u32; 3]> {
    match topology {
        PrimitiveTopology::TriangleList => indices
            .chunks_exact(3)
            .map(|t| [t[0], t[1], t[2]])
            .collect(),
        PrimitiveTopology::TriangleStrip => indices
            .windows(3)
            .enumerate()
            .map(|(i, t)| {
                if i % 2 == 0 {
                    [t[0], t[1], t[2]]
                } else {
                    [t[1], t[0], t[2]]
                }
            })
            .collect(),
    }
}

fn edge(a: [f32; 2], b: [f32; 2], p: [f32; 2]) -> f32 {
    (b[0] - a[0]) * (p[1] - a[1]) - (b[1] - a[1]) * (p[0] - a[0])
}

/// Calls `emit` for every pixel center of `viewport` inside the triangle.
///
/// Triangles with a vertex at or behind the eye (`w <= 0`) are dropped, as
/// are fragments outside the `[0, 1]` depth range. Both windings are drawn.
pub(crate) fn rasterize<E>(
    viewport: Viewport,
    clip: [[f32; 4]; 3],
    mut emit: impl FnMut(Coverage) -> Result<(), E>,
) -> Result<u32, E> {
    if viewport.is_empty() || clip.iter().any(|c| c[3] <= f32::EPSILON) {
        return Ok(0);
    }

    let mut screen = [[0.0f32; 2]; 3];
    let mut depth = [0.0f32; 3];
    let mut inv_w = [0.0f32; 3];
    for (i, c) in clip.iter().enumerate() {
        inv_w[i] = 1.0 / c[3];
        let (x, y) = viewport.ndc_to_pixel(c[0] * inv_w[i], c[1] * inv_w[i]);
        screen[i] = [x, y];
        depth[i] = c[2] * inv_w[i];
    }

    let area = edge(screen[0], screen[1], screen[2]);
    if area.abs() <= f32::EPSILON {
        return Ok(0);
    }

    let min_x = screen.iter().map(|p| p[0]).fold(f32::INFINITY, f32::min);
    let max_x = screen.iter().map(|p| p[0]).fold(f32::NEG_INFINITY, f32::max);
    let min_y = screen.iter().map(|p| p[1]).fold(f32::INFINITY, f32::min);
    let max_y = screen.iter().map(|p| p[1]).fold(f32::NEG_INFINITY, f32::max);

    let vp_x1 = (viewport.x + viewport.width) as f32;
    let vp_y1 = (viewport.y + viewport.height) as f32;
    let x0 = min_x.floor().max(viewport.x as f32) as u32;
    let y0 = min_y.floor().max(viewport.y as f32) as u32;
    let x1 = max_x.ceil().min(vp_x1).max(0.0) as u32;
    let y1 = max_y.ceil().min(vp_y1).max(0.0) as u32;

    let mut covered = 0;
    for py in y0..y1 {
        for px in x0..x1 {
            let p = [px as f32 + 0.5, py as f32 + 0.5];
            let b = [
                edge(screen[1], screen[2], p) / area,
                edge(screen[2], screen[0], p) / area,
                edge(screen[0], screen[1], p) / area,
            ];
            if b.iter().any(|w| *w < 0.0) {
                continue;
            }

            let z = b[0] * depth[0] + b[1] * depth[1] + b[2] * depth[2];
            if !(0.0..=1.0).contains(&z) {
                continue;
            }

            let persp = [b[0] * inv_w[0], b[1] * inv_w[1], b[2] * inv_w[2]];
            let sum = persp[0] + persp[1] + persp[2];
            let weights = [persp[0] / sum, persp[1] / sum, persp[2] / sum];

            emit(Coverage {
                x: px,
                y: py,
                weights,
                coord: [p[0], p[1], z, sum],
            })?;
            covered += 1;
        }
    }

    Ok(covered)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(viewport: Viewport, clip: [[f32; 4]; 3]) -> Vec<(u32, u32)> {
        let mut out = Vec::new();
        rasterize::<()>(viewport, clip, |c| {
            out.push((c.x, c.y));
            Ok(())
        })
        .unwrap();
        out
    }

    #[test]
    fn fullscreen_pair_covers_every_pixel_once_or_more() {
        let vp = Viewport::full(4, 4);
        let a = collect(vp, [[-1.0, -1.0, 0.0, 1.0], [1.0, -1.0, 0.0, 1.0], [1.0, 1.0, 0.0, 1.0]]);
        let b = collect(vp, [[-1.0, -1.0, 0.0, 1.0], [1.0, 1.0, 0.0, 1.0], [-1.0, 1.0, 0.0, 1.0]]);
        for y in 0..4 {
            for x in 0..4 {
                assert!(a.contains(&(x, y)) || b.contains(&(x, y)), "pixel {x},{y} uncovered");
            }
        }
    }

    #[test]
    fn both_windings_rasterize() {
        let vp = Viewport::full(8, 8);
        let ccw = collect(vp, [[-0.5, -0.5, 0.0, 1.0], [0.5, -0.5, 0.0, 1.0], [0.0, 0.5, 0.0, 1.0]]);
        let cw = collect(vp, [[-0.5, -0.5, 0.0, 1.0], [0.0, 0.5, 0.0, 1.0], [0.5, -0.5, 0.0, 1.0]]);
        assert!(!ccw.is_empty());
        assert_eq!(ccw.len(), cw.len());
    }

    #[test]
    fn pixels_stay_inside_viewport() {
        let vp = Viewport::new(2, 2, 4, 4);
        let px = collect(vp, [[-3.0, -3.0, 0.0, 1.0], [3.0, -3.0, 0.0, 1.0], [0.0, 3.0, 0.0, 1.0]]);
        assert!(!px.is_empty());
        assert!(px.iter().all(|&(x, y)| (2..6).contains(&x) && (2..6).contains(&y)));
    }

    #[test]
    fn triangle_behind_eye_is_dropped() {
        let vp = Viewport::full(8, 8);
        let px = collect(vp, [[-1.0, -1.0, 0.0, -1.0], [1.0, -1.0, 0.0, 1.0], [0.0, 1.0, 0.0, 1.0]]);
        assert!(px.is_empty());
    }

    #[test]
    fn strip_alternates_winding() {
        let tris = assemble(PrimitiveTopology::TriangleStrip, &[0, 1, 2, 3]);
        assert_eq!(tris, vec![[0, 1, 2], [2, 1, 3]]);
        let list = assemble(PrimitiveTopology::TriangleList, &[0, 1, 3, 1, 2, 3, 9]);
        assert_eq!(list, vec![[0, 1, 3], [1, 2, 3]]);
    }
}
