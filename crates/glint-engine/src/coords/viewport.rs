/// Rendering viewport in physical pixels.
///
/// Maps normalized device coordinates onto a rectangle of the drawable surface.
/// Origin is the top-left corner of the surface.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct Viewport {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    #[inline]
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    /// Viewport covering a whole drawable of the given size.
    #[inline]
    pub const fn full(width: u32, height: u32) -> Self {
        Self::new(0, 0, width, height)
    }

    #[inline]
    pub fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Converts NDC (`x`, `y` in `[-1, 1]`, +Y up) into surface pixel coordinates
    /// (+Y down).
    #[inline]
    pub fn ndc_to_pixel(self, ndc_x: f32, ndc_y: f32) -> (f32, f32) {
        let px = self.x as f32 + (ndc_x + 1.0) * 0.5 * self.width as f32;
        let py = self.y as f32 + (1.0 - ndc_y) * 0.5 * self.height as f32;
        (px, py)
    }

    /// Clamps the viewport to a surface of `width` x `height` pixels.
    pub fn clamped_to(self, width: u32, height: u32) -> Self {
        let x = self.x.min(width);
        let y = self.y.min(height);
        Self {
            x,
            y,
            width: self.width.min(width - x),
            height: self.height.min(height - y),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ndc_corners_map_to_surface_corners() {
        let vp = Viewport::full(800, 600);
        assert_eq!(vp.ndc_to_pixel(-1.0, 1.0), (0.0, 0.0));
        assert_eq!(vp.ndc_to_pixel(1.0, -1.0), (800.0, 600.0));
        assert_eq!(vp.ndc_to_pixel(0.0, 0.0), (400.0, 300.0));
    }

    #[test]
    fn offset_viewport_shifts_mapping() {
        let vp = Viewport::new(10, 20, 100, 100);
        assert_eq!(vp.ndc_to_pixel(-1.0, 1.0), (10.0, 20.0));
    }

    #[test]
    fn clamp_trims_overhang() {
        let vp = Viewport::new(50, 50, 100, 100).clamped_to(120, 80);
        assert_eq!(vp, Viewport::new(50, 50, 70, 30));
    }

    #[test]
    fn zero_sized_is_empty() {
        assert!(Viewport::full(0, 600).is_empty());
        assert!(!Viewport::full(1, 1).is_empty());
    }
}
