use glam::Vec2;

/// Axis-aligned pixel rectangle inside an atlas page (top-left origin).
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl PixelRect {
    #[inline]
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    /// Exclusive right edge. Widened so `x + width` cannot overflow.
    #[inline]
    pub fn right(self) -> u64 {
        self.x as u64 + self.width as u64
    }

    /// Exclusive bottom edge.
    #[inline]
    pub fn bottom(self) -> u64 {
        self.y as u64 + self.height as u64
    }

    #[inline]
    pub fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// True if the rectangle lies within a `width × height` page.
    #[inline]
    pub fn fits_within(self, width: u32, height: u32) -> bool {
        self.right() <= width as u64 && self.bottom() <= height as u64
    }

    /// Half-open overlap test; rectangles sharing an edge do not overlap.
    #[inline]
    pub fn overlaps(self, other: PixelRect) -> bool {
        if self.is_empty() || other.is_empty() {
            return false;
        }
        (self.x as u64) < other.right()
            && (other.x as u64) < self.right()
            && (self.y as u64) < other.bottom()
            && (other.y as u64) < self.bottom()
    }

    /// Affine UV transform mapping the unit square onto this rectangle of a
    /// `page_width × page_height` page.
    pub fn uv_transform(self, page_width: u32, page_height: u32) -> UvTransform {
        let page = Vec2::new(page_width as f32, page_height as f32);
        UvTransform {
            min: Vec2::new(self.x as f32, self.y as f32) / page,
            max: Vec2::new(self.right() as f32, self.bottom() as f32) / page,
        }
    }
}

/// `packed = min * (1 - uv) + max * uv`, exact at both edges.
///
/// `min` and `max` are the region's edges in page UV space, each divided
/// once from integer pixels, so neighbouring regions share edge values
/// exactly.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct UvTransform {
    pub min: Vec2,
    pub max: Vec2,
}

impl UvTransform {
    /// Coordinates inside the unit square never leave `[min, max]`; those
    /// outside it (wrapping UVs) follow the affine map unclamped.
    #[inline]
    pub fn apply(self, uv: Vec2) -> Vec2 {
        let packed = self.min * (Vec2::ONE - uv) + self.max * uv;
        let inside = uv.cmpge(Vec2::ZERO) & uv.cmple(Vec2::ONE);
        Vec2::select(inside, packed.clamp(self.min, self.max), packed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn r(x: u32, y: u32, w: u32, h: u32) -> PixelRect {
        PixelRect::new(x, y, w, h)
    }

    // ── overlaps ──────────────────────────────────────────────────────────

    #[test]
    fn overlapping_rects() {
        assert!(r(0, 0, 10, 10).overlaps(r(5, 5, 10, 10)));
        assert!(r(5, 5, 10, 10).overlaps(r(0, 0, 10, 10)));
    }

    #[test]
    fn contained_rect_overlaps() {
        assert!(r(0, 0, 100, 100).overlaps(r(10, 10, 5, 5)));
    }

    #[test]
    fn shared_edge_is_not_overlap() {
        assert!(!r(0, 0, 10, 10).overlaps(r(10, 0, 10, 10)));
        assert!(!r(0, 0, 10, 10).overlaps(r(0, 10, 10, 10)));
    }

    #[test]
    fn empty_rect_never_overlaps() {
        assert!(!r(5, 5, 0, 10).overlaps(r(0, 0, 20, 20)));
    }

    // ── fits_within ───────────────────────────────────────────────────────

    #[test]
    fn fits_within_page_edges() {
        assert!(r(0, 0, 64, 64).fits_within(64, 64));
        assert!(!r(1, 0, 64, 64).fits_within(64, 64));
        assert!(!r(0, 0, 64, 65).fits_within(64, 64));
    }

    #[test]
    fn fits_within_does_not_overflow() {
        assert!(!r(u32::MAX, 0, 2, 1).fits_within(u32::MAX, 1));
    }

    // ── uv_transform ──────────────────────────────────────────────────────

    #[test]
    fn uv_transform_maps_unit_square_onto_rect() {
        let t = r(256, 512, 256, 128).uv_transform(1024, 1024);
        assert_eq!(t.apply(Vec2::ZERO), Vec2::new(0.25, 0.5));
        assert_eq!(t.apply(Vec2::ONE), Vec2::new(0.5, 0.625));
    }

    #[test]
    fn unit_square_stays_inside_region_on_odd_page_sizes() {
        for page in [1000_u32, 999, 1023, 777, 300] {
            for w in [1_u32, 3, 7, 33, 100, 333] {
                for x in 0..=page - w {
                    let rect = r(x, 0, w, 1);
                    let t = rect.uv_transform(page, 1);
                    let min = x as f32 / page as f32;
                    let max = (x + w) as f32 / page as f32;
                    for u in [0.0, 1.0] {
                        let packed = t.apply(Vec2::new(u, 0.0)).x;
                        assert!(
                            (min..=max).contains(&packed),
                            "page {page}, x {x}, w {w}: {u} → {packed} outside [{min}, {max}]"
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn adjacent_rects_share_their_edge_exactly() {
        let left = r(2, 0, 7, 1).uv_transform(1000, 1);
        let right = r(9, 0, 7, 1).uv_transform(1000, 1);
        assert_eq!(left.apply(Vec2::ONE).x, right.apply(Vec2::ZERO).x);
    }

    #[test]
    fn uvs_outside_unit_square_are_not_clamped() {
        let t = r(0, 0, 64, 64).uv_transform(256, 256);
        assert_eq!(t.apply(Vec2::new(2.0, -1.0)), Vec2::new(0.5, -0.25));
    }
}
