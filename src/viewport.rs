/// Size of the host container the viewer draws into.
///
/// Dimensions are logical pixels; `pixel_ratio` converts them to the size of
/// the drawing buffer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    width: u32,
    height: u32,
    pixel_ratio: f64,
}

impl Viewport {
    /// Creates a viewport from measured container dimensions.
    ///
    /// Zero-sized containers are clamped to one pixel so the aspect ratio
    /// stays finite.
    pub fn new(width: u32, height: u32, pixel_ratio: f64) -> Self {
        Self {
            width: width.max(1),
            height: height.max(1),
            pixel_ratio: sanitize_ratio(pixel_ratio),
        }
    }

    pub fn update(&mut self, width: u32, height: u32) {
        self.width = width.max(1);
        self.height = height.max(1);
    }

    pub fn set_pixel_ratio(&mut self, pixel_ratio: f64) {
        self.pixel_ratio = sanitize_ratio(pixel_ratio);
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn pixel_ratio(&self) -> f64 {
        self.pixel_ratio
    }

    pub fn aspect(&self) -> f32 {
        self.width as f32 / self.height as f32
    }

    /// Size of the backing surface in physical pixels.
    pub fn drawing_buffer_size(&self) -> (u32, u32) {
        (
            physical(self.width, self.pixel_ratio),
            physical(self.height, self.pixel_ratio),
        )
    }
}

fn sanitize_ratio(ratio: f64) -> f64 {
    if ratio.is_finite() && ratio > 0.0 {
        ratio
    } else {
        1.0
    }
}

fn physical(logical: u32, ratio: f64) -> u32 {
    ((logical as f64 * ratio).round() as u32).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aspect_matches_container() {
        let mut viewport = Viewport::new(1280, 720, 1.0);
        assert_eq!(viewport.aspect(), 1280.0 / 720.0);
        viewport.update(300, 600);
        assert_eq!(viewport.size(), (300, 600));
        assert_eq!(viewport.aspect(), 0.5);
    }

    #[test]
    fn zero_dimensions_are_clamped() {
        let viewport = Viewport::new(0, 0, 2.0);
        assert_eq!(viewport.size(), (1, 1));
        assert!(viewport.aspect().is_finite());
    }

    #[test]
    fn drawing_buffer_uses_pixel_ratio() {
        let viewport = Viewport::new(400, 300, 2.0);
        assert_eq!(viewport.drawing_buffer_size(), (800, 600));
        let mut fallback = Viewport::new(400, 300, f64::NAN);
        assert_eq!(fallback.pixel_ratio(), 1.0);
        fallback.set_pixel_ratio(1.5);
        assert_eq!(fallback.drawing_buffer_size(), (600, 450));
    }
}
