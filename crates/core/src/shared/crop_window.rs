use super::detection::Point;

/// Pixel window `[y0:y1, x0:x1]`, half-open on the far edges.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CropWindow {
    pub x0: i32,
    pub y0: i32,
    pub x1: i32,
    pub y1: i32,
}

impl CropWindow {
    /// Square window of side `size` centred on `center`, clamped to the
    /// frame. Near the edges the window shrinks instead of sliding.
    pub fn around(center: Point, size: u32, frame_width: u32, frame_height: u32) -> Self {
        let half = (size / 2) as i32;
        Self {
            x0: (center.x - half).max(0),
            y0: (center.y - half).max(0),
            x1: (center.x + half).min(frame_width as i32),
            y1: (center.y + half).min(frame_height as i32),
        }
    }

    pub fn width(&self) -> i32 {
        (self.x1 - self.x0).max(0)
    }

    pub fn height(&self) -> i32 {
        (self.y1 - self.y0).max(0)
    }

    pub fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case((10, 10), (0, 0, 170, 170))]
    #[case((320, 240), (160, 80, 480, 400))]
    #[case((630, 470), (470, 310, 640, 480))]
    #[case((320, 10), (160, 0, 480, 170))]
    fn test_window_clamps_at_edges(
        #[case] center: (i32, i32),
        #[case] expected: (i32, i32, i32, i32),
    ) {
        let window = CropWindow::around(Point::new(center.0, center.1), 320, 640, 480);
        assert_eq!(
            (window.x0, window.y0, window.x1, window.y1),
            expected
        );
    }

    #[test]
    fn test_window_in_interior_is_full_size() {
        let window = CropWindow::around(Point::new(320, 240), 320, 640, 480);
        assert_eq!(window.width(), 320);
        assert_eq!(window.height(), 320);
    }

    #[test]
    fn test_window_larger_than_frame_covers_frame() {
        let window = CropWindow::around(Point::new(50, 40), 320, 100, 80);
        assert_eq!((window.x0, window.y0, window.x1, window.y1), (0, 0, 100, 80));
    }

    #[test]
    fn test_center_outside_frame_is_empty() {
        let window = CropWindow::around(Point::new(900, 240), 320, 640, 480);
        assert!(window.is_empty());
    }
}
