use euclid::{Point2D, Transform2D, Vector2D};

/// Logical coordinate system of diagram content.
#[derive(Debug, Copy, Clone)]
pub struct DiagramSpace;

/// Pointer-device / screen coordinate system.
#[derive(Debug, Copy, Clone)]
pub struct ScreenSpace;

pub type DiagramPoint = Point2D<f64, DiagramSpace>;
pub type ScreenPoint = Point2D<f64, ScreenSpace>;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ViewportError {
    #[error("zoom must be finite and positive, got {0}")]
    InvalidZoom(f64),
    #[error("pan must be finite")]
    InvalidPan,
    #[error("viewport transform is not invertible")]
    Singular,
}

/// Pan/zoom of the canvas, as owned by the canvas layer.
///
/// `screen = diagram * zoom + pan`
#[derive(Debug, Copy, Clone)]
pub struct Viewport {
    pan: Vector2D<f64, ScreenSpace>,
    zoom: f64,
    to_screen: Transform2D<f64, DiagramSpace, ScreenSpace>,
    to_diagram: Transform2D<f64, ScreenSpace, DiagramSpace>,
}

impl Viewport {
    pub fn new(pan_x: f64, pan_y: f64, zoom: f64) -> Result<Self, ViewportError> {
        if !zoom.is_finite() || zoom <= 0.0 {
            return Err(ViewportError::InvalidZoom(zoom));
        }
        if !pan_x.is_finite() || !pan_y.is_finite() {
            return Err(ViewportError::InvalidPan);
        }
        let pan = Vector2D::new(pan_x, pan_y);
        let to_screen = Transform2D::scale(zoom, zoom).then_translate(pan);
        let to_diagram = to_screen.inverse().ok_or(ViewportError::Singular)?;
        Ok(Self {
            pan,
            zoom,
            to_screen,
            to_diagram,
        })
    }

    pub fn identity() -> Self {
        Self {
            pan: Vector2D::zero(),
            zoom: 1.0,
            to_screen: Transform2D::identity(),
            to_diagram: Transform2D::identity(),
        }
    }

    pub fn pan(&self) -> Vector2D<f64, ScreenSpace> {
        self.pan
    }

    pub fn zoom(&self) -> f64 {
        self.zoom
    }

    pub fn to_diagram_space(&self, screen_x: f64, screen_y: f64) -> DiagramPoint {
        self.to_diagram
            .transform_point(ScreenPoint::new(screen_x, screen_y))
    }

    pub fn to_screen_space(&self, x: f64, y: f64) -> ScreenPoint {
        self.to_screen.transform_point(DiagramPoint::new(x, y))
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self::identity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn close_to(a: f64, b: f64) -> bool {
        (a - b).abs() <= 1e-6 * (1.0 + b.abs())
    }

    #[test]
    fn it_applies_zoom_then_pan() {
        let viewport = Viewport::new(100.0, -20.0, 2.0).unwrap();
        let screen = viewport.to_screen_space(10.0, 5.0);
        assert_eq!((screen.x, screen.y), (120.0, -10.0));

        let diagram = viewport.to_diagram_space(120.0, -10.0);
        assert!(close_to(diagram.x, 10.0) && close_to(diagram.y, 5.0));
    }

    #[test]
    fn it_rejects_degenerate_viewports() {
        assert_eq!(
            Viewport::new(0.0, 0.0, 0.0).unwrap_err(),
            ViewportError::InvalidZoom(0.0)
        );
        assert!(Viewport::new(0.0, 0.0, -1.0).is_err());
        assert!(Viewport::new(0.0, 0.0, f64::NAN).is_err());
        assert_eq!(
            Viewport::new(f64::INFINITY, 0.0, 1.0).unwrap_err(),
            ViewportError::InvalidPan
        );
    }

    proptest! {
        #[test]
        fn diagram_screen_round_trip(
            x in -1.0e5f64..1.0e5,
            y in -1.0e5f64..1.0e5,
            pan_x in -1.0e4f64..1.0e4,
            pan_y in -1.0e4f64..1.0e4,
            zoom in 0.05f64..20.0,
        ) {
            let viewport = Viewport::new(pan_x, pan_y, zoom).unwrap();
            let screen = viewport.to_screen_space(x, y);
            let back = viewport.to_diagram_space(screen.x, screen.y);
            prop_assert!(close_to(back.x, x), "x: {} != {}", back.x, x);
            prop_assert!(close_to(back.y, y), "y: {} != {}", back.y, y);
        }
    }
}
