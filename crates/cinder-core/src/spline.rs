//! Scalar property curves with piecewise cubic Hermite evaluation
//!
//! Effect properties are authored as curves over normalized time. Each
//! control point carries a value and a tangent direction; between points
//! the curve is a cubic Hermite segment, and outside the authored domain
//! it clamps to the endpoint values.

use crate::error::{CinderError, Result};
use serde::{Deserialize, Serialize};

/// A single control point on a property curve.
///
/// `tx`/`ty` describe the tangent direction at the point. `tx` must be
/// positive so the curve stays a function of x; the slope is `ty / tx`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CurvePoint {
    pub x: f32,
    pub y: f32,
    #[serde(default = "default_tangent_x")]
    pub tx: f32,
    #[serde(default)]
    pub ty: f32,
}

fn default_tangent_x() -> f32 {
    1.0
}

impl CurvePoint {
    pub const fn new(x: f32, y: f32, tx: f32, ty: f32) -> Self {
        Self { x, y, tx, ty }
    }

    /// Tangent slope dy/dx at this point
    fn slope(&self) -> f32 {
        self.ty / self.tx
    }
}

/// A scalar property curve: control points with strictly increasing x
/// values. Evaluation is total; a curve with no points reads as zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyCurve {
    points: Vec<CurvePoint>,
}

impl PropertyCurve {
    /// Build a curve, validating the control points
    pub fn new(points: Vec<CurvePoint>) -> Result<Self> {
        for (i, p) in points.iter().enumerate() {
            if !p.tx.is_finite() || p.tx <= 0.0 {
                return Err(CinderError::InvalidCurve(format!(
                    "point {i}: tangent tx must be positive, got {}",
                    p.tx
                )));
            }
            if !p.x.is_finite() || !p.y.is_finite() || !p.ty.is_finite() {
                return Err(CinderError::InvalidCurve(format!(
                    "point {i}: non-finite component"
                )));
            }
        }
        for (i, pair) in points.windows(2).enumerate() {
            if pair[1].x <= pair[0].x {
                return Err(CinderError::InvalidCurve(format!(
                    "point {} x={} does not increase past point {} x={}",
                    i + 1,
                    pair[1].x,
                    i,
                    pair[0].x
                )));
            }
        }
        Ok(Self { points })
    }

    /// A curve that holds `y` for all inputs
    pub fn constant(y: f32) -> Self {
        Self {
            points: vec![CurvePoint::new(0.0, y, 1.0, 0.0)],
        }
    }

    pub fn points(&self) -> &[CurvePoint] {
        &self.points
    }

    /// Evaluate the curve at `x`, clamping outside the authored domain.
    /// An empty curve reads as zero.
    ///
    /// At a control point's exact x the stored y is returned unmodified.
    pub fn evaluate(&self, x: f32) -> f32 {
        let Some(first) = self.points.first() else {
            return 0.0;
        };
        // NaN takes this branch too, so the segment scan below always
        // has a bracketing pair
        if x.is_nan() || x <= first.x {
            return first.y;
        }
        let last = &self.points[self.points.len() - 1];
        if x >= last.x {
            return last.y;
        }

        // Linear scan; curves hold a handful of points
        let mut seg = 0;
        for (i, pair) in self.points.windows(2).enumerate() {
            if x < pair[1].x {
                seg = i;
                break;
            }
        }

        let p0 = &self.points[seg];
        let p1 = &self.points[seg + 1];
        let dx = p1.x - p0.x;
        let t = (x - p0.x) / dx;
        // Tangents scale with segment width so slopes are in value-per-x units
        cubic_hermite(p0.y, p0.slope() * dx, p1.y, p1.slope() * dx, t)
    }
}

/// Cubic Hermite interpolation.
///
/// `p0`, `m0`: start value and outgoing tangent
/// `p1`, `m1`: end value and incoming tangent
/// `t`: normalized [0..1] parameter
pub fn cubic_hermite(p0: f32, m0: f32, p1: f32, m1: f32, t: f32) -> f32 {
    let t2 = t * t;
    let t3 = t2 * t;

    // Hermite basis functions
    let h00 = 2.0 * t3 - 3.0 * t2 + 1.0;
    let h10 = t3 - 2.0 * t2 + t;
    let h01 = -2.0 * t3 + 3.0 * t2;
    let h11 = t3 - t2;

    h00 * p0 + h10 * m0 + h01 * p1 + h11 * m1
}
