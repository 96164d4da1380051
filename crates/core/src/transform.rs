//! Model ↔ GPS coordinate transform fitting (Helmert / affine).
//!
//! All GPS positions are first projected into a [`LocalTangentPlane`]
//! centred on the GPS centroid, so the fit is a planar problem in meters.
//! Model coordinates are centred on their own centroid before solving,
//! which keeps the normal equations well-conditioned for georeferenced
//! models whose coordinates are in the millions.
//!
//! The fitted map is
//!
//! ```text
//! [e]   [a b] [x - x0]   [tx]
//! [n] = [c d] [y - y0] + [ty]
//! ```
//!
//! where `(x0, y0)` is the model origin and `(e, n)` are tangent-plane meters.

use nalgebra::{DMatrix, Matrix2, Vector2};
use serde::{Deserialize, Serialize};

use crate::geo::{GpsCoord, LocalTangentPlane, ModelCoord};

/// Minimum number of active calibration points for any fit.
pub const MIN_POINTS: usize = 2;

/// Relative threshold below which a linear system is treated as singular.
pub const SINGULAR_EPSILON: f64 = 1e-9;

/// Points closer than this in the planar frame do not separate (meters).
pub const DEGENERATE_SEPARATION_M: f64 = 1e-3;

/// Residual multiple of the RMSE above which a point is flagged.
pub const OUTLIER_RMSE_FACTOR: f64 = 2.0;

/// Residuals below this are never flagged, however small the RMSE (meters).
pub const OUTLIER_MIN_ERROR_M: f64 = 0.5;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Calibration input the operator must fix. None of these are retryable.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TransformError {
    #[error("At least {MIN_POINTS} active calibration points are required, found {found}. Capture another reference point.")]
    InsufficientPoints { found: usize },

    #[error("Calibration points are collinear or coincide in the model ({detail}). Add a point away from the line through the existing ones.")]
    SingularConfiguration { detail: String },

    #[error("Calibration points do not separate in the GPS frame ({detail}). Capture points further apart on site.")]
    DegenerateProjection { detail: String },
}

impl TransformError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::InsufficientPoints { .. } => "INSUFFICIENT_POINTS",
            Self::SingularConfiguration { .. } => "SINGULAR_CONFIGURATION",
            Self::DegenerateProjection { .. } => "DEGENERATE_PROJECTION",
        }
    }
}

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// One surveyed model ↔ GPS pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Correspondence {
    pub model: ModelCoord,
    pub gps: GpsCoord,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransformKind {
    /// Rotation, uniform scale and translation (exactly two points).
    Helmert,
    /// Full 6-parameter least-squares fit (three or more points).
    Affine,
}

impl TransformKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Helmert => "helmert",
            Self::Affine => "affine",
        }
    }

    pub fn from_str_db(s: &str) -> Option<Self> {
        match s {
            "helmert" => Some(Self::Helmert),
            "affine" => Some(Self::Affine),
            _ => None,
        }
    }
}

/// A fitted transform plus the accuracy of the fit over its input points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoordinateTransform {
    pub kind: TransformKind,
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub tx: f64,
    pub ty: f64,
    pub rotation_deg: f64,
    pub scale: f64,
    /// Model-frame centroid subtracted before applying the linear part.
    pub model_origin_x: f64,
    pub model_origin_y: f64,
    /// Tangent-plane origin used for the planar frame.
    pub origin_latitude: f64,
    pub origin_longitude: f64,
    pub point_count: usize,
    pub rmse_m: f64,
    pub max_error_m: f64,
}

/// Residual of one calibration point after re-projection.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PointResidual {
    pub index: usize,
    pub dx_m: f64,
    pub dy_m: f64,
    pub error_m: f64,
    pub is_outlier: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccuracyReport {
    pub rmse_m: f64,
    pub max_error_m: f64,
    pub per_point: Vec<PointResidual>,
}

// ---------------------------------------------------------------------------
// Fitting
// ---------------------------------------------------------------------------

/// Fit a transform from model to GPS coordinates.
///
/// Two points give an exact Helmert fit; three or more give a least-squares
/// affine fit. Collinear or coincident model points fail with
/// [`TransformError::SingularConfiguration`] rather than producing
/// non-finite parameters.
pub fn fit_transform(points: &[Correspondence]) -> Result<CoordinateTransform, TransformError> {
    if points.len() < MIN_POINTS {
        return Err(TransformError::InsufficientPoints {
            found: points.len(),
        });
    }
    if let Some(bad) = points.iter().position(|p| !is_finite(p)) {
        return Err(TransformError::SingularConfiguration {
            detail: format!("point {bad} has non-finite coordinates"),
        });
    }

    let gps: Vec<GpsCoord> = points.iter().map(|p| p.gps).collect();
    let plane = LocalTangentPlane::centered_on(&gps).ok_or(TransformError::InsufficientPoints {
        found: 0,
    })?;

    let model: Vec<Vector2<f64>> = points.iter().map(|p| p.model.xy()).collect();
    let planar: Vec<Vector2<f64>> = gps.iter().map(|g| plane.project(g)).collect();

    let model_origin = centroid(&model);
    let planar_origin = centroid(&planar);
    let dm: Vec<Vector2<f64>> = model.iter().map(|m| m - model_origin).collect();
    let dp: Vec<Vector2<f64>> = planar.iter().map(|p| p - planar_origin).collect();

    let model_spread = dm.iter().map(|v| v.norm()).fold(0.0, f64::max);
    let model_magnitude = model_origin.norm().max(1.0);
    if model_spread <= SINGULAR_EPSILON * model_magnitude {
        return Err(TransformError::SingularConfiguration {
            detail: "all model points coincide".to_string(),
        });
    }

    let planar_spread = dp.iter().map(|v| v.norm()).fold(0.0, f64::max);
    if planar_spread < DEGENERATE_SEPARATION_M {
        return Err(TransformError::DegenerateProjection {
            detail: format!("GPS positions span only {:.4} m", 2.0 * planar_spread),
        });
    }

    let (kind, linear) = if points.len() == 2 {
        (TransformKind::Helmert, helmert_linear(&dm, &dp))
    } else {
        (TransformKind::Affine, affine_linear(&dm, &dp)?)
    };

    check_invertible(&linear)?;

    let det = linear.determinant();
    let (rotation_deg, scale) = match kind {
        TransformKind::Helmert => (
            normalize_degrees(linear[(1, 0)].atan2(linear[(0, 0)]).to_degrees()),
            (linear[(0, 0)].powi(2) + linear[(1, 0)].powi(2)).sqrt(),
        ),
        TransformKind::Affine => (
            normalize_degrees(linear[(1, 0)].atan2(linear[(0, 0)]).to_degrees()),
            det.abs().sqrt(),
        ),
    };

    let (origin_latitude, origin_longitude) = plane.origin();
    let mut transform = CoordinateTransform {
        kind,
        a: linear[(0, 0)],
        b: linear[(0, 1)],
        c: linear[(1, 0)],
        d: linear[(1, 1)],
        tx: planar_origin.x,
        ty: planar_origin.y,
        rotation_deg,
        scale,
        model_origin_x: model_origin.x,
        model_origin_y: model_origin.y,
        origin_latitude,
        origin_longitude,
        point_count: points.len(),
        rmse_m: 0.0,
        max_error_m: 0.0,
    };

    let report = evaluate_accuracy(&transform, points);
    transform.rmse_m = report.rmse_m;
    transform.max_error_m = report.max_error_m;
    Ok(transform)
}

/// Closed-form similarity from the segment joining two centred points.
fn helmert_linear(dm: &[Vector2<f64>], dp: &[Vector2<f64>]) -> Matrix2<f64> {
    let vm = dm[1] - dm[0];
    let vp = dp[1] - dp[0];
    let scale = vp.norm() / vm.norm();
    let theta = vp.y.atan2(vp.x) - vm.y.atan2(vm.x);
    let (sin, cos) = theta.sin_cos();
    Matrix2::new(scale * cos, -scale * sin, scale * sin, scale * cos)
}

/// Least-squares linear part over centred coordinates.
///
/// Solves `X · Aᵀ = P` where the rows of `X` are centred model points and
/// the rows of `P` are centred planar points. Centring decouples the
/// translation, which is then exactly the planar centroid.
fn affine_linear(dm: &[Vector2<f64>], dp: &[Vector2<f64>]) -> Result<Matrix2<f64>, TransformError> {
    let n = dm.len();
    let x = DMatrix::<f64>::from_fn(n, 2, |r, c| dm[r][c]);
    let p = DMatrix::<f64>::from_fn(n, 2, |r, c| dp[r][c]);

    let svd = x.svd(true, true);
    let sigma_max = svd.singular_values.max();
    let sigma_min = svd.singular_values.min();
    if sigma_max <= 0.0 || sigma_min / sigma_max < SINGULAR_EPSILON.sqrt() {
        return Err(TransformError::SingularConfiguration {
            detail: format!(
                "model points are collinear (singular value ratio {:.3e})",
                if sigma_max > 0.0 { sigma_min / sigma_max } else { 0.0 }
            ),
        });
    }

    let solution = svd
        .solve(&p, SINGULAR_EPSILON)
        .map_err(|e| TransformError::SingularConfiguration {
            detail: e.to_string(),
        })?;

    // `solution` is Aᵀ.
    Ok(Matrix2::new(
        solution[(0, 0)],
        solution[(1, 0)],
        solution[(0, 1)],
        solution[(1, 1)],
    ))
}

fn check_invertible(linear: &Matrix2<f64>) -> Result<(), TransformError> {
    let det = linear.determinant();
    let frob_sq = linear.norm_squared();
    if !det.is_finite() || frob_sq == 0.0 || det.abs() < SINGULAR_EPSILON * 0.5 * frob_sq {
        return Err(TransformError::SingularConfiguration {
            detail: format!("determinant {det:.3e} is not invertible"),
        });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Application
// ---------------------------------------------------------------------------

impl CoordinateTransform {
    fn linear(&self) -> Matrix2<f64> {
        Matrix2::new(self.a, self.b, self.c, self.d)
    }

    pub fn plane(&self) -> LocalTangentPlane {
        LocalTangentPlane::new(self.origin_latitude, self.origin_longitude)
    }

    /// Model coordinate → tangent-plane meters.
    pub fn to_planar(&self, model: &ModelCoord) -> Vector2<f64> {
        let centred = Vector2::new(model.x - self.model_origin_x, model.y - self.model_origin_y);
        self.linear() * centred + Vector2::new(self.tx, self.ty)
    }
}

/// Forward map: model → GPS.
pub fn apply(transform: &CoordinateTransform, model: &ModelCoord) -> GpsCoord {
    transform.plane().unproject(&transform.to_planar(model))
}

/// Inverse map: GPS → model.
pub fn apply_inverse(
    transform: &CoordinateTransform,
    gps: &GpsCoord,
) -> Result<ModelCoord, TransformError> {
    let linear = transform.linear();
    check_invertible(&linear)?;
    let inverse = linear
        .try_inverse()
        .ok_or_else(|| TransformError::SingularConfiguration {
            detail: "linear part has no inverse".to_string(),
        })?;
    let planar = transform.plane().project(gps) - Vector2::new(transform.tx, transform.ty);
    let centred = inverse * planar;
    Ok(ModelCoord::new(
        centred.x + transform.model_origin_x,
        centred.y + transform.model_origin_y,
    ))
}

/// Re-project every point through `transform` and measure the residual
/// against its surveyed position in the transform's planar frame.
pub fn evaluate_accuracy(transform: &CoordinateTransform, points: &[Correspondence]) -> AccuracyReport {
    let plane = transform.plane();
    let mut per_point: Vec<PointResidual> = points
        .iter()
        .enumerate()
        .map(|(index, p)| {
            let residual = transform.to_planar(&p.model) - plane.project(&p.gps);
            PointResidual {
                index,
                dx_m: residual.x,
                dy_m: residual.y,
                error_m: residual.norm(),
                is_outlier: false,
            }
        })
        .collect();

    if per_point.is_empty() {
        return AccuracyReport {
            rmse_m: 0.0,
            max_error_m: 0.0,
            per_point,
        };
    }

    let sum_sq: f64 = per_point.iter().map(|r| r.error_m * r.error_m).sum();
    let rmse_m = (sum_sq / per_point.len() as f64).sqrt();
    let max_error_m = per_point.iter().map(|r| r.error_m).fold(0.0, f64::max);

    let threshold = (OUTLIER_RMSE_FACTOR * rmse_m).max(OUTLIER_MIN_ERROR_M);
    for r in &mut per_point {
        r.is_outlier = r.error_m > threshold;
    }

    AccuracyReport {
        rmse_m,
        max_error_m,
        per_point,
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn centroid(points: &[Vector2<f64>]) -> Vector2<f64> {
    points.iter().fold(Vector2::zeros(), |acc, p| acc + p) / points.len() as f64
}

fn is_finite(p: &Correspondence) -> bool {
    p.model.x.is_finite()
        && p.model.y.is_finite()
        && p.gps.latitude.is_finite()
        && p.gps.longitude.is_finite()
}

fn normalize_degrees(deg: f64) -> f64 {
    let mut d = deg % 360.0;
    if d <= -180.0 {
        d += 360.0;
    } else if d > 180.0 {
        d -= 360.0;
    }
    d
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
