//! Coordinate types and map projections.
//!
//! Two families of projection live here:
//!
//! - [`LocalTangentPlane`]: an equirectangular east/north plane (meters)
//!   around a reference origin. Calibration fits operate in this frame so
//!   the linear algebra works on Euclidean distances instead of degrees.
//!   Over a building site (a few hundred meters) the distortion is far below
//!   survey accuracy, and the mapping is exactly invertible.
//! - [`FixedProjection`]: named real-world coordinate reference systems used
//!   when a model is already georeferenced and needs no calibration.

use std::f64::consts::{FRAC_PI_2, FRAC_PI_4};

use nalgebra::Vector2;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// GRS80 / WGS84 semi-major axis in meters (identical to well below a millimeter).
pub const SEMI_MAJOR_AXIS_M: f64 = 6_378_137.0;

/// GRS80 inverse flattening.
pub const INVERSE_FLATTENING: f64 = 298.257_222_101;

/// First eccentricity squared of the GRS80 ellipsoid.
fn eccentricity_sq() -> f64 {
    let f = 1.0 / INVERSE_FLATTENING;
    2.0 * f - f * f
}

// ---------------------------------------------------------------------------
// Coordinate value types
// ---------------------------------------------------------------------------

/// A position in the building model's native frame (units vary by model).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelCoord {
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub z: Option<f64>,
}

impl ModelCoord {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y, z: None }
    }

    pub(crate) fn xy(&self) -> Vector2<f64> {
        Vector2::new(self.x, self.y)
    }
}

/// A WGS84 position. `accuracy_m` is sensor metadata, never a filter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GpsCoord {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub altitude: Option<f64>,
    #[serde(default)]
    pub accuracy_m: Option<f64>,
}

impl GpsCoord {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            altitude: None,
            accuracy_m: None,
        }
    }

    /// Reject coordinates outside the WGS84 domain or non-finite values.
    pub fn validate(&self) -> Result<(), CoreError> {
        if !self.latitude.is_finite() || !(-90.0..=90.0).contains(&self.latitude) {
            return Err(CoreError::Validation(format!(
                "Latitude {} is outside [-90, 90]",
                self.latitude
            )));
        }
        if !self.longitude.is_finite() || !(-180.0..=180.0).contains(&self.longitude) {
            return Err(CoreError::Validation(format!(
                "Longitude {} is outside [-180, 180]",
                self.longitude
            )));
        }
        if let Some(acc) = self.accuracy_m {
            if !acc.is_finite() || acc < 0.0 {
                return Err(CoreError::Validation(format!(
                    "GPS accuracy must be a non-negative number of meters, got {acc}"
                )));
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Local tangent plane
// ---------------------------------------------------------------------------

/// Equirectangular east/north plane tangent to the ellipsoid at `origin`.
///
/// Radii of curvature are evaluated once at the origin latitude, which makes
/// the forward and inverse maps exact inverses of each other.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocalTangentPlane {
    origin_lat: f64,
    origin_lon: f64,
    meters_per_rad_lat: f64,
    meters_per_rad_lon: f64,
}

impl LocalTangentPlane {
    pub fn new(origin_lat: f64, origin_lon: f64) -> Self {
        let e2 = eccentricity_sq();
        let phi = origin_lat.to_radians();
        let w = 1.0 - e2 * phi.sin().powi(2);
        let meridional = SEMI_MAJOR_AXIS_M * (1.0 - e2) / w.powf(1.5);
        let prime_vertical = SEMI_MAJOR_AXIS_M / w.sqrt();
        Self {
            origin_lat,
            origin_lon,
            meters_per_rad_lat: meridional,
            meters_per_rad_lon: prime_vertical * phi.cos(),
        }
    }

    /// Plane centred on the arithmetic mean of the given GPS positions.
    pub fn centered_on(points: &[GpsCoord]) -> Option<Self> {
        if points.is_empty() {
            return None;
        }
        let n = points.len() as f64;
        let lat = points.iter().map(|p| p.latitude).sum::<f64>() / n;
        let lon = points.iter().map(|p| p.longitude).sum::<f64>() / n;
        Some(Self::new(lat, lon))
    }

    pub fn origin(&self) -> (f64, f64) {
        (self.origin_lat, self.origin_lon)
    }

    /// GPS → (east, north) meters.
    pub fn project(&self, gps: &GpsCoord) -> Vector2<f64> {
        Vector2::new(
            (gps.longitude - self.origin_lon).to_radians() * self.meters_per_rad_lon,
            (gps.latitude - self.origin_lat).to_radians() * self.meters_per_rad_lat,
        )
    }

    /// (east, north) meters → GPS.
    pub fn unproject(&self, planar: &Vector2<f64>) -> GpsCoord {
        GpsCoord::new(
            self.origin_lat + (planar.y / self.meters_per_rad_lat).to_degrees(),
            self.origin_lon + (planar.x / self.meters_per_rad_lon).to_degrees(),
        )
    }
}

// ---------------------------------------------------------------------------
// Fixed projections
// ---------------------------------------------------------------------------

/// Unit of model coordinates for georeferenced (fixed CRS) models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelUnit {
    Millimeter,
    Meter,
}

impl ModelUnit {
    pub fn meters_per_unit(self) -> f64 {
        match self {
            Self::Millimeter => 0.001,
            Self::Meter => 1.0,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Millimeter => "mm",
            Self::Meter => "m",
        }
    }

    pub fn from_str_db(s: &str) -> Result<Self, CoreError> {
        match s {
            "mm" => Ok(Self::Millimeter),
            "m" => Ok(Self::Meter),
            other => Err(CoreError::Validation(format!(
                "Invalid model unit '{other}'. Must be one of: mm, m"
            ))),
        }
    }
}

/// A named coordinate reference system requiring no calibration.
///
/// Model `x` is read as easting and `y` as northing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FixedProjection {
    /// EPSG:3301, Estonian L-EST97 (Lambert conformal conic, 2SP, GRS80).
    LEst97,
    /// EPSG:3857, spherical Web Mercator.
    WebMercator,
}

/// Identifier of the local (calibrated) pathway.
pub const CRS_LOCAL: &str = "local";
pub const CRS_L_EST97: &str = "EPSG:3301";
pub const CRS_WEB_MERCATOR: &str = "EPSG:3857";

/// All accepted coordinate system identifiers.
pub const VALID_COORDINATE_SYSTEMS: &[&str] = &[CRS_LOCAL, CRS_L_EST97, CRS_WEB_MERCATOR];

/// How a project converts between model and GPS coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinatePathway {
    /// Model frame is arbitrary; a calibration transform is required.
    Local,
    /// Model frame is a known projected CRS.
    Fixed(FixedProjection),
}

impl CoordinatePathway {
    pub fn from_str_db(s: &str) -> Result<Self, CoreError> {
        match s {
            CRS_LOCAL => Ok(Self::Local),
            CRS_L_EST97 => Ok(Self::Fixed(FixedProjection::LEst97)),
            CRS_WEB_MERCATOR => Ok(Self::Fixed(FixedProjection::WebMercator)),
            other => Err(CoreError::Validation(format!(
                "Unknown coordinate system '{other}'. Must be one of: {}",
                VALID_COORDINATE_SYSTEMS.join(", ")
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Local => CRS_LOCAL,
            Self::Fixed(FixedProjection::LEst97) => CRS_L_EST97,
            Self::Fixed(FixedProjection::WebMercator) => CRS_WEB_MERCATOR,
        }
    }
}

/// Lambert conformal conic (2SP) parameters for EPSG:3301.
struct LambertConic {
    n: f64,
    f: f64,
    rho_0: f64,
    lon_0: f64,
    false_easting: f64,
    false_northing: f64,
}

fn dms(deg: f64, min: f64, sec: f64) -> f64 {
    (deg + min / 60.0 + sec / 3600.0).to_radians()
}

fn lcc_m(phi: f64, e: f64) -> f64 {
    phi.cos() / (1.0 - (e * phi.sin()).powi(2)).sqrt()
}

fn lcc_t(phi: f64, e: f64) -> f64 {
    let es = e * phi.sin();
    (FRAC_PI_4 - phi / 2.0).tan() / ((1.0 - es) / (1.0 + es)).powf(e / 2.0)
}

impl LambertConic {
    fn l_est97() -> Self {
        let e = eccentricity_sq().sqrt();
        let phi_1 = dms(59.0, 20.0, 0.0);
        let phi_2 = dms(58.0, 0.0, 0.0);
        let phi_0 = dms(57.0, 31.0, 3.194_15);
        let (m1, m2) = (lcc_m(phi_1, e), lcc_m(phi_2, e));
        let (t0, t1, t2) = (lcc_t(phi_0, e), lcc_t(phi_1, e), lcc_t(phi_2, e));
        let n = (m1.ln() - m2.ln()) / (t1.ln() - t2.ln());
        let f = m1 / (n * t1.powf(n));
        Self {
            n,
            f,
            rho_0: SEMI_MAJOR_AXIS_M * f * t0.powf(n),
            lon_0: 24.0_f64.to_radians(),
            false_easting: 500_000.0,
            false_northing: 6_375_000.0,
        }
    }

    fn forward(&self, gps: &GpsCoord) -> Vector2<f64> {
        let e = eccentricity_sq().sqrt();
        let rho = SEMI_MAJOR_AXIS_M * self.f * lcc_t(gps.latitude.to_radians(), e).powf(self.n);
        let theta = self.n * (gps.longitude.to_radians() - self.lon_0);
        Vector2::new(
            self.false_easting + rho * theta.sin(),
            self.false_northing + self.rho_0 - rho * theta.cos(),
        )
    }

    fn inverse(&self, en: &Vector2<f64>) -> GpsCoord {
        let e = eccentricity_sq().sqrt();
        let dx = en.x - self.false_easting;
        let dy = self.rho_0 - (en.y - self.false_northing);
        let rho = (dx * dx + dy * dy).sqrt().copysign(self.n);
        let t = (rho / (SEMI_MAJOR_AXIS_M * self.f)).powf(1.0 / self.n);
        let theta = dx.atan2(dy);

        let mut phi = FRAC_PI_2 - 2.0 * t.atan();
        for _ in 0..15 {
            let es = e * phi.sin();
            let next = FRAC_PI_2 - 2.0 * (t * ((1.0 - es) / (1.0 + es)).powf(e / 2.0)).atan();
            let done = (next - phi).abs() < 1e-12;
            phi = next;
            if done {
                break;
            }
        }

        GpsCoord::new(phi.to_degrees(), (theta / self.n + self.lon_0).to_degrees())
    }
}

impl FixedProjection {
    /// GPS → projected (easting, northing) meters.
    pub fn forward(&self, gps: &GpsCoord) -> Vector2<f64> {
        match self {
            Self::LEst97 => LambertConic::l_est97().forward(gps),
            Self::WebMercator => Vector2::new(
                SEMI_MAJOR_AXIS_M * gps.longitude.to_radians(),
                SEMI_MAJOR_AXIS_M * (FRAC_PI_4 + gps.latitude.to_radians() / 2.0).tan().ln(),
            ),
        }
    }

    /// Projected (easting, northing) meters → GPS.
    pub fn inverse(&self, en: &Vector2<f64>) -> GpsCoord {
        match self {
            Self::LEst97 => LambertConic::l_est97().inverse(en),
            Self::WebMercator => GpsCoord::new(
                (2.0 * (en.y / SEMI_MAJOR_AXIS_M).exp().atan() - FRAC_PI_2).to_degrees(),
                (en.x / SEMI_MAJOR_AXIS_M).to_degrees(),
            ),
        }
    }

    /// Model coordinate (in `unit`) → GPS.
    pub fn model_to_gps(&self, model: &ModelCoord, unit: ModelUnit) -> GpsCoord {
        let k = unit.meters_per_unit();
        let mut gps = self.inverse(&Vector2::new(model.x * k, model.y * k));
        gps.altitude = model.z.map(|z| z * k);
        gps
    }

    /// GPS → model coordinate (in `unit`).
    pub fn gps_to_model(&self, gps: &GpsCoord, unit: ModelUnit) -> ModelCoord {
        let k = unit.meters_per_unit();
        let en = self.forward(gps);
        ModelCoord {
            x: en.x / k,
            y: en.y / k,
            z: gps.altitude.map(|a| a / k),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use assert_matches::assert_matches;

    #[test]
    fn tangent_plane_round_trip_is_exact() {
        let plane = LocalTangentPlane::new(59.437, 24.7536);
        let gps = GpsCoord::new(59.4391, 24.7489);
        let back = plane.unproject(&plane.project(&gps));
        assert_relative_eq!(back.latitude, gps.latitude, epsilon = 1e-12);
        assert_relative_eq!(back.longitude, gps.longitude, epsilon = 1e-12);
    }

    #[test]
    fn tangent_plane_scale_matches_degree_lengths() {
        // At ~59.4°N one degree of longitude is roughly 56.8 km.
        let plane = LocalTangentPlane::new(59.437, 24.0);
        let east = plane.project(&GpsCoord::new(59.437, 25.0));
        assert!((east.x - 56_800.0).abs() < 300.0, "got {}", east.x);
        assert_relative_eq!(east.y, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn centered_plane_requires_points() {
        assert!(LocalTangentPlane::centered_on(&[]).is_none());
        let plane = LocalTangentPlane::centered_on(&[
            GpsCoord::new(10.0, 20.0),
            GpsCoord::new(12.0, 22.0),
        ])
        .unwrap();
        assert_eq!(plane.origin(), (11.0, 21.0));
    }

    #[test]
    fn l_est97_reference_point() {
        // EPSG guidance example area: Tallinn old town.
        let gps = GpsCoord::new(59.437, 24.7536);
        let en = FixedProjection::LEst97.forward(&gps);
        assert!((en.x - 542_000.0).abs() < 1_500.0, "easting {}", en.x);
        assert!((en.y - 6_589_000.0).abs() < 1_500.0, "northing {}", en.y);

        let back = FixedProjection::LEst97.inverse(&en);
        assert_relative_eq!(back.latitude, gps.latitude, epsilon = 1e-9);
        assert_relative_eq!(back.longitude, gps.longitude, epsilon = 1e-9);
    }

    #[test]
    fn l_est97_central_meridian_has_false_easting() {
        let en = FixedProjection::LEst97.forward(&GpsCoord::new(58.5, 24.0));
        assert_relative_eq!(en.x, 500_000.0, epsilon = 1e-6);
    }

    #[test]
    fn web_mercator_round_trip() {
        let gps = GpsCoord::new(-33.8688, 151.2093);
        let back = FixedProjection::WebMercator.inverse(&FixedProjection::WebMercator.forward(&gps));
        assert_relative_eq!(back.latitude, gps.latitude, epsilon = 1e-9);
        assert_relative_eq!(back.longitude, gps.longitude, epsilon = 1e-9);
    }

    #[test]
    fn millimeter_models_scale_before_projection() {
        let proj = FixedProjection::LEst97;
        let gps = GpsCoord::new(59.437, 24.7536);
        let model_mm = proj.gps_to_model(&gps, ModelUnit::Millimeter);
        let model_m = proj.gps_to_model(&gps, ModelUnit::Meter);
        assert_relative_eq!(model_mm.x, model_m.x * 1000.0, epsilon = 1e-3);

        let back = proj.model_to_gps(&model_mm, ModelUnit::Millimeter);
        assert_relative_eq!(back.latitude, gps.latitude, epsilon = 1e-9);
    }

    #[test]
    fn pathway_parsing() {
        assert_eq!(CoordinatePathway::from_str_db("local").unwrap(), CoordinatePathway::Local);
        assert_eq!(
            CoordinatePathway::from_str_db("EPSG:3301").unwrap(),
            CoordinatePathway::Fixed(FixedProjection::LEst97)
        );
        assert_matches!(
            CoordinatePathway::from_str_db("EPSG:9999"),
            Err(CoreError::Validation(_))
        );
        for s in VALID_COORDINATE_SYSTEMS {
            assert_eq!(CoordinatePathway::from_str_db(s).unwrap().as_str(), *s);
        }
    }

    #[test]
    fn gps_validation_rejects_out_of_range() {
        assert!(GpsCoord::new(59.0, 24.0).validate().is_ok());
        assert!(GpsCoord::new(91.0, 24.0).validate().is_err());
        assert!(GpsCoord::new(59.0, f64::NAN).validate().is_err());
        let mut gps = GpsCoord::new(59.0, 24.0);
        gps.accuracy_m = Some(-1.0);
        assert!(gps.validate().is_err());
    }
}
