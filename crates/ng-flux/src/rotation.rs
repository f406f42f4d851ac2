//! Optional 3-D rotation between the flux coordinate system and the
//! detector frame, built from a declarative configuration.

use nalgebra::{Matrix3, Rotation3, Vector3};
use ng_core::{Error, Result};

/// A flux-frame rotation.
///
/// The stored matrix maps flux-frame vectors into the detector frame; the
/// inverse is applied when interpreting user-supplied coordinates, which
/// keeps the frame-vs-object rotation convention consistent with the
/// original tooling.
#[derive(Debug, Clone, PartialEq)]
pub struct FluxRotation {
    matrix: Matrix3<f64>,
}

impl FluxRotation {
    /// Build from a configuration string plus its numeric values.
    ///
    /// `cfg` selects the form:
    /// - `none` → `Ok(None)`
    /// - `newxyz` or `3x3` → `values` are 9 numbers giving the new X, Y, Z
    ///   basis vectors expressed in old coordinates (row-major)
    /// - `series <spec>` → `<spec>` is a whitespace-separated sequence of
    ///   axis-tagged angles such as `x30d z1.5708r`, applied left to right;
    ///   the unit suffix is `d` (degrees) or `r` (radians)
    pub fn from_config(cfg: &str, values: &[f64]) -> Result<Option<FluxRotation>> {
        let cfg = cfg.trim();
        if cfg.is_empty() || cfg.eq_ignore_ascii_case("none") {
            return Ok(None);
        }
        let lower = cfg.to_ascii_lowercase();
        if lower == "newxyz" || lower == "3x3" {
            if values.len() != 9 {
                return Err(Error::Config(format!(
                    "newxyz rotation needs 9 values, got {}",
                    values.len()
                )));
            }
            let m = Matrix3::from_row_slice(values);
            // Basis vectors must form a proper rotation (orthonormal).
            let det = m.determinant();
            if (det.abs() - 1.0).abs() > 1e-6 {
                return Err(Error::Config(format!(
                    "newxyz rotation matrix is not orthonormal (det = {det})"
                )));
            }
            return Ok(Some(FluxRotation { matrix: m }));
        }
        if let Some(series) = lower.strip_prefix("series") {
            let mut m = Matrix3::identity();
            for tok in series.split_whitespace() {
                let mut chars = tok.chars();
                let axis = chars.next().ok_or_else(|| {
                    Error::Config(format!("empty rotation token in series '{cfg}'"))
                })?;
                let rest: String = chars.collect();
                let (num, unit) = rest.split_at(rest.len().saturating_sub(1));
                let angle: f64 = num.parse().map_err(|_| {
                    Error::Config(format!("bad rotation angle in token '{tok}'"))
                })?;
                let angle = match unit {
                    "d" => angle.to_radians(),
                    "r" => angle,
                    _ => {
                        return Err(Error::Config(format!(
                            "rotation token '{tok}' must end in 'd' or 'r'"
                        )))
                    }
                };
                let rot = match axis {
                    'x' => Rotation3::from_axis_angle(&Vector3::x_axis(), angle),
                    'y' => Rotation3::from_axis_angle(&Vector3::y_axis(), angle),
                    'z' => Rotation3::from_axis_angle(&Vector3::z_axis(), angle),
                    _ => {
                        return Err(Error::Config(format!(
                            "rotation axis '{axis}' is not one of x/y/z"
                        )))
                    }
                };
                m = rot.matrix() * m;
            }
            return Ok(Some(FluxRotation { matrix: m }));
        }
        Err(Error::Config(format!("unknown flux rotation form '{cfg}'")))
    }

    /// Rotate a flux-frame vector into the detector frame.
    pub fn apply(&self, v: [f64; 3]) -> [f64; 3] {
        let out = self.matrix * Vector3::new(v[0], v[1], v[2]);
        [out.x, out.y, out.z]
    }

    /// Rotate a detector-frame (user-supplied) vector into the flux frame.
    pub fn apply_inverse(&self, v: [f64; 3]) -> [f64; 3] {
        let out = self.matrix.transpose() * Vector3::new(v[0], v[1], v[2]);
        [out.x, out.y, out.z]
    }

    /// The stored rotation matrix.
    pub fn matrix(&self) -> &Matrix3<f64> {
        &self.matrix
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_none_yields_no_rotation() {
        assert!(FluxRotation::from_config("none", &[]).unwrap().is_none());
        assert!(FluxRotation::from_config("", &[]).unwrap().is_none());
    }

    #[test]
    fn test_newxyz_identity() {
        let vals = [1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0];
        let r = FluxRotation::from_config("newxyz", &vals).unwrap().unwrap();
        let v = r.apply([1.0, 2.0, 3.0]);
        assert_relative_eq!(v[0], 1.0);
        assert_relative_eq!(v[1], 2.0);
        assert_relative_eq!(v[2], 3.0);
    }

    #[test]
    fn test_newxyz_wrong_count() {
        assert!(FluxRotation::from_config("3x3", &[1.0; 8]).is_err());
    }

    #[test]
    fn test_series_z90_maps_x_to_y() {
        let r = FluxRotation::from_config("series z90d", &[]).unwrap().unwrap();
        let v = r.apply([1.0, 0.0, 0.0]);
        assert_relative_eq!(v[0], 0.0, epsilon = 1e-12);
        assert_relative_eq!(v[1], 1.0, epsilon = 1e-12);
        assert_relative_eq!(v[2], 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_inverse_undoes_apply() {
        let r = FluxRotation::from_config("series x30d z45d y0.5r", &[]).unwrap().unwrap();
        let v = [0.3, -1.2, 2.5];
        let back = r.apply_inverse(r.apply(v));
        for i in 0..3 {
            assert_relative_eq!(back[i], v[i], epsilon = 1e-12);
        }
    }

    #[test]
    fn test_unknown_form_is_fatal() {
        assert!(FluxRotation::from_config("euler 1 2 3", &[]).is_err());
    }
}
