//! Detector geometry: the top-volume description used for vertex
//! placement, the fiducial-cut mini-DSL, and the geometry-scan selector.

use ng_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Axis-aligned box, detector coordinates (cm).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Lower corner.
    pub min: [f64; 3],
    /// Upper corner.
    pub max: [f64; 3],
}

impl BoundingBox {
    /// Point-in-box test, boundary inclusive.
    pub fn contains(&self, p: [f64; 3]) -> bool {
        (0..3).all(|i| p[i] >= self.min[i] && p[i] <= self.max[i])
    }
}

/// Top-volume geometry handed to the driver. Lengths in centimeters,
/// densities in g/cm3; masses are carried in kg for the rate formula.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectorGeometry {
    /// Name of the selected top volume.
    pub top_volume: String,
    /// Bounding box of the top volume in detector coordinates.
    pub bounds: BoundingBox,
    /// Offset of the top-volume frame origin in master (world)
    /// coordinates.
    pub master_offset: [f64; 3],
    /// Active mass (kg).
    pub detector_mass: f64,
    /// Surrounding material mass (kg).
    pub surrounding_mass: f64,
}

impl DetectorGeometry {
    /// Translate a top-volume point into master coordinates.
    pub fn to_master(&self, p: [f64; 3]) -> [f64; 3] {
        [
            p[0] + self.master_offset[0],
            p[1] + self.master_offset[1],
            p[2] + self.master_offset[2],
        ]
    }
}

// ── fiducial mini-DSL ──────────────────────────────────────────

/// Fiducial shapes recognized by the mini-DSL.
#[derive(Debug, Clone, PartialEq)]
pub enum FiducialShape {
    /// `zcyl:x0,y0,r,zmin,zmax`
    ZCyl {
        /// Axis x.
        x0: f64,
        /// Axis y.
        y0: f64,
        /// Radius.
        r: f64,
        /// Lower z.
        zmin: f64,
        /// Upper z.
        zmax: f64,
    },
    /// `box:xmin,ymin,zmin,xmax,ymax,zmax`
    Box(BoundingBox),
    /// `zpoly:nfaces,x0,y0,rin,phi,zmin,zmax`
    ZPoly {
        /// Number of faces.
        nfaces: u32,
        /// Axis x.
        x0: f64,
        /// Axis y.
        y0: f64,
        /// Inscribed radius.
        rin: f64,
        /// Phase angle of the first face normal (rad).
        phi: f64,
        /// Lower z.
        zmin: f64,
        /// Upper z.
        zmax: f64,
    },
    /// `sphere:x0,y0,z0,r`
    Sphere {
        /// Center.
        center: [f64; 3],
        /// Radius.
        r: f64,
    },
}

impl FiducialShape {
    fn contains(&self, p: [f64; 3]) -> bool {
        match self {
            FiducialShape::ZCyl { x0, y0, r, zmin, zmax } => {
                let (dx, dy) = (p[0] - x0, p[1] - y0);
                dx * dx + dy * dy <= r * r && p[2] >= *zmin && p[2] <= *zmax
            }
            FiducialShape::Box(b) => b.contains(p),
            FiducialShape::ZPoly { nfaces, x0, y0, rin, phi, zmin, zmax } => {
                if p[2] < *zmin || p[2] > *zmax {
                    return false;
                }
                // Inside a regular polygon iff the projection onto every
                // face normal stays within the inscribed radius.
                let (dx, dy) = (p[0] - x0, p[1] - y0);
                let n = (*nfaces).max(3);
                (0..n).all(|i| {
                    let a = phi + 2.0 * std::f64::consts::PI * i as f64 / n as f64;
                    dx * a.cos() + dy * a.sin() <= *rin
                })
            }
            FiducialShape::Sphere { center, r } => {
                let d2 = (0..3).map(|i| (p[i] - center[i]).powi(2)).sum::<f64>();
                d2 <= r * r
            }
        }
    }
}

/// Rock-box parameters; the cut forces the top volume to the world
/// volume and accepts interactions in the surrounding material.
#[derive(Debug, Clone, PartialEq)]
pub struct RockBox {
    /// Inner fiducial box, detector coordinates.
    pub inner: BoundingBox,
    /// Wall thickness added around the inner box (cm).
    pub wall: f64,
    /// Mean energy loss in rock (GeV/cm) used to pre-cut low-energy rays.
    pub dedx: f64,
    /// Safety fudge factor on the range estimate.
    pub fudge: f64,
    /// Accept only rock interactions, rejecting the inner box.
    pub rock_only: bool,
}

/// A parsed fiducial cut.
#[derive(Debug, Clone, PartialEq)]
pub enum FiducialCut {
    /// Accept (or with `reverse` reject) vertices inside a shape.
    Shape {
        /// The shape.
        shape: FiducialShape,
        /// Leading `0`: reject instead of accept.
        reverse: bool,
        /// Leading `m`: values are master coordinates.
        master: bool,
    },
    /// Rock-box selector.
    Rock(RockBox),
}

fn parse_values(s: &str, want: usize, what: &str) -> Result<Vec<f64>> {
    let vals: Vec<f64> = s
        .split(',')
        .map(|v| {
            v.trim()
                .parse::<f64>()
                .map_err(|_| Error::Config(format!("bad {what} value '{}'", v.trim())))
        })
        .collect::<Result<_>>()?;
    if vals.len() != want {
        return Err(Error::Config(format!(
            "{what} needs {want} values, got {}",
            vals.len()
        )));
    }
    Ok(vals)
}

impl FiducialCut {
    /// Parse the mini-DSL: `[0][m]<shape>:val1,val2,...`.
    pub fn parse(input: &str) -> Result<Self> {
        let mut rest = input.trim();
        let mut reverse = false;
        let mut master = false;
        if let Some(r) = rest.strip_prefix('0') {
            reverse = true;
            rest = r;
        }
        if let Some(r) = rest.strip_prefix('m') {
            master = true;
            rest = r;
        }
        let (shape_name, args) = rest
            .split_once(':')
            .ok_or_else(|| Error::Config(format!("fiducial cut '{input}' has no ':'")))?;
        let shape = match shape_name.trim() {
            "zcyl" => {
                let v = parse_values(args, 5, "zcyl")?;
                FiducialShape::ZCyl { x0: v[0], y0: v[1], r: v[2], zmin: v[3], zmax: v[4] }
            }
            "box" => {
                let v = parse_values(args, 6, "box")?;
                FiducialShape::Box(BoundingBox {
                    min: [v[0], v[1], v[2]],
                    max: [v[3], v[4], v[5]],
                })
            }
            "zpoly" => {
                let v = parse_values(args, 7, "zpoly")?;
                FiducialShape::ZPoly {
                    nfaces: v[0] as u32,
                    x0: v[1],
                    y0: v[2],
                    rin: v[3],
                    phi: v[4],
                    zmin: v[5],
                    zmax: v[6],
                }
            }
            "sphere" => {
                let v = parse_values(args, 4, "sphere")?;
                FiducialShape::Sphere { center: [v[0], v[1], v[2]], r: v[3] }
            }
            "rock" => {
                // rock:xmin,ymin,zmin,xmax,ymax,zmax,wall,dedx,fudge,rockonly
                let v = parse_values(args, 10, "rock")?;
                return Ok(FiducialCut::Rock(RockBox {
                    inner: BoundingBox { min: [v[0], v[1], v[2]], max: [v[3], v[4], v[5]] },
                    wall: v[6],
                    dedx: v[7],
                    fudge: v[8],
                    rock_only: v[9] != 0.0,
                }));
            }
            other => return Err(Error::Config(format!("unknown fiducial shape '{other}'"))),
        };
        Ok(FiducialCut::Shape { shape, reverse, master })
    }

    /// Accept or reject a vertex. `geom` supplies the top-volume to
    /// master translation for cuts declared in master coordinates.
    pub fn accepts(&self, vertex: [f64; 3], geom: &DetectorGeometry) -> bool {
        match self {
            FiducialCut::Shape { shape, reverse, master } => {
                let p = if *master { geom.to_master(vertex) } else { vertex };
                shape.contains(p) != *reverse
            }
            FiducialCut::Rock(rock) => {
                let outer = BoundingBox {
                    min: [
                        rock.inner.min[0] - rock.wall,
                        rock.inner.min[1] - rock.wall,
                        rock.inner.min[2] - rock.wall,
                    ],
                    max: [
                        rock.inner.max[0] + rock.wall,
                        rock.inner.max[1] + rock.wall,
                        rock.inner.max[2] + rock.wall,
                    ],
                };
                if rock.rock_only {
                    outer.contains(vertex) && !rock.inner.contains(vertex)
                } else {
                    outer.contains(vertex)
                }
            }
        }
    }
}

// ── geometry scan ──────────────────────────────────────────────

/// Driver geometry-scan configuration.
#[derive(Debug, Clone, PartialEq)]
pub enum GeomScan {
    /// Driver default scan.
    Default,
    /// Pre-computed max-path-lengths file.
    File(PathBuf),
    /// Box scan: `box:<nPoints> <nRays> [safety] [writeout]`.
    Box {
        /// Surface points.
        n_points: u32,
        /// Rays per point.
        n_rays: u32,
        /// Safety factor on the found maximum.
        safety: f64,
        /// Write the scan result to disk.
        writeout: bool,
    },
    /// Flux-driven scan: `flux:<nParticles> [safety] [writeout]`.
    Flux {
        /// Rays drawn from the flux driver.
        n_particles: u32,
        /// Safety factor on the found maximum.
        safety: f64,
        /// Write the scan result to disk.
        writeout: bool,
    },
}

impl GeomScan {
    /// Parse the `GeomScan` selector string. Empty means `default`.
    pub fn parse(input: &str) -> Result<Self> {
        let s = input.trim();
        if s.is_empty() || s.eq_ignore_ascii_case("default") {
            return Ok(GeomScan::Default);
        }
        if let Some(path) = s.strip_prefix("file:") {
            let path = path.trim();
            if path.is_empty() {
                return Err(Error::Config("geom scan 'file:' needs a path".into()));
            }
            return Ok(GeomScan::File(PathBuf::from(path)));
        }
        if let Some(args) = s.strip_prefix("box:") {
            let parts: Vec<&str> = args.split_whitespace().collect();
            if parts.len() < 2 || parts.len() > 4 {
                return Err(Error::Config(format!("bad box geom scan '{s}'")));
            }
            let n_points = parts[0]
                .parse()
                .map_err(|_| Error::Config(format!("bad box scan point count '{}'", parts[0])))?;
            let n_rays = parts[1]
                .parse()
                .map_err(|_| Error::Config(format!("bad box scan ray count '{}'", parts[1])))?;
            let safety = parts
                .get(2)
                .map(|v| v.parse::<f64>())
                .transpose()
                .map_err(|_| Error::Config(format!("bad box scan safety in '{s}'")))?
                .unwrap_or(1.0);
            let writeout = parts.get(3).map(|v| *v != "0").unwrap_or(false);
            return Ok(GeomScan::Box { n_points, n_rays, safety, writeout });
        }
        if let Some(args) = s.strip_prefix("flux:") {
            let parts: Vec<&str> = args.split_whitespace().collect();
            if parts.is_empty() || parts.len() > 3 {
                return Err(Error::Config(format!("bad flux geom scan '{s}'")));
            }
            let n_particles = parts[0]
                .parse()
                .map_err(|_| Error::Config(format!("bad flux scan count '{}'", parts[0])))?;
            let safety = parts
                .get(1)
                .map(|v| v.parse::<f64>())
                .transpose()
                .map_err(|_| Error::Config(format!("bad flux scan safety in '{s}'")))?
                .unwrap_or(1.0);
            let writeout = parts.get(2).map(|v| *v != "0").unwrap_or(false);
            return Ok(GeomScan::Flux { n_particles, safety, writeout });
        }
        Err(Error::Config(format!("unrecognized geom scan '{s}'")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn geom() -> DetectorGeometry {
        DetectorGeometry {
            top_volume: "vDetEnclosure".into(),
            bounds: BoundingBox { min: [-200.0, -200.0, 0.0], max: [200.0, 200.0, 500.0] },
            master_offset: [0.0, 0.0, 1000.0],
            detector_mass: 1.0,
            surrounding_mass: 0.0,
        }
    }

    #[test]
    fn test_box_cut_includes_and_reverse_excludes() {
        let inside = [0.0, 0.0, 100.0];
        let cut = FiducialCut::parse("box:-50,-50,50,50,50,150").unwrap();
        assert!(cut.accepts(inside, &geom()));
        let cut = FiducialCut::parse("0box:-50,-50,50,50,50,150").unwrap();
        assert!(!cut.accepts(inside, &geom()));
        assert!(cut.accepts([0.0, 0.0, 400.0], &geom()));
    }

    #[test]
    fn test_master_flag_translates_before_testing() {
        // The box is placed at master z = [1050, 1150]; the top-volume
        // point z = 100 lands at master z = 1100.
        let cut = FiducialCut::parse("mbox:-50,-50,1050,50,50,1150").unwrap();
        assert!(cut.accepts([0.0, 0.0, 100.0], &geom()));
        assert!(!cut.accepts([0.0, 0.0, 300.0], &geom()));
    }

    #[test]
    fn test_zcyl_and_sphere() {
        let cut = FiducialCut::parse("zcyl:0,0,10,0,100").unwrap();
        assert!(cut.accepts([5.0, 5.0, 50.0], &geom()));
        assert!(!cut.accepts([9.0, 9.0, 50.0], &geom()));
        let cut = FiducialCut::parse("sphere:0,0,0,10").unwrap();
        assert!(cut.accepts([0.0, 0.0, 9.0], &geom()));
        assert!(!cut.accepts([0.0, 0.0, 11.0], &geom()));
    }

    #[test]
    fn test_zpoly_square() {
        // 4 faces, inscribed radius 10, faces aligned with the axes.
        let cut = FiducialCut::parse("zpoly:4,0,0,10,0,0,100").unwrap();
        assert!(cut.accepts([9.0, 9.0, 50.0], &geom()));
        assert!(!cut.accepts([11.0, 0.0, 50.0], &geom()));
    }

    #[test]
    fn test_rock_box() {
        let cut = FiducialCut::parse("rock:-50,-50,-50,50,50,50,25,0.002,1.2,1").unwrap();
        // Inner box rejected when rock-only, wall accepted.
        assert!(!cut.accepts([0.0, 0.0, 0.0], &geom()));
        assert!(cut.accepts([60.0, 0.0, 0.0], &geom()));
        assert!(!cut.accepts([80.0, 0.0, 0.0], &geom()));
    }

    #[test]
    fn test_unknown_shape_is_fatal() {
        assert!(FiducialCut::parse("egg:1,2,3").is_err());
    }

    #[test]
    fn test_geom_scan_forms() {
        assert_eq!(GeomScan::parse("").unwrap(), GeomScan::Default);
        assert_eq!(GeomScan::parse("default").unwrap(), GeomScan::Default);
        assert_eq!(
            GeomScan::parse("file:/tmp/maxpl.json").unwrap(),
            GeomScan::File(PathBuf::from("/tmp/maxpl.json"))
        );
        assert_eq!(
            GeomScan::parse("box: 200 200 1.1 1").unwrap(),
            GeomScan::Box { n_points: 200, n_rays: 200, safety: 1.1, writeout: true }
        );
        assert_eq!(
            GeomScan::parse("flux: 10000").unwrap(),
            GeomScan::Flux { n_particles: 10000, safety: 1.0, writeout: false }
        );
        assert!(GeomScan::parse("spiral: 3").is_err());
    }
}
