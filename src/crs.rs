//! Coordinate reference systems and reprojection.
//!
//! The grid is constructed in a length-preserving (projected) CRS so that
//! `cell_size` means metres, while inputs and persisted outputs are usually
//! geographic WGS84. A [`Crs`] is just an EPSG tag; the supported transforms
//! are geographic <-> UTM via the standard transverse-Mercator series
//! (GRS80/WGS84 ellipsoid, k0 = 0.9996, 500 km false easting). Anything
//! fancier belongs to an external toolchain, not this crate.

use std::fmt;

use geo::{Coord, MapCoords};

use crate::error::SimError;

/// EPSG-tagged coordinate reference system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Crs {
    epsg: u32,
}

impl Crs {
    pub const fn from_epsg(epsg: u32) -> Self {
        Self { epsg }
    }

    /// Geographic WGS84 lat/lon (EPSG:4326).
    pub const fn wgs84() -> Self {
        Self { epsg: 4326 }
    }

    /// WGS84 / UTM zone, northern or southern hemisphere.
    pub const fn utm(zone: u8, north: bool) -> Self {
        let base = if north { 32600 } else { 32700 };
        Self {
            epsg: base + zone as u32,
        }
    }

    pub const fn epsg(&self) -> u32 {
        self.epsg
    }

    /// True for the angular lat/lon systems this crate understands
    /// (WGS84 and ETRS89, which coincide at centimetre level).
    pub fn is_geographic(&self) -> bool {
        matches!(self.epsg, 4326 | 4258)
    }

    /// True for the metric (length-preserving) systems this crate
    /// understands: WGS84/UTM (326xx, 327xx) and ETRS89/UTM (258xx).
    pub fn is_projected(&self) -> bool {
        self.utm_zone().is_some()
    }

    fn utm_zone(&self) -> Option<UtmZone> {
        match self.epsg {
            32601..=32660 => Some(UtmZone {
                zone: (self.epsg - 32600) as u8,
                north: true,
            }),
            32701..=32760 => Some(UtmZone {
                zone: (self.epsg - 32700) as u8,
                north: false,
            }),
            // ETRS89 / UTM zones 28N-38N, e.g. 25832 for most of Germany.
            25828..=25838 => Some(UtmZone {
                zone: (self.epsg - 25800) as u8,
                north: true,
            }),
            _ => None,
        }
    }
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EPSG:{}", self.epsg)
    }
}

/// Uniform reprojection capability for spatial inputs.
///
/// Callers are responsible for bringing points and cells into a common CRS
/// before spatial assignment; implementations reproject every coordinate and
/// retag, leaving the original untouched.
pub trait Reproject: Sized {
    fn reproject(&self, target: &Crs) -> Result<Self, SimError>;
}

/// Reprojects a bare geometry between two supported CRS tags.
pub(crate) fn transform<G>(geometry: &G, from: &Crs, to: &Crs) -> Result<G, SimError>
where
    G: MapCoords<f64, f64, Output = G>,
{
    let step = Transform::resolve(from, to)?;
    Ok(geometry.map_coords(|c| step.apply(c)))
}

#[derive(Debug, Clone, Copy)]
enum Transform {
    Identity,
    Project(UtmZone),
    Unproject(UtmZone),
    /// Projected -> projected goes through geographic coordinates.
    Rezone { from: UtmZone, to: UtmZone },
}

impl Transform {
    fn resolve(from: &Crs, to: &Crs) -> Result<Self, SimError> {
        if from == to || (from.is_geographic() && to.is_geographic()) {
            return Ok(Transform::Identity);
        }
        match (from.utm_zone(), to.utm_zone()) {
            (None, Some(zone)) if from.is_geographic() => Ok(Transform::Project(zone)),
            (Some(zone), None) if to.is_geographic() => Ok(Transform::Unproject(zone)),
            (Some(a), Some(b)) => Ok(Transform::Rezone { from: a, to: b }),
            _ => Err(SimError::InvalidParameter(format!(
                "unsupported reprojection {from} -> {to}"
            ))),
        }
    }

    fn apply(&self, c: Coord<f64>) -> Coord<f64> {
        match self {
            Transform::Identity => c,
            Transform::Project(zone) => zone.forward(c),
            Transform::Unproject(zone) => zone.inverse(c),
            Transform::Rezone { from, to } => to.forward(from.inverse(c)),
        }
    }
}

// GRS80/WGS84 ellipsoid; the flattening difference between the two is far
// below the tolerance of anything this crate computes.
const SEMI_MAJOR: f64 = 6_378_137.0;
const FLATTENING: f64 = 1.0 / 298.257_223_563;
const SCALE: f64 = 0.9996;
const FALSE_EASTING: f64 = 500_000.0;
const FALSE_NORTHING_SOUTH: f64 = 10_000_000.0;

fn e2() -> f64 {
    FLATTENING * (2.0 - FLATTENING)
}

fn ep2() -> f64 {
    let e2 = e2();
    e2 / (1.0 - e2)
}

/// Meridian arc length from the equator (Snyder 3-21).
fn meridian_arc(lat: f64) -> f64 {
    let e2 = e2();
    let e4 = e2 * e2;
    let e6 = e4 * e2;
    SEMI_MAJOR
        * ((1.0 - e2 / 4.0 - 3.0 * e4 / 64.0 - 5.0 * e6 / 256.0) * lat
            - (3.0 * e2 / 8.0 + 3.0 * e4 / 32.0 + 45.0 * e6 / 1024.0) * (2.0 * lat).sin()
            + (15.0 * e4 / 256.0 + 45.0 * e6 / 1024.0) * (4.0 * lat).sin()
            - (35.0 * e6 / 3072.0) * (6.0 * lat).sin())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct UtmZone {
    zone: u8,
    north: bool,
}

impl UtmZone {
    fn central_meridian_deg(&self) -> f64 {
        f64::from(self.zone) * 6.0 - 183.0
    }

    /// Geographic (lon, lat in degrees) -> (easting, northing in metres).
    /// Transverse-Mercator series, Snyder eq. 8-9..8-13.
    fn forward(&self, c: Coord<f64>) -> Coord<f64> {
        let lat = c.y.to_radians();
        let lon = c.x.to_radians();
        let lam0 = self.central_meridian_deg().to_radians();
        let e2 = e2();
        let ep2 = ep2();

        let sin = lat.sin();
        let cos = lat.cos();
        let tan = lat.tan();

        let n = SEMI_MAJOR / (1.0 - e2 * sin * sin).sqrt();
        let t = tan * tan;
        let cc = ep2 * cos * cos;
        let a = (lon - lam0) * cos;
        let a2 = a * a;
        let a3 = a2 * a;
        let a4 = a3 * a;
        let a5 = a4 * a;
        let a6 = a5 * a;
        let m = meridian_arc(lat);

        let easting = FALSE_EASTING
            + SCALE
                * n
                * (a
                    + (1.0 - t + cc) * a3 / 6.0
                    + (5.0 - 18.0 * t + t * t + 72.0 * cc - 58.0 * ep2) * a5 / 120.0);
        let mut northing = SCALE
            * (m + n
                * tan
                * (a2 / 2.0
                    + (5.0 - t + 9.0 * cc + 4.0 * cc * cc) * a4 / 24.0
                    + (61.0 - 58.0 * t + t * t + 600.0 * cc - 330.0 * ep2) * a6 / 720.0));
        if !self.north {
            northing += FALSE_NORTHING_SOUTH;
        }
        Coord {
            x: easting,
            y: northing,
        }
    }

    /// (easting, northing in metres) -> geographic (lon, lat in degrees).
    fn inverse(&self, c: Coord<f64>) -> Coord<f64> {
        let e2 = e2();
        let ep2 = ep2();
        let e4 = e2 * e2;
        let e6 = e4 * e2;
        let sqrt1me2 = (1.0 - e2).sqrt();
        let e1 = (1.0 - sqrt1me2) / (1.0 + sqrt1me2);

        let x = c.x - FALSE_EASTING;
        let y = if self.north {
            c.y
        } else {
            c.y - FALSE_NORTHING_SOUTH
        };

        let m = y / SCALE;
        let mu = m / (SEMI_MAJOR * (1.0 - e2 / 4.0 - 3.0 * e4 / 64.0 - 5.0 * e6 / 256.0));

        let e1_2 = e1 * e1;
        let e1_3 = e1_2 * e1;
        let e1_4 = e1_3 * e1;
        // Footpoint latitude.
        let phi1 = mu
            + (3.0 * e1 / 2.0 - 27.0 * e1_3 / 32.0) * (2.0 * mu).sin()
            + (21.0 * e1_2 / 16.0 - 55.0 * e1_4 / 32.0) * (4.0 * mu).sin()
            + (151.0 * e1_3 / 96.0) * (6.0 * mu).sin()
            + (1097.0 * e1_4 / 512.0) * (8.0 * mu).sin();

        let sin1 = phi1.sin();
        let cos1 = phi1.cos();
        let tan1 = phi1.tan();

        let c1 = ep2 * cos1 * cos1;
        let t1 = tan1 * tan1;
        let n1 = SEMI_MAJOR / (1.0 - e2 * sin1 * sin1).sqrt();
        let r1 = SEMI_MAJOR * (1.0 - e2) / (1.0 - e2 * sin1 * sin1).powf(1.5);
        let d = x / (n1 * SCALE);
        let d2 = d * d;
        let d3 = d2 * d;
        let d4 = d3 * d;
        let d5 = d4 * d;
        let d6 = d5 * d;

        let lat = phi1
            - (n1 * tan1 / r1)
                * (d2 / 2.0
                    - (5.0 + 3.0 * t1 + 10.0 * c1 - 4.0 * c1 * c1 - 9.0 * ep2) * d4 / 24.0
                    + (61.0 + 90.0 * t1 + 298.0 * c1 + 45.0 * t1 * t1
                        - 252.0 * ep2
                        - 3.0 * c1 * c1)
                        * d6
                        / 720.0);
        let lon = self.central_meridian_deg().to_radians()
            + (d - (1.0 + 2.0 * t1 + c1) * d3 / 6.0
                + (5.0 - 2.0 * c1 + 28.0 * t1 - 3.0 * c1 * c1 + 8.0 * ep2 + 24.0 * t1 * t1)
                    * d5
                    / 120.0)
                / cos1;

        Coord {
            x: lon.to_degrees(),
            y: lat.to_degrees(),
        }
    }
}
