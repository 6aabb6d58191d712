pub mod geodesy;
pub mod plane;

use std::str::FromStr;

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::waveform::{Coordinates, Trace};
use crate::{ArrayError, ArrayResult};

pub use geodesy::{geo_to_km, great_circle_km, wrap_longitude, KM_PER_DEG};
pub use plane::correct_to_plane;

/// Which trace attributes hold the station positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CoordinateSystem {
    /// (longitude, latitude) in degrees, elevation in km.
    LonLat,
    /// Local (x, y) in km, elevation in km.
    Xy,
}

impl FromStr for CoordinateSystem {
    type Err = ArrayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "lonlat" => Ok(CoordinateSystem::LonLat),
            "xy" => Ok(CoordinateSystem::Xy),
            other => Err(ArrayError::CoordinateSystem(other.to_string())),
        }
    }
}

/// Centers station coordinates on the array centroid, in kilometers.
///
/// Row order matches the input order, which in turn matches the trace
/// order of the analysis call. With `correct_3dplane` the centered
/// positions are additionally projected onto their best-fitting plane.
pub fn array_geometry(
    coords: &[Coordinates],
    system: CoordinateSystem,
    correct_3dplane: bool,
) -> ArrayResult<Array2<f64>> {
    if coords.is_empty() {
        return Err(ArrayError::InvalidInput(
            "no station coordinates provided".into(),
        ));
    }
    let nstat = coords.len();
    let mut geometry = Array2::zeros((nstat, 3));

    match system {
        CoordinateSystem::LonLat => {
            let center_lon = coords.iter().map(|c| c.x_or_lon).sum::<f64>() / nstat as f64;
            let center_lat = coords.iter().map(|c| c.y_or_lat).sum::<f64>() / nstat as f64;
            let center_h = coords.iter().map(|c| c.elevation_km).sum::<f64>() / nstat as f64;
            for (i, c) in coords.iter().enumerate() {
                let (x, y) = geo_to_km(center_lon, center_lat, c.x_or_lon, c.y_or_lat);
                geometry[[i, 0]] = x;
                geometry[[i, 1]] = y;
                geometry[[i, 2]] = c.elevation_km - center_h;
            }
        }
        CoordinateSystem::Xy => {
            let mean_x = coords.iter().map(|c| c.x_or_lon).sum::<f64>() / nstat as f64;
            let mean_y = coords.iter().map(|c| c.y_or_lat).sum::<f64>() / nstat as f64;
            let mean_h = coords.iter().map(|c| c.elevation_km).sum::<f64>() / nstat as f64;
            for (i, c) in coords.iter().enumerate() {
                geometry[[i, 0]] = c.x_or_lon - mean_x;
                geometry[[i, 1]] = c.y_or_lat - mean_y;
                geometry[[i, 2]] = c.elevation_km - mean_h;
            }
        }
    }

    if correct_3dplane {
        correct_to_plane(&mut geometry);
    }
    Ok(geometry)
}

/// Geometry taken from the coordinates attached to the traces.
pub fn geometry_from_traces(
    traces: &[Trace],
    system: CoordinateSystem,
    correct_3dplane: bool,
) -> ArrayResult<Array2<f64>> {
    let coords: Vec<Coordinates> = traces.iter().map(|tr| tr.coordinates).collect();
    array_geometry(&coords, system, correct_3dplane)
}

/// Largest pairwise station separation in kilometers.
pub fn aperture(coords: &[Coordinates], system: CoordinateSystem) -> f64 {
    let mut largest = 0.0f64;
    for (i, a) in coords.iter().enumerate() {
        for b in coords.iter().skip(i + 1) {
            let d = match system {
                CoordinateSystem::LonLat => {
                    great_circle_km(a.y_or_lat, a.x_or_lon, b.y_or_lat, b.x_or_lon)
                }
                CoordinateSystem::Xy => {
                    let dx = a.x_or_lon - b.x_or_lon;
                    let dy = a.y_or_lat - b.y_or_lat;
                    let dz = a.elevation_km - b.elevation_km;
                    (dx * dx + dy * dy + dz * dz).sqrt()
                }
            };
            largest = largest.max(d);
        }
    }
    largest
}
