use std::f64::consts::PI;

/// Kilometers per degree of a great circle on the reference sphere.
pub const KM_PER_DEG: f64 = 111.19492664455873;

/// Wraps a longitude difference into [-180, 180) degrees.
pub fn wrap_longitude(deg: f64) -> f64 {
    let mut wrapped = (deg + 180.0) % 360.0;
    if wrapped < 0.0 {
        wrapped += 360.0;
    }
    wrapped - 180.0
}

/// Converts a geographic offset from an origin into local east/north km.
///
/// Equirectangular approximation evaluated at the origin latitude; valid
/// for the small apertures of seismic arrays. The longitude difference is
/// wrapped so arrays straddling the +-180 degree seam stay compact.
pub fn geo_to_km(orig_lon: f64, orig_lat: f64, lon: f64, lat: f64) -> (f64, f64) {
    let x = wrap_longitude(lon - orig_lon) * KM_PER_DEG * orig_lat.to_radians().cos();
    let y = (lat - orig_lat) * KM_PER_DEG;
    (x, y)
}

/// Great-circle distance in kilometers between two geographic points.
pub fn great_circle_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let radius = KM_PER_DEG * 360.0 / (2.0 * PI);
    let (p1, p2) = (lat1.to_radians(), lat2.to_radians());
    let half_dp = (p2 - p1) / 2.0;
    let half_dl = (lon2 - lon1).to_radians() / 2.0;
    let a = half_dp.sin().powi(2) + p1.cos() * p2.cos() * half_dl.sin().powi(2);
    2.0 * radius * a.sqrt().min(1.0).asin()
}
