//! WGS84 to Lambert-93 (EPSG:2154) projection for the CSV `x`/`y` columns.
//!
//! RGF93 and WGS84 are treated as identical; the difference is far below
//! the centimetre precision the export keeps.

use std::f64::consts::FRAC_PI_4;

/// Lambert-93 cone constant
const N: f64 = 0.725_607_765_053_267;
/// Projection constant, metres
const C: f64 = 11_754_255.426_096;
const X_S: f64 = 700_000.0;
const Y_S: f64 = 12_655_612.049_876;
/// First eccentricity of the GRS80 ellipsoid
const E: f64 = 0.081_819_191_042_815_8;
/// Central meridian, 3° East
const LAMBDA_0: f64 = 3.0;

/// Project a WGS84 longitude/latitude (degrees) to Lambert-93 metres
pub fn to_lambert93(longitude: f64, latitude: f64) -> (f64, f64) {
    let phi = latitude.to_radians();
    let e_sin_phi = E * phi.sin();

    let isometric_latitude = ((FRAC_PI_4 + phi / 2.0).tan()
        * ((1.0 - e_sin_phi) / (1.0 + e_sin_phi)).powf(E / 2.0))
    .ln();

    let radius = C * (-N * isometric_latitude).exp();
    let gamma = N * (longitude - LAMBDA_0).to_radians();

    (X_S + radius * gamma.sin(), Y_S - radius * gamma.cos())
}

/// Overseas communes (`97…`) use other projections and get no x/y
pub fn has_lambert93(commune: &str) -> bool {
    !commune.starts_with("97")
}
