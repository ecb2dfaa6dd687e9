//! Decimal-degree conversion for EXIF GPS angles.
//!
//! EXIF stores angles as degrees/minutes/seconds rational triples with a
//! separate hemisphere reference letter; everything downstream wants a
//! single signed float.

/// Convert a degrees/minutes/seconds angle plus hemisphere reference into
/// signed decimal degrees, rounded to 8 decimal places.
///
/// `S` and `W` hemispheres negate the result; any other reference leaves
/// it positive. Callers are responsible for passing well-formed numeric
/// components.
pub fn to_decimal_degrees(degrees: f64, minutes: f64, seconds: f64, hemisphere_ref: char) -> f64 {
    let decimal = degrees + minutes / 60.0 + seconds / 3600.0;
    let signed = match hemisphere_ref {
        'S' | 'W' => -decimal,
        _ => decimal,
    };
    round_to(signed, 8)
}

/// Apply the EXIF altitude reference to a raw altitude value
/// (reference byte 1 means below sea level).
pub fn signed_altitude(altitude: f64, below_sea_level: bool) -> f64 {
    if below_sea_level {
        -altitude
    } else {
        altitude
    }
}

pub fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}
