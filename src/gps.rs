//! GPS extraction from the EXIF GPS sub-block.

use crate::coords::{signed_altitude, to_decimal_degrees};
use crate::metadata::Section;
use exif::{Context, Exif, Field, In, Tag, Value};
use serde::Serialize;
use std::collections::BTreeMap;
use url::Url;

pub const NO_GPS_MESSAGE: &str = "No GPS data found in EXIF";
const NO_COORDINATES_MESSAGE: &str = "No valid GPS coordinates found";
const OSM_ZOOM: &str = "15";

#[derive(Debug, Clone, Serialize)]
pub struct GpsRecord {
    pub latitude: f64,
    pub longitude: f64,
    pub latitude_ref: String,
    pub longitude_ref: String,
    pub coordinates_decimal: String,
    pub google_maps_url: String,
    pub openstreetmap_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub altitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub altitude_ref: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gps_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gps_time_utc: Option<String>,
    /// Unconverted tag values, kept for auditability.
    pub raw_gps_data: BTreeMap<String, String>,
}

/// Extract a GPS record from decoded EXIF data.
///
/// Absence of the GPS sub-block is the normal case for most images and is
/// reported as a section absence, never as a request failure. Malformed
/// GPS data degrades to an absence carrying the reason.
pub fn extract_gps(exif: Option<&Exif>) -> Section<GpsRecord> {
    let Some(exif) = exif else {
        return Section::absent(NO_GPS_MESSAGE);
    };

    match read_gps(exif) {
        Ok(Some(record)) => Section::Present(record),
        Ok(None) => Section::absent(NO_GPS_MESSAGE),
        Err(reason) => {
            log::warn!("Malformed GPS data: {}", reason);
            Section::absent(reason)
        }
    }
}

fn read_gps(exif: &Exif) -> Result<Option<GpsRecord>, String> {
    let gps_fields: Vec<&Field> = exif
        .fields()
        .filter(|f| f.ifd_num == In::PRIMARY && f.tag.context() == Context::Gps)
        .collect();

    if gps_fields.is_empty() {
        return Ok(None);
    }

    let lat_field = exif.get_field(Tag::GPSLatitude, In::PRIMARY);
    let lon_field = exif.get_field(Tag::GPSLongitude, In::PRIMARY);
    let (Some(lat_field), Some(lon_field)) = (lat_field, lon_field) else {
        return Err(NO_COORDINATES_MESSAGE.to_string());
    };

    let (lat_deg, lat_min, lat_sec) = dms_triple(lat_field)?;
    let (lon_deg, lon_min, lon_sec) = dms_triple(lon_field)?;

    // Reference letters default to the positive hemispheres when the tag
    // is missing, matching how most readers treat incomplete GPS blocks.
    let latitude_ref = ascii_value(exif, Tag::GPSLatitudeRef).unwrap_or_else(|| "N".to_string());
    let longitude_ref = ascii_value(exif, Tag::GPSLongitudeRef).unwrap_or_else(|| "E".to_string());

    let latitude = to_decimal_degrees(lat_deg, lat_min, lat_sec, ref_char(&latitude_ref, 'N'));
    let longitude = to_decimal_degrees(lon_deg, lon_min, lon_sec, ref_char(&longitude_ref, 'E'));

    let coordinates_decimal = format!("{}, {}", latitude, longitude);
    let (google_maps_url, openstreetmap_url) = map_urls(latitude, longitude)?;

    let (altitude, altitude_ref) = read_altitude(exif);

    let raw_gps_data = gps_fields
        .iter()
        .map(|f| (f.tag.to_string(), f.display_value().to_string()))
        .collect();

    Ok(Some(GpsRecord {
        latitude,
        longitude,
        latitude_ref,
        longitude_ref,
        coordinates_decimal,
        google_maps_url,
        openstreetmap_url,
        altitude,
        altitude_ref,
        gps_date: ascii_value(exif, Tag::GPSDateStamp),
        gps_time_utc: read_timestamp(exif),
        raw_gps_data,
    }))
}

fn dms_triple(field: &Field) -> Result<(f64, f64, f64), String> {
    match &field.value {
        Value::Rational(v) if v.len() >= 3 => Ok((v[0].to_f64(), v[1].to_f64(), v[2].to_f64())),
        Value::Rational(v) => Err(format!(
            "{} has {} rational components, expected 3",
            field.tag,
            v.len()
        )),
        _ => Err(format!("{} is not a rational triple", field.tag)),
    }
}

fn ref_char(reference: &str, default: char) -> char {
    reference.trim().chars().next().unwrap_or(default)
}

fn ascii_value(exif: &Exif, tag: Tag) -> Option<String> {
    let field = exif.get_field(tag, In::PRIMARY)?;
    match &field.value {
        Value::Ascii(v) => {
            let text = v
                .first()
                .map(|s| String::from_utf8_lossy(s).trim_end_matches('\0').trim().to_string())?;
            (!text.is_empty()).then_some(text)
        }
        _ => None,
    }
}

fn read_altitude(exif: &Exif) -> (Option<f64>, Option<String>) {
    let Some(field) = exif.get_field(Tag::GPSAltitude, In::PRIMARY) else {
        return (None, None);
    };
    let Value::Rational(v) = &field.value else {
        return (None, None);
    };
    let Some(raw) = v.first().map(|r| r.to_f64()).filter(|a| a.is_finite()) else {
        return (None, None);
    };

    let below = matches!(
        exif.get_field(Tag::GPSAltitudeRef, In::PRIMARY).map(|f| &f.value),
        Some(Value::Byte(bytes)) if bytes.first() == Some(&1)
    );

    let label = if below { "below sea level" } else { "above sea level" };
    (Some(signed_altitude(raw, below)), Some(label.to_string()))
}

fn read_timestamp(exif: &Exif) -> Option<String> {
    let field = exif.get_field(Tag::GPSTimeStamp, In::PRIMARY)?;
    match &field.value {
        Value::Rational(v) if v.len() >= 3 => Some(format!(
            "{:02}:{:02}:{:02}",
            v[0].to_f64() as u64,
            v[1].to_f64() as u64,
            v[2].to_f64() as u64
        )),
        _ => None,
    }
}

fn map_urls(latitude: f64, longitude: f64) -> Result<(String, String), String> {
    let google = Url::parse(&format!("https://maps.google.com/?q={},{}", latitude, longitude))
        .map_err(|e| format!("Failed to build map URL: {}", e))?;
    let osm = Url::parse_with_params(
        "https://www.openstreetmap.org/",
        [
            ("mlat", latitude.to_string()),
            ("mlon", longitude.to_string()),
            ("zoom", OSM_ZOOM.to_string()),
        ],
    )
    .map_err(|e| format!("Failed to build map URL: {}", e))?;
    Ok((google.to_string(), osm.to_string()))
}
