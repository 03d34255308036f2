use serde::{Deserialize, Serialize};
use std::fmt;

/// Geographic point in degrees.
///
/// No range validation happens here; whatever the client sent (after the
/// zero fallback in [`parse_coordinate`]) is stored as-is.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub lat: f64,
    pub lon: f64,
}

impl Location {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Great-circle distance in kilometers (haversine)
    pub fn distance_km(&self, other: &Location) -> f64 {
        const EARTH_RADIUS_KM: f64 = 6371.0088;

        let d_lat = (other.lat - self.lat).to_radians();
        let d_lon = (other.lon - self.lon).to_radians();
        let a = (d_lat / 2.0).sin().powi(2)
            + self.lat.to_radians().cos() * other.lat.to_radians().cos() * (d_lon / 2.0).sin().powi(2);

        2.0 * EARTH_RADIUS_KM * a.sqrt().atan2((1.0 - a).sqrt())
    }
}

/// Media classification derived from the uploaded filename
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Video,
    Unknown,
}

impl MediaKind {
    /// Classify by extension; anything outside the fixed table is `Unknown`
    pub fn from_filename(filename: &str) -> Self {
        match extension(filename).as_deref() {
            Some("jpeg" | "jpg" | "gif" | "png") => MediaKind::Image,
            Some("mov" | "mp4" | "avi" | "flv" | "wmv") => MediaKind::Video,
            _ => MediaKind::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Video => "video",
            MediaKind::Unknown => "unknown",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lowercased text after the last `.` of the final path component, so a
/// bare `.png` still has the extension `png`
fn extension(filename: &str) -> Option<String> {
    let name = filename.rsplit(['/', '\\']).next().unwrap_or(filename);
    name.rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
}

/// Content type sent with the stored object
pub fn content_type_for(filename: &str) -> &'static str {
    match extension(filename).as_deref() {
        Some("jpeg" | "jpg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("mov") => "video/quicktime",
        Some("mp4") => "video/mp4",
        Some("avi") => "video/x-msvideo",
        Some("flv") => "video/x-flv",
        Some("wmv") => "video/x-ms-wmv",
        _ => "application/octet-stream",
    }
}

/// Parse a client-supplied coordinate.
///
/// Missing, unparsable and non-finite values all degrade to `0.0`.
pub fn parse_coordinate(raw: Option<&str>) -> f64 {
    raw.and_then(|s| s.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite())
        .unwrap_or(0.0)
}

/// A published post as stored in, and returned from, the search index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    /// Authenticated author, never client-supplied
    pub user: String,
    #[serde(default)]
    pub message: String,
    pub location: Location,
    /// Public URL of the stored media; empty for text-only posts
    #[serde(default)]
    pub url: String,
    /// `image`, `video`, `unknown`, or empty for text-only posts
    #[serde(rename = "type", default)]
    pub media_type: String,
    /// Face detection confidence
    #[serde(default)]
    pub face: f32,
}

impl Post {
    pub fn new(user: impl Into<String>, message: impl Into<String>, location: Location) -> Self {
        Self {
            user: user.into(),
            message: message.into(),
            location,
            url: String::new(),
            media_type: String::new(),
            face: 0.0,
        }
    }
}

/// Media attached to a publish request
#[derive(Debug, Clone)]
pub struct MediaUpload {
    /// Original client filename; only its extension is used
    pub filename: String,
    pub data: Vec<u8>,
}
