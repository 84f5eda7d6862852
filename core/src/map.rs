//! Map Renderer: marker layout for enriched records

use crate::enrich::EnrichedRecord;
use crate::render::snippet;
use serde::{Deserialize, Serialize};

pub const DEFAULT_ZOOM: u8 = 2;
/// Characters of content shown in a marker popup
pub const POPUP_CHARS: usize = 50;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapMarker {
    pub latitude: f64,
    pub longitude: f64,
    pub tooltip: String,
    pub popup: String,
}

impl MapMarker {
    fn from_record(record: &EnrichedRecord) -> Self {
        Self {
            latitude: record.metadata.latitude,
            longitude: record.metadata.longitude,
            tooltip: record.title.clone(),
            popup: format!("{}...", snippet(&record.content, POPUP_CHARS)),
        }
    }
}

/// Everything the page needs to draw the map
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapView {
    /// `[latitude, longitude]`
    pub center: [f64; 2],
    pub zoom: u8,
    pub markers: Vec<MapMarker>,
    /// `[[south, west], [north, east]]`; absent when there are no markers
    pub bounds: Option<[[f64; 2]; 2]>,
}

impl MapView {
    pub fn from_records(records: &[EnrichedRecord]) -> Self {
        let markers: Vec<MapMarker> = records.iter().map(MapMarker::from_record).collect();
        Self {
            center: centroid(&markers),
            zoom: DEFAULT_ZOOM,
            bounds: bounds(&markers),
            markers,
        }
    }
}

/// Arithmetic mean of marker coordinates; `[0, 0]` when empty
fn centroid(markers: &[MapMarker]) -> [f64; 2] {
    if markers.is_empty() {
        return [0.0, 0.0];
    }
    let n = markers.len() as f64;
    let (lat, lon) = markers
        .iter()
        .fold((0.0, 0.0), |(lat, lon), m| (lat + m.latitude, lon + m.longitude));
    [lat / n, lon / n]
}

fn bounds(markers: &[MapMarker]) -> Option<[[f64; 2]; 2]> {
    let first = markers.first()?;
    let mut sw = [first.latitude, first.longitude];
    let mut ne = sw;
    for m in &markers[1..] {
        sw[0] = sw[0].min(m.latitude);
        sw[1] = sw[1].min(m.longitude);
        ne[0] = ne[0].max(m.latitude);
        ne[1] = ne[1].max(m.longitude);
    }
    Some([sw, ne])
}
