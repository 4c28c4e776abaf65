//! `get_livedata_info` payload schema and humidity parsing

use std::sync::OnceLock;

use regex::Regex;
use serde::Deserialize;

use crate::models::ChannelReading;

/// Top-level payload; anything besides `ch_soil` is ignored
#[derive(Debug, Deserialize)]
struct LiveData {
    ch_soil: Vec<SoilChannel>,
}

#[derive(Debug, Deserialize)]
struct SoilChannel {
    channel: ChannelIndex,
    name: String,
    humidity: String,
}

/// Firmware versions differ on whether the channel index is a number or a string
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ChannelIndex {
    Number(u32),
    Text(String),
}

impl ChannelIndex {
    fn index(&self) -> Option<u32> {
        match self {
            ChannelIndex::Number(n) => Some(*n),
            ChannelIndex::Text(s) => s.trim().parse().ok(),
        }
    }
}

fn non_numeric() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^0-9.]").expect("humidity filter regex"))
}

/// Parse a gateway humidity string such as `"57%"` into a whole percentage.
///
/// Everything except ASCII digits and `.` is dropped, the longest valid
/// decimal prefix is parsed and rounded to the nearest integer. Values are
/// not clamped to 0..=100. Returns `None` when no number remains.
pub fn parse_percentage(value: &str) -> Option<i64> {
    let stripped = non_numeric().replace_all(value, "");

    let mut seen_point = false;
    let numeric: String = stripped
        .chars()
        .take_while(|c| {
            if *c == '.' {
                if seen_point {
                    return false;
                }
                seen_point = true;
            }
            true
        })
        .collect();

    numeric
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .map(|v| v.round() as i64)
}

/// Decode a `get_livedata_info` body into soil channel readings.
///
/// Any schema violation yields an error description; no partial list is returned.
pub fn parse_live_data(body: &str) -> Result<Vec<ChannelReading>, String> {
    let data: LiveData =
        serde_json::from_str(body).map_err(|e| format!("invalid livedata payload: {}", e))?;

    data.ch_soil
        .into_iter()
        .map(|sensor| {
            let index = sensor
                .channel
                .index()
                .ok_or_else(|| format!("invalid soil channel index {:?}", sensor.channel))?;
            let moisture = parse_percentage(&sensor.humidity).ok_or_else(|| {
                format!(
                    "soil channel {} has unparsable humidity {:?}",
                    index, sensor.humidity
                )
            })?;

            Ok(ChannelReading::new(
                ChannelReading::channel_id_for(index),
                sensor.name,
                moisture,
            ))
        })
        .collect()
}
