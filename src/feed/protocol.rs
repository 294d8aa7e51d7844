//! AISStream wire format: the subscription we send and the envelopes we parse.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{Mmsi, PositionReport};

pub const IDENTITY_KIND: &str = "ShipStaticData";
pub const POSITION_KIND: &str = "PositionReport";

/// Whole-globe bounding box as `[[lat_min, lon_min], [lat_max, lon_max]]`.
pub const GLOBAL_BOX: [[f64; 2]; 2] = [[-90.0, -180.0], [90.0, 180.0]];

/// Subscription sent immediately after connecting.
#[derive(Debug, Clone, Serialize)]
pub struct Subscription<'a> {
    #[serde(rename = "APIKey")]
    pub api_key: &'a str,
    #[serde(rename = "BoundingBoxes")]
    pub bounding_boxes: Vec<[[f64; 2]; 2]>,
    #[serde(rename = "FilterMessageTypes")]
    pub message_types: Vec<&'static str>,
}

impl<'a> Subscription<'a> {
    pub fn global(api_key: &'a str) -> Self {
        Self {
            api_key,
            bounding_boxes: vec![GLOBAL_BOX],
            message_types: vec![POSITION_KIND, IDENTITY_KIND],
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// A well-formed inbound message of a kind we act on.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Identity { mmsi: Mmsi, name: String },
    Position { mmsi: Mmsi, report: PositionReport },
}

impl Frame {
    pub fn mmsi(&self) -> Mmsi {
        match self {
            Frame::Identity { mmsi, .. } | Frame::Position { mmsi, .. } => *mmsi,
        }
    }
}

/// Why an inbound frame was not turned into a [`Frame`]. Always dropped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    #[error("malformed envelope: {0}")]
    Malformed(String),
    #[error("unhandled message type {0:?}")]
    UnknownKind(String),
    #[error("{0} envelope without a body")]
    MissingBody(&'static str),
    #[error("missing or zero UserID")]
    MissingMmsi,
    #[error("identity without a name")]
    MissingName,
}

#[derive(Debug, Deserialize)]
struct RawEnvelope {
    #[serde(rename = "MessageType", default)]
    message_type: Option<String>,
    #[serde(rename = "Message", default)]
    message: Option<RawMessage>,
}

#[derive(Debug, Default, Deserialize)]
struct RawMessage {
    #[serde(rename = "ShipStaticData", default)]
    ship_static_data: Option<RawStatic>,
    #[serde(rename = "PositionReport", default)]
    position_report: Option<RawPosition>,
}

#[derive(Debug, Deserialize)]
struct RawStatic {
    #[serde(rename = "UserID", default)]
    user_id: Option<u64>,
    #[serde(rename = "Name", default)]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawPosition {
    #[serde(rename = "UserID", default)]
    user_id: Option<u64>,
    #[serde(rename = "Latitude", default)]
    latitude: Option<f64>,
    #[serde(rename = "Longitude", default)]
    longitude: Option<f64>,
    #[serde(rename = "Sog", default)]
    sog: Option<f64>,
    #[serde(rename = "Cog", default)]
    cog: Option<f64>,
}

/// Parses one inbound websocket payload. `bytes` is used as scratch space by
/// the SIMD parser and is left in an unspecified state.
pub fn parse_frame(bytes: &mut [u8]) -> Result<Frame, FrameError> {
    let envelope: RawEnvelope =
        simd_json::from_slice(bytes).map_err(|err| FrameError::Malformed(err.to_string()))?;
    let kind = envelope.message_type.unwrap_or_default();
    let message = envelope.message.unwrap_or_default();

    match kind.as_str() {
        IDENTITY_KIND => {
            let body = message
                .ship_static_data
                .ok_or(FrameError::MissingBody(IDENTITY_KIND))?;
            let mmsi = body.user_id.and_then(Mmsi::new).ok_or(FrameError::MissingMmsi)?;
            let name = body
                .name
                .filter(|name| !name.trim_matches(|c: char| c.is_whitespace() || c.is_control()).is_empty())
                .ok_or(FrameError::MissingName)?;
            Ok(Frame::Identity { mmsi, name })
        }
        POSITION_KIND => {
            let body = message
                .position_report
                .ok_or(FrameError::MissingBody(POSITION_KIND))?;
            let mmsi = body.user_id.and_then(Mmsi::new).ok_or(FrameError::MissingMmsi)?;
            Ok(Frame::Position {
                mmsi,
                report: PositionReport {
                    lat: body.latitude,
                    lon: body.longitude,
                    speed: body.sog,
                    course: body.cog,
                },
            })
        }
        _ => Err(FrameError::UnknownKind(kind)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> Result<Frame, FrameError> {
        let mut bytes = text.as_bytes().to_vec();
        parse_frame(&mut bytes)
    }

    #[test]
    fn subscription_shape() {
        let json = Subscription::global("secret").to_json().expect("json");
        let value: serde_json::Value = serde_json::from_str(&json).expect("json");
        assert_eq!(value["APIKey"], "secret");
        assert_eq!(value["BoundingBoxes"][0][0][0], -90.0);
        assert_eq!(value["BoundingBoxes"][0][1][1], 180.0);
        assert_eq!(
            value["FilterMessageTypes"],
            serde_json::json!(["PositionReport", "ShipStaticData"])
        );
    }

    #[test]
    fn parses_identity() {
        let frame = parse(
            r#"{"MessageType":"ShipStaticData","MetaData":{"MMSI":311000123},
                "Message":{"ShipStaticData":{"UserID":311000123,"Name":"ICON OF THE SEAS    ","Type":60}}}"#,
        )
        .expect("identity");
        assert_eq!(
            frame,
            Frame::Identity {
                mmsi: Mmsi(311_000_123),
                name: "ICON OF THE SEAS    ".to_string()
            }
        );
    }

    #[test]
    fn parses_position_with_missing_fields() {
        let frame = parse(
            r#"{"MessageType":"PositionReport",
                "Message":{"PositionReport":{"UserID":311000123,"Latitude":25.77,"Longitude":-80.17,"Sog":null,"Cog":181.5}}}"#,
        )
        .expect("position");
        let Frame::Position { mmsi, report } = frame else {
            panic!("expected position");
        };
        assert_eq!(mmsi, Mmsi(311_000_123));
        assert_eq!(report.lat, Some(25.77));
        assert_eq!(report.speed, None);
        assert_eq!(report.course, Some(181.5));

        let frame = parse(r#"{"MessageType":"PositionReport","Message":{"PositionReport":{"UserID":5}}}"#)
            .expect("position without fix");
        assert_eq!(frame.mmsi(), Mmsi(5));
        assert!(matches!(frame, Frame::Position { report, .. } if report.lat.is_none()));
    }

    #[test]
    fn invalid_frames() {
        assert!(matches!(parse("not json"), Err(FrameError::Malformed(_))));
        assert!(matches!(
            parse(r#"{"MessageType":"StandardClassBPositionReport","Message":{}}"#),
            Err(FrameError::UnknownKind(kind)) if kind == "StandardClassBPositionReport"
        ));
        assert_eq!(
            parse(r#"{"MessageType":"PositionReport","Message":{}}"#),
            Err(FrameError::MissingBody(POSITION_KIND))
        );
        assert_eq!(
            parse(r#"{"MessageType":"PositionReport","Message":{"PositionReport":{"UserID":0,"Latitude":1.0,"Longitude":2.0}}}"#),
            Err(FrameError::MissingMmsi)
        );
        assert_eq!(
            parse(r#"{"MessageType":"ShipStaticData","Message":{"ShipStaticData":{"UserID":7,"Name":"  "}}}"#),
            Err(FrameError::MissingName)
        );
        assert_eq!(
            parse(r#"{"MessageType":"PositionReport","Message":{"PositionReport":{"UserID":"abc"}}}"#)
                .map_err(|err| matches!(err, FrameError::Malformed(_))),
            Err(true)
        );
    }
}
