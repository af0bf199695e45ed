//! Session record format.
//!
//! One CSV file per session. The filename
//! `session-<id:03>-<start HH:MM:SS>-<stop HH:MM:SS>.csv` is the only place
//! the session's identity and time bounds are kept; the body is a header row
//! followed by one row per sample.

use std::fmt::Write as _;

use crate::error::{MotionError, MotionResult};
use crate::models::{CollectingSession, SensorSample, SessionInfo, Vec3};
use crate::utils::time_codec::{hms_to_seconds, seconds_to_hms};

pub const COLUMNS: [&str; 10] = [
    "timestamp", "ax", "ay", "az", "gx", "gy", "gz", "roll", "pitch", "yaw",
];

const FILE_PREFIX: &str = "session-";
const FILE_EXTENSION: &str = ".csv";

/// A session as it sits on disk: the key (filename) and the CSV body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRecord {
    pub file_name: String,
    pub body: String,
}

pub fn file_name(info: &SessionInfo) -> String {
    format!(
        "{FILE_PREFIX}{:03}-{}-{}{FILE_EXTENSION}",
        info.id,
        seconds_to_hms(info.start_time_of_day),
        seconds_to_hms(info.stop_time_of_day)
    )
}

/// Parses a record filename back into [`SessionInfo`]. Anything that does
/// not match the exact pattern yields `None`.
pub fn parse_file_name(name: &str) -> Option<SessionInfo> {
    let stem = name.strip_prefix(FILE_PREFIX)?.strip_suffix(FILE_EXTENSION)?;
    let mut fields = stem.splitn(3, '-');
    let id_text = fields.next()?;
    let start = hms_to_seconds(fields.next()?)?;
    let stop = hms_to_seconds(fields.next()?)?;

    if id_text.len() < 3 || !id_text.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let id: u32 = id_text.parse().ok()?;
    // Only the canonical zero-padding is accepted ("0007" is not id 7).
    if format!("{id:03}") != id_text {
        return None;
    }

    Some(SessionInfo::new(id, start, stop))
}

pub fn encode(session: &CollectingSession) -> SessionRecord {
    let mut body = String::with_capacity(64 * (session.samples.len() + 1));
    body.push_str(&COLUMNS.join(","));
    body.push('\n');

    for s in &session.samples {
        // `{}` on f32 prints the shortest text that parses back to the same value.
        let _ = writeln!(
            body,
            "{},{},{},{},{},{},{},{},{},{}",
            s.timestamp_ms,
            s.accel.x,
            s.accel.y,
            s.accel.z,
            s.gyro.x,
            s.gyro.y,
            s.gyro.z,
            s.roll,
            s.pitch,
            s.yaw
        );
    }

    SessionRecord {
        file_name: file_name(&session.info),
        body,
    }
}

pub fn decode(record: &SessionRecord) -> MotionResult<CollectingSession> {
    let info = parse_file_name(&record.file_name).ok_or_else(|| {
        MotionError::DecodeFailure(format!("unrecognised record name '{}'", record.file_name))
    })?;
    let samples = decode_body(&record.body)?;
    Ok(CollectingSession::new(info, samples))
}

pub fn decode_body(body: &str) -> MotionResult<Vec<SensorSample>> {
    let mut lines = body.lines().enumerate();

    let header = lines
        .next()
        .map(|(_, line)| line.trim())
        .ok_or_else(|| MotionError::DecodeFailure("empty record body".into()))?;
    if header != COLUMNS.join(",") {
        return Err(MotionError::DecodeFailure(format!(
            "unexpected header '{header}'"
        )));
    }

    let mut samples = Vec::new();
    for (index, line) in lines {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        samples.push(parse_row(line).map_err(|reason| {
            MotionError::DecodeFailure(format!("line {}: {reason}", index + 1))
        })?);
    }
    Ok(samples)
}

fn parse_row(line: &str) -> Result<SensorSample, String> {
    let fields: Vec<&str> = line.split(',').collect();
    if fields.len() != COLUMNS.len() {
        return Err(format!(
            "expected {} fields, found {}",
            COLUMNS.len(),
            fields.len()
        ));
    }

    let timestamp_ms: i64 = fields[0]
        .parse()
        .map_err(|err| format!("bad timestamp '{}': {err}", fields[0]))?;

    let mut values = [0f32; 9];
    for (slot, (name, raw)) in values
        .iter_mut()
        .zip(COLUMNS[1..].iter().zip(&fields[1..]))
    {
        *slot = raw
            .parse()
            .map_err(|err| format!("bad {name} '{raw}': {err}"))?;
    }

    Ok(SensorSample {
        timestamp_ms,
        accel: Vec3::new(values[0], values[1], values[2]),
        gyro: Vec3::new(values[3], values[4], values[5]),
        roll: values[6],
        pitch: values[7],
        yaw: values[8],
    })
}
