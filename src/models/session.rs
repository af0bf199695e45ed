use serde::{Deserialize, Serialize};

use crate::utils::time_codec::SECONDS_PER_DAY;

use super::SensorSample;

pub type SessionId = u32;

/// Identity and time bounds of a stored session. Times are seconds of day
/// in `[0, 86399]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    pub id: SessionId,
    pub start_time_of_day: u32,
    pub stop_time_of_day: u32,
}

impl SessionInfo {
    pub fn new(id: SessionId, start_time_of_day: u32, stop_time_of_day: u32) -> Self {
        Self {
            id,
            start_time_of_day,
            stop_time_of_day,
        }
    }

    /// Stop minus start, wrapping across midnight. Out-of-range times are
    /// taken modulo one day.
    pub fn duration_secs(&self) -> u32 {
        let start = self.start_time_of_day % SECONDS_PER_DAY;
        let stop = self.stop_time_of_day % SECONDS_PER_DAY;
        (stop + SECONDS_PER_DAY - start) % SECONDS_PER_DAY
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectingSession {
    pub info: SessionInfo,
    pub samples: Vec<SensorSample>,
}

impl CollectingSession {
    pub fn new(info: SessionInfo, samples: Vec<SensorSample>) -> Self {
        Self { info, samples }
    }

    pub fn id(&self) -> SessionId {
        self.info.id
    }
}
