pub mod activity;
pub mod sample;
pub mod session;

pub use activity::{ActivityClass, ModelOutput, SessionAnalysisResult, WindowPrediction, CLASS_COUNT};
pub use sample::{EulerAngles, SensorSample, Vec3};
pub use session::{CollectingSession, SessionId, SessionInfo};
