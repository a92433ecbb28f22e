pub mod compose;
pub mod fields;
pub mod job;
pub mod overlay;
pub mod request;
pub mod validate;

pub use compose::{compose_line, json_array, render_line, should_repeat, ArrayFramer, LogLine};
pub use fields::FieldKind;
pub use job::{
    AllJobMetrics, ErrorResponse, JobActionResponse, JobId, JobKind, JobSnapshot, JobStatus,
    ProgressEvent, SubmitResponse,
};
pub use request::{
    BatchSettings, CustomOverlay, FieldSetting, FieldSettings, GenerationRequest, StreamSettings,
};
pub use validate::{validate, ValidationError};
