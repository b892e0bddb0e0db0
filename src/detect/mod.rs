mod backend;
pub mod backends;
pub mod postprocess;
mod registry;
pub(crate) mod result;

pub use backend::DetectorBackend;
pub use backends::ScriptedBackend;
pub use registry::BackendRegistry;
pub use result::{
    BoundingBox, ClassNames, Detection, FrameInference, Inference, VideoInference, MAX_CLASSES,
};

#[cfg(feature = "backend-tract")]
pub use backends::TractBackend;
