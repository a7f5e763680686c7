mod backend;
mod backends;
mod pipeline;
mod result;

pub use backend::DetectorBackend;
pub use backends::{SeetaBackend, StubBackend};
pub use pipeline::{annotate, load_backend, prepare_gray, FaceDetector};
pub use result::{Detection, FaceBox, NormalizedPosition, Scale};
