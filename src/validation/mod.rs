mod path;

pub use path::{validate_artifact_path, validate_within_root};
