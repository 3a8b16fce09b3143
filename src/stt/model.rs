//! Locating GGML model files on disk.

use std::path::{Path, PathBuf};

/// Resolve the configured model name to a file path.
///
/// | Configured value            | Resolved path                      |
/// |-----------------------------|------------------------------------|
/// | `/opt/models/custom.bin`    | used as-is (absolute)              |
/// | `ggml-small.bin`            | `<models_dir>/ggml-small.bin`      |
/// | `small`                     | `<models_dir>/ggml-small.bin`      |
pub fn resolve_model_path(models_dir: &Path, model: &str) -> PathBuf {
    let candidate = Path::new(model);
    if candidate.is_absolute() {
        return candidate.to_path_buf();
    }
    if candidate.extension().is_some_and(|ext| ext == "bin") {
        return models_dir.join(candidate);
    }
    models_dir.join(format!("ggml-{model}.bin"))
}
