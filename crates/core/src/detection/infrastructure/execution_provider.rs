use std::path::Path;

/// Return the preferred ONNX execution providers for the current platform.
///
/// Falls back to CPU if the platform-specific provider is unavailable.
pub fn preferred_execution_providers() -> Vec<ort::execution_providers::ExecutionProviderDispatch> {
    #[cfg(target_os = "macos")]
    {
        vec![ort::execution_providers::CoreMLExecutionProvider::default().build()]
    }
    #[cfg(target_os = "windows")]
    {
        vec![ort::execution_providers::DirectMLExecutionProvider::default().build()]
    }
    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    {
        vec![]
    }
}

/// Open an ONNX model with full graph optimization and the platform's
/// preferred providers. Shared by the person detector and the classifier.
pub fn open_session(model_path: &Path) -> Result<ort::session::Session, Box<dyn std::error::Error>> {
    log::debug!("Loading ONNX model {}", model_path.display());
    let session = ort::session::Session::builder()?
        .with_optimization_level(ort::session::builder::GraphOptimizationLevel::Level3)?
        .with_execution_providers(preferred_execution_providers())?
        .commit_from_file(model_path)?;
    Ok(session)
}

/// Spatial size of a square NCHW/NTCHW model input, read from the last axis
/// of the first input. `None` when the axis is dynamic.
pub fn square_input_size(session: &ort::session::Session) -> Option<u32> {
    let input = session.inputs().first()?;
    match input.dtype() {
        ort::value::ValueType::Tensor { shape, .. } => {
            let last = *shape.last()?;
            (last > 0).then_some(last as u32)
        }
        _ => None,
    }
}
