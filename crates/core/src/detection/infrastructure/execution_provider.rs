use ort::execution_providers::ExecutionProviderDispatch;

/// Return the preferred ONNX execution providers for the current platform.
///
/// ort falls back to CPU when a listed provider can't be registered, so the
/// list is a preference, not a requirement.
pub fn preferred_execution_providers() -> Vec<ExecutionProviderDispatch> {
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

/// Human-readable provider list for startup logging.
pub fn describe_providers() -> &'static str {
    if cfg!(target_os = "macos") {
        "CoreML, CPU"
    } else if cfg!(target_os = "windows") {
        "DirectML, CPU"
    } else {
        "CPU"
    }
}
