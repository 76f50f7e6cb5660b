pub mod model_config;
pub mod onnx_videomae_classifier;
