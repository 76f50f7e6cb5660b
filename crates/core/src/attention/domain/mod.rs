pub mod attention_cropper;
pub mod frame_batcher;
pub mod grouping;
pub mod selection_tracker;
