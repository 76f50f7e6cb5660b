pub mod action_classifier;
