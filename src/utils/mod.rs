//! Utility functions and helpers

pub mod normalize;

pub use normalize::ReturnNormalizer;
