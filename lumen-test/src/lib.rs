mod runner;
mod threshold;

pub use tokio::test as test_attr;

pub use lumen;
pub use runner::{compare_image_to_path, download_image, padded_bytes_per_row, OffscreenTarget, TestRunner, TEST_FORMAT};
pub use threshold::{Threshold, ThresholdSet};

/// Unwraps the result of [`lumen::create_iad`], returning `Ok(())` from the
/// calling test when the machine has no usable adapter.
#[macro_export]
macro_rules! no_gpu_return {
    ($value:expr) => {
        match $value {
            Err($crate::lumen::RendererInitializationError::MissingAdapter) => {
                eprintln!("No adapter available, skipping test");
                return Ok(());
            }
            other => other,
        }
    };
}
