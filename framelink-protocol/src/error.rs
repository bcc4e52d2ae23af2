//! Frame-level error types.

use thiserror::Error;

/// Errors raised while building or mutating a frame.
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("header length {words} words exceeds the {max}-word maximum", max = crate::MAX_HEADER_WORDS)]
    TooManyOptions { words: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = FrameError::TooManyOptions { words: 16 };
        let msg = err.to_string();
        assert!(msg.contains("16"));
        assert!(msg.contains("15"));
    }
}
