//! System-wide constants for the execution core.

// =============================================================================
// Batch Constants
// =============================================================================

/// Maximum number of rows any single batch may hold.
///
/// Offsets into a batch must fit a two-byte selection vector, so this is
/// also the upper bound for every configurable output-row cap.
pub const MAX_ROW_COUNT: usize = 65_536;

/// Smallest output-row cap an operator will run with.
pub const MIN_OUTPUT_ROWS: usize = 1;

// =============================================================================
// Memory Constants
// =============================================================================

/// Default memory limit for one fragment's operators (256 MB).
pub const DEFAULT_MEMORY_LIMIT: usize = 256 * 1024 * 1024;

/// Memory limit used by `for_testing()` configurations (16 MB).
pub const TEST_MEMORY_LIMIT: usize = 16 * 1024 * 1024;

/// Fixed per-value overhead charged when estimating row sizes.
pub const VALUE_HEADER_SIZE: usize = 16;
