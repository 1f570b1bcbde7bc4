//! Integration tests for the SRTLA receiver live in `tests/`.
