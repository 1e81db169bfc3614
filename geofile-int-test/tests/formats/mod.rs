//! Source format tests for GeoJSON lines and delimited text.

mod delimited_test;
