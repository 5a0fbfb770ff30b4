//! Integration tests for block-distributed random-access reads

mod concurrent_readers;
mod file_access;
mod support;
