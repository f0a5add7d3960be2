//! Test modules for the bounded queue
//!
//! Organised by functional area.
