//! End-to-end tests: a scripted engine driven through a real `Bridge`

mod harness;

mod foreign;
mod imports;
