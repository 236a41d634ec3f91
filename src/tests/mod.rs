pub mod common;

mod fetch_retry;
