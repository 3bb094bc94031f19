//! Integration scenarios for the chemistry runtime.

mod binding;
mod blocking_timeout;
mod counter;
mod failure;
mod livelock;
mod readers_writer;
mod single_access_cell;
mod static_discipline;
