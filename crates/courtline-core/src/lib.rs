// Library root: the feature-state engine, margin inference, and bet
// selection, plus the storage and config layers the binary wires together.

pub mod backtest;
pub mod builder;
pub mod config;
pub mod dataset;
pub mod db;
pub mod features;
pub mod game;
pub mod inference;
pub mod model;
pub mod odds;
pub mod probability;
pub mod selector;
pub mod service;
pub mod team_state;
