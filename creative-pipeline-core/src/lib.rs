#![doc = "creative-pipeline-core: domain logic for the creative automation pipeline."]

//! This crate holds everything that does not talk to a real network: brief parsing,
//! hero image resolution, the generation fallback, the composition job poller and
//! the per-campaign driver. Remote systems are reached only through the traits in
//! [`contract`]; the CLI crate supplies the HTTP and S3 implementations.
//!
//! # Usage
//! Build a [`pipeline::Pipeline`] from one implementation of each contract trait and a
//! [`config::PipelineOptions`], then call [`pipeline::Pipeline::run_staging`].

pub mod brief;
pub mod compose;
pub mod config;
pub mod contract;
pub mod error;
pub mod folders;
pub mod generate;
pub mod naming;
pub mod pipeline;
pub mod resolver;
