// SPDX-License-Identifier: Apache-2.0
//! Upload pipeline of the image store.
//!
//! Uploads arrive as chunks pushed by an upstream producer while the storage sink reads
//! them incrementally. [`pubsub::adapter::PushPullAdapter`] turns the pushed chunks into
//! single pulls, [`stream::reader::ChunkedByteReader`] exposes those pulls as a byte
//! stream and [`repository::filesystem::FilesystemStorage`] persists it.

pub mod config;
pub mod driver;
pub mod error;
pub mod pubsub;
pub mod repository;
pub mod stream;
