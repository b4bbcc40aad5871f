// SPDX-License-Identifier: Apache-2.0
pub mod adapter;
pub mod observer;
pub mod pending;
pub mod producer;
pub mod subscriber;
