// SPDX-License-Identifier: Apache-2.0
pub mod error_kind;
pub mod store;
