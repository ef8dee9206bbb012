/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Types and traits that are used across multiple components of the consensus core.
//!
//! Types specific to a single component, e.g., the header [`Extra`](crate::header::Extra) or the
//! round engine's messages, live in that component's module.

pub mod data_types;

pub mod crypto_primitives;

pub mod bitmap;

pub mod block;

pub mod validator_set;
