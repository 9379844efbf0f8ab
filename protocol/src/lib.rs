// Copyright (c) 2026 Veil Contributors. MIT License.
// See LICENSE for details.

//! # Veil Protocol Core Library
//!
//! The primitives every Veil contract leans on. Nothing in here holds
//! escrowed value or governance state; that lives in `veil-contracts`.
//! This crate answers the smaller questions: what does an account look
//! like, how is a commitment hashed, how is a permit signed, and what
//! are the numbers that must never drift.
//!
//! ## Modules
//!
//! - **config**: Protocol constants: fee ceiling, timelock delays, batch
//!   limits, payload lengths.
//! - **crypto**: BLAKE3 / SHA-256 hashing and Ed25519 keys and signatures.
//! - **identity**: 20-byte account addresses and their derivation from keys.
//! - **token**: The permit-capable fungible token used to pay fees.

pub mod config;
pub mod crypto;
pub mod identity;
pub mod token;
