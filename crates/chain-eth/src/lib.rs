//! Ethereum/EVM primitives for the wallet-connect client.
//!
//! This crate provides:
//! - Address shape checks and EIP-55 checksums
//! - Minimal ABI encoding/decoding for the calls the client makes
//! - ERC-20 calldata (transfer, balanceOf, decimals, symbol)
//! - Decimal amount <-> base unit conversion
//! - EVM network definitions
//! - JSON-RPC payload types for transactions and receipts

pub mod abi;
pub mod address;
pub mod chains;
pub mod erc20;
pub mod error;
pub mod transaction;
pub mod units;
