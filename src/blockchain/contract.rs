// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Access-control contract binding.
//!
//! The contract is deployed from externally supplied bytecode with a single
//! constructor argument, the owning session key's address. Only `terminate()`
//! is called afterwards.

use alloy::{
    primitives::{Address, Bytes},
    sol,
    sol_types::SolValue,
};

use super::client::ChainError;

sol! {
    #[sol(rpc)]
    interface IVaultAccessControl {
        function terminate() external;
    }
}

/// Parse contract bytecode given as hex text (whitespace and `0x` tolerated).
pub fn parse_bytecode(raw: &str) -> Result<Bytes, ChainError> {
    let compact: String = raw.split_whitespace().collect();
    let hex = compact.strip_prefix("0x").unwrap_or(&compact);
    if hex.is_empty() {
        return Err(ChainError::ContractError("empty contract bytecode".to_string()));
    }
    alloy::hex::decode(hex)
        .map(Bytes::from)
        .map_err(|e| ChainError::ContractError(format!("invalid contract bytecode: {e}")))
}

/// Creation code: bytecode followed by the ABI-encoded owner address.
pub fn deploy_code(bytecode: &[u8], owner: Address) -> Bytes {
    let mut code = bytecode.to_vec();
    code.extend_from_slice(&owner.abi_encode());
    Bytes::from(code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deploy_code_appends_padded_owner() {
        let owner: Address = "0x00000000000000000000000000000000000000ff".parse().unwrap();
        let code = deploy_code(&[0x60, 0x80], owner);

        assert_eq!(code.len(), 2 + 32);
        assert_eq!(&code[..2], &[0x60, 0x80]);
        assert!(code[2..33].iter().all(|b| *b == 0));
        assert_eq!(code[33], 0xff);
    }

    #[test]
    fn parse_bytecode_tolerates_prefix_and_whitespace() {
        let code = parse_bytecode("0x6080\n6040 52\n").unwrap();
        assert_eq!(code.as_ref(), &[0x60, 0x80, 0x60, 0x40, 0x52]);
    }

    #[test]
    fn parse_bytecode_rejects_empty_and_invalid() {
        assert!(parse_bytecode("0x").is_err());
        assert!(parse_bytecode("zz").is_err());
    }
}
