//! Solidity interface definitions for on-chain reads.
//!
//! Contains the minimal ABI surface needed by capability detection:
//! - [`IERC20Meta`] — token metadata views (`name`, `version`,
//!   EIP-5267 `eip712Domain`) plus the `implementation()` proxy probe
//! - [`IERC165`] — `supportsInterface` for receiving-contract probes

use alloy_sol_types::sol;

sol! {
    /// Metadata views read from token contracts.
    ///
    /// Only the functions actually called by the detector are declared.
    /// `eip712Domain()` follows EIP-5267; its third return value is the
    /// domain version.
    #[allow(missing_docs)]
    #[derive(Debug)]
    #[sol(rpc)]
    interface IERC20Meta {
        function name() external view returns (string);
        function version() external view returns (string);
        function implementation() external view returns (address);
        function eip712Domain() external view returns (
            bytes1 fields,
            string name,
            string version,
            uint256 chainId,
            address verifyingContract,
            bytes32 salt,
            uint256[] extensions
        );
    }
}

sol! {
    /// ERC-165 interface detection.
    ///
    /// Reference: <https://eips.ethereum.org/EIPS/eip-165>
    #[allow(missing_docs)]
    #[derive(Debug)]
    #[sol(rpc)]
    interface IERC165 {
        function supportsInterface(bytes4 interfaceId) external view returns (bool);
    }
}
