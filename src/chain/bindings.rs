//! Typed ABI bindings for every remote method the keeper reads.
//!
//! One fixed call/return definition per method — decoding always goes
//! through the generated `SolCall` types, never a dynamic decoder.

use alloy::sol;

sol! {
    /// Custodial vault holding LP position NFTs on behalf of users.
    interface ILpNftVault {
        function getWhitelistedNFTCount() external view returns (uint256);

        function getWhitelistedNFTs(uint256 offset, uint256 limit) external view returns (address[] memory);

        function getPositionInfo(address nft, uint256 tokenId)
            external
            view
            returns (
                address token0,
                address token1,
                uint24 fee,
                uint128 liquidity,
                int24 tickLower,
                int24 tickUpper,
                int24 currentTick,
                uint160 sqrtPriceX96,
                bool isInRange,
                uint256 owed0,
                uint256 owed1
            );

        struct Deposit {
            address owner;
            address nft;
            uint256 tokenId;
            bool active;
            address token0;
            address token1;
            uint24 fee;
            int24 tickLower;
            int24 tickUpper;
            uint128 liquiditySnapshot;
        }

        function getDeposit(address nft, uint256 tokenId) external view returns (Deposit memory);

        function shouldHedgePosition(address nft, uint256 tokenId)
            external
            view
            returns (
                bool shouldHedge,
                uint256 targetTokenBalance,
                uint256 otherTokenBalance,
                uint256 targetTokenRatio,
                string memory reason
            );
    }

    /// Minimal ERC721Enumerable surface used for vault holdings discovery.
    interface IErc721Enumerable {
        function balanceOf(address owner) external view returns (uint256);

        function tokenOfOwnerByIndex(address owner, uint256 index) external view returns (uint256);
    }

    /// Hedge execution manager, keyed by vault account.
    interface IHedgeManager {
        function getHedgeStatus(address user)
            external
            view
            returns (
                bool isActive,
                uint64 hedgeSize,
                uint64 entryPrice,
                uint64 currentPrice,
                uint256 stableDeposit
            );
    }

    /// Multicall3 aggregation entry point (failure-tolerant variant only).
    interface IMulticall3 {
        struct Call {
            address target;
            bytes callData;
        }

        struct Result {
            bool success;
            bytes returnData;
        }

        function tryAggregate(bool requireSuccess, Call[] calldata calls)
            external
            payable
            returns (Result[] memory returnData);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::sol_types::SolCall;

    #[test]
    fn selectors_are_distinct() {
        let selectors = [
            ILpNftVault::getWhitelistedNFTCountCall::SELECTOR,
            ILpNftVault::getWhitelistedNFTsCall::SELECTOR,
            ILpNftVault::getPositionInfoCall::SELECTOR,
            ILpNftVault::getDepositCall::SELECTOR,
            ILpNftVault::shouldHedgePositionCall::SELECTOR,
            IErc721Enumerable::balanceOfCall::SELECTOR,
            IErc721Enumerable::tokenOfOwnerByIndexCall::SELECTOR,
            IHedgeManager::getHedgeStatusCall::SELECTOR,
            IMulticall3::tryAggregateCall::SELECTOR,
        ];
        for (i, a) in selectors.iter().enumerate() {
            for b in selectors.iter().skip(i + 1) {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn balance_of_matches_erc721_selector() {
        // balanceOf(address) is the standard ERC-721 selector 0x70a08231.
        assert_eq!(IErc721Enumerable::balanceOfCall::SELECTOR, [0x70, 0xa0, 0x82, 0x31]);
    }
}
