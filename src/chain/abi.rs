//! Read-only contract interfaces used by the engine and breakdown formulas.

use alloy_sol_types::sol;

sol! {
    interface IERC20 {
        function decimals() external view returns (uint8);
        function name() external view returns (string memory);
        function symbol() external view returns (string memory);
        function totalSupply() external view returns (uint256);
        function balanceOf(address account) external view returns (uint256);
    }
}

sol! {
    interface IBeefyVault {
        function getPricePerFullShare() external view returns (uint256);
        function balance() external view returns (uint256);
        function totalSupply() external view returns (uint256);
        function want() external view returns (address);
        function strategy() external view returns (address);
    }
}

sol! {
    interface IBeefyStrategy {
        function vault() external view returns (address);
    }
}

sol! {
    /// Concentrated liquidity manager and its wrapping vaults.
    interface IBeefyClmManager {
        function wants() external view returns (address token0, address token1);
        function balances() external view returns (uint256 amount0, uint256 amount1);
        function totalSupply() external view returns (uint256);
    }
}

sol! {
    interface IUniV2Pair {
        function token0() external view returns (address);
        function token1() external view returns (address);
        function reserve0() external view returns (uint256);
        function reserve1() external view returns (uint256);
        function totalSupply() external view returns (uint256);
    }
}

sol! {
    interface ISolidlyPool {
        function metadata() external view returns (
            uint256 dec0,
            uint256 dec1,
            uint256 r0,
            uint256 r1,
            bool st,
            address t0,
            address t1
        );
        function totalSupply() external view returns (uint256);
    }
}

sol! {
    interface IGammaHypervisor {
        function getTotalAmounts() external view returns (uint256 total0, uint256 total1);
        function token0() external view returns (address);
        function token1() external view returns (address);
        function totalSupply() external view returns (uint256);
    }
}

sol! {
    interface IIchiVault {
        function getBasePosition() external view returns (uint128 liquidity, uint256 amount0, uint256 amount1);
        function getLimitPosition() external view returns (uint128 liquidity, uint256 amount0, uint256 amount1);
        function token0() external view returns (address);
        function token1() external view returns (address);
        function totalSupply() external view returns (uint256);
    }
}

sol! {
    interface IBalancerPool {
        function getVault() external view returns (address);
        function getPoolId() external view returns (bytes32);
        function getActualSupply() external view returns (uint256);
    }
}

sol! {
    interface IBalancerVault {
        function getPoolTokens(bytes32 poolId) external view returns (
            address[] memory tokens,
            uint256[] memory balances,
            uint256 lastChangeBlock
        );
    }
}

sol! {
    interface ICurvePool {
        function coins(uint256 i) external view returns (address);
        function balances(uint256 i) external view returns (uint256);
        function totalSupply() external view returns (uint256);
    }
}

sol! {
    interface IPendleMarket {
        struct MarketState {
            int256 totalPt;
            int256 totalSy;
            int256 totalLp;
            address treasury;
            int256 scalarRoot;
            uint256 expiry;
            uint256 lnFeeRateRoot;
            uint256 reserveFeePercent;
            uint256 lastLnImpliedRate;
        }

        function readTokens() external view returns (address sy, address pt, address yt);
        function readState(address router) external view returns (MarketState memory market);
    }
}

sol! {
    interface IPendleSy {
        function yieldToken() external view returns (address);
    }
}
