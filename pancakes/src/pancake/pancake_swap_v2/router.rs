use alloy::primitives::{Address, Bytes, U256};
use alloy::sol_types::SolCall;

pub fn format_token(amount: U256, decimals: u32) -> String {
    let base = U256::from(10u64).pow(U256::from(decimals));
    let whole = amount / base;
    let frac = amount % base;
    if frac.is_zero() {
        return format!("{whole}");
    }
    let mut frac_str = format!("{:0width$}", frac, width = decimals as usize);
    while frac_str.ends_with('0') {
        frac_str.pop();
    }
    format!("{whole}.{frac_str}")
}

alloy::sol! {
    #[sol(rpc)]
    interface IPancakeRouter02 {
        function getAmountsOut(uint amountIn, address[] calldata path) external view returns (uint[] memory amounts);

        function swapExactETHForTokensSupportingFeeOnTransferTokens(
            uint amountOutMin,
            address[] calldata path,
            address to,
            uint deadline
        ) external payable;

        function swapExactTokensForETHSupportingFeeOnTransferTokens(
            uint amountIn,
            uint amountOutMin,
            address[] calldata path,
            address to,
            uint deadline
        ) external;
    }

    #[sol(rpc)]
    interface IPancakeFactory {
        function getPair(address tokenA, address tokenB) view returns (address pair);
    }

    #[sol(rpc)]
    interface IERC20 {
        event Transfer(address indexed from, address indexed to, uint256 value);

        function allowance(address owner, address spender) view returns (uint256);
        function approve(address spender, uint256 value) returns (bool);
        function balanceOf(address owner) view returns (uint256);
        function decimals() view returns (uint8);
        function symbol() view returns (string);
    }

    #[sol(rpc)]
    interface IWBNB {
        event Withdrawal(address indexed src, uint256 wad);
    }
}

/// Calldata for buying `path.last()` with the attached BNB value.
pub fn buy_calldata(min_out: U256, path: Vec<Address>, to: Address, deadline: U256) -> Bytes {
    IPancakeRouter02::swapExactETHForTokensSupportingFeeOnTransferTokensCall {
        amountOutMin: min_out,
        path,
        to,
        deadline,
    }
    .abi_encode()
    .into()
}

/// Calldata for selling `amount_in` of `path[0]` for BNB.
pub fn sell_calldata(
    amount_in: U256,
    min_out: U256,
    path: Vec<Address>,
    to: Address,
    deadline: U256,
) -> Bytes {
    IPancakeRouter02::swapExactTokensForETHSupportingFeeOnTransferTokensCall {
        amountIn: amount_in,
        amountOutMin: min_out,
        path,
        to,
        deadline,
    }
    .abi_encode()
    .into()
}

pub fn approve_calldata(spender: Address, value: U256) -> Bytes {
    IERC20::approveCall { spender, value }.abi_encode().into()
}
