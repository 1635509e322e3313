/*
 * Uniswap V3 integration module
 */

mod quoter;
mod router;
mod types;

pub use quoter::QuoteClient;
pub use router::{SwapExecutor, DEFAULT_DEADLINE_SECS};
pub use types::{
    decode_quote_exact_input, decode_quote_exact_output, encode_quote_exact_input_single,
    encode_quote_exact_output_single, EXACT_INPUT_SINGLE, QUOTE_EXACT_INPUT_SINGLE,
    QUOTE_EXACT_OUTPUT_SINGLE,
};

pub const FEE_LOW: u32 = 500;
pub const FEE_MEDIUM: u32 = 3000;
pub const FEE_HIGH: u32 = 10_000;
