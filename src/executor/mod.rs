// 交易构建流水线
pub mod builder;
pub mod context;

// 池子兑换指令与报价
pub mod swap;

// 导出
pub use builder::{BuilderConfig, TransactionBuilder};
pub use context::{BuildContext, SwapRequest};
