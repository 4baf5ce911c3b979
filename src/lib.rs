// lib.rs - 导出公共接口供集成测试使用

pub mod compensation;
pub mod config;
pub mod destination;
pub mod error;
pub mod executor;
pub mod fees;
pub mod registry;
pub mod routes;
pub mod rpc;
pub mod token;
pub mod types;

// 重新导出常用类型
pub use compensation::{compute_fee_compensation, FeeCompensation, FeeCompensationInput, FeeWallet};
pub use destination::{analyse_destination, DestinationAccount};
pub use error::{SourceValidationError, SwapError, SwapResult};
pub use executor::{BuilderConfig, SwapRequest, TransactionBuilder};
pub use fees::{FeeSchedule, SwapFeeCalculator};
pub use registry::{RegistryHandle, SwapRegistry};
pub use routes::{generate_routes, trade_id, Route, RouteConfigs};
pub use rpc::SwapRpcClient;
pub use types::{FeeAmount, PreparedTransaction, SwapPreparation};
