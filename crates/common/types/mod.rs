mod account;
mod block;
mod genesis;
mod receipt;
mod transaction;

pub use account::*;
pub use block::*;
pub use genesis::*;
pub use receipt::*;
pub use transaction::*;

pub type BlockHash = ethereum_types::H256;
pub type BlockNumber = u64;
