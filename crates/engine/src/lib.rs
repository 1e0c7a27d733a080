pub mod act;
pub mod collaborators;
pub mod collateralization;
pub mod facade;
pub mod memory;
pub mod oracle;
pub mod readiness;
pub mod staking;
pub mod valuation;

pub use act::FacadeAct;
pub use facade::FacadeRead;
