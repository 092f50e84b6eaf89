pub mod complaint;
pub mod fee;
pub mod incident;
pub mod payment;
pub mod profile;
pub mod residence;
pub mod upload;

pub use complaint::*;
pub use fee::*;
pub use incident::*;
pub use payment::*;
pub use profile::*;
pub use residence::*;
pub use upload::*;
