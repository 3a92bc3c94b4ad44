pub mod app;
pub mod contact;
pub mod device;
pub mod ids;
pub mod push;
pub mod session;

pub use app::*;
pub use contact::*;
pub use device::*;
pub use ids::*;
pub use push::*;
pub use session::*;
