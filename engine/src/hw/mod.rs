pub mod pcm;
pub mod pointer;
pub mod regs;
pub mod traits;
pub mod transport;

pub use traits::{Mailbox, RdmaStatusSource};
pub use transport::{AckPolicy, Transport};
