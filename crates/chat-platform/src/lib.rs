pub mod storage;
pub mod socket;
pub mod clock;

pub use clock::BrowserClock;
pub use socket::BrowserSocket;
