mod router;
mod subscribers;

pub use router::{Dispatch, DispatchStats, MessageRouter};
pub use subscribers::{Subscribers, Subscription};
