mod channel;

pub use channel::{Channel, SubscribeOptions, Subscription};
