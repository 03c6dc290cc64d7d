pub mod channel_layer;
pub mod event;

pub use channel_layer::{AlertBroadcaster, ChannelLayer, Subscription, ALERTS_GROUP};
pub use event::AlertNotification;
