pub mod check;
pub mod feeds;
pub mod run;
pub mod subscribe;
pub mod subscriptions;
pub mod unsubscribe;
